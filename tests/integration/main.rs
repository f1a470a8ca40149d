mod api_tests;
mod common;
mod ownership;
mod rentals;
mod transactions;
