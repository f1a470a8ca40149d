//! Role-based authorization rules
//!
//! Pure functions over a [`Principal`]; callers load whatever targets the
//! decision needs first, so a missing target surfaces as not-found rather
//! than forbidden.

use crate::{
    error::{AppError, AppResult},
    models::{Principal, Role, User},
};

/// Admins act on anything, everyone else only on what they own
pub fn can_act_on_own_resource(principal: &Principal, owner_id: i32) -> bool {
    principal.is_admin() || principal.user_id == owner_id
}

/// Exact role match
pub fn require_role(principal: &Principal, role: Role) -> bool {
    principal.role == role
}

/// Desk staff may lend, return and extend on behalf of readers
pub fn can_manage_circulation(principal: &Principal) -> bool {
    matches!(principal.role, Role::Admin | Role::Librarian)
}

/// Owner of a book being created or updated. Only admins choose; an admin
/// who omits the owner gets the book.
pub fn resolve_book_owner(principal: &Principal, requested: Option<i32>) -> i32 {
    match principal.role {
        Role::Admin => requested.unwrap_or(principal.user_id),
        _ => principal.user_id,
    }
}

/// Borrower of a rental being created; readers always borrow for themselves
pub fn resolve_borrower(principal: &Principal, requested: Option<i32>) -> i32 {
    if can_manage_circulation(principal) {
        requested.unwrap_or(principal.user_id)
    } else {
        principal.user_id
    }
}

pub fn can_transfer(principal: &Principal, from_user_id: i32, destination: &User) -> bool {
    principal.is_admin()
        || (principal.user_id == from_user_id && destination.role == Role::User)
}

/// Turn a denied decision into a `Forbidden` error
pub fn ensure(allowed: bool, action: &str) -> AppResult<()> {
    if allowed {
        Ok(())
    } else {
        Err(AppError::Authorization(format!("Not allowed to {}", action)))
    }
}
