//! Bearer-token authentication

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{tokens::TokenLedger, transaction::TransactionCoordinator};
use crate::{
    config::AuthConfig,
    error::{AppResult, AuthError},
    models::{token::TokenClaims, Principal, TokenType},
    repository::Repository,
};

/// Turns a presented bearer token into a [`Principal`]
#[derive(Clone)]
pub struct SessionAuthenticator<S> {
    coordinator: TransactionCoordinator<S>,
    ledger: TokenLedger<S>,
    config: Arc<AuthConfig>,
}

impl<S: Repository> SessionAuthenticator<S> {
    pub fn new(
        coordinator: TransactionCoordinator<S>,
        ledger: TokenLedger<S>,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            coordinator,
            ledger,
            config,
        }
    }

    /// Validate `bearer` for an endpoint requiring `required` tokens.
    ///
    /// Gates run in a fixed order and the first failing one names the error:
    /// signature, ledger presence, revocation, expiry, type, then owner.
    /// The principal carries the owner's current role.
    pub async fn authenticate(&self, bearer: &str, required: TokenType) -> AppResult<Principal> {
        let claims = TokenClaims::from_token(bearer, &self.config.jwt_secret).map_err(|e| {
            tracing::debug!("Rejected bearer token: {}", e);
            AuthError::InvalidCredential
        })?;
        let subject = claims.user_id().ok_or(AuthError::InvalidCredential)?;

        let now = self.ledger.now();
        let this = self.clone();
        let bearer = bearer.to_string();

        self.coordinator
            .read_only(move |tx| {
                Box::pin(async move { this.check_in(tx, &bearer, subject, required, now).await })
            })
            .await
    }

    async fn check_in(
        &self,
        tx: &mut S::Tx,
        bearer: &str,
        subject: i32,
        required: TokenType,
        now: DateTime<Utc>,
    ) -> AppResult<Principal> {
        let token = self
            .ledger
            .find_in(tx, bearer)
            .await?
            .ok_or(AuthError::UnknownToken)?;

        if token.is_revoked {
            return Err(AuthError::Revoked.into());
        }
        if token.is_expired_at(now) {
            return Err(AuthError::Expired.into());
        }
        if token.token_type != required {
            return Err(AuthError::WrongType.into());
        }
        if token.user_id != subject {
            return Err(AuthError::InvalidCredential.into());
        }

        let user = self
            .coordinator
            .store()
            .users_get_by_id(tx, token.user_id)
            .await?
            .ok_or(AuthError::PrincipalGone)?;

        Ok(Principal::new(user.id, user.role))
    }
}
