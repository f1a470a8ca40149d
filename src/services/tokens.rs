//! Issued-token ledger
//!
//! Every bearer token handed out is recorded here; the row, not the JWT
//! `exp` claim, decides whether a token is still usable.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::transaction::TransactionCoordinator;
use crate::{
    clock::Clock,
    config::AuthConfig,
    error::{AppError, AppResult},
    models::token::{IssuedToken, NewToken, TokenClaims, TokenType},
    repository::Repository,
};

#[derive(Clone)]
pub struct TokenLedger<S> {
    coordinator: TransactionCoordinator<S>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<S: Repository> TokenLedger<S> {
    pub fn new(
        coordinator: TransactionCoordinator<S>,
        config: Arc<AuthConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            coordinator,
            config,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Configured lifetime of a token type
    pub fn ttl(&self, token_type: TokenType) -> chrono::Duration {
        match token_type {
            TokenType::Access => self.config.access_token_ttl(),
            TokenType::Refresh => self.config.refresh_token_ttl(),
        }
    }

    /// Sign and record a new token inside the caller's transaction
    pub async fn issue_in(
        &self,
        tx: &mut S::Tx,
        user_id: i32,
        token_type: TokenType,
        ttl: chrono::Duration,
    ) -> AppResult<IssuedToken> {
        let now = self.clock.now();
        let expires_at = now + ttl;

        let claims = TokenClaims {
            sub: user_id.to_string(),
            typ: token_type,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token_value = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        let token = NewToken {
            user_id,
            token_value,
            token_type,
            expires_at,
            created_at: now,
        };

        self.coordinator.store().tokens_create(tx, &token).await
    }

    pub async fn issue(
        &self,
        user_id: i32,
        token_type: TokenType,
        ttl: chrono::Duration,
    ) -> AppResult<IssuedToken> {
        let ledger = self.clone();
        self.coordinator
            .run(move |tx| {
                Box::pin(async move { ledger.issue_in(tx, user_id, token_type, ttl).await })
            })
            .await
    }

    /// Access + refresh tokens with their configured lifetimes
    pub async fn issue_pair_in(
        &self,
        tx: &mut S::Tx,
        user_id: i32,
    ) -> AppResult<(IssuedToken, IssuedToken)> {
        let access = self
            .issue_in(tx, user_id, TokenType::Access, self.ttl(TokenType::Access))
            .await?;
        let refresh = self
            .issue_in(tx, user_id, TokenType::Refresh, self.ttl(TokenType::Refresh))
            .await?;
        Ok((access, refresh))
    }

    pub async fn find_in(&self, tx: &mut S::Tx, token_value: &str) -> AppResult<Option<IssuedToken>> {
        self.coordinator.store().tokens_find(tx, token_value).await
    }

    pub async fn find(&self, token_value: &str) -> AppResult<Option<IssuedToken>> {
        let ledger = self.clone();
        let token_value = token_value.to_string();
        self.coordinator
            .read_only(move |tx| Box::pin(async move { ledger.find_in(tx, &token_value).await }))
            .await
    }

    /// Revoke one token. Returns whether this call flipped the flag; unknown
    /// or already revoked tokens are not an error.
    pub async fn revoke_in(&self, tx: &mut S::Tx, token_value: &str) -> AppResult<bool> {
        let now = self.clock.now();
        self.coordinator
            .store()
            .tokens_revoke(tx, token_value, now)
            .await
    }

    pub async fn revoke(&self, token_value: &str) -> AppResult<bool> {
        let ledger = self.clone();
        let token_value = token_value.to_string();
        self.coordinator
            .run(move |tx| Box::pin(async move { ledger.revoke_in(tx, &token_value).await }))
            .await
    }

    pub async fn revoke_all_for_user_in(&self, tx: &mut S::Tx, user_id: i32) -> AppResult<u64> {
        let now = self.clock.now();
        self.coordinator
            .store()
            .tokens_revoke_all_for_user(tx, user_id, now)
            .await
    }

    pub async fn revoke_all_for_user(&self, user_id: i32) -> AppResult<u64> {
        let ledger = self.clone();
        let revoked = self
            .coordinator
            .run(move |tx| {
                Box::pin(async move { ledger.revoke_all_for_user_in(tx, user_id).await })
            })
            .await?;

        tracing::info!("Revoked {} tokens of user {}", revoked, user_id);
        Ok(revoked)
    }

    /// Hard delete; only a cascading user delete does this
    pub async fn delete_all_for_user_in(&self, tx: &mut S::Tx, user_id: i32) -> AppResult<u64> {
        self.coordinator
            .store()
            .tokens_delete_all_for_user(tx, user_id)
            .await
    }

    /// Delete every token already expired
    pub async fn purge_expired(&self) -> AppResult<u64> {
        let store = self.coordinator.store().clone();
        let now = self.clock.now();
        let purged = self
            .coordinator
            .run(move |tx| Box::pin(async move { store.tokens_purge_expired(tx, now).await }))
            .await?;

        if purged > 0 {
            tracing::info!("Purged {} expired tokens", purged);
        }
        Ok(purged)
    }

    /// Sweep expired tokens every `period` until the handle is aborted
    pub fn spawn_purge_task(&self, period: Duration) -> JoinHandle<()> {
        let ledger = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                if let Err(e) = ledger.purge_expired().await {
                    tracing::warn!("Expired token purge failed: {}", e);
                }
            }
        })
    }
}
