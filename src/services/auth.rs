//! Login, refresh-token rotation and logout

use super::{
    session::SessionAuthenticator, tokens::TokenLedger, transaction::TransactionCoordinator,
    users::verify_password,
};
use crate::{
    error::{AppResult, AuthError},
    models::{
        token::{IssuedToken, TokenPair},
        Principal, TokenType,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct AuthService<S> {
    coordinator: TransactionCoordinator<S>,
    ledger: TokenLedger<S>,
    session: SessionAuthenticator<S>,
}

impl<S: Repository> AuthService<S> {
    pub fn new(
        coordinator: TransactionCoordinator<S>,
        ledger: TokenLedger<S>,
        session: SessionAuthenticator<S>,
    ) -> Self {
        Self {
            coordinator,
            ledger,
            session,
        }
    }

    /// Check credentials and issue an access + refresh pair atomically
    pub async fn login(&self, login: &str, password: &str) -> AppResult<TokenPair> {
        let store = self.coordinator.store().clone();
        let login = login.trim().to_string();
        let user = self
            .coordinator
            .read_only(move |tx| Box::pin(async move { store.users_get_by_login(tx, &login).await }))
            .await?
            .ok_or(AuthError::InvalidLogin)?;

        if !verify_password(&user, password)? {
            tracing::info!("Failed login attempt for user {}", user.id);
            return Err(AuthError::InvalidLogin.into());
        }

        let ledger = self.ledger.clone();
        let user_id = user.id;
        let (access, refresh) = self
            .coordinator
            .run(move |tx| Box::pin(async move { ledger.issue_pair_in(tx, user_id).await }))
            .await?;

        tracing::info!("User {} logged in", user_id);
        Ok(self.pair(access, refresh))
    }

    /// Trade a refresh token for a new pair. The presented token is revoked
    /// in the same transaction, so of two concurrent refreshes only one wins.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<TokenPair> {
        let principal = self
            .session
            .authenticate(refresh_token, TokenType::Refresh)
            .await?;

        let this = self.clone();
        let refresh_token = refresh_token.to_string();
        let (access, refresh) = self
            .coordinator
            .run(move |tx| {
                Box::pin(async move { this.rotate_in(tx, &refresh_token, principal.user_id).await })
            })
            .await?;

        Ok(self.pair(access, refresh))
    }

    async fn rotate_in(
        &self,
        tx: &mut S::Tx,
        refresh_token: &str,
        user_id: i32,
    ) -> AppResult<(IssuedToken, IssuedToken)> {
        if !self.ledger.revoke_in(tx, refresh_token).await? {
            return Err(AuthError::Revoked.into());
        }
        self.ledger.issue_pair_in(tx, user_id).await
    }

    /// Revoke the presented access token, and the refresh token too when
    /// given and owned by the same user.
    pub async fn logout(&self, access_token: &str, refresh_token: Option<String>) -> AppResult<()> {
        let principal = self
            .session
            .authenticate(access_token, TokenType::Access)
            .await?;

        let this = self.clone();
        let access_token = access_token.to_string();
        self.coordinator
            .run(move |tx| {
                Box::pin(async move {
                    this.logout_in(tx, principal, &access_token, refresh_token.as_deref())
                        .await
                })
            })
            .await?;

        tracing::info!("User {} logged out", principal.user_id);
        Ok(())
    }

    async fn logout_in(
        &self,
        tx: &mut S::Tx,
        principal: Principal,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> AppResult<()> {
        self.ledger.revoke_in(tx, access_token).await?;

        if let Some(refresh_token) = refresh_token {
            match self.ledger.find_in(tx, refresh_token).await? {
                Some(token) if token.user_id == principal.user_id => {
                    self.ledger.revoke_in(tx, refresh_token).await?;
                }
                _ => tracing::debug!("Ignoring foreign or unknown refresh token on logout"),
            }
        }
        Ok(())
    }

    /// Revoke every token of the principal
    pub async fn logout_all(&self, principal: &Principal) -> AppResult<u64> {
        self.ledger.revoke_all_for_user(principal.user_id).await
    }

    fn pair(&self, access: IssuedToken, refresh: IssuedToken) -> TokenPair {
        TokenPair {
            expires_in: (access.expires_at - access.created_at).num_seconds(),
            refresh_expires_in: (refresh.expires_at - refresh.created_at).num_seconds(),
            access_token: access.token_value,
            refresh_token: refresh.token_value,
            token_type: "Bearer".to_string(),
        }
    }
}
