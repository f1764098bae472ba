//! Client-side authentication state.
//!
//! Holds the logged-in profile, a loading flag and a user-facing error. The
//! bearer token is persisted in the local slot table so a restart resumes the
//! session; a profile lookup that fails with a stored token is treated as an
//! expired session and the token is dropped.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{AuthError, StoreError};
use crate::gateway::AuthApi;
use crate::models::{AuthToken, CreateUserRequest, LoginRequest, MeResponse};
use crate::storage::{Database, AUTH_TOKEN_KEY};

pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please login again.";
pub const LOGOUT_FAILED_MESSAGE: &str = "Logout failed. Please try again.";

/// Persisted bearer token slot
#[derive(Clone)]
pub struct TokenStore {
    db: Arc<Database>,
}

impl TokenStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Stored token, ignoring a blank slot
    pub async fn load(&self) -> Result<Option<String>, StoreError> {
        let token = self.db.get_config(AUTH_TOKEN_KEY).await?;
        Ok(token.filter(|t| !t.trim().is_empty()))
    }

    pub async fn store(&self, token: &str) -> Result<(), StoreError> {
        self.db.set_config(AUTH_TOKEN_KEY, token).await
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.db.delete_config(AUTH_TOKEN_KEY).await
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub me: Option<MeResponse>,
    pub loading: bool,
    pub error: Option<String>,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        self.me.is_some()
    }
}

#[derive(Clone)]
pub struct AuthContext {
    api: Arc<dyn AuthApi>,
    tokens: TokenStore,
    state: Arc<RwLock<AuthState>>,
}

impl AuthContext {
    /// Starts in the loading state until [`AuthContext::init`] has run
    pub fn new(api: Arc<dyn AuthApi>, tokens: TokenStore) -> Self {
        Self {
            api,
            tokens,
            state: Arc::new(RwLock::new(AuthState {
                loading: true,
                ..Default::default()
            })),
        }
    }

    pub async fn state(&self) -> AuthState {
        self.state.read().await.clone()
    }

    /// Resume a stored session, if there is one
    pub async fn init(&self) {
        let token = match self.tokens.load().await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("Failed to read stored token: {}", e);
                None
            }
        };

        match token {
            Some(token) => {
                self.api.use_token(Some(token)).await;
                self.load_profile().await;
            }
            None => {
                tracing::debug!("No stored token, starting logged out");
                self.state.write().await.loading = false;
            }
        }
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<(), AuthError> {
        self.set_loading(true).await;
        tracing::info!("Logging in as {}", request.username);

        match self.api.login(request).await {
            Ok(token) => self.start_session(token).await,
            Err(e) => {
                tracing::error!("Login failed: {}", e);
                self.set_loading(false).await;
                Err(e.into())
            }
        }
    }

    pub async fn register(&self, request: &CreateUserRequest) -> Result<(), AuthError> {
        self.set_loading(true).await;
        tracing::info!("Registering {}", request.username);

        match self.api.register(request).await {
            Ok(token) => self.start_session(token).await,
            Err(e) => {
                tracing::error!("Registration failed: {}", e);
                self.set_loading(false).await;
                Err(e.into())
            }
        }
    }

    pub async fn logout(&self) {
        self.set_loading(true).await;

        let result = self.api.logout().await;
        self.forget_token().await;

        let mut state = self.state.write().await;
        match result {
            Ok(()) => {
                tracing::info!("Logged out");
                state.me = None;
                state.error = None;
            }
            Err(e) => {
                tracing::error!("Logout failed: {}", e);
                state.error = Some(LOGOUT_FAILED_MESSAGE.to_string());
            }
        }
        state.loading = false;
    }

    async fn start_session(&self, token: AuthToken) -> Result<(), AuthError> {
        if let Err(e) = self.tokens.store(&token.token).await {
            self.set_loading(false).await;
            return Err(e.into());
        }
        self.api.use_token(Some(token.token)).await;
        self.load_profile().await;
        Ok(())
    }

    async fn load_profile(&self) {
        let result = self.api.me().await;
        if let Err(ref e) = result {
            tracing::error!("Failed to fetch user profile: {}", e);
            self.forget_token().await;
        }

        let mut state = self.state.write().await;
        match result {
            Ok(me) => {
                state.me = Some(me);
                state.error = None;
            }
            Err(_) => {
                state.me = None;
                state.error = Some(SESSION_EXPIRED_MESSAGE.to_string());
            }
        }
        state.loading = false;
    }

    async fn forget_token(&self) {
        if let Err(e) = self.tokens.clear().await {
            tracing::warn!("Failed to remove stored token: {}", e);
        }
        self.api.use_token(None).await;
    }

    async fn set_loading(&self, loading: bool) {
        self.state.write().await.loading = loading;
    }
}
