use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::clock::{Clock, SystemClock};
use crate::models::{AuthResponse, LoginRequest, RegisterRequest, User};

use super::claims::peek_claims;
use super::credentials::{CredentialStore, StorageError, TOKEN_KEY, USER_KEY};
use super::guard::{self, GuardDecision, Navigator, LANDING_PATH};
use super::validation::{validate_login, RegistrationForm, ValidationError};

/// Pause between a successful registration and the move to the landing page,
/// long enough for the confirmation to be read.
pub const REGISTER_REDIRECT_DELAY: Duration = Duration::from_millis(1500);

/// Remote identity provider: the `/api/auth/*` endpoints.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError>;
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub token: String,
    pub user: User,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server response did not include a token and user")]
    IncompleteResponse,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Classify an identity call failure. `operation` names the call in the
    /// fallback message used when the server sent none.
    fn from_api(err: ApiError, operation: &str) -> Self {
        if err.is_transport() {
            return SessionError::Network(err.to_string());
        }
        match err.status() {
            Some(status) => {
                let message = err
                    .body()
                    .and_then(|b| b.message.clone())
                    .unwrap_or_else(|| format!("{} failed ({})", operation, status));
                SessionError::Server { status, message }
            }
            None => match err {
                ApiError::InvalidResponse(_) => SessionError::IncompleteResponse,
                other => SessionError::Network(other.to_string()),
            },
        }
    }
}

/// Client side of the session lifecycle.
///
/// Owns no state of its own: the token and profile live in the
/// `CredentialStore`, the location lives in the `Navigator`.
pub struct SessionManager {
    identity: Arc<dyn IdentityService>,
    store: Arc<dyn CredentialStore>,
    navigator: Arc<Navigator>,
    clock: Arc<dyn Clock>,
    register_redirect_delay: Duration,
}

impl SessionManager {
    pub fn new(
        identity: Arc<dyn IdentityService>,
        store: Arc<dyn CredentialStore>,
        navigator: Arc<Navigator>,
    ) -> Self {
        Self {
            identity,
            store,
            navigator,
            clock: Arc::new(SystemClock),
            register_redirect_delay: REGISTER_REDIRECT_DELAY,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_register_delay(mut self, delay: Duration) -> Self {
        self.register_redirect_delay = delay;
        self
    }

    pub fn navigator(&self) -> &Arc<Navigator> {
        &self.navigator
    }

    // ===== Register / Login / Logout =====

    /// Validate the form locally, create the account, persist the session and
    /// move to the landing page after the confirmation delay.
    pub async fn register(&self, form: &RegistrationForm) -> Result<SessionData, SessionError> {
        form.validate()?;

        let request = RegisterRequest {
            name: form.name.clone(),
            email: form.email.clone(),
            password: form.password.clone(),
        };
        let response = self
            .identity
            .register(&request)
            .await
            .map_err(|e| SessionError::from_api(e, "Registration"))?;

        let session = self.persist(response)?;
        info!(user = %session.user.email, "Registered");

        if !self.register_redirect_delay.is_zero() {
            tokio::time::sleep(self.register_redirect_delay).await;
        }
        self.navigator.go(LANDING_PATH);
        Ok(session)
    }

    /// Sign in and navigate immediately, resuming at the page the guard
    /// redirected away from when there was one.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionData, SessionError> {
        validate_login(email, password)?;

        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self
            .identity
            .login(&request)
            .await
            .map_err(|e| SessionError::from_api(e, "Login"))?;

        let session = self.persist(response)?;
        info!(user = %session.user.email, "Logged in");

        let target = guard::resume_target(&self.navigator.current())
            .unwrap_or_else(|| LANDING_PATH.to_string());
        self.navigator.go(target);
        Ok(session)
    }

    /// Clear the stored session and go to the logout confirmation page.
    /// Storage failures are logged; the navigation always happens.
    pub fn logout(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "Failed to clear credential");
            }
        }
        self.navigator.go(guard::logout_location());
    }

    fn persist(&self, response: AuthResponse) -> Result<SessionData, SessionError> {
        let (token, user) = response
            .into_parts()
            .ok_or(SessionError::IncompleteResponse)?;
        let user_json = serde_json::to_string(&user).map_err(StorageError::from)?;
        self.store.set(TOKEN_KEY, &token)?;
        self.store.set(USER_KEY, &user_json)?;
        Ok(SessionData { token, user })
    }

    // ===== Queries =====

    /// Advisory check of the stored token's `exp` claim.
    ///
    /// An expired token is cleared (and the client sent to the logout page).
    /// Undecodable tokens and an unreadable store both count as signed out.
    pub fn is_authenticated(&self) -> bool {
        let token = match self.store.get(TOKEN_KEY) {
            Ok(Some(token)) => token,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "Credential store unavailable");
                return false;
            }
        };

        match peek_claims(&token) {
            Ok(claims) if claims.is_expired(self.clock.as_ref()) => {
                debug!("Stored token has expired");
                self.logout();
                false
            }
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Stored token is unreadable");
                false
            }
        }
    }

    /// Run the route guard for `path`, following any redirect it decides on.
    pub fn guard(&self, path: &str) -> GuardDecision {
        let decision = guard::decide(path, self.is_authenticated());
        if let GuardDecision::Redirect(ref target) = decision {
            self.navigator.go(target.clone());
        }
        decision
    }

    pub fn token(&self) -> Option<String> {
        self.store.get(TOKEN_KEY).ok().flatten()
    }

    pub fn current_user(&self) -> Option<User> {
        let json = self.store.get(USER_KEY).ok().flatten()?;
        match serde_json::from_str(&json) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Stored user profile is unreadable");
                None
            }
        }
    }

    pub fn session(&self) -> Option<SessionData> {
        Some(SessionData {
            token: self.token()?,
            user: self.current_user()?,
        })
    }
}
