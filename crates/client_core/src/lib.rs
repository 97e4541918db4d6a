use std::{fmt, str::FromStr, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::domain::{synthetic_email, UserId, UserState};

pub mod controller;
pub mod error;
pub mod hosted_auth;
pub mod http_api;
pub mod validation;

pub use controller::{
    CounterWrite, GameResult, Panel, PersistedIdentity, Session, SessionController, Tone,
    ViewModel, WriteOutcome, IDENTITY_RECORD_KEY,
};
pub use error::{BackendError, Field, SessionError, ValidationError};
pub use hosted_auth::HostedAuthBackend;
pub use http_api::HttpApiBackend;
pub use validation::{PasswordRule, ValidationPolicy, Validator};

/// Which kind of service answers the [`SessionBackend`] calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendBinding {
    /// Same-origin JSON API under `/api/*`.
    #[default]
    HttpApi,
    /// Third-party identity service plus a `users` table behind a REST gateway.
    HostedAuth,
}

impl fmt::Display for BackendBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HttpApi => f.write_str("http_api"),
            Self::HostedAuth => f.write_str("hosted_auth"),
        }
    }
}

impl FromStr for BackendBinding {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "http_api" | "http" | "api" => Ok(Self::HttpApi),
            "hosted_auth" | "hosted" => Ok(Self::HostedAuth),
            other => Err(format!("unknown backend binding '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendCapabilities {
    pub bet_game: bool,
}

/// The signed-in account as the backend identifies it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Exchanged for a new access token once the current one expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Identity {
    pub fn new(user_id: UserId, username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            user_id,
            email: synthetic_email(&username),
            username,
            access_token: None,
            refresh_token: None,
        }
    }

    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterOutcome {
    pub user_id: Option<UserId>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub identity: Identity,
    /// Some backends return the stored counter with the login answer.
    pub state: Option<UserState>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BetOutcome {
    pub new_coins: u64,
    pub is_odd: bool,
    pub random_number: Option<u32>,
    pub message: String,
}

/// Credential and per-user data operations the session controller delegates.
///
/// Calls are awaited one at a time and never retried by the caller.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    fn binding(&self) -> BackendBinding;

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::default()
    }

    async fn register(&self, username: &str, password: &str)
        -> Result<RegisterOutcome, BackendError>;

    async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, BackendError>;

    async fn fetch_user_state(&self, identity: &Identity) -> Result<UserState, BackendError>;

    /// Fails with [`BackendError::Unauthorized`] when the credentials have
    /// expired.
    async fn update_counter(&self, identity: &Identity, counter: u64) -> Result<(), BackendError>;

    async fn play_bet_game(
        &self,
        _identity: &Identity,
        _current_coins: u64,
    ) -> Result<BetOutcome, BackendError> {
        Err(BackendError::Unsupported("bet game"))
    }

    /// Whether a restored identity is still signed in.
    async fn check_session(&self, _identity: &Identity) -> Result<bool, BackendError> {
        Ok(true)
    }

    /// Trades the refresh token for fresh credentials. `None` means the
    /// session cannot be renewed and the user has to sign in again.
    async fn refresh_session(&self, _identity: &Identity) -> Result<Option<Identity>, BackendError> {
        Ok(None)
    }

    async fn sign_out(&self, _identity: &Identity) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Connection settings for one backend binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    HttpApi { base_url: String },
    HostedAuth { project_url: String, anon_key: String },
}

impl BackendConfig {
    pub fn binding(&self) -> BackendBinding {
        match self {
            Self::HttpApi { .. } => BackendBinding::HttpApi,
            Self::HostedAuth { .. } => BackendBinding::HostedAuth,
        }
    }

    pub fn connect(self) -> Arc<dyn SessionBackend> {
        match self {
            Self::HttpApi { base_url } => Arc::new(HttpApiBackend::new(base_url)),
            Self::HostedAuth {
                project_url,
                anon_key,
            } => Arc::new(HostedAuthBackend::new(project_url, anon_key)),
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
