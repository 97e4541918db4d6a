//! Binding for a hosted identity service with a REST table gateway.
//!
//! Accounts live in the identity service under the synthetic email; the
//! counter lives in a `users` table keyed by the account id. The wire shape
//! follows the Supabase auth (`/auth/v1`) and PostgREST (`/rest/v1`) APIs.

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use shared::domain::{synthetic_email, username_from_email, UserId, UserState, DEFAULT_COINS};
use tracing::{debug, info, warn};

use crate::{
    BackendBinding, BackendError, Identity, LoginOutcome, RegisterOutcome, SessionBackend,
};

const PROFILE_TABLE: &str = "users";
const SINGLE_OBJECT_MEDIA_TYPE: &str = "application/vnd.pgrst.object+json";

#[derive(Debug, Serialize)]
struct EmailPasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: UserId,
    #[serde(default)]
    email: Option<String>,
}

/// Sign-up answers with a session when confirmation is disabled and with the
/// bare user object otherwise.
#[derive(Debug, Deserialize)]
struct SignUpResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    user: Option<AuthUser>,
    #[serde(default)]
    id: Option<UserId>,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Answer of both the password and the refresh token grants.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_identity(self, fallback_username: &str) -> Identity {
        debug!(user_id = %self.user.id, expires_in = ?self.expires_in, "issued access token");
        let username = self
            .user
            .email
            .as_deref()
            .map(username_from_email)
            .unwrap_or(fallback_username)
            .to_string();
        let mut identity =
            Identity::new(self.user.id, username).with_access_token(self.access_token);
        identity.refresh_token = self.refresh_token;
        if let Some(email) = self.user.email {
            identity.email = email;
        }
        identity
    }
}

#[derive(Debug, Serialize)]
struct ProfileInsert<'a> {
    id: &'a UserId,
    username: &'a str,
    counter: u64,
}

#[derive(Debug, Serialize)]
struct CounterPatch {
    counter: u64,
}

#[derive(Debug, Deserialize)]
struct CounterRow {
    #[serde(default)]
    counter: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
            .filter(|message| !message.trim().is_empty())
    }
}

pub struct HostedAuthBackend {
    http: Client,
    project_url: String,
    anon_key: String,
}

impl HostedAuthBackend {
    pub fn new(project_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self::with_client(Client::new(), project_url, anon_key)
    }

    pub fn with_client(
        http: Client,
        project_url: impl Into<String>,
        anon_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            project_url: project_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str, bearer: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.project_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    fn bearer<'a>(&'a self, identity: &'a Identity) -> &'a str {
        identity.access_token.as_deref().unwrap_or(&self.anon_key)
    }

    fn profile_path(&self) -> String {
        format!("/rest/v1/{PROFILE_TABLE}")
    }

    async fn insert_profile(
        &self,
        user_id: &UserId,
        username: &str,
        bearer: &str,
    ) -> Result<(), BackendError> {
        let res = self
            .request(reqwest::Method::POST, &self.profile_path(), bearer)
            .header("Prefer", "return=minimal")
            .json(&[ProfileInsert {
                id: user_id,
                username,
                counter: 0,
            }])
            .send()
            .await?;
        expect_success(res, "profile insert").await?;
        Ok(())
    }
}

/// Like [`expect_success`], but an expired or rejected token becomes
/// [`BackendError::Unauthorized`] so the caller can refresh and retry.
async fn expect_authorized(res: Response, operation: &str) -> Result<Response, BackendError> {
    if res.status() == StatusCode::UNAUTHORIZED {
        return Err(BackendError::Unauthorized);
    }
    expect_success(res, operation).await
}

/// Passes 2xx responses through and turns anything else into `Rejected`
/// with the service's own wording when it sent one.
async fn expect_success(res: Response, operation: &str) -> Result<Response, BackendError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| format!("{operation} failed with status {status}"));
    Err(BackendError::Rejected(message))
}

#[async_trait]
impl SessionBackend for HostedAuthBackend {
    fn binding(&self) -> BackendBinding {
        BackendBinding::HostedAuth
    }

    async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<RegisterOutcome, BackendError> {
        let email = synthetic_email(username);
        let res = self
            .request(reqwest::Method::POST, "/auth/v1/signup", &self.anon_key)
            .json(&EmailPasswordRequest {
                email: &email,
                password,
            })
            .send()
            .await?;
        let body: SignUpResponse = expect_success(res, "sign-up")
            .await?
            .json()
            .await
            .map_err(|err| BackendError::Malformed(format!("sign-up: {err}")))?;

        let user_id = body
            .user
            .map(|user| user.id)
            .or(body.id)
            .ok_or_else(|| BackendError::Malformed("sign-up: response has no user id".into()))?;

        let bearer = body.access_token.as_deref().unwrap_or(&self.anon_key);
        if let Err(err) = self.insert_profile(&user_id, username, bearer).await {
            warn!(user_id = %user_id, error = %err, "failed to insert user profile row");
        }

        info!(user_id = %user_id, "registered hosted account");
        Ok(RegisterOutcome {
            user_id: Some(user_id),
            message: None,
        })
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, BackendError> {
        let email = synthetic_email(username);
        let res = self
            .request(
                reqwest::Method::POST,
                "/auth/v1/token?grant_type=password",
                &self.anon_key,
            )
            .json(&EmailPasswordRequest {
                email: &email,
                password,
            })
            .send()
            .await?;
        let body: TokenResponse = expect_success(res, "sign-in")
            .await?
            .json()
            .await
            .map_err(|err| BackendError::Malformed(format!("sign-in: {err}")))?;

        Ok(LoginOutcome {
            identity: body.into_identity(username),
            state: None,
        })
    }

    async fn fetch_user_state(&self, identity: &Identity) -> Result<UserState, BackendError> {
        let res = self
            .request(
                reqwest::Method::GET,
                &self.profile_path(),
                self.bearer(identity),
            )
            .header(header::ACCEPT, SINGLE_OBJECT_MEDIA_TYPE)
            .query(&[
                ("select", "counter".to_string()),
                ("id", format!("eq.{}", identity.user_id)),
            ])
            .send()
            .await?;
        let row: CounterRow = expect_authorized(res, "profile fetch")
            .await?
            .json()
            .await
            .map_err(|err| BackendError::Malformed(format!("profile fetch: {err}")))?;
        Ok(UserState {
            counter: row.counter.unwrap_or(0),
            coins: DEFAULT_COINS,
        })
    }

    async fn update_counter(&self, identity: &Identity, counter: u64) -> Result<(), BackendError> {
        let res = self
            .request(
                reqwest::Method::PATCH,
                &self.profile_path(),
                self.bearer(identity),
            )
            .header("Prefer", "return=minimal")
            .query(&[("id", format!("eq.{}", identity.user_id))])
            .json(&CounterPatch { counter })
            .send()
            .await?;
        expect_authorized(res, "counter update").await?;
        Ok(())
    }

    async fn check_session(&self, identity: &Identity) -> Result<bool, BackendError> {
        let Some(token) = identity.access_token.as_deref() else {
            return Ok(false);
        };
        let res = self
            .request(reqwest::Method::GET, "/auth/v1/user", token)
            .send()
            .await?;
        match res.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(false),
            _ => {
                expect_success(res, "session check").await?;
                Ok(true)
            }
        }
    }

    async fn refresh_session(&self, identity: &Identity) -> Result<Option<Identity>, BackendError> {
        let Some(refresh_token) = identity.refresh_token.as_deref() else {
            return Ok(None);
        };
        let res = self
            .request(
                reqwest::Method::POST,
                "/auth/v1/token?grant_type=refresh_token",
                &self.anon_key,
            )
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;
        if matches!(
            res.status(),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            info!(user_id = %identity.user_id, status = %res.status(), "refresh token refused");
            return Ok(None);
        }
        let body: TokenResponse = expect_success(res, "token refresh")
            .await?
            .json()
            .await
            .map_err(|err| BackendError::Malformed(format!("token refresh: {err}")))?;

        let mut refreshed = body.into_identity(&identity.username);
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = identity.refresh_token.clone();
        }
        info!(user_id = %refreshed.user_id, "refreshed hosted session");
        Ok(Some(refreshed))
    }

    async fn sign_out(&self, identity: &Identity) -> Result<(), BackendError> {
        let Some(token) = identity.access_token.as_deref() else {
            return Ok(());
        };
        let res = self
            .request(reqwest::Method::POST, "/auth/v1/logout", token)
            .send()
            .await?;
        if res.status() == StatusCode::UNAUTHORIZED {
            return Err(BackendError::Unauthorized);
        }
        expect_success(res, "sign-out").await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/hosted_auth_tests.rs"]
mod tests;
