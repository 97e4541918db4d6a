//! Binding for the same-origin JSON API (`POST /api/*`).

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{UserState, DEFAULT_COINS},
    protocol::{
        ensure_success, AckResponse, BetGameRequest, BetGameResponse, CredentialsRequest,
        LoginResponse, UpdateCounterRequest, UserDataRequest, UserDataResponse,
    },
};
use tracing::debug;

use crate::{
    BackendBinding, BackendCapabilities, BackendError, BetOutcome, Identity, LoginOutcome,
    RegisterOutcome, SessionBackend,
};

pub struct HttpApiBackend {
    http: Client,
    base_url: String,
}

impl HttpApiBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<Req, Res>(&self, endpoint: &str, body: &Req) -> Result<Res, BackendError>
    where
        Req: Serialize + Sync,
        Res: DeserializeOwned,
    {
        let res = self
            .http
            .post(format!("{}/api/{endpoint}", self.base_url))
            .json(body)
            .send()
            .await?;
        let status = res.status();
        debug!(endpoint, status = %status, "api call completed");

        // Error statuses still carry the `{success, message}` envelope when
        // the server produced them on purpose.
        let status_error = res.error_for_status_ref().err();
        let text = res.text().await?;
        match serde_json::from_str::<Res>(&text) {
            Ok(decoded) => Ok(decoded),
            Err(err) => match status_error {
                Some(status_error) => Err(BackendError::Transport(status_error)),
                None => Err(BackendError::Malformed(format!("{endpoint}: {err}"))),
            },
        }
    }
}

#[async_trait]
impl SessionBackend for HttpApiBackend {
    fn binding(&self) -> BackendBinding {
        BackendBinding::HttpApi
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities { bet_game: true }
    }

    async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<RegisterOutcome, BackendError> {
        let body: AckResponse = self
            .post(
                "register",
                &CredentialsRequest {
                    username: username.to_string(),
                    password: password.to_string(),
                },
            )
            .await?;
        ensure_success(body.success, body.message.as_deref(), "registration was refused")?;
        Ok(RegisterOutcome {
            user_id: None,
            message: body.message,
        })
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, BackendError> {
        let body: LoginResponse = self
            .post(
                "login",
                &CredentialsRequest {
                    username: username.to_string(),
                    password: password.to_string(),
                },
            )
            .await?;
        ensure_success(
            body.success,
            body.message.as_deref(),
            "incorrect username or password",
        )?;
        let user = body
            .user
            .ok_or_else(|| BackendError::Malformed("login: response has no user".into()))?;

        let state = (user.counter.is_some() || user.coins.is_some()).then(|| UserState {
            counter: user.counter.unwrap_or(0),
            coins: user.coins.unwrap_or(DEFAULT_COINS),
        });
        let username = user.username.unwrap_or_else(|| username.to_string());
        Ok(LoginOutcome {
            identity: Identity::new(user.id, username),
            state,
        })
    }

    async fn fetch_user_state(&self, identity: &Identity) -> Result<UserState, BackendError> {
        let body: UserDataResponse = self
            .post(
                "get_user_data",
                &UserDataRequest {
                    user_id: identity.user_id.clone(),
                },
            )
            .await?;
        ensure_success(body.success, body.message.as_deref(), "failed to load user data")?;
        Ok(UserState {
            counter: body.counter.unwrap_or(0),
            coins: body.coins.unwrap_or(DEFAULT_COINS),
        })
    }

    async fn update_counter(&self, identity: &Identity, counter: u64) -> Result<(), BackendError> {
        let body: AckResponse = self
            .post(
                "update_counter",
                &UpdateCounterRequest {
                    user_id: identity.user_id.clone(),
                    counter,
                },
            )
            .await?;
        ensure_success(body.success, body.message.as_deref(), "failed to save counter")?;
        Ok(())
    }

    async fn play_bet_game(
        &self,
        identity: &Identity,
        current_coins: u64,
    ) -> Result<BetOutcome, BackendError> {
        let body: BetGameResponse = self
            .post(
                "bet_game",
                &BetGameRequest {
                    user_id: identity.user_id.clone(),
                    current_coins,
                },
            )
            .await?;
        ensure_success(body.success, body.message.as_deref(), "bet was refused")?;
        let new_coins = body
            .new_coins
            .ok_or_else(|| BackendError::Malformed("bet_game: response has no new_coins".into()))?;
        Ok(BetOutcome {
            new_coins,
            is_odd: body.is_odd.unwrap_or(false),
            random_number: body.random_number,
            message: body.message.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
#[path = "tests/http_api_tests.rs"]
mod tests;
