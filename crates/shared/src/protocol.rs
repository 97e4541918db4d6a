//! JSON bodies of the `/api/*` endpoints.
//!
//! Every response carries a `success` flag; failures put a human readable
//! reason in `message`.

use serde::{Deserialize, Serialize};

use crate::{domain::UserId, error::ApiError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginUser {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coins: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<LoginUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDataRequest {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDataResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coins: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCounterRequest {
    pub user_id: UserId,
    pub counter: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetGameRequest {
    pub user_id: UserId,
    pub current_coins: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetGameResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_coins: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_odd: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub random_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Turns a `{success, message}` pair into a result, using `fallback` when a
/// failed response carries no message.
pub fn ensure_success(
    success: bool,
    message: Option<&str>,
    fallback: &str,
) -> Result<(), ApiError> {
    if success {
        return Ok(());
    }
    match message {
        Some(message) if !message.trim().is_empty() => Err(ApiError::new(message)),
        _ => Err(ApiError::new(fallback)),
    }
}
