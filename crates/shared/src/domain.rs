use std::fmt;

use serde::{Deserialize, Serialize};

/// Coin balance every account starts with, and the balance shown after logout.
pub const DEFAULT_COINS: u64 = 1000;

/// Coins wagered by one round of the bet game.
pub const BET_STAKE: u64 = 100;

/// Domain appended to usernames to build the email-shaped account identifier.
pub const SYNTHETIC_EMAIL_DOMAIN: &str = "example.com";

/// Backend-assigned account identifier.
///
/// Backends hand out either integer row ids or UUID strings; the client never
/// interprets the value and sends it back exactly as received.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        Self::Numeric(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserState {
    pub counter: u64,
    pub coins: u64,
}

impl Default for UserState {
    fn default() -> Self {
        Self {
            counter: 0,
            coins: DEFAULT_COINS,
        }
    }
}

pub fn synthetic_email(username: &str) -> String {
    format!("{username}@{SYNTHETIC_EMAIL_DOMAIN}")
}

/// Recovers the username from a synthetic email; other addresses pass through unchanged.
pub fn username_from_email(email: &str) -> &str {
    email
        .strip_suffix(SYNTHETIC_EMAIL_DOMAIN)
        .and_then(|rest| rest.strip_suffix('@'))
        .unwrap_or(email)
}
