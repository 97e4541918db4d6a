//! Credential checks that run before any backend call.

use regex::Regex;

use crate::error::{Field, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordRule {
    /// Exactly `digits` ASCII digits.
    NumericPin { digits: usize },
    /// At least `min` characters of anything.
    MinLength { min: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub username_min: usize,
    pub username_max: Option<usize>,
    pub password: PasswordRule,
    /// Register asks for the password twice.
    pub require_confirmation: bool,
    /// Login checks the username shape before contacting the backend.
    pub check_username_on_login: bool,
}

impl ValidationPolicy {
    /// Usernames of three or more alphanumerics, six digit PIN passwords.
    pub fn pin() -> Self {
        Self {
            username_min: 3,
            username_max: None,
            password: PasswordRule::NumericPin { digits: 6 },
            require_confirmation: false,
            check_username_on_login: false,
        }
    }

    /// Usernames of 6 to 12 alphanumerics, free-form passwords of six or more
    /// characters confirmed on register.
    pub fn free_form() -> Self {
        Self {
            username_min: 6,
            username_max: Some(12),
            password: PasswordRule::MinLength { min: 6 },
            require_confirmation: true,
            check_username_on_login: true,
        }
    }

    fn username_message(&self) -> String {
        match self.username_max {
            Some(max) => format!(
                "Username must be {}-{max} letters or digits",
                self.username_min
            ),
            None => format!(
                "Username must be at least {} letters or digits",
                self.username_min
            ),
        }
    }

    fn password_message(&self) -> String {
        match self.password {
            PasswordRule::NumericPin { digits } => format!("Password must be {digits} digits"),
            PasswordRule::MinLength { min } => {
                format!("Password must be at least {min} characters")
            }
        }
    }
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self::pin()
    }
}

#[derive(Debug, Clone)]
pub struct Validator {
    policy: ValidationPolicy,
    username_re: Regex,
    pin_re: Option<Regex>,
}

impl Validator {
    /// Fails when the bounds do not form a valid repetition (e.g. `max < min`).
    pub fn new(policy: ValidationPolicy) -> Result<Self, regex::Error> {
        let bounds = match policy.username_max {
            Some(max) => format!("{{{},{max}}}", policy.username_min),
            None => format!("{{{},}}", policy.username_min),
        };
        let username_re = Regex::new(&format!("^[a-zA-Z0-9]{bounds}$"))?;
        let pin_re = match policy.password {
            // `\d` is Unicode-aware in this engine; PINs are ASCII only.
            PasswordRule::NumericPin { digits } => {
                Some(Regex::new(&format!("^[0-9]{{{digits}}}$"))?)
            }
            PasswordRule::MinLength { .. } => None,
        };

        Ok(Self {
            policy,
            username_re,
            pin_re,
        })
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    pub fn validate_username(&self, username: &str) -> bool {
        self.username_re.is_match(username)
    }

    pub fn validate_password(&self, password: &str) -> bool {
        match self.policy.password {
            PasswordRule::NumericPin { .. } => self
                .pin_re
                .as_ref()
                .is_some_and(|pin_re| pin_re.is_match(password)),
            PasswordRule::MinLength { min } => password.chars().count() >= min,
        }
    }

    pub fn check_username(&self, username: &str) -> Result<(), ValidationError> {
        if self.validate_username(username) {
            Ok(())
        } else {
            Err(ValidationError::new(
                Field::Username,
                self.policy.username_message(),
            ))
        }
    }

    pub fn check_password(&self, password: &str) -> Result<(), ValidationError> {
        if self.validate_password(password) {
            Ok(())
        } else {
            Err(ValidationError::new(
                Field::Password,
                self.policy.password_message(),
            ))
        }
    }

    /// A missing confirmation counts as a mismatch.
    pub fn check_confirmation(
        &self,
        password: &str,
        confirmation: Option<&str>,
    ) -> Result<(), ValidationError> {
        if confirmation == Some(password) {
            Ok(())
        } else {
            Err(ValidationError::new(
                Field::Confirmation,
                "Passwords do not match",
            ))
        }
    }

    /// Checks a register submission in form order; the first failure wins.
    pub fn check_registration(
        &self,
        username: &str,
        password: &str,
        confirmation: Option<&str>,
    ) -> Result<(), ValidationError> {
        self.check_username(username)?;
        if self.policy.require_confirmation {
            self.check_confirmation(password, confirmation)?;
        }
        self.check_password(password)
    }

    pub fn check_login(&self, username: &str) -> Result<(), ValidationError> {
        if self.policy.check_username_on_login {
            self.check_username(username)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
