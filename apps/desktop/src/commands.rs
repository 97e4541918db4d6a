//! Commands typed at the prompt, parsed before they reach the controller.

use thiserror::Error;

pub const HELP: &str = "\
commands:
  login <user> <password>
  register <user> <password> [confirmation]
  show login | show register
  inc          add one to the counter
  bet          stake 100 coins on an odd draw
  logout
  status       print the current screen again
  help
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    Login {
        username: String,
        password: String,
    },
    Register {
        username: String,
        password: String,
        confirmation: Option<String>,
    },
    ShowLogin,
    ShowRegister,
    Increment,
    Bet,
    Logout,
    Status,
    Help,
    Quit,
}

impl UiCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::Register { .. } => "register",
            Self::ShowLogin => "show_login",
            Self::ShowRegister => "show_register",
            Self::Increment => "increment",
            Self::Bet => "bet",
            Self::Logout => "logout",
            Self::Status => "status",
            Self::Help => "help",
            Self::Quit => "quit",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}', type 'help' for the list")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Blank lines parse to `None`.
pub fn parse_command(line: &str) -> Result<Option<UiCommand>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (head.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("login", [username, password]) => UiCommand::Login {
            username: username.to_string(),
            password: password.to_string(),
        },
        ("login", _) => return Err(CommandError::Usage("login <user> <password>")),
        ("register", [username, password]) => UiCommand::Register {
            username: username.to_string(),
            password: password.to_string(),
            confirmation: None,
        },
        ("register", [username, password, confirmation]) => UiCommand::Register {
            username: username.to_string(),
            password: password.to_string(),
            confirmation: Some(confirmation.to_string()),
        },
        ("register", _) => {
            return Err(CommandError::Usage(
                "register <user> <password> [confirmation]",
            ))
        }
        ("show", [panel]) if panel.eq_ignore_ascii_case("login") => UiCommand::ShowLogin,
        ("show", [panel]) if panel.eq_ignore_ascii_case("register") => UiCommand::ShowRegister,
        ("show", _) => return Err(CommandError::Usage("show login | show register")),
        ("inc" | "increment", []) => UiCommand::Increment,
        ("bet", []) => UiCommand::Bet,
        ("logout", []) => UiCommand::Logout,
        ("status", []) => UiCommand::Status,
        ("help" | "?", _) => UiCommand::Help,
        ("quit" | "exit", []) => UiCommand::Quit,
        _ => return Err(CommandError::Unknown(head.to_string())),
    };
    Ok(Some(command))
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
