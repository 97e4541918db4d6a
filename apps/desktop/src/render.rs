use std::fmt::Write as _;

use client_core::{Field, Panel, Tone, ViewModel};

fn panel_title(panel: Panel) -> &'static str {
    match panel {
        Panel::Login => "Login",
        Panel::Register => "Register",
        Panel::Main => "Counter",
    }
}

fn field_label(field: Field) -> &'static str {
    match field {
        Field::Username => "username",
        Field::Password => "password",
        Field::Confirmation => "confirm password",
    }
}

fn hint(panel: Panel) -> &'static str {
    match panel {
        Panel::Login => "login <user> <password>, or 'show register' to create an account",
        Panel::Register => "register <user> <password> [confirmation], or 'show login'",
        Panel::Main => "inc, bet, logout",
    }
}

/// Text for the single visible panel and its messages.
pub fn render(view: &ViewModel) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", panel_title(view.panel));

    if view.panel == Panel::Main {
        if let Some(username) = &view.username {
            let _ = writeln!(out, "signed in as {username}");
        }
        let _ = writeln!(out, "counter: {}", view.counter);
        if view.show_coins {
            let _ = writeln!(out, "coins: {}", view.coins);
        }
        if let Some(result) = &view.game_result {
            let tone = match result.tone {
                Tone::Win => "win",
                Tone::Loss => "loss",
            };
            let _ = writeln!(out, "[{tone}] {}", result.text);
        }
    }

    for (field, message) in &view.field_errors {
        let _ = writeln!(out, "  {}: {message}", field_label(*field));
    }
    if let Some(notice) = &view.notice {
        let _ = writeln!(out, "* {notice}");
    }
    if let Some(alert) = &view.alert {
        let _ = writeln!(out, "! {alert}");
    }
    let _ = write!(out, "({})", hint(view.panel));
    out
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
