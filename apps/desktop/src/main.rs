use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{SessionController, SessionError, Validator, WriteOutcome};
use storage::Storage;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    task::JoinSet,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod render;

use commands::{parse_command, UiCommand, HELP};
use config::{load_settings, CliArgs};
use render::render;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let settings = load_settings(&args)?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let storage = Storage::open_in_dir(&settings.data_dir)
        .await
        .with_context(|| format!("failed to open data dir '{}'", settings.data_dir.display()))?;
    let validator =
        Validator::new(settings.validation.policy()).context("invalid validation policy")?;
    let backend = settings.backend_config()?.connect();
    info!(
        binding = %backend.binding(),
        server_url = %settings.server_url,
        data_dir = %settings.data_dir.display(),
        "starting counter session"
    );

    let mut controller = SessionController::new(backend, Arc::new(storage), validator);
    controller.start().await;
    show(&mut controller);

    let mut counter_writes = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        debug!(command = command.name(), "ui command");

        match command {
            UiCommand::Quit => break,
            UiCommand::Help => {
                println!("{HELP}");
                continue;
            }
            command => {
                if let Err(err) = dispatch(&mut controller, command, &mut counter_writes).await {
                    report(&err);
                }
            }
        }
        show(&mut controller);

        while let Some(joined) = counter_writes.try_join_next() {
            settle(&mut controller, joined).await;
        }
    }

    while let Some(joined) = counter_writes.join_next().await {
        settle(&mut controller, joined).await;
    }
    Ok(())
}

/// Keeps credentials renewed by a finished counter write.
async fn settle(
    controller: &mut SessionController,
    joined: Result<WriteOutcome, tokio::task::JoinError>,
) {
    match joined {
        Ok(WriteOutcome {
            refreshed: Some(identity),
            ..
        }) => controller.adopt_identity(identity).await,
        Ok(_) => {}
        Err(err) => warn!(error = %err, "counter write task failed"),
    }
}

async fn dispatch(
    controller: &mut SessionController,
    command: UiCommand,
    counter_writes: &mut JoinSet<WriteOutcome>,
) -> Result<(), SessionError> {
    match command {
        UiCommand::Login { username, password } => {
            controller.submit_login(&username, &password).await
        }
        UiCommand::Register {
            username,
            password,
            confirmation,
        } => {
            controller
                .submit_register(&username, &password, confirmation.as_deref())
                .await
        }
        UiCommand::ShowLogin => controller.show_login(),
        UiCommand::ShowRegister => controller.show_register(),
        UiCommand::Increment => {
            let write = controller.increment_counter()?;
            counter_writes.spawn(write.persist());
            Ok(())
        }
        UiCommand::Bet => controller.play_bet_game().await,
        UiCommand::Logout => {
            controller.logout().await;
            Ok(())
        }
        UiCommand::Status | UiCommand::Help | UiCommand::Quit => Ok(()),
    }
}

/// Errors that are not already on screen as a field error or alert.
fn report(err: &SessionError) {
    match err {
        SessionError::Validation(_) | SessionError::Auth(_) | SessionError::Game(_) => {}
        other => println!("{other}"),
    }
}

/// Prints the current panel; an alert is shown once and then dismissed.
fn show(controller: &mut SessionController) {
    println!("{}", render(controller.view()));
    controller.take_alert();
}
