use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{bail, Context};
use clap::Parser;
use client_core::{BackendBinding, BackendConfig, ValidationPolicy};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "counter_session.toml";
const ENV_PREFIX: &str = "APP__";

#[derive(Parser, Debug, Default)]
#[command(name = "counter-session", about = "Terminal front end for the counter session")]
pub struct CliArgs {
    /// TOML settings file; `counter_session.toml` is read when present.
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub binding: Option<BackendBinding>,
    #[arg(long)]
    pub server_url: Option<String>,
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    #[arg(long)]
    pub validation: Option<ValidationPreset>,
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPreset {
    /// 3+ character usernames and a 6 digit PIN.
    #[default]
    Pin,
    /// 6-12 character usernames, 6+ character passwords and a confirmation.
    FreeForm,
}

impl ValidationPreset {
    pub fn policy(self) -> ValidationPolicy {
        match self {
            Self::Pin => ValidationPolicy::pin(),
            Self::FreeForm => ValidationPolicy::free_form(),
        }
    }
}

impl FromStr for ValidationPreset {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pin" => Ok(Self::Pin),
            "free_form" => Ok(Self::FreeForm),
            other => Err(format!("unknown validation preset '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub binding: BackendBinding,
    pub server_url: String,
    pub anon_key: String,
    pub data_dir: PathBuf,
    pub validation: ValidationPreset,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            binding: BackendBinding::HttpApi,
            server_url: "http://127.0.0.1:8080".into(),
            anon_key: String::new(),
            data_dir: PathBuf::from("./data"),
            validation: ValidationPreset::Pin,
            log_level: "info".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    binding: Option<BackendBinding>,
    server_url: Option<String>,
    anon_key: Option<String>,
    data_dir: Option<PathBuf>,
    validation: Option<ValidationPreset>,
    log_level: Option<String>,
}

impl Settings {
    pub fn apply_file(&mut self, raw: &str) -> anyhow::Result<()> {
        let file: FileSettings = toml::from_str(raw).context("invalid settings file")?;
        if let Some(v) = file.binding {
            self.binding = v;
        }
        if let Some(v) = file.server_url {
            self.server_url = v;
        }
        if let Some(v) = file.anon_key {
            self.anon_key = v;
        }
        if let Some(v) = file.data_dir {
            self.data_dir = v;
        }
        if let Some(v) = file.validation {
            self.validation = v;
        }
        if let Some(v) = file.log_level {
            self.log_level = v;
        }
        Ok(())
    }

    /// Reads `APP__<KEY>` overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        let var = |key: &str| lookup(&format!("{ENV_PREFIX}{key}"));

        if let Some(v) = var("BINDING") {
            self.binding = v
                .parse()
                .map_err(anyhow::Error::msg)
                .context("APP__BINDING")?;
        }
        if let Some(v) = var("SERVER_URL") {
            self.server_url = v;
        }
        if let Some(v) = var("ANON_KEY") {
            self.anon_key = v;
        }
        if let Some(v) = var("DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = var("VALIDATION") {
            self.validation = v
                .parse()
                .map_err(anyhow::Error::msg)
                .context("APP__VALIDATION")?;
        }
        if let Some(v) = var("LOG_LEVEL") {
            self.log_level = v;
        }
        Ok(())
    }

    pub fn apply_cli(&mut self, args: &CliArgs) {
        if let Some(v) = args.binding {
            self.binding = v;
        }
        if let Some(v) = &args.server_url {
            self.server_url = v.clone();
        }
        if let Some(v) = &args.data_dir {
            self.data_dir = v.clone();
        }
        if let Some(v) = args.validation {
            self.validation = v;
        }
        if let Some(v) = &args.log_level {
            self.log_level = v.clone();
        }
    }

    pub fn backend_config(&self) -> anyhow::Result<BackendConfig> {
        let url = Url::parse(self.server_url.trim())
            .with_context(|| format!("invalid server_url '{}'", self.server_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("server_url must be http or https, got '{}'", url.scheme());
        }

        Ok(match self.binding {
            BackendBinding::HttpApi => BackendConfig::HttpApi {
                base_url: url.to_string(),
            },
            BackendBinding::HostedAuth => {
                if self.anon_key.trim().is_empty() {
                    bail!("the hosted_auth binding needs an anon_key");
                }
                BackendConfig::HostedAuth {
                    project_url: url.to_string(),
                    anon_key: self.anon_key.clone(),
                }
            }
        })
    }
}

/// Defaults, then the settings file, then `APP__*` variables, then flags.
pub fn load_settings(args: &CliArgs) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match &args.config {
        Some(path) => {
            let raw = read_settings_file(path)?;
            settings.apply_file(&raw)?;
        }
        None => {
            if let Ok(raw) = fs::read_to_string(DEFAULT_CONFIG_FILE) {
                settings.apply_file(&raw)?;
            }
        }
    }

    settings.apply_env(|key| std::env::var(key).ok())?;
    settings.apply_cli(args);
    Ok(settings)
}

fn read_settings_file(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file '{}'", path.display()))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
