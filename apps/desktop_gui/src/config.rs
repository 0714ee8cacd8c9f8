//! Startup settings: defaults, then `labdesk.toml`, then `LABDESK_*`
//! environment variables, then command-line flags.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context};
use clap::Parser;
use client_core::{DEFAULT_API_URL, DEFAULT_LIST_COUNT};
use serde::Deserialize;

pub const CONFIG_FILE_NAME: &str = "labdesk.toml";
const APP_DIR: &str = "labdesk";

const ENV_API_URL: &str = "LABDESK_API_URL";
const ENV_CREDENTIALS: &str = "LABDESK_CREDENTIALS";
const ENV_EXPERIMENT_LIMIT: &str = "LABDESK_EXPERIMENT_LIMIT";
const ENV_TIMEOUT_SECS: &str = "LABDESK_TIMEOUT_SECS";

#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "labdesk",
    version,
    about = "Desktop client for browsing and editing Labstep experiments"
)]
pub struct StartupArgs {
    /// Settings file; defaults to ./labdesk.toml or the platform config dir.
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub api_url: Option<String>,
    /// Two-line credential file: account, then API key.
    #[arg(long)]
    pub credentials: Option<PathBuf>,
    #[arg(long)]
    pub experiment_limit: Option<u32>,
    /// tracing filter directive, e.g. `labdesk=debug,info`.
    #[arg(long)]
    pub log_filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_url: String,
    pub credentials_path: PathBuf,
    pub experiment_limit: u32,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            credentials_path: PathBuf::from("key.cfg"),
            experiment_limit: DEFAULT_LIST_COUNT,
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.api_url.trim().is_empty(), "api_url must not be empty");
        ensure!(
            self.experiment_limit > 0,
            "experiment_limit must be at least 1"
        );
        ensure!(
            self.request_timeout_secs > 0,
            "request_timeout_secs must be at least 1"
        );
        Ok(())
    }
}

pub fn load_settings(args: &StartupArgs) -> anyhow::Result<Settings> {
    let config_dir = dirs::config_dir().map(|dir| dir.join(APP_DIR));
    let mut settings = match locate_config_file(args, config_dir.as_deref()) {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading settings file");
            read_settings_file(&path)?
        }
        None => Settings::default(),
    };
    apply_env(&mut settings, |name| std::env::var(name).ok());
    apply_args(&mut settings, args);
    settings.credentials_path =
        resolve_credentials_path(settings.credentials_path, config_dir.as_deref());
    settings.validate()?;
    Ok(settings)
}

fn locate_config_file(args: &StartupArgs, config_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = &args.config {
        return Some(path.clone());
    }
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    config_dir
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .filter(|path| path.is_file())
}

pub fn read_settings_file(path: &Path) -> anyhow::Result<Settings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("invalid settings file '{}'", path.display()))
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    if let Some(v) = lookup(ENV_API_URL) {
        settings.api_url = v;
    }
    if let Some(v) = lookup(ENV_CREDENTIALS) {
        settings.credentials_path = PathBuf::from(v);
    }
    if let Some(v) = lookup(ENV_EXPERIMENT_LIMIT) {
        match v.trim().parse::<u32>() {
            Ok(parsed) => settings.experiment_limit = parsed,
            Err(err) => tracing::warn!("ignoring {ENV_EXPERIMENT_LIMIT}={v}: {err}"),
        }
    }
    if let Some(v) = lookup(ENV_TIMEOUT_SECS) {
        match v.trim().parse::<u64>() {
            Ok(parsed) => settings.request_timeout_secs = parsed,
            Err(err) => tracing::warn!("ignoring {ENV_TIMEOUT_SECS}={v}: {err}"),
        }
    }
}

fn apply_args(settings: &mut Settings, args: &StartupArgs) {
    if let Some(v) = &args.api_url {
        settings.api_url = v.clone();
    }
    if let Some(v) = &args.credentials {
        settings.credentials_path = v.clone();
    }
    if let Some(v) = args.experiment_limit {
        settings.experiment_limit = v;
    }
}

/// A relative credential path that does not exist falls back to the same
/// name under the config dir, when that one exists.
fn resolve_credentials_path(path: PathBuf, config_dir: Option<&Path>) -> PathBuf {
    if path.is_absolute() || path.exists() {
        return path;
    }
    match config_dir.map(|dir| dir.join(&path)) {
        Some(fallback) if fallback.is_file() => fallback,
        _ => path,
    }
}
