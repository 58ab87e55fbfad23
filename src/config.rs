//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$POPBACKUP_CONFIG` (environment variable)
//! 2. `~/.config/popbackup/config.toml` (Linux/macOS)
//!    `%APPDATA%\popbackup\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Then a `.env` file in the working directory is loaded and the
//! `EMAIL`, `PASSWORD`, `POP3_SERVER`, `POP3_PORT` and `POP3_TLS`
//! variables override the `[pop3]` section.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{BackupError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// POP3 server and account.
    pub pop3: Pop3Config,
    /// Where and what to write during a backup.
    pub backup: BackupConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Directory for the log file.
    pub log_dir: PathBuf,
    /// Log file name inside `log_dir`.
    pub log_file: String,
}

/// POP3 server and account.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Pop3Config {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Wrap the connection in TLS (POP3S, usually port 995).
    pub tls: bool,
    /// Read/write timeout for the session, in seconds.
    pub timeout_secs: u64,
}

/// Where and what to write during a backup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Directory for `mail_<id>.eml` files.
    pub mail_dir: PathBuf,
    /// Also write `mail_<id>_rawbody.txt` with the undecoded body section.
    pub save_raw_body: bool,
    /// Print each message's headers and extracted body to stdout.
    pub print_bodies: bool,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_dir: PathBuf::from("logs"),
            log_file: "mail.log".to_string(),
        }
    }
}

impl Default for Pop3Config {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 110,
            username: String::new(),
            password: String::new(),
            tls: false,
            timeout_secs: 30,
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            mail_dir: PathBuf::from("backup"),
            save_raw_body: true,
            print_bodies: true,
        }
    }
}

/// The password never shows up in debug output or logs.
impl std::fmt::Debug for Pop3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pop3Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("tls", &self.tls)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Pop3Config {
    /// Check that everything needed to log in is present.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("host (POP3_SERVER)", self.host.is_empty()),
            ("username (EMAIL)", self.username.is_empty()),
            ("password (PASSWORD)", self.password.is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, empty)| empty.then_some(name))
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(BackupError::Config(format!(
                "missing POP3 settings: {}",
                missing.join(", ")
            )))
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations, then apply `.env`
/// and environment overrides.
///
/// A missing or unparseable file falls back to defaults; an invalid
/// override (e.g. a non-numeric `POP3_PORT`) is an error.
pub fn load_config() -> Result<Config> {
    let mut config = load_config_file();

    match dotenv::dotenv() {
        Ok(path) => tracing::info!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Failed to read .env, ignoring it"),
    }

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    Ok(config)
}

fn load_config_file() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Apply `EMAIL`, `PASSWORD`, `POP3_SERVER`, `POP3_PORT` and `POP3_TLS`.
///
/// `lookup` abstracts the environment so tests do not touch process state.
pub fn apply_env_overrides(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(email) = lookup("EMAIL") {
        config.pop3.username = email;
    }
    if let Some(password) = lookup("PASSWORD") {
        config.pop3.password = password;
    }
    if let Some(server) = lookup("POP3_SERVER") {
        config.pop3.host = server;
    }
    if let Some(port) = lookup("POP3_PORT") {
        config.pop3.port = port
            .trim()
            .parse()
            .map_err(|e| BackupError::Config(format!("invalid POP3_PORT '{port}': {e}")))?;
    }
    if let Some(tls) = lookup("POP3_TLS") {
        config.pop3.tls = match tls.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" | "" => false,
            other => {
                return Err(BackupError::Config(format!("invalid POP3_TLS '{other}'")));
            }
        };
    }
    Ok(())
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("POPBACKUP_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("popbackup").join("config.toml"))
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    config.general.log_dir.join(&config.general.log_file)
}
