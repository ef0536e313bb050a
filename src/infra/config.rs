//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! API tokens may also come from CRM_LIVE_TOKEN / CRM_SANDBOX_TOKEN, which take
//! precedence over values in the file.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const LIVE_TOKEN_ENV: &str = "CRM_LIVE_TOKEN";
pub const SANDBOX_TOKEN_ENV: &str = "CRM_SANDBOX_TOKEN";

/// Which credential set a batch talks to the CRM with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrmEnvironment {
    #[default]
    Live,
    Sandbox,
}

impl CrmEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrmEnvironment::Live => "live",
            CrmEnvironment::Sandbox => "sandbox",
        }
    }
}

impl std::fmt::Display for CrmEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CrmEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" | "production" => Ok(CrmEnvironment::Live),
            "sandbox" | "test" => Ok(CrmEnvironment::Sandbox),
            other => Err(format!("unknown CRM environment '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: default_bind_address(), port: default_port() }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialConfig {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub default_environment: CrmEnvironment,
    #[serde(default)]
    pub live: CredentialConfig,
    #[serde(default)]
    pub sandbox: CredentialConfig,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            default_environment: CrmEnvironment::default(),
            live: CredentialConfig::default(),
            sandbox: CredentialConfig::default(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.intercom.io".to_string()
}

fn default_timeout_ms() -> u64 {
    15_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct PacingConfig {
    /// Pause between contact resolution and event submission
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Pause between consecutive publishes in a batch
    #[serde(default = "default_inter_event_delay_ms")]
    pub inter_event_delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            inter_event_delay_ms: default_inter_event_delay_ms(),
        }
    }
}

fn default_settle_delay_ms() -> u64 {
    500
}

fn default_inter_event_delay_ms() -> u64 {
    250
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub crm: CrmConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    bind_address: String,
    port: u16,
    crm_base_url: String,
    crm_timeout_ms: u64,
    default_environment: CrmEnvironment,
    live_token: Option<String>,
    sandbox_token: Option<String>,
    settle_delay_ms: u64,
    inter_event_delay_ms: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: &str) -> Self {
        Self {
            bind_address: toml_config.server.bind_address,
            port: toml_config.server.port,
            crm_base_url: toml_config.crm.base_url.trim_end_matches('/').to_string(),
            crm_timeout_ms: toml_config.crm.timeout_ms,
            default_environment: toml_config.crm.default_environment,
            live_token: toml_config.crm.live.token.filter(|t| !t.trim().is_empty()),
            sandbox_token: toml_config.crm.sandbox.token.filter(|t| !t.trim().is_empty()),
            settle_delay_ms: toml_config.pacing.settle_delay_ms,
            inter_event_delay_ms: toml_config.pacing.inter_event_delay_ms,
            config_file: config_file.to_string(),
        }
    }

    /// Determine config file path from args or environment
    pub fn resolve_config_path(args: &[String]) -> String {
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return path.clone();
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return path.to_string();
            }
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, &path.display().to_string()))
    }

    /// Load configuration - tries TOML file first, falls back to defaults.
    /// Token environment variables are applied in both cases.
    pub fn load_from_path(path: &str) -> Self {
        let config = match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}. Using defaults.", e);
                Self::default()
            }
        };
        config.with_env_tokens(env::var(LIVE_TOKEN_ENV).ok(), env::var(SANDBOX_TOKEN_ENV).ok())
    }

    /// Override tokens with externally supplied values (blank values are ignored)
    pub fn with_env_tokens(mut self, live: Option<String>, sandbox: Option<String>) -> Self {
        if let Some(token) = live.filter(|t| !t.trim().is_empty()) {
            self.live_token = Some(token);
        }
        if let Some(token) = sandbox.filter(|t| !t.trim().is_empty()) {
            self.sandbox_token = Some(token);
        }
        self
    }

    /// Token for the given credential set
    pub fn crm_token(&self, environment: CrmEnvironment) -> Option<&str> {
        match environment {
            CrmEnvironment::Live => self.live_token.as_deref(),
            CrmEnvironment::Sandbox => self.sandbox_token.as_deref(),
        }
    }

    pub fn bind_address(&self) -> &str {
        &self.bind_address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn crm_base_url(&self) -> &str {
        &self.crm_base_url
    }

    pub fn crm_timeout(&self) -> Duration {
        Duration::from_millis(self.crm_timeout_ms)
    }

    pub fn default_environment(&self) -> CrmEnvironment {
        self.default_environment
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn inter_event_delay(&self) -> Duration {
        Duration::from_millis(self.inter_event_delay_ms)
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to point the client at a local server
    pub fn with_crm_base_url(mut self, url: &str) -> Self {
        self.crm_base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Builder method for tests to shorten or remove pacing
    pub fn with_pacing_ms(mut self, settle_ms: u64, inter_event_ms: u64) -> Self {
        self.settle_delay_ms = settle_ms;
        self.inter_event_delay_ms = inter_event_ms;
        self
    }
}
