//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - storedproc.toml (default configuration)
//! - storedproc.local.toml (git-ignored local overrides)
//! - Environment variables (STOREDPROC_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # storedproc.toml
//! server = "v9"
//! host_url = "https://sas.example.com"
//! metadata_root = "/Apps/Sales"
//! debug = false
//!
//! [logging]
//! level = "debug"
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! STOREDPROC_DEBUG=true
//! STOREDPROC_LOGGING__FORMAT=json
//! ```
//!
//! A remote JSON document (see [`AdapterConfig::remote_config_url`]) can be
//! merged over the loaded configuration at runtime with
//! [`AdapterConfig::merge_remote`].

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// `_debug` code sent when debug mode is on
pub const DEBUG_CODE: u32 = 131;

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Server flavour, selects the default program and logout endpoints
    #[serde(default)]
    pub server: ServerFlavor,

    /// Program endpoint override (defaults to the flavour's endpoint)
    #[serde(default)]
    pub url: Option<String>,

    /// Scheme and host of a remote server, e.g. `https://sas.example.com`
    #[serde(default)]
    pub host_url: Option<String>,

    /// Login form endpoint
    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// Logout endpoint override (defaults to the flavour's endpoint)
    #[serde(default)]
    pub logout_url: Option<String>,

    /// Request the debug payload format (`_debug=131`)
    #[serde(default)]
    pub debug: bool,

    /// Folder prefixed to every program path
    #[serde(default)]
    pub metadata_root: String,

    /// `_service` form field
    #[serde(default = "default_service")]
    pub service: String,

    /// Re-issues of a call whose response could not be parsed
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Also retry parse failures in debug mode
    #[serde(default)]
    pub retry_in_debug: bool,

    /// Transport timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Log in again and replay the call when the session expires
    #[serde(default)]
    pub auto_login: bool,

    /// JSON document merged over this config once at startup.
    /// Calls are queued until it arrives.
    #[serde(default)]
    pub remote_config_url: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServerFlavor {
    /// Stored Process Web Application
    #[default]
    V9,
    /// Job Execution service
    Viya,
}

impl ServerFlavor {
    pub fn program_path(self) -> &'static str {
        match self {
            ServerFlavor::V9 => "/SASStoredProcess/do",
            ServerFlavor::Viya => "/SASJobExecution/",
        }
    }

    pub fn logout_path(self) -> &'static str {
        match self {
            ServerFlavor::V9 => "/SASStoredProcess/do?_action=logoff",
            ServerFlavor::Viya => "/SASLogon/logout.do?",
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Optional log file; stderr when unset
    #[serde(default)]
    pub file: Option<String>,
}

// Default value functions
fn default_login_url() -> String {
    "/SASLogon/login.do".to_string()
}
fn default_service() -> String {
    "default".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_ms() -> u64 {
    300_000 // 5 minutes
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl AdapterConfig {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. storedproc.toml (base configuration)
    /// 2. storedproc.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (STOREDPROC_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(AdapterConfig::default()))
            .merge(Toml::file("storedproc.toml"))
            .merge(Toml::file("storedproc.local.toml"))
            .merge(Env::prefixed("STOREDPROC_").split("__"))
            .extract()
    }

    /// Load configuration from specific file path
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(AdapterConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("STOREDPROC_").split("__"))
            .extract()
    }

    /// Merge a remote JSON configuration object over this one.
    ///
    /// Keys use the same names as the TOML file. `remote_config_url` in the
    /// remote document is ignored.
    pub fn merge_remote(&self, remote: &serde_json::Value) -> Result<Self, figment::Error> {
        let mut overrides = match remote {
            serde_json::Value::Object(map) => map.clone(),
            other => {
                return Err(figment::Error::from(format!(
                    "remote config must be a JSON object, got {other}"
                )))
            }
        };
        overrides.remove("remote_config_url");

        let mut merged: AdapterConfig = Figment::from(Serialized::defaults(self))
            .merge(Serialized::defaults(overrides))
            .extract()?;
        merged.remote_config_url.clone_from(&self.remote_config_url);
        Ok(merged)
    }

    /// `_debug` form value for the current debug mode
    pub fn debug_code(&self) -> u32 {
        if self.debug {
            DEBUG_CODE
        } else {
            0
        }
    }

    /// Absolute program endpoint
    pub fn program_url(&self) -> String {
        let path = self
            .url
            .as_deref()
            .unwrap_or_else(|| self.server.program_path());
        self.with_host(path)
    }

    /// Absolute login endpoint
    pub fn login_endpoint(&self) -> String {
        self.with_host(&self.login_url)
    }

    /// Absolute logout endpoint
    pub fn logout_endpoint(&self) -> String {
        let path = self
            .logout_url
            .as_deref()
            .unwrap_or_else(|| self.server.logout_path());
        self.with_host(path)
    }

    /// Prefix a relative endpoint with `host_url`.
    ///
    /// Endpoints that already contain the host are returned unchanged.
    fn with_host(&self, endpoint: &str) -> String {
        let host = self
            .host_url
            .as_deref()
            .map(|h| h.trim_end_matches('/'))
            .filter(|h| !h.is_empty());
        match host {
            Some(host) if endpoint.contains(host) => endpoint.to_string(),
            Some(host) => format!("{host}{}", leading_slash(endpoint)),
            None if endpoint.contains("://") => endpoint.to_string(),
            None => leading_slash(endpoint),
        }
    }
}

fn leading_slash(endpoint: &str) -> String {
    if endpoint.starts_with('/') {
        endpoint.to_string()
    } else {
        format!("/{endpoint}")
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        AdapterConfig {
            server: ServerFlavor::V9,
            url: None,
            host_url: None,
            login_url: default_login_url(),
            logout_url: None,
            debug: false,
            metadata_root: String::new(),
            service: default_service(),
            max_retries: default_max_retries(),
            retry_in_debug: false,
            timeout_ms: default_timeout_ms(),
            auto_login: false,
            remote_config_url: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}
