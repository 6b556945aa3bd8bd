//! Adapter Error Types
//!
//! Every failure of an adapter operation is reported through one of these
//! variants. None of them is thrown across an `.await`: operations return
//! `AdapterResult<T>` and the caller decides what to do.

use thiserror::Error;

/// Login status code reported when the service answers a login request with
/// its login form again (credentials rejected).
pub const LOGIN_REJECTED: i32 = -1;

/// Transport layer failure (network error, timeout or non-2xx status)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Transport error (status {status}): {message}")]
pub struct TransportError {
    /// HTTP status, 0 when no response was received
    pub status: u16,
    pub message: String,
}

impl TransportError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        TransportError {
            status,
            message: message.into(),
        }
    }

    /// Failure before any HTTP status was available
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(0, message)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let status = e.status().map_or(0, |s| s.as_u16());
        let message = if e.is_timeout() {
            format!("request timed out: {e}")
        } else {
            e.to_string()
        };
        TransportError { status, message }
    }
}

/// Adapter errors
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Invalid call arguments or table input
    #[error("Argument error: {0}")]
    Argument(String),

    /// Column type conflict within one table
    #[error("Type error: {0}")]
    Type(String),

    /// Response body could not be decoded (after any retries)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Re-authentication attempt failed
    #[error("Login error: unable to login (status {status})")]
    Login { status: i32 },

    /// Session expired and automatic login is disabled
    #[error("You are not logged in")]
    NotLoggedIn,

    /// Missing username or password
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// Transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Remote configuration could not be loaded
    #[error("Remote config cannot be loaded: {0}")]
    RemoteConfig(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local configuration could not be loaded or merged
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl AdapterError {
    /// Short machine-readable kind, stable across message changes
    pub fn kind(&self) -> &'static str {
        match self {
            AdapterError::Argument(_) => "argumentError",
            AdapterError::Type(_) => "typeError",
            AdapterError::Parse(_) => "parseError",
            AdapterError::Login { .. } => "loginError",
            AdapterError::NotLoggedIn => "notLoggedinError",
            AdapterError::Credentials(_) => "credentialsError",
            AdapterError::Transport(_) => "transportError",
            AdapterError::RemoteConfig(_) => "remoteConfigError",
            AdapterError::Json(_) => "jsonError",
            AdapterError::Config(_) => "configError",
        }
    }
}

impl From<figment::Error> for AdapterError {
    fn from(e: figment::Error) -> Self {
        AdapterError::Config(Box::new(e))
    }
}

/// Result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;
