//! Session Guard
//!
//! The service never answers an expired session with a status code. It
//! serves its login form instead, with `200 OK`, in place of the program
//! output. [`is_login_page`] recognises that form; [`Session`] decides what
//! happens next.
//!
//! ## State machine
//!
//! ```text
//!             login ok                     marker, auto-login on
//! Anonymous ─────────────► Authenticated ─────────────────────► Authenticating
//!     │  ▲                       ▲                                 │      │
//!     │  └── login rejected      └──────── login ok, replay ───────┘      │
//!     │                                                                    │
//!     └── marker, auto-login off ──► Expired ◄──── login failed ──────────┘
//! ```
//!
//! A successful manual login turns auto-login on for later expirations.
//! An expiry during the replay of a call is never recovered a second time.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use crate::error::{AdapterError, AdapterResult, LOGIN_REJECTED};

/// `_sasapp` sent with the login form
pub const LOGIN_APP_NAME: &str = "Stored Process Web App 9.3";

fn login_form_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<form.+action="[^"]*Logon[^"]*""#).expect("valid login form pattern")
    })
}

/// True when `body` is the service's login form rather than program output
pub fn is_login_page(body: &str) -> bool {
    login_form_pattern().is_match(body)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticating,
    Authenticated,
    Expired,
}

/// Username and password
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub pass: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, pass: impl Into<String>) -> AdapterResult<Self> {
        let user = user.into();
        let pass = pass.into();
        if user.is_empty() || pass.is_empty() {
            return Err(AdapterError::Credentials("Missing credentials".to_string()));
        }
        Ok(Credentials { user, pass })
    }

    /// Login form fields
    pub fn login_form(&self, service: &str) -> Vec<(String, String)> {
        vec![
            ("_service".to_string(), service.to_string()),
            ("_sasapp".to_string(), LOGIN_APP_NAME.to_string()),
            ("ux".to_string(), self.user.clone()),
            ("px".to_string(), self.pass.clone()),
        ]
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("pass", &"***")
            .finish()
    }
}

/// What to do about an expired session
#[derive(Debug)]
pub enum ExpiryAction {
    /// Log in with these credentials, then replay the call once
    Relogin(Credentials),
    /// Give up on the call
    Fail(AdapterError),
}

/// Authentication state of one adapter
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    credentials: Option<Credentials>,
    auto_login: bool,
    /// State to fall back to when a login attempt fails
    before_login: SessionState,
}

impl Session {
    pub fn new(auto_login: bool) -> Self {
        Session {
            state: SessionState::Anonymous,
            credentials: None,
            auto_login,
            before_login: SessionState::Anonymous,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn auto_login(&self) -> bool {
        self.auto_login
    }

    pub fn set_auto_login(&mut self, enabled: bool) {
        self.auto_login = enabled;
    }

    pub fn set_credentials(&mut self, credentials: Credentials) {
        self.credentials = Some(credentials);
    }

    pub fn credentials(&self) -> AdapterResult<Credentials> {
        self.credentials
            .clone()
            .ok_or_else(|| AdapterError::Credentials("Credentials not set".to_string()))
    }

    /// A response carried the login form.
    ///
    /// `replayed` is true when the response belongs to a call that was already
    /// replayed after a login.
    pub fn on_expired(&mut self, replayed: bool) -> ExpiryAction {
        self.state = SessionState::Expired;
        if !self.auto_login || replayed {
            return ExpiryAction::Fail(AdapterError::NotLoggedIn);
        }
        match self.credentials() {
            Ok(credentials) => {
                self.begin_login();
                ExpiryAction::Relogin(credentials)
            }
            Err(e) => ExpiryAction::Fail(e),
        }
    }

    pub fn begin_login(&mut self) {
        if self.state != SessionState::Authenticating {
            self.before_login = self.state;
        }
        self.state = SessionState::Authenticating;
    }

    /// The login request came back with a 2xx status.
    pub fn on_login_response(&mut self, body: &str, status: u16) -> AdapterResult<u16> {
        if is_login_page(body) {
            self.state = self.before_login;
            return Err(AdapterError::Login {
                status: LOGIN_REJECTED,
            });
        }
        self.state = SessionState::Authenticated;
        // The service can ask for a login again after inactivity
        self.auto_login = true;
        Ok(status)
    }

    /// The login request failed at the transport level.
    pub fn on_login_failed(&mut self) {
        self.state = self.before_login;
    }

    pub fn on_logout(&mut self) {
        self.state = SessionState::Anonymous;
        self.before_login = SessionState::Anonymous;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(false)
    }
}
