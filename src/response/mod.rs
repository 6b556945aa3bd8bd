//! Response Decoding
//!
//! The service answers every call with a text body in one of two shapes:
//!
//! - **Production**: the body is the JSON result.
//! - **Debug** (`_debug=131`): the body is an HTML log page with the JSON
//!   result embedded between [`DEBUG_START`] and [`DEBUG_END`].
//!
//! Every string leaf of the decoded tree is URL-unescaped. Two side channels
//! are filled while decoding: the application log ring buffer (from the
//! `logmessage` field) and the diagnostic error list (from `ERROR` lines in
//! the raw body).

pub mod diagnostics;
pub mod logs;

pub use diagnostics::extract_errors;
pub use logs::{LogEntry, LogRingBuffer, LOG_CAPACITY};

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::error::{AdapterError, AdapterResult};
use crate::table::unescape;

/// Start marker of the debug payload
pub const DEBUG_START: &str = "--h54s-data-start--";
/// End marker of the debug payload
pub const DEBUG_END: &str = "--h54s-data-end--";
/// `logmessage` value meaning "nothing to log"
pub const BLANK_LOG: &str = "blank";

fn debug_payload_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?m)^\x{{FEFF}}?{}([\s\S]*){}",
            regex::escape(DEBUG_START),
            regex::escape(DEBUG_END)
        ))
        .expect("valid debug payload pattern")
    })
}

/// How a response body is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Production,
    Debug,
}

impl ParseMode {
    pub fn from_debug(debug: bool) -> Self {
        if debug {
            ParseMode::Debug
        } else {
            ParseMode::Production
        }
    }
}

/// Where the side channels of a parse end up
#[derive(Debug, Default)]
pub struct ResponseSinks {
    pub logs: LogRingBuffer,
    /// `ERROR` lines of the last response
    pub diagnostics: Vec<String>,
}

/// Stateless response decoder
pub struct ResponseParser;

impl ResponseParser {
    /// Decode `body` and feed the side channels.
    ///
    /// The diagnostic list is replaced on every call, whatever the outcome.
    pub fn parse(body: &str, mode: ParseMode, sinks: &mut ResponseSinks) -> AdapterResult<Value> {
        sinks.diagnostics = extract_errors(body);

        let value = Self::decode(body, mode)?;
        if let Some(message) = log_message(&value) {
            sinks.logs.push(message);
        }
        Ok(value)
    }

    /// Decode `body` without touching any side channel.
    pub fn decode(body: &str, mode: ParseMode) -> AdapterResult<Value> {
        let json = match mode {
            ParseMode::Production => body,
            ParseMode::Debug => Self::debug_payload(body).ok_or_else(|| {
                AdapterError::Parse("Debug payload markers not found in response".to_string())
            })?,
        };

        let mut value: Value = serde_json::from_str(json)
            .map_err(|e| AdapterError::Parse(format!("Unable to parse response json: {e}")))?;
        unescape_tree(&mut value)?;
        Ok(value)
    }

    /// Text between the debug markers, if both are present
    pub fn debug_payload(body: &str) -> Option<&str> {
        debug_payload_pattern()
            .captures(body)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

/// URL-decode every string leaf in place, depth first.
pub fn unescape_tree(value: &mut Value) -> AdapterResult<()> {
    match value {
        Value::String(s) => {
            let decoded = unescape(s)?;
            *s = decoded;
        }
        Value::Array(items) => {
            for item in items {
                unescape_tree(item)?;
            }
        }
        Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                unescape_tree(item)?;
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
    Ok(())
}

/// The top-level `logmessage`, unless absent or `"blank"`
fn log_message(value: &Value) -> Option<String> {
    match value.get("logmessage")? {
        Value::String(s) if s == BLANK_LOG => None,
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
