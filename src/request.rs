//! Outgoing call parameters
//!
//! A [`CallRequest`] is everything the service needs for one program run,
//! already resolved against the configuration. It is what gets queued while
//! remote configuration is loading, and what gets replayed after a re-login.

use crate::config::AdapterConfig;
use crate::error::{AdapterError, AdapterResult};
use crate::table::EncodedTable;
use crate::transport::Method;

/// One program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    /// `_program`, already prefixed with the metadata root
    pub program: String,
    /// `_debug`
    pub debug: u32,
    /// `_service`
    pub service: String,
    /// Macro name → `[spec, chunk0, chunk1, ...]`, in the order tables were added
    pub tables: Vec<(String, Vec<String>)>,
}

impl CallRequest {
    /// Form fields in wire order. Table strings repeat their macro name.
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("_program".to_string(), self.program.clone()),
            ("_debug".to_string(), self.debug.to_string()),
            ("_service".to_string(), self.service.clone()),
        ];
        for (macro_name, values) in &self.tables {
            for value in values {
                pairs.push((macro_name.clone(), value.clone()));
            }
        }
        pairs
    }

    /// Bring a queued request up to date with a configuration that arrived
    /// after it was built.
    pub fn repatch(&mut self, config: &AdapterConfig) {
        self.debug = config.debug_code();
        self.program = with_metadata_root(&config.metadata_root, &self.program);
    }
}

/// A raw request to any endpoint of the service, sent through the same
/// session handling as program calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedRequest {
    pub method: Method,
    pub url: String,
    pub params: Vec<(String, String)>,
}

impl ManagedRequest {
    pub fn new(method: Method, url: impl Into<String>, params: Vec<(String, String)>) -> Self {
        ManagedRequest {
            method,
            url: url.into(),
            params,
        }
    }

    /// Patch `_program` and `_debug` fields, if present, to match `config`.
    pub fn repatch(&mut self, config: &AdapterConfig) {
        for (name, value) in &mut self.params {
            match name.as_str() {
                "_program" => *value = with_metadata_root(&config.metadata_root, value),
                "_debug" => *value = config.debug_code().to_string(),
                _ => {}
            }
        }
    }
}

/// Prefix `program` with `root` unless it already contains it.
///
/// Exactly one `/` separates the two.
pub fn with_metadata_root(root: &str, program: &str) -> String {
    if root.is_empty() || program.contains(root) {
        return program.to_string();
    }
    format!(
        "{}/{}",
        root.trim_end_matches('/'),
        program.trim_start_matches('/')
    )
}

/// Assembles [`CallRequest`]s
pub struct RequestBuilder;

impl RequestBuilder {
    pub fn build(
        program: &str,
        tables: &[(String, EncodedTable)],
        config: &AdapterConfig,
    ) -> AdapterResult<CallRequest> {
        if program.trim().is_empty() {
            return Err(AdapterError::Argument(
                "You must provide program file path".to_string(),
            ));
        }

        let tables = tables
            .iter()
            .map(|(name, table)| Ok((name.clone(), table.to_params()?)))
            .collect::<AdapterResult<Vec<_>>>()?;

        Ok(CallRequest {
            program: with_metadata_root(&config.metadata_root, program),
            debug: config.debug_code(),
            service: config.service.clone(),
            tables,
        })
    }
}
