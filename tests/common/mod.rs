//! Scripted transport for adapter tests.
//!
//! Responses are served in the order they were queued. Every request is
//! recorded so tests can assert on exactly what went over the wire.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use storedproc::{Transport, TransportError, TransportResponse};

pub const LOGIN_PAGE: &str = r#"<html><body>
<form method="post" action="/SASLogon/Logon.do" name="logonForm">
<input type="text" name="ux"/><input type="password" name="px"/>
</form></body></html>"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub method: &'static str,
    pub url: String,
    pub params: Vec<(String, String)>,
}

impl Recorded {
    /// Every value of a form field, in order
    pub fn values(&self, key: &str) -> Vec<&str> {
        self.params
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.values(key).first().copied()
    }
}

#[derive(Clone, Default)]
pub struct ScriptedTransport {
    responses: Arc<Mutex<VecDeque<Result<TransportResponse, TransportError>>>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, body: &str) -> &Self {
        self.responses
            .lock()
            .push_back(Ok(TransportResponse::ok(body)));
        self
    }

    pub fn fail(&self, status: u16) -> &Self {
        self.responses
            .lock()
            .push_back(Err(TransportError::new(status, "scripted failure")));
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }

    fn serve(
        &self,
        method: &'static str,
        url: &str,
        params: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        self.requests.lock().push(Recorded {
            method,
            url: url.to_string(),
            params: params.to_vec(),
        });
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::network("no scripted response left")))
    }
}

impl Transport for ScriptedTransport {
    async fn post(
        &self,
        url: &str,
        form: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        self.serve("POST", url, form)
    }

    async fn get(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        self.serve("GET", url, query)
    }
}
