//! Adapter
//!
//! Ties the pieces together for one service connection:
//!
//! ```text
//! call(program)
//!   │  RequestBuilder (tables added with add_table)
//!   ├─ waiting for remote config? ──► PendingCallQueue ──► replayed on arrival
//!   ▼
//! transport.post ──► login form? ──► Session: re-login once and replay, or fail
//!   │
//!   ▼
//! ResponseParser ──► parse failure? ──► RetryPolicy: re-issue or fail
//!   │
//!   ▼
//! Ok(value)
//! ```
//!
//! All mutable state lives in one `AdapterState` behind a mutex that is
//! never held across an `.await`. There is no cancellation: dropping a call
//! future stops waiting for it, but a request already handed to the
//! transport still completes on the server.

use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::config::AdapterConfig;
use crate::error::{AdapterError, AdapterResult};
use crate::pending::{PendingCallQueue, PendingKind};
use crate::request::{CallRequest, ManagedRequest, RequestBuilder};
use crate::response::{LogEntry, ParseMode, ResponseParser, ResponseSinks};
use crate::retry::RetryPolicy;
use crate::session::{is_login_page, Credentials, ExpiryAction, Session, SessionState};
use crate::table::{EncodedTable, Row, TableEncoder};
use crate::transport::{HttpTransport, Method, Transport, TransportResponse};

/// Callback run once remote configuration has been merged
pub type ConfigListener = Arc<dyn Fn(&AdapterConfig) + Send + Sync>;

/// Everything an adapter instance mutates
struct AdapterState {
    config: AdapterConfig,
    session: Session,
    /// Tables for the next call, in the order they were added
    tables: Vec<(String, EncodedTable)>,
    pending: PendingCallQueue,
    sinks: ResponseSinks,
    /// Calls are parked while remote configuration is outstanding
    waiting_for_config: bool,
    listeners: Vec<ConfigListener>,
}

impl AdapterState {
    fn new(config: AdapterConfig) -> Self {
        AdapterState {
            session: Session::new(config.auto_login),
            waiting_for_config: config.remote_config_url.is_some(),
            config,
            tables: Vec::new(),
            pending: PendingCallQueue::new(),
            sinks: ResponseSinks::default(),
            listeners: Vec::new(),
        }
    }
}

struct Inner<T> {
    transport: T,
    state: Mutex<AdapterState>,
}

/// Whether a request goes out now or waits for configuration
enum Dispatch<R, T> {
    Send(R),
    Wait(oneshot::Receiver<AdapterResult<T>>),
}

/// Client adapter for one service. Clones share the same state.
pub struct Adapter<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for Adapter<T> {
    fn clone(&self) -> Self {
        Adapter {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Adapter<HttpTransport> {
    /// Adapter over a reqwest transport using the configured timeout
    ///
    /// With `remote_config_url` set and a tokio runtime current, the remote
    /// configuration fetch starts right away.
    pub fn from_config(config: AdapterConfig) -> AdapterResult<Self> {
        let transport = HttpTransport::new(Duration::from_millis(config.timeout_ms))?;
        let adapter = Adapter::new(config, transport);
        if adapter.is_waiting_for_config() && tokio::runtime::Handle::try_current().is_ok() {
            drop(adapter.spawn_remote_config());
        }
        Ok(adapter)
    }
}

impl<T: Transport> Adapter<T> {
    /// Create an adapter. With `remote_config_url` set, calls are queued until
    /// [`Adapter::load_remote_config`] completes, or fail with
    /// [`AdapterError::RemoteConfig`] after `timeout_ms` without configuration.
    pub fn new(config: AdapterConfig, transport: T) -> Self {
        Adapter {
            inner: Arc::new(Inner {
                transport,
                state: Mutex::new(AdapterState::new(config)),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, AdapterState> {
        self.inner.state.lock()
    }

    pub fn config(&self) -> AdapterConfig {
        self.state().config.clone()
    }

    pub fn session_state(&self) -> SessionState {
        self.state().session.state()
    }

    pub fn auto_login(&self) -> bool {
        self.state().session.auto_login()
    }

    pub fn is_waiting_for_config(&self) -> bool {
        self.state().waiting_for_config
    }

    pub fn pending_calls(&self) -> usize {
        self.state().pending.len()
    }

    /// `ERROR` lines of the last decoded response
    pub fn diagnostic_errors(&self) -> Vec<String> {
        self.state().sinks.diagnostics.clone()
    }

    /// Most recent application log messages, oldest first
    pub fn application_logs(&self) -> Vec<LogEntry> {
        self.state().sinks.logs.entries()
    }

    pub fn set_credentials(&self, user: &str, pass: &str) -> AdapterResult<()> {
        let credentials = Credentials::new(user, pass)?;
        self.state().session.set_credentials(credentials);
        Ok(())
    }

    /// Attach a table to the next call under `macro_name`.
    pub fn add_table(&self, rows: &[Row], macro_name: &str) -> AdapterResult<()> {
        validate_macro_name(macro_name)?;
        let table = TableEncoder::new().encode(rows)?;
        self.push_table(macro_name, table);
        Ok(())
    }

    /// [`Adapter::add_table`] for a JSON array of objects
    pub fn add_json_table(&self, table: &Value, macro_name: &str) -> AdapterResult<()> {
        validate_macro_name(macro_name)?;
        let table = TableEncoder::new().encode_json(table)?;
        self.push_table(macro_name, table);
        Ok(())
    }

    fn push_table(&self, macro_name: &str, table: EncodedTable) {
        let mut state = self.state();
        state.tables.retain(|(name, _)| name != macro_name);
        state.tables.push((macro_name.to_string(), table));
    }

    /// Register a callback for the arrival of remote configuration
    pub fn on_remote_config(&self, listener: impl Fn(&AdapterConfig) + Send + Sync + 'static) {
        self.state().listeners.push(Arc::new(listener));
    }

    /// Run `program` with the tables added so far and return its decoded
    /// output. The tables are consumed by this call.
    pub async fn call(&self, program: &str) -> AdapterResult<Value> {
        let dispatch = {
            let mut state = self.state();
            let request = RequestBuilder::build(program, &state.tables, &state.config)?;
            state.tables.clear();
            if state.waiting_for_config {
                Dispatch::Wait(state.pending.push_program(request))
            } else {
                Dispatch::Send(request)
            }
        };

        match dispatch {
            Dispatch::Send(request) => self.execute(request).await,
            Dispatch::Wait(rx) => self.await_parked(rx).await,
        }
    }

    /// Send an arbitrary request through the session handling.
    pub async fn managed_request(
        &self,
        method: Method,
        url: &str,
        params: Vec<(String, String)>,
    ) -> AdapterResult<TransportResponse> {
        let request = ManagedRequest::new(method, url, params);
        let dispatch = {
            let mut state = self.state();
            if state.waiting_for_config {
                Dispatch::Wait(state.pending.push_managed(request))
            } else {
                Dispatch::Send(request)
            }
        };

        match dispatch {
            Dispatch::Send(request) => self.execute_managed(request).await,
            Dispatch::Wait(rx) => self.await_parked(rx).await,
        }
    }

    /// Wait for a parked call. Gives up after `timeout_ms` if configuration
    /// still has not arrived; once it has, the replay runs to completion.
    async fn await_parked<R>(&self, mut rx: oneshot::Receiver<AdapterResult<R>>) -> AdapterResult<R> {
        let timeout_ms = self.state().config.timeout_ms;
        match tokio::time::timeout(Duration::from_millis(timeout_ms), &mut rx).await {
            Ok(result) => result.unwrap_or_else(|_| Err(abandoned())),
            Err(_) if self.is_waiting_for_config() => {
                tracing::warn!(timeout_ms, "remote_config_wait_expired");
                Err(AdapterError::RemoteConfig(format!(
                    "no configuration received within {timeout_ms} ms"
                )))
            }
            Err(_) => rx.await.unwrap_or_else(|_| Err(abandoned())),
        }
    }

    /// Log in with the stored credentials. Returns the login response status.
    pub async fn login(&self) -> AdapterResult<u16> {
        let credentials = self.state().session.credentials()?;
        self.send_login(&credentials).await
    }

    /// Store credentials, then log in.
    pub async fn login_with(&self, user: &str, pass: &str) -> AdapterResult<u16> {
        self.set_credentials(user, pass)?;
        self.login().await
    }

    pub async fn logout(&self) -> AdapterResult<()> {
        let url = self.state().config.logout_endpoint();
        self.inner.transport.get(&url, &[]).await?;
        self.state().session.on_logout();
        tracing::info!("logged_out");
        Ok(())
    }

    /// Fetch the remote configuration, merge it, and replay parked calls.
    ///
    /// Does nothing without `remote_config_url`. On failure every parked call
    /// completes with [`AdapterError::RemoteConfig`] and the adapter carries on
    /// with its local configuration.
    pub async fn load_remote_config(&self) -> AdapterResult<()> {
        let Some(url) = self.state().config.remote_config_url.clone() else {
            return Ok(());
        };

        let fetched = match self.inner.transport.get(&url, &[]).await {
            Ok(response) => serde_json::from_str::<Value>(&response.body)
                .map_err(|e| AdapterError::RemoteConfig(format!("invalid JSON: {e}"))),
            Err(e) => Err(AdapterError::RemoteConfig(format!(
                "Http status code: {}",
                e.status
            ))),
        };

        match fetched {
            Ok(remote) => self.apply_remote_config(&remote).await,
            Err(e) => {
                tracing::error!(url = %url, error = %e, "remote_config_failed");
                self.abort_pending(&e);
                Err(e)
            }
        }
    }

    /// Merge `remote` over the current configuration, notify listeners, and
    /// replay parked calls in issuance order.
    pub async fn apply_remote_config(&self, remote: &Value) -> AdapterResult<()> {
        let merged = {
            let mut state = self.state();
            match state.config.merge_remote(remote) {
                Ok(merged) => {
                    if merged.auto_login {
                        state.session.set_auto_login(true);
                    }
                    state.config = merged.clone();
                    Ok((merged, state.listeners.clone()))
                }
                Err(e) => Err(AdapterError::RemoteConfig(e.to_string())),
            }
        };

        let (config, listeners) = match merged {
            Ok(merged) => merged,
            Err(e) => {
                self.abort_pending(&e);
                return Err(e);
            }
        };

        tracing::info!(pending = self.pending_calls(), "remote_config_loaded");
        for listener in &listeners {
            listener(&config);
        }
        self.drain_pending().await;
        Ok(())
    }

    /// Replay parked calls front to back, including ones parked meanwhile.
    async fn drain_pending(&self) {
        loop {
            let next = {
                let mut state = self.state();
                match state.pending.pop_front() {
                    Some(mut call) => {
                        call.repatch(&state.config);
                        Some(call)
                    }
                    None => {
                        state.waiting_for_config = false;
                        None
                    }
                }
            };
            let Some(call) = next else { break };
            if call.is_abandoned() {
                tracing::debug!(position = call.position, "pending_call_dropped");
                continue;
            }

            tracing::debug!(position = call.position, "pending_call_replayed");
            match call.kind {
                PendingKind::Program { request, reply } => {
                    let _ = reply.send(self.execute(request).await);
                }
                PendingKind::Managed { request, reply } => {
                    let _ = reply.send(self.execute_managed(request).await);
                }
            }
        }
    }

    fn abort_pending(&self, error: &AdapterError) {
        let calls = {
            let mut state = self.state();
            state.waiting_for_config = false;
            state.pending.drain()
        };
        for call in calls {
            call.fail(AdapterError::RemoteConfig(error.to_string()));
        }
    }

    /// Send a built request until it yields a decoded value or a final error.
    async fn execute(&self, request: CallRequest) -> AdapterResult<Value> {
        let form = request.form_pairs();
        let mode = ParseMode::from_debug(request.debug != 0);
        let mut retries = 0;
        let mut replayed = false;

        loop {
            let (url, policy) = {
                let state = self.state();
                (state.config.program_url(), RetryPolicy::from_config(&state.config))
            };

            tracing::debug!(program = %request.program, retries, replayed, "call_sent");
            let response = self.inner.transport.post(&url, &form).await?;

            if is_login_page(&response.body) {
                self.recover_session(&request.program, replayed).await?;
                replayed = true;
                continue;
            }

            let parsed = {
                let mut state = self.state();
                ResponseParser::parse(&response.body, mode, &mut state.sinks)
            };
            match parsed {
                Ok(value) => return Ok(value),
                Err(e) if policy.should_retry(mode, retries) => {
                    retries += 1;
                    tracing::warn!(program = %request.program, attempt = retries, error = %e, "response_parse_retry");
                }
                Err(e) => {
                    tracing::warn!(program = %request.program, retries, error = %e, "response_parse_failed");
                    return Err(e);
                }
            }
        }
    }

    async fn execute_managed(&self, request: ManagedRequest) -> AdapterResult<TransportResponse> {
        let mut replayed = false;
        loop {
            let response = match request.method {
                Method::Get => self.inner.transport.get(&request.url, &request.params).await?,
                Method::Post => self.inner.transport.post(&request.url, &request.params).await?,
            };
            if !is_login_page(&response.body) {
                return Ok(response);
            }
            self.recover_session(&request.url, replayed).await?;
            replayed = true;
        }
    }

    /// Handle a login form in place of a response. `Ok` means replay the call.
    async fn recover_session(&self, endpoint: &str, replayed: bool) -> AdapterResult<()> {
        let action = self.state().session.on_expired(replayed);
        match action {
            ExpiryAction::Fail(e) => {
                tracing::warn!(endpoint, replayed, error = %e, "session_expired");
                Err(e)
            }
            ExpiryAction::Relogin(credentials) => {
                tracing::info!(endpoint, "session_expired_relogin");
                self.send_login(&credentials).await.map(|_| ())
            }
        }
    }

    async fn send_login(&self, credentials: &Credentials) -> AdapterResult<u16> {
        let (url, form) = {
            let mut state = self.state();
            state.session.begin_login();
            (
                state.config.login_endpoint(),
                credentials.login_form(&state.config.service),
            )
        };

        match self.inner.transport.post(&url, &form).await {
            Ok(response) => {
                let outcome = self
                    .state()
                    .session
                    .on_login_response(&response.body, response.status);
                match &outcome {
                    Ok(status) => tracing::info!(user = %credentials.user, status, "login_succeeded"),
                    Err(_) => tracing::warn!(user = %credentials.user, "login_rejected"),
                }
                outcome
            }
            Err(e) => {
                self.state().session.on_login_failed();
                tracing::warn!(user = %credentials.user, status = e.status, "login_failed");
                Err(AdapterError::Login {
                    status: i32::from(e.status),
                })
            }
        }
    }
}

impl<T: Transport + 'static> Adapter<T> {
    /// Load remote configuration on a background task.
    pub fn spawn_remote_config(&self) -> tokio::task::JoinHandle<AdapterResult<()>> {
        let adapter = self.clone();
        tokio::spawn(async move { adapter.load_remote_config().await })
    }
}

fn validate_macro_name(macro_name: &str) -> AdapterResult<()> {
    if macro_name.trim().is_empty() {
        return Err(AdapterError::Argument(
            "Macro name must be a non-empty string".to_string(),
        ));
    }
    Ok(())
}

fn abandoned() -> AdapterError {
    AdapterError::RemoteConfig("adapter dropped before configuration arrived".to_string())
}
