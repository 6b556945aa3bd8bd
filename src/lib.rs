//! # storedproc
//!
//! Client adapter for stored-process and job-execution web services.
//!
//! A caller attaches tables, runs a program by path and gets its JSON output
//! back. Along the way the adapter handles what the service makes awkward:
//!
//! ```text
//! rows ──► [table]    typed column spec + chunks under the 32k parameter limit
//!            ↓
//!          [request]  _program / _debug / _service + one field per table fragment
//!            ↓
//!          [adapter]  ──► queued while remote config loads ([pending])
//!            ↓
//!          [transport] POST
//!            ↓
//!          [session]  login form instead of output? re-login once, replay
//!            ↓
//!          [response] production JSON or debug page; unescape, logs, ERROR lines
//!            ↓
//!          [retry]    unparsable production body? re-issue, bounded
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use storedproc::{Adapter, AdapterConfig, Row};
//!
//! let adapter = Adapter::from_config(AdapterConfig::load()?)?;
//! adapter.set_credentials("user", "secret")?;
//! adapter.add_table(&[Row::new().with("id", 1).with("name", "Ada")], "people")?;
//! let output = adapter.call("/Shared Data/programs/startup").await?;
//! ```
//!
//! ## Module Organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `table` | Type inference, column spec, chunking |
//! | `request` | Form parameters of one call |
//! | `response` | Production/debug decoding, log ring, diagnostics |
//! | `session` | Expiry detection and login state |
//! | `retry` | Parse-failure retry bound |
//! | `pending` | Calls parked while remote config loads |
//! | `transport` | HTTP seam, reqwest implementation |
//! | `adapter` | Orchestration |
//! | `config` | figment layered configuration |
//! | `datetime` | SAS date/datetime conversion |

pub mod adapter;
pub mod config;
pub mod datetime;
pub mod error;
pub mod logging;
pub mod pending;
pub mod request;
pub mod response;
pub mod retry;
pub mod session;
pub mod table;
pub mod transport;

pub use adapter::{Adapter, ConfigListener};
pub use config::{AdapterConfig, LoggingConfig, ServerFlavor, DEBUG_CODE};
pub use datetime::{from_sas_date, from_sas_datetime, to_sas_date, to_sas_datetime};
pub use error::{AdapterError, AdapterResult, TransportError, LOGIN_REJECTED};
pub use request::{CallRequest, ManagedRequest, RequestBuilder};
pub use response::{LogEntry, ParseMode, ResponseParser, ResponseSinks};
pub use retry::RetryPolicy;
pub use session::{Credentials, Session, SessionState};
pub use table::{Cell, ColumnSpec, ColumnType, EncodedTable, Row, TableChunk, TableEncoder};
pub use transport::{HttpTransport, Method, Transport, TransportResponse};
