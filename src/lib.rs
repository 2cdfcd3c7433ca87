//! # Freeman Engine
//!
//! The request-execution core of the Freeman API client.
//!
//! ## Features
//! - Request building: variables, query params, auth, JSON/raw/form/GraphQL bodies
//! - Two transports: a portable standard one and a native one with proxy,
//!   client certificates and per-call redirect limits
//! - One envelope shape for every outcome, including failures
//! - Cancellation, batch execution and a small performance harness
//! - cURL import/export
//!
//! ## Architecture
//! Descriptor -> Builder -> Transport -> Normalizer -> Envelope, fronted by
//! [`RequestExecutor`] and optionally driven through the [`ExecutionActor`].

pub mod builder;
pub mod constants;
pub mod curl;
pub mod error;
pub mod executor;
pub mod logging;
pub mod messages;
pub mod models;
pub mod network;
pub mod normalizer;
pub mod resolver;
pub mod response;
pub mod settings;

// Re-export commonly used types
pub use builder::{BuiltRequest, RequestBuilder};
pub use curl::{build_curl_command, parse_curl};
pub use error::{BuildError, ErrorKind, TransportError, ValidationError};
pub use executor::{
    HealthStatus, HistoryEntry, HistorySink, MemoryHistory, PerformanceReport, RequestExecutor,
};
pub use messages::ExecutionCommand;
pub use models::{AuthType, Environment, Header, HttpMethod, Request, RequestBody};
pub use network::{ActorHandle, ExecutionActor, Executor, Transport, TransportKind};
pub use normalizer::{normalize, Normalizer};
pub use resolver::{CookieProvider, NoopResolver, VariableResolver};
pub use response::{ResponseData, ResponseEnvelope};
pub use settings::{GlobalSettings, RuntimeConfig};
