//! Backend selection - decided once per process.

use std::sync::{Arc, OnceLock};

use crate::constants::{SANDBOX_ENV_VAR, TRANSPORT_ENV_VAR};
use crate::network::native::NativeTransport;
use crate::network::standard::StandardTransport;
use crate::network::transport::{Transport, TransportKind};

static TRANSPORT: OnceLock<Arc<dyn Transport>> = OnceLock::new();

/// What the hosting process is allowed to do
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionEnvironment {
    /// Full filesystem access, no interactive window context
    FullTrust,
    /// Sandboxed or embedded host
    Restricted,
}

impl ExecutionEnvironment {
    pub fn detect() -> Self {
        let sandboxed = std::env::var(SANDBOX_ENV_VAR).is_ok_and(|v| !v.trim().is_empty());
        if sandboxed || dirs::home_dir().is_none() {
            ExecutionEnvironment::Restricted
        } else {
            ExecutionEnvironment::FullTrust
        }
    }
}

fn parse_override(value: &str) -> Option<TransportKind> {
    match value.trim().to_ascii_lowercase().as_str() {
        "standard" => Some(TransportKind::Standard),
        "native" => Some(TransportKind::Native),
        _ => None,
    }
}

/// Pick a backend. An explicit override wins over the environment.
pub fn select(environment: ExecutionEnvironment, forced: Option<&str>) -> TransportKind {
    if let Some(raw) = forced {
        match parse_override(raw) {
            Some(kind) => return kind,
            None => tracing::warn!(value = raw, "ignoring unknown {}", TRANSPORT_ENV_VAR),
        }
    }
    match environment {
        ExecutionEnvironment::FullTrust => TransportKind::Native,
        ExecutionEnvironment::Restricted => TransportKind::Standard,
    }
}

pub fn build(kind: TransportKind) -> Arc<dyn Transport> {
    match kind {
        TransportKind::Standard => Arc::new(StandardTransport::new()),
        TransportKind::Native => Arc::new(NativeTransport::new()),
    }
}

/// The process-wide transport
pub fn transport() -> Arc<dyn Transport> {
    TRANSPORT
        .get_or_init(|| {
            let forced = std::env::var(TRANSPORT_ENV_VAR).ok();
            let environment = ExecutionEnvironment::detect();
            let kind = select(environment, forced.as_deref());
            tracing::info!(backend = kind.as_str(), ?environment, "selected transport");
            build(kind)
        })
        .clone()
}
