//! Network layer - transports, backend selection and the execution actor
//!
//! The actor receives execution commands and replies with envelopes.

pub mod actor;
pub mod certs;
pub mod errors;
pub mod native;
pub mod selector;
pub mod standard;
pub mod transport;

pub use actor::{ActorHandle, ExecutionActor, Executor};
pub use native::NativeTransport;
pub use selector::{transport, ExecutionEnvironment};
pub use standard::StandardTransport;
pub use transport::{
    ProxyTarget, RawResponse, Transport, TransportKind, TransportOptions, TransportRequest,
};
