//! Execution messages - communication between a host and the execution actor

use tokio::sync::oneshot;

use crate::models::{Environment, Request};
use crate::response::ResponseEnvelope;

/// Commands sent to the execution actor
#[derive(Debug)]
pub enum ExecutionCommand {
    /// Execute a request and reply with its envelope
    Execute {
        id: u64,
        request: Request,
        environment: Option<Environment>,
        save_to_history: bool,
        reply: oneshot::Sender<ResponseEnvelope>,
    },
    /// Cancel an in-flight execution
    Cancel(u64),
    /// Cancel everything and stop the actor
    Shutdown,
}
