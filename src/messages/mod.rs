//! Message types exchanged with the execution actor.

pub mod execution;

pub use execution::ExecutionCommand;
