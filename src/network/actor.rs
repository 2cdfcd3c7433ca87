//! Execution actor - runs requests on the Tokio runtime on behalf of a host

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::error::ErrorKind;
use crate::executor::RequestExecutor;
use crate::messages::ExecutionCommand;
use crate::models::{Environment, Request};
use crate::resolver::VariableResolver;
use crate::response::ResponseEnvelope;

/// Actor that executes requests and tracks them for cancellation
pub struct ExecutionActor {
    executor: Arc<RequestExecutor>,
    active_requests: JoinSet<u64>,
    cancel_handles: HashMap<u64, CancellationToken>,
}

impl ExecutionActor {
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        ExecutionActor {
            executor,
            active_requests: JoinSet::new(),
            cancel_handles: HashMap::new(),
        }
    }

    /// Start the actor on the current runtime
    pub fn spawn(executor: Arc<RequestExecutor>) -> (ActorHandle, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(ExecutionActor::new(executor).run(cmd_rx));
        (ActorHandle::new(cmd_tx), task)
    }

    /// Run the actor message loop
    pub async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<ExecutionCommand>) {
        loop {
            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(ExecutionCommand::Execute { id, request, environment, save_to_history, reply }) => {
                            let token = CancellationToken::new();
                            self.cancel_handles.insert(id, token.clone());
                            let executor = self.executor.clone();

                            self.active_requests.spawn(async move {
                                tracing::info!(id, url = %request.url, method = ?request.method, "Executing request");
                                let resolver = environment.as_ref().map(|env| env as &dyn VariableResolver);
                                let envelope = executor
                                    .execute_request_with_cancel(&request, &token, resolver, save_to_history)
                                    .await;
                                tracing::info!(id, status = envelope.status, "Request completed");
                                let _ = reply.send(envelope);
                                id
                            });
                        }

                        Some(ExecutionCommand::Cancel(id)) => {
                            if let Some(token) = self.cancel_handles.remove(&id) {
                                tracing::info!(id, "Cancelling request");
                                token.cancel();
                            }
                        }

                        Some(ExecutionCommand::Shutdown) | None => {
                            for (_, token) in self.cancel_handles.drain() {
                                token.cancel();
                            }
                            // Let cancelled executions deliver their envelopes
                            while self.active_requests.join_next().await.is_some() {}
                            break;
                        }
                    }
                }

                Some(result) = self.active_requests.join_next() => {
                    match result {
                        Ok(id) => {
                            self.cancel_handles.remove(&id);
                        }
                        Err(e) => tracing::error!(error = %e, "Execution task failed"),
                    }
                }
            }
        }
        tracing::debug!("Execution actor stopped");
    }
}

/// Cloneable sender side of a running [`ExecutionActor`]
#[derive(Clone, Debug)]
pub struct ActorHandle {
    cmd_tx: mpsc::UnboundedSender<ExecutionCommand>,
    next_id: Arc<AtomicU64>,
}

impl ActorHandle {
    fn new(cmd_tx: mpsc::UnboundedSender<ExecutionCommand>) -> Self {
        ActorHandle {
            cmd_tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Fresh id for [`ActorHandle::execute_as`]
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn execute(
        &self,
        request: Request,
        environment: Option<Environment>,
        save_to_history: bool,
    ) -> ResponseEnvelope {
        self.execute_as(self.next_id(), request, environment, save_to_history)
            .await
    }

    /// Execute under a caller-chosen id, so it can be cancelled with [`ActorHandle::cancel`]
    pub async fn execute_as(
        &self,
        id: u64,
        request: Request,
        environment: Option<Environment>,
        save_to_history: bool,
    ) -> ResponseEnvelope {
        let started = Instant::now();
        let (reply, response) = oneshot::channel();
        let command = ExecutionCommand::Execute {
            id,
            request,
            environment,
            save_to_history,
            reply,
        };
        if self.cmd_tx.send(command).is_err() {
            return actor_gone(started);
        }
        response.await.unwrap_or_else(|_| actor_gone(started))
    }

    pub fn cancel(&self, id: u64) {
        let _ = self.cmd_tx.send(ExecutionCommand::Cancel(id));
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(ExecutionCommand::Shutdown);
    }
}

fn actor_gone(started: Instant) -> ResponseEnvelope {
    ResponseEnvelope::failure(ErrorKind::Network, "Execution actor is not running", started)
}

/// Where executions run, chosen once by the host
#[derive(Clone, Debug)]
pub enum Executor {
    /// In-process
    Local(Arc<RequestExecutor>),
    /// Through a running actor
    Remote(ActorHandle),
}

impl Executor {
    pub async fn execute(
        &self,
        request: Request,
        environment: Option<Environment>,
        save_to_history: bool,
    ) -> ResponseEnvelope {
        match self {
            Executor::Local(executor) => {
                let resolver = environment.as_ref().map(|env| env as &dyn VariableResolver);
                executor
                    .execute_request(&request, resolver, save_to_history)
                    .await
            }
            Executor::Remote(handle) => {
                handle
                    .execute(request, environment, save_to_history)
                    .await
            }
        }
    }
}
