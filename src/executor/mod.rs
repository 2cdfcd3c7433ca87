//! Request execution service.
//!
//! Orchestrates builder, transport and normalizer. Every entry point returns an
//! envelope: failures to obtain a response become status-0 envelopes and are
//! never propagated to the caller.

pub mod history;

use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::builder::{BodyPayload, BuiltRequest, RequestBuilder};
use crate::error::{BuildError, ErrorKind, TransportError};
use crate::models::{HttpMethod, Request};
use crate::network::{self, RawResponse, Transport, TransportKind, TransportRequest};
use crate::normalizer::Normalizer;
use crate::resolver::{CookieProvider, VariableResolver};
use crate::response::{RequestEcho, ResponseEnvelope};
use crate::settings::{self, RuntimeConfig};

pub use history::{HistoryEntry, HistorySink, HistoryStatus, MemoryHistory};

/// Default number of requests run in parallel by a batch
pub const DEFAULT_BATCH_CONCURRENCY: usize = 3;

/// Result of [`RequestExecutor::health_check`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub is_healthy: bool,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceStatistics {
    pub average_duration_ms: f64,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
    pub success_rate_percent: f64,
    /// Iterations whose status fell outside [200, 400)
    pub error_count: usize,
}

impl PerformanceStatistics {
    pub fn from_results(results: &[ResponseEnvelope]) -> Self {
        if results.is_empty() {
            return Self::default();
        }
        let durations = results.iter().map(|r| r.duration_ms);
        let total: u64 = durations.clone().sum();
        let successes = results.iter().filter(|r| r.is_success()).count();
        PerformanceStatistics {
            average_duration_ms: total as f64 / results.len() as f64,
            min_duration_ms: durations.clone().min().unwrap_or_default(),
            max_duration_ms: durations.max().unwrap_or_default(),
            success_rate_percent: successes as f64 * 100.0 / results.len() as f64,
            error_count: results.len() - successes,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub results: Vec<ResponseEnvelope>,
    pub statistics: PerformanceStatistics,
}

/// The execution façade
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    config: RuntimeConfig,
    cookies: Option<Arc<dyn CookieProvider>>,
    history: Option<Arc<dyn HistorySink>>,
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("transport", &self.transport.kind())
            .field("cookies", &self.cookies.is_some())
            .field("history", &self.history.is_some())
            .finish()
    }
}

impl RequestExecutor {
    /// Executor on the process-wide transport
    pub fn new(config: RuntimeConfig) -> Self {
        Self::with_transport(network::transport(), config)
    }

    pub fn with_transport(transport: Arc<dyn Transport>, config: RuntimeConfig) -> Self {
        RequestExecutor {
            transport,
            config,
            cookies: None,
            history: None,
        }
    }

    pub fn with_history(mut self, history: Arc<dyn HistorySink>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_cookie_provider(mut self, cookies: Arc<dyn CookieProvider>) -> Self {
        self.cookies = Some(cookies);
        self
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub async fn execute_request(
        &self,
        request: &Request,
        resolver: Option<&dyn VariableResolver>,
        save_to_history: bool,
    ) -> ResponseEnvelope {
        self.execute_request_with_cancel(request, &CancellationToken::new(), resolver, save_to_history)
            .await
    }

    /// Execute, aborting the transport call when `cancel` fires.
    pub async fn execute_request_with_cancel(
        &self,
        request: &Request,
        cancel: &CancellationToken,
        resolver: Option<&dyn VariableResolver>,
        save_to_history: bool,
    ) -> ResponseEnvelope {
        let started = Instant::now();
        let envelope = self.run(request, cancel, resolver, started).await;

        tracing::info!(
            method = request.method.as_str(),
            url = %request.url,
            status = envelope.status,
            duration_ms = envelope.duration_ms,
            "Request completed"
        );

        if save_to_history {
            if let Some(history) = &self.history {
                history.record(HistoryEntry::new(request.clone(), envelope.clone()));
            }
        }
        envelope
    }

    async fn run(
        &self,
        request: &Request,
        cancel: &CancellationToken,
        resolver: Option<&dyn VariableResolver>,
        started: Instant,
    ) -> ResponseEnvelope {
        if cancel.is_cancelled() {
            return ResponseEnvelope::from_transport_error(&TransportError::cancelled(), started);
        }

        let global = self.config.snapshot();
        let built = match RequestBuilder::new(request, settings::resolve(request, &global))
            .resolver(resolver)
            .cookies(self.cookies.as_deref())
            .build()
        {
            Ok(built) => built,
            Err(e) => {
                tracing::warn!(error = %e, "Request could not be built");
                return ResponseEnvelope::failure(ErrorKind::InvalidRequest, e.to_string(), started);
            }
        };

        let echo = echo_of(&built);
        let outgoing = TransportRequest::from_built(built, &global);
        tracing::debug!(
            transport = self.transport.kind().as_str(),
            url = %outgoing.url,
            "Dispatching request"
        );

        let result: Result<RawResponse, TransportError> = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::cancelled()),
            result = self.transport.send(outgoing, cancel) => result,
        };

        match result {
            Ok(raw) => Normalizer::new(global.max_materialize_bytes)
                .normalize(raw, started)
                .with_request(echo),
            Err(e) => {
                tracing::warn!(kind = ?e.kind, error = %e.message, "Request failed");
                ResponseEnvelope::from_transport_error(&e, started).with_request(echo)
            }
        }
    }

    /// Every problem that would stop the request from being built, deduplicated
    pub fn validate_request(
        &self,
        request: &Request,
        resolver: Option<&dyn VariableResolver>,
    ) -> Vec<String> {
        let mut messages: Vec<String> = Vec::new();
        for error in crate::builder::validate(request, resolver) {
            if !messages.contains(&error.message) {
                messages.push(error.message);
            }
        }
        messages
    }

    pub fn build_curl_command(
        &self,
        request: &Request,
        resolver: Option<&dyn VariableResolver>,
    ) -> Result<String, BuildError> {
        crate::curl::build_curl_command(request, resolver)
    }

    /// Bodiless GET, not recorded in history
    pub async fn health_check(&self, url: &str) -> HealthStatus {
        let request = Request::new(HttpMethod::GET, url);
        let envelope = self.execute_request(&request, None, false).await;
        HealthStatus {
            is_healthy: envelope.is_success(),
            response_time_ms: envelope.duration_ms,
            status_code: (!envelope.is_failure()).then_some(envelope.status),
            error: envelope.error_message().map(str::to_string),
        }
    }

    /// Run in chunks of `max_concurrency`; each chunk finishes before the next
    /// starts. Output order matches input order.
    pub async fn execute_batch_requests(
        &self,
        requests: &[Request],
        resolver: Option<&dyn VariableResolver>,
        max_concurrency: usize,
    ) -> Vec<ResponseEnvelope> {
        let chunk_size = max_concurrency.max(1);
        let mut results = Vec::with_capacity(requests.len());
        for chunk in requests.chunks(chunk_size) {
            let envelopes =
                join_all(chunk.iter().map(|request| self.execute_request(request, resolver, true)))
                    .await;
            results.extend(envelopes);
        }
        results
    }

    /// Serial iterations, not recorded in history
    pub async fn run_performance_test(
        &self,
        request: &Request,
        iterations: usize,
        resolver: Option<&dyn VariableResolver>,
    ) -> PerformanceReport {
        let mut results = Vec::with_capacity(iterations);
        for _ in 0..iterations {
            results.push(self.execute_request(request, resolver, false).await);
        }
        let statistics = PerformanceStatistics::from_results(&results);
        tracing::info!(
            iterations,
            average_ms = statistics.average_duration_ms,
            success_rate = statistics.success_rate_percent,
            "Performance test finished"
        );
        PerformanceReport {
            results,
            statistics,
        }
    }
}

fn echo_of(built: &BuiltRequest) -> RequestEcho {
    let body = built.body.as_ref().map(|body| match body {
        BodyPayload::Text(text) => text.clone(),
        BodyPayload::Multipart { boundary, bytes } => String::from_utf8(bytes.to_vec())
            .unwrap_or_else(|_| format!("<multipart body, {} bytes, boundary {}>", bytes.len(), boundary)),
    });
    RequestEcho {
        method: built.method.as_str().to_string(),
        url: built.url.to_string(),
        headers: built
            .headers
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
        body,
    }
}
