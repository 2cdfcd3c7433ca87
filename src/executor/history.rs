//! Request history - a sink the executor reports completed executions to

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::MAX_HISTORY;
use crate::models::Request;
use crate::response::ResponseEnvelope;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Success,
    Error,
}

/// One recorded execution
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub request: Request,
    pub response: ResponseEnvelope,
    pub duration_ms: u64,
    pub status: HistoryStatus,
    pub error_message: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(request: Request, response: ResponseEnvelope) -> Self {
        let (status, error_message) = if response.is_failure() {
            (
                HistoryStatus::Error,
                Some(
                    response
                        .error_message()
                        .map(str::to_string)
                        .unwrap_or_else(|| response.status_text.clone()),
                ),
            )
        } else {
            (HistoryStatus::Success, None)
        };
        HistoryEntry {
            request,
            duration_ms: response.duration_ms,
            response,
            status,
            error_message,
            recorded_at: Utc::now(),
        }
    }
}

/// Receives history entries. Implementations must not block for long.
pub trait HistorySink: Send + Sync {
    fn record(&self, entry: HistoryEntry);
}

/// Bounded in-memory history, most recent first
#[derive(Debug, Default)]
pub struct MemoryHistory {
    entries: Mutex<VecDeque<HistoryEntry>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        MemoryHistory {
            entries: Mutex::new(VecDeque::with_capacity(MAX_HISTORY)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<HistoryEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Entry by index (0 = most recent)
    pub fn get(&self, index: usize) -> Option<HistoryEntry> {
        self.lock().get(index).cloned()
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl HistorySink for MemoryHistory {
    fn record(&self, entry: HistoryEntry) {
        let mut entries = self.lock();
        if entries.len() >= MAX_HISTORY {
            entries.pop_back();
        }
        entries.push_front(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::HttpMethod;
    use std::time::Instant;

    fn failed() -> ResponseEnvelope {
        ResponseEnvelope::failure(ErrorKind::HostNotFound, "no such host", Instant::now())
    }

    #[test]
    fn test_failed_execution_is_error_entry() {
        let entry = HistoryEntry::new(Request::new(HttpMethod::GET, "https://x.invalid"), failed());
        assert_eq!(entry.status, HistoryStatus::Error);
        assert_eq!(entry.error_message.as_deref(), Some("no such host"));
    }

    #[test]
    fn test_history_is_bounded_and_most_recent_first() {
        let history = MemoryHistory::new();
        for i in 0..(MAX_HISTORY + 5) {
            let req = Request::new(HttpMethod::GET, format!("https://a.io/{}", i));
            history.record(HistoryEntry::new(req, failed()));
        }
        assert_eq!(history.len(), MAX_HISTORY);
        assert_eq!(
            history.get(0).unwrap().request.url,
            format!("https://a.io/{}", MAX_HISTORY + 4)
        );
    }
}
