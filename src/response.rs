//! Response envelope - the single result shape for every execution attempt

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, TransportError};

/// Coarse classification of binary bodies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinarySubType {
    Image,
    Document,
    Audio,
    Video,
    Other,
}

impl BinarySubType {
    /// Classify from a Content-Type value
    pub fn from_content_type(content_type: &str) -> Self {
        let ct = content_type.to_ascii_lowercase();
        if ct.starts_with("image/") {
            BinarySubType::Image
        } else if ct.contains("pdf") || ct.contains("document") || ct.contains("presentation") {
            BinarySubType::Document
        } else if ct.starts_with("audio/") {
            BinarySubType::Audio
        } else if ct.starts_with("video/") {
            BinarySubType::Video
        } else {
            BinarySubType::Other
        }
    }
}

/// Binary body description
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryBody {
    pub sub_type: BinarySubType,
    /// Base64 payload, `None` when empty, too large, or unreadable
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
    pub size: usize,
    pub is_previewable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response body, tagged by kind
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResponseData {
    Json {
        data: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        raw: Option<String>,
    },
    Text {
        data: String,
    },
    Binary(BinaryBody),
    Error {
        error: String,
        #[serde(rename = "contentType", skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
    },
}

impl ResponseData {
    pub fn kind(&self) -> &'static str {
        match self {
            ResponseData::Json { .. } => "json",
            ResponseData::Text { .. } => "text",
            ResponseData::Binary(_) => "binary",
            ResponseData::Error { .. } => "error",
        }
    }
}

/// Echo of what was actually sent, for raw views
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestEcho {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Normalized result of one execution attempt. Never mutated once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    /// HTTP status, 0 when no response was obtained
    pub status: u16,
    pub status_text: String,
    pub headers: BTreeMap<String, String>,
    pub data: ResponseData,
    /// Wall clock from dispatch to normalized result
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestEcho>,
}

impl ResponseEnvelope {
    /// Status-0 envelope for a failure to obtain any response
    pub fn failure(kind: ErrorKind, message: impl Into<String>, started: Instant) -> Self {
        ResponseEnvelope {
            status: 0,
            status_text: kind.status_text().to_string(),
            headers: BTreeMap::new(),
            data: ResponseData::Error {
                error: message.into(),
                content_type: None,
            },
            duration_ms: elapsed_ms(started),
            timestamp: Utc::now(),
            final_url: None,
            request: None,
        }
    }

    pub fn from_transport_error(err: &TransportError, started: Instant) -> Self {
        Self::failure(err.kind, err.message.clone(), started)
    }

    pub fn with_request(mut self, echo: RequestEcho) -> Self {
        self.request = Some(echo);
        self
    }

    /// Status in [200, 400)
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }

    /// No HTTP response was obtained
    pub fn is_failure(&self) -> bool {
        self.status == 0
    }

    /// Error text carried by an error body
    pub fn error_message(&self) -> Option<&str> {
        match &self.data {
            ResponseData::Error { error, .. } => Some(error),
            ResponseData::Binary(BinaryBody { error: Some(error), .. }) => Some(error),
            _ => None,
        }
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
