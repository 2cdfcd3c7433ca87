//! Response normalization - turns a raw transport response into an envelope.
//!
//! Normalization never fails: body problems are reported inside the envelope
//! and the real HTTP status is kept.

use std::collections::BTreeMap;
use std::time::Instant;

use base64::Engine;
use bytes::Bytes;
use chrono::Utc;

use crate::constants::DEFAULT_MAX_MATERIALIZE_BYTES;
use crate::network::RawResponse;
use crate::response::{elapsed_ms, BinaryBody, BinarySubType, ResponseData, ResponseEnvelope};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BodyClass {
    Json,
    Text,
    Binary,
}

fn classify(content_type: &str) -> BodyClass {
    let ct = content_type.to_ascii_lowercase();
    if ct.contains("json") {
        BodyClass::Json
    } else if ct.starts_with("text/") || ct.contains("xml") {
        BodyClass::Text
    } else {
        BodyClass::Binary
    }
}

/// Duplicate names collapse to the last value received
pub fn flatten_headers(headers: &[(String, String)]) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn content_type_of(headers: &BTreeMap<String, String>) -> String {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        .map(|(_, value)| value.clone())
        .unwrap_or_default()
}

#[derive(Clone, Copy, Debug)]
pub struct Normalizer {
    max_materialize_bytes: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Normalizer::new(DEFAULT_MAX_MATERIALIZE_BYTES)
    }
}

impl Normalizer {
    pub fn new(max_materialize_bytes: usize) -> Self {
        Normalizer {
            max_materialize_bytes,
        }
    }

    pub fn normalize(&self, raw: RawResponse, started: Instant) -> ResponseEnvelope {
        let headers = flatten_headers(&raw.headers);
        let content_type = content_type_of(&headers);
        let class = classify(&content_type);

        let data = match (raw.body, class) {
            (Ok(bytes), BodyClass::Json) => json_body(&bytes),
            (Ok(bytes), BodyClass::Text) => ResponseData::Text {
                data: String::from_utf8_lossy(&bytes).into_owned(),
            },
            (Ok(bytes), BodyClass::Binary) => self.binary_body(&bytes, &content_type),
            (Err(error), BodyClass::Binary) => {
                tracing::warn!(status = raw.status, %error, "failed to read binary response body");
                ResponseData::Binary(BinaryBody {
                    sub_type: BinarySubType::from_content_type(&content_type),
                    data: None,
                    data_url: None,
                    size: 0,
                    is_previewable: false,
                    notice: None,
                    error: Some(error),
                })
            }
            (Err(error), _) => {
                tracing::warn!(status = raw.status, %error, "failed to read response body");
                ResponseData::Error {
                    error,
                    content_type: Some(content_type.clone()),
                }
            }
        };

        ResponseEnvelope {
            status: raw.status,
            status_text: raw.status_text,
            headers,
            data,
            duration_ms: elapsed_ms(started),
            timestamp: Utc::now(),
            final_url: raw.final_url,
            request: None,
        }
    }

    fn binary_body(&self, bytes: &Bytes, content_type: &str) -> ResponseData {
        let size = bytes.len();
        if size == 0 {
            return ResponseData::Binary(BinaryBody {
                sub_type: BinarySubType::Other,
                data: None,
                data_url: None,
                size,
                is_previewable: false,
                notice: None,
                error: None,
            });
        }

        let sub_type = BinarySubType::from_content_type(content_type);
        if size > self.max_materialize_bytes {
            return ResponseData::Binary(BinaryBody {
                sub_type,
                data: None,
                data_url: None,
                size,
                is_previewable: false,
                notice: Some(format!("Large file ({} bytes), base64 skipped", size)),
                error: None,
            });
        }

        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        let mime = if content_type.is_empty() {
            "application/octet-stream"
        } else {
            content_type
        };
        ResponseData::Binary(BinaryBody {
            sub_type,
            data_url: Some(format!("data:{};base64,{}", mime, encoded)),
            data: Some(encoded),
            size,
            is_previewable: sub_type != BinarySubType::Other,
            notice: None,
            error: None,
        })
    }
}

fn json_body(bytes: &Bytes) -> ResponseData {
    let text = String::from_utf8_lossy(bytes).into_owned();
    match serde_json::from_str(&text) {
        Ok(data) => ResponseData::Json {
            data,
            raw: Some(text),
        },
        // Mislabelled JSON is still a usable text response
        Err(_) => ResponseData::Text { data: text },
    }
}

/// Normalize with the default materialization limit
pub fn normalize(raw: RawResponse, started: Instant) -> ResponseEnvelope {
    Normalizer::default().normalize(raw, started)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(content_type: &str, body: impl Into<Bytes>) -> RawResponse {
        RawResponse {
            status: 200,
            status_text: "OK".into(),
            headers: vec![("content-type".into(), content_type.into())],
            body: Ok(body.into()),
            final_url: Some("https://api.example.com/".into()),
        }
    }

    #[test]
    fn test_json_body_is_parsed() {
        let env = normalize(raw("application/json; charset=utf-8", r#"{"a":1}"#), Instant::now());
        assert_eq!(
            env.data,
            ResponseData::Json {
                data: json!({"a": 1}),
                raw: Some(r#"{"a":1}"#.into())
            }
        );
        assert_eq!(env.status, 200);
    }

    #[test]
    fn test_built_json_body_round_trips() {
        use crate::builder::RequestBuilder;
        use crate::models::{HttpMethod, Request, RequestBody};
        use crate::settings::{resolve, GlobalSettings};

        let text = r#"{"name":"widget","tags":["a","b"],"price":9.5,"meta":null}"#;
        let req = Request::new(HttpMethod::POST, "https://a.io").with_body(RequestBody::Json(text.into()));
        let built = RequestBuilder::new(&req, resolve(&req, &GlobalSettings::default()))
            .build()
            .unwrap();
        let echoed = built.body.unwrap().into_bytes();

        let env = normalize(raw("application/json", echoed), Instant::now());
        match env.data {
            ResponseData::Json { data, .. } => {
                assert_eq!(data, serde_json::from_str::<serde_json::Value>(text).unwrap())
            }
            other => panic!("expected json, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_ld_json_is_json() {
        let env = normalize(raw("application/ld+json", "[1,2]"), Instant::now());
        assert_eq!(env.data.kind(), "json");
    }

    #[test]
    fn test_invalid_json_degrades_to_text() {
        let env = normalize(raw("application/json", "not json{"), Instant::now());
        assert_eq!(
            env.data,
            ResponseData::Text {
                data: "not json{".into()
            }
        );
        assert_eq!(env.status, 200);
    }

    #[test]
    fn test_text_and_xml() {
        assert_eq!(normalize(raw("text/html", "<p>"), Instant::now()).data.kind(), "text");
        assert_eq!(
            normalize(raw("application/xhtml+xml", "<p/>"), Instant::now()).data.kind(),
            "text"
        );
    }

    #[test]
    fn test_empty_binary() {
        let env = normalize(raw("image/png", Bytes::new()), Instant::now());
        match env.data {
            ResponseData::Binary(body) => {
                assert_eq!(body.sub_type, BinarySubType::Other);
                assert!(body.data.is_none());
                assert!(!body.is_previewable);
            }
            other => panic!("expected binary, got {:?}", other),
        }
    }

    #[test]
    fn test_small_image_is_materialized() {
        let env = normalize(raw("image/png", vec![0x89u8, 0x50, 0x4e, 0x47]), Instant::now());
        match env.data {
            ResponseData::Binary(body) => {
                assert_eq!(body.sub_type, BinarySubType::Image);
                assert_eq!(body.data.as_deref(), Some("iVBORw=="));
                assert_eq!(body.data_url.as_deref(), Some("data:image/png;base64,iVBORw=="));
                assert!(body.is_previewable);
                assert_eq!(body.size, 4);
            }
            other => panic!("expected binary, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_binary_is_not_previewable() {
        let env = normalize(raw("application/octet-stream", vec![1u8, 2, 3]), Instant::now());
        match env.data {
            ResponseData::Binary(body) => {
                assert_eq!(body.sub_type, BinarySubType::Other);
                assert!(body.data.is_some());
                assert!(!body.is_previewable);
            }
            other => panic!("expected binary, got {:?}", other),
        }
    }

    #[test]
    fn test_materialization_boundary() {
        let limit = DEFAULT_MAX_MATERIALIZE_BYTES;

        let at_limit = normalize(raw("application/pdf", vec![0u8; limit]), Instant::now());
        match at_limit.data {
            ResponseData::Binary(body) => {
                assert!(body.data.is_some());
                assert!(body.notice.is_none());
            }
            other => panic!("expected binary, got {:?}", other.kind()),
        }

        let over = normalize(raw("application/pdf", vec![0u8; limit + 1]), Instant::now());
        match over.data {
            ResponseData::Binary(body) => {
                assert_eq!(body.sub_type, BinarySubType::Document);
                assert!(body.data.is_none());
                assert!(!body.is_previewable);
                assert!(body.notice.unwrap().contains("base64 skipped"));
                assert_eq!(body.size, limit + 1);
            }
            other => panic!("expected binary, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_custom_limit() {
        let env = Normalizer::new(2).normalize(raw("image/gif", vec![1u8, 2, 3]), Instant::now());
        match env.data {
            ResponseData::Binary(body) => assert!(body.data.is_none()),
            other => panic!("expected binary, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_duplicate_headers_last_wins() {
        let mut response = raw("text/plain", "ok");
        response.headers.push(("x-trace".into(), "1".into()));
        response.headers.push(("x-trace".into(), "2".into()));
        let env = normalize(response, Instant::now());
        assert_eq!(env.headers.get("x-trace").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_body_read_failure_keeps_status() {
        let mut response = raw("application/json", "");
        response.status = 502;
        response.status_text = "Bad Gateway".into();
        response.body = Err("connection closed before message completed".into());
        let env = normalize(response, Instant::now());
        assert_eq!(env.status, 502);
        assert_eq!(
            env.error_message(),
            Some("connection closed before message completed")
        );

        let mut response = raw("image/png", "");
        response.body = Err("reset".into());
        let env = normalize(response, Instant::now());
        assert_eq!(env.data.kind(), "binary");
        assert_eq!(env.error_message(), Some("reset"));
    }
}
