//! Body construction for every body kind.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use bytes::{BufMut, Bytes, BytesMut};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::BuildError;
use crate::models::{FileAttachment, FileEncoding, FormField, GraphQlBody, Request, RequestBody};
use crate::resolver::{resolve_with, VariableResolver};

/// Characters left alone by JavaScript's `encodeURIComponent`
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// A built request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyPayload {
    Text(String),
    /// Pre-encoded multipart/form-data
    Multipart { boundary: String, bytes: Bytes },
}

impl BodyPayload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            BodyPayload::Text(text) => text.as_bytes(),
            BodyPayload::Multipart { bytes, .. } => bytes,
        }
    }

    /// Textual form, when the payload is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            BodyPayload::Text(text) => Some(text),
            BodyPayload::Multipart { .. } => None,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_bytes(self) -> Bytes {
        match self {
            BodyPayload::Text(text) => Bytes::from(text),
            BodyPayload::Multipart { bytes, .. } => bytes,
        }
    }
}

/// Fresh multipart boundary, unique within the process
pub(crate) fn generate_boundary() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("----FreemanFormBoundary{:016x}{:04x}", nanos, seq & 0xffff)
}

/// Content type implied by the body kind, used when none is set explicitly.
pub(crate) fn implied_content_type(request: &Request, boundary: &str) -> Option<String> {
    match &request.body {
        RequestBody::Json(_) if request.method.implies_json_content_type() => {
            Some("application/json".to_string())
        }
        RequestBody::GraphQl(_) if request.method.allows_body() => {
            Some("application/json".to_string())
        }
        RequestBody::UrlEncoded(_) if request.method.allows_body() => {
            Some("application/x-www-form-urlencoded".to_string())
        }
        RequestBody::FormData(_) if request.method.allows_body() => {
            Some(format!("multipart/form-data; boundary={}", boundary))
        }
        _ => None,
    }
}

/// `operationName` from a `query|mutation|subscription <Name>` prefix
pub fn graphql_operation_name(query: &str) -> Option<String> {
    static OPERATION: OnceLock<Regex> = OnceLock::new();
    let re = OPERATION.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:query|mutation|subscription)\s+([_A-Za-z][_0-9A-Za-z]*)").unwrap()
    });
    re.captures(query)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Resolve placeholders inside every string of a JSON value
fn resolve_value(value: &Value, resolver: Option<&dyn VariableResolver>) -> Value {
    match value {
        Value::String(s) => Value::String(resolve_with(resolver, s)),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_value(v, resolver)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, resolver)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// JSON text of a GraphQL request: `{query, variables, operationName?}`
pub fn graphql_payload(body: &GraphQlBody, resolver: Option<&dyn VariableResolver>) -> String {
    let query = resolve_with(resolver, &body.query);
    let mut payload = Map::new();
    if let Some(name) = graphql_operation_name(&query) {
        payload.insert("operationName".into(), Value::String(name));
    }
    payload.insert(
        "variables".into(),
        resolve_value(&Value::Object(body.variables.clone()), resolver),
    );
    payload.insert("query".into(), Value::String(query));
    Value::Object(payload).to_string()
}

/// `key=value&...` with every component percent-encoded
pub fn urlencode_fields(fields: &[FormField], resolver: Option<&dyn VariableResolver>) -> String {
    fields
        .iter()
        .filter(|f| f.enabled)
        .map(|f| (resolve_with(resolver, &f.key), f))
        .filter(|(key, _)| !key.trim().is_empty())
        .map(|(key, f)| {
            let value = resolve_with(resolver, &f.value);
            format!(
                "{}={}",
                utf8_percent_encode(&key, COMPONENT),
                utf8_percent_encode(&value, COMPONENT)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Raw bytes of a materialized file attachment
pub fn decode_attachment(file: &FileAttachment) -> Result<Vec<u8>, BuildError> {
    match file.encoding {
        FileEncoding::Base64 => {
            let content = file.content.trim();
            // Accept data: URLs as produced by file pickers
            let content = match content.split_once(";base64,") {
                Some((prefix, data)) if prefix.starts_with("data:") => data,
                _ => content,
            };
            base64::engine::general_purpose::STANDARD
                .decode(content)
                .map_err(|e| BuildError::Attachment {
                    name: file.file_name.clone(),
                    reason: e.to_string(),
                })
        }
        FileEncoding::Binary => Ok(file.content.chars().map(|c| c as u32 as u8).collect()),
    }
}

fn escape_disposition(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Encode enabled fields as multipart/form-data
pub fn encode_multipart(
    fields: &[FormField],
    boundary: &str,
    resolver: Option<&dyn VariableResolver>,
) -> Result<Bytes, BuildError> {
    let mut out = BytesMut::new();
    for field in fields.iter().filter(|f| f.enabled) {
        let key = resolve_with(resolver, &field.key);
        if key.trim().is_empty() {
            continue;
        }
        let name = escape_disposition(&key);
        out.put_slice(format!("--{}\r\n", boundary).as_bytes());
        match &field.file {
            Some(file) => {
                let content_type = file
                    .content_type
                    .as_deref()
                    .filter(|ct| !ct.trim().is_empty())
                    .unwrap_or("application/octet-stream");
                out.put_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name,
                        escape_disposition(&file.file_name),
                        content_type
                    )
                    .as_bytes(),
                );
                out.put_slice(&decode_attachment(file)?);
            }
            None => {
                out.put_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                out.put_slice(resolve_with(resolver, &field.value).as_bytes());
            }
        }
        out.put_slice(b"\r\n");
    }
    out.put_slice(format!("--{}--\r\n", boundary).as_bytes());
    Ok(out.freeze())
}

/// Build the body, or `None` when nothing is sent.
pub fn build_body(
    request: &Request,
    resolver: Option<&dyn VariableResolver>,
    boundary: &str,
) -> Result<Option<BodyPayload>, BuildError> {
    if !request.method.allows_body() {
        return Ok(None);
    }

    let payload = match &request.body {
        RequestBody::None => None,
        RequestBody::Json(text) | RequestBody::Raw(text) => {
            let text = resolve_with(resolver, text);
            (!text.is_empty()).then_some(BodyPayload::Text(text))
        }
        RequestBody::GraphQl(body) => Some(BodyPayload::Text(graphql_payload(body, resolver))),
        RequestBody::UrlEncoded(fields) => {
            let encoded = urlencode_fields(fields, resolver);
            (!encoded.is_empty()).then_some(BodyPayload::Text(encoded))
        }
        RequestBody::FormData(fields) => Some(BodyPayload::Multipart {
            boundary: boundary.to_string(),
            bytes: encode_multipart(fields, boundary, resolver)?,
        }),
    };

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HttpMethod;

    fn text_of(payload: Option<BodyPayload>) -> String {
        payload.unwrap().as_text().unwrap().to_string()
    }

    #[test]
    fn test_no_body_for_get_head_options() {
        for method in [HttpMethod::GET, HttpMethod::HEAD, HttpMethod::OPTIONS] {
            let req = Request::new(method, "https://x.io").with_body(RequestBody::Json("{}".into()));
            assert_eq!(build_body(&req, None, "b").unwrap(), None);
        }
    }

    #[test]
    fn test_urlencoded_fields() {
        let req = Request::new(HttpMethod::POST, "https://x.io").with_body(RequestBody::UrlEncoded(vec![
            FormField::text("username", "john"),
            FormField::text("password", "secret"),
            FormField {
                enabled: false,
                ..FormField::text("debug", "1")
            },
        ]));
        assert_eq!(text_of(build_body(&req, None, "b").unwrap()), "username=john&password=secret");
    }

    #[test]
    fn test_fields_keyed_by_empty_variables_are_dropped() {
        let resolver = |text: &str| text.replace("{{k}}", " ");
        let fields = vec![FormField::text("{{k}}", "lost"), FormField::text("a", "1")];
        assert_eq!(urlencode_fields(&fields, Some(&resolver)), "a=1");

        let encoded = encode_multipart(&fields, "b", Some(&resolver)).unwrap();
        let text = String::from_utf8_lossy(&encoded);
        assert!(!text.contains("lost"));
        assert!(text.contains("name=\"a\""));
    }

    #[test]
    fn test_urlencoded_percent_encodes_components() {
        let fields = vec![FormField::text("full name", "Jöhn & Co=1"), FormField::text("ok", "a-b_c.d~(x)")];
        assert_eq!(
            urlencode_fields(&fields, None),
            "full%20name=J%C3%B6hn%20%26%20Co%3D1&ok=a-b_c.d~(x)"
        );
    }

    #[test]
    fn test_json_body_is_resolved_text() {
        let resolver = |text: &str| text.replace("{{id}}", "42");
        let req = Request::new(HttpMethod::PUT, "https://x.io")
            .with_body(RequestBody::Json(r#"{"id": {{id}}}"#.into()));
        assert_eq!(text_of(build_body(&req, Some(&resolver), "b").unwrap()), r#"{"id": 42}"#);
    }

    #[test]
    fn test_empty_raw_body_is_none() {
        let req = Request::new(HttpMethod::POST, "https://x.io").with_body(RequestBody::Raw(String::new()));
        assert_eq!(build_body(&req, None, "b").unwrap(), None);
    }

    #[test]
    fn test_graphql_without_operation_name() {
        let body = GraphQlBody {
            query: "query { users { id } }".into(),
            variables: Map::new(),
        };
        let payload: Value = serde_json::from_str(&graphql_payload(&body, None)).unwrap();
        assert_eq!(payload["query"], "query { users { id } }");
        assert!(payload.get("operationName").is_none());
        assert_eq!(payload["variables"], serde_json::json!({}));
    }

    #[test]
    fn test_graphql_operation_name_and_variables() {
        let mut variables = Map::new();
        variables.insert("id".into(), Value::String("{{user}}".into()));
        variables.insert("limit".into(), Value::from(5));
        let body = GraphQlBody {
            query: "  Mutation UpdateUser($id: ID!) { update(id: $id) }".into(),
            variables,
        };
        let resolver = |text: &str| text.replace("{{user}}", "u-1");
        let payload: Value = serde_json::from_str(&graphql_payload(&body, Some(&resolver))).unwrap();
        assert_eq!(payload["operationName"], "UpdateUser");
        assert_eq!(payload["variables"]["id"], "u-1");
        assert_eq!(payload["variables"]["limit"], 5);
    }

    #[test]
    fn test_operation_name_regex() {
        assert_eq!(graphql_operation_name("query GetUsers { a }"), Some("GetUsers".into()));
        assert_eq!(graphql_operation_name("subscription OnEvent{ a }"), Some("OnEvent".into()));
        assert_eq!(graphql_operation_name("{ users { id } }"), None);
        assert_eq!(graphql_operation_name("query($x: Int) { a }"), None);
    }

    #[test]
    fn test_multipart_with_file_and_disabled_field() {
        let fields = vec![
            FormField::text("title", "report"),
            FormField {
                enabled: false,
                ..FormField::text("hidden", "nope")
            },
            FormField::file(
                "upload",
                FileAttachment {
                    file_name: "a.txt".into(),
                    content: "aGVsbG8=".into(),
                    encoding: FileEncoding::Base64,
                    content_type: Some("text/plain".into()),
                },
            ),
        ];
        let bytes = encode_multipart(&fields, "XYZ", None).unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert_eq!(
            text,
            "--XYZ\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nreport\r\n\
             --XYZ\r\nContent-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\nContent-Type: text/plain\r\n\r\nhello\r\n\
             --XYZ--\r\n"
        );
        assert!(!text.contains("hidden"));
    }

    #[test]
    fn test_attachment_decoding() {
        let mut file = FileAttachment {
            file_name: "f.bin".into(),
            content: "data:application/octet-stream;base64,AAEC".into(),
            encoding: FileEncoding::Base64,
            content_type: None,
        };
        assert_eq!(decode_attachment(&file).unwrap(), vec![0, 1, 2]);

        file.content = "\u{0}\u{ff}A".into();
        file.encoding = FileEncoding::Binary;
        assert_eq!(decode_attachment(&file).unwrap(), vec![0, 255, 65]);

        file.content = "not base64!".into();
        file.encoding = FileEncoding::Base64;
        assert!(matches!(decode_attachment(&file), Err(BuildError::Attachment { .. })));
    }

    #[test]
    fn test_boundaries_are_unique() {
        assert_ne!(generate_boundary(), generate_boundary());
    }
}
