use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// HTTP Method enum
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum HttpMethod {
    #[default]
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
    HEAD,
    OPTIONS,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
        }
    }

    /// GET, HEAD and OPTIONS never carry a body
    pub fn allows_body(&self) -> bool {
        !matches!(self, HttpMethod::GET | HttpMethod::HEAD | HttpMethod::OPTIONS)
    }

    /// Methods that get an automatic `Content-Type: application/json` for JSON bodies
    pub fn implies_json_content_type(&self) -> bool {
        matches!(self, HttpMethod::POST | HttpMethod::PUT | HttpMethod::PATCH)
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::GET),
            "POST" => Ok(HttpMethod::POST),
            "PUT" => Ok(HttpMethod::PUT),
            "PATCH" => Ok(HttpMethod::PATCH),
            "DELETE" => Ok(HttpMethod::DELETE),
            "HEAD" => Ok(HttpMethod::HEAD),
            "OPTIONS" => Ok(HttpMethod::OPTIONS),
            _ => Err(format!("Unknown HTTP method: {}", s)),
        }
    }
}

/// A `{key, value, enabled}` triple used for headers and query parameters.
///
/// Keys are not unique: duplicates are legal and all enabled entries are sent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

pub type Header = KeyValue;
pub type QueryParam = KeyValue;

fn enabled_by_default() -> bool {
    true
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        KeyValue {
            key: key.into(),
            value: value.into(),
            enabled: true,
        }
    }

    pub fn disabled(key: impl Into<String>, value: impl Into<String>) -> Self {
        KeyValue {
            enabled: false,
            ..KeyValue::new(key, value)
        }
    }
}

/// How the content of a [`FileAttachment`] is stored
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileEncoding {
    #[default]
    Base64,
    /// Latin-1 byte string: every char is one byte
    Binary,
}

/// A file already read by the host, carried inline in a form field
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub file_name: String,
    pub content: String,
    #[serde(default)]
    pub encoding: FileEncoding,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// One entry of a form-data or x-www-form-urlencoded body
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub file: Option<FileAttachment>,
}

impl FormField {
    pub fn text(key: impl Into<String>, value: impl Into<String>) -> Self {
        FormField {
            key: key.into(),
            value: value.into(),
            enabled: true,
            file: None,
        }
    }

    pub fn file(key: impl Into<String>, attachment: FileAttachment) -> Self {
        FormField {
            key: key.into(),
            value: String::new(),
            enabled: true,
            file: Some(attachment),
        }
    }
}

/// GraphQL body payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct GraphQlBody {
    pub query: String,
    #[serde(default)]
    pub variables: serde_json::Map<String, serde_json::Value>,
}

/// Request body, discriminated by body kind
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "content")]
pub enum RequestBody {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "json")]
    Json(String),
    #[serde(rename = "raw")]
    Raw(String),
    #[serde(rename = "form-data")]
    FormData(Vec<FormField>),
    #[serde(rename = "x-www-form-urlencoded")]
    UrlEncoded(Vec<FormField>),
    #[serde(rename = "graphql")]
    GraphQl(GraphQlBody),
}

impl RequestBody {
    pub fn kind(&self) -> &'static str {
        match self {
            RequestBody::None => "none",
            RequestBody::Json(_) => "json",
            RequestBody::Raw(_) => "raw",
            RequestBody::FormData(_) => "form-data",
            RequestBody::UrlEncoded(_) => "x-www-form-urlencoded",
            RequestBody::GraphQl(_) => "graphql",
        }
    }
}

/// Where an API key is sent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    #[default]
    Header,
    Query,
}

/// Authentication type
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AuthType {
    #[default]
    None,
    Basic {
        username: String,
        #[serde(default)]
        password: String,
    },
    Bearer {
        token: String,
    },
    ApiKey {
        key: String,
        value: String,
        #[serde(default)]
        location: ApiKeyLocation,
    },
}

/// Per-request overrides of the process-wide settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RequestSettings {
    pub timeout_ms: Option<u64>,
    pub follow_redirects: Option<bool>,
    pub max_redirects: Option<u32>,
    #[serde(rename = "validateSSL")]
    pub validate_ssl: Option<bool>,
    pub user_agent: Option<String>,
}

/// A single HTTP request descriptor.
///
/// Read-only to the engine: variable resolution produces derived values and
/// never writes back into the descriptor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub method: HttpMethod,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub params: Vec<QueryParam>,
    #[serde(default)]
    pub body: RequestBody,
    #[serde(default)]
    pub auth: AuthType,
    #[serde(default)]
    pub settings: Option<RequestSettings>,
}

impl Request {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Request {
            method,
            url: url.into(),
            ..Request::default()
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(key, value));
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push(QueryParam::new(key, value));
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn with_auth(mut self, auth: AuthType) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_settings(mut self, settings: RequestSettings) -> Self {
        self.settings = Some(settings);
        self
    }
}

impl Default for Request {
    fn default() -> Self {
        Request {
            id: String::new(),
            name: String::new(),
            method: HttpMethod::GET,
            url: String::new(),
            headers: Vec::new(),
            params: Vec::new(),
            body: RequestBody::None,
            auth: AuthType::None,
            settings: None,
        }
    }
}

/// Environment variables
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    pub variables: HashMap<String, String>,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Environment {
            name: name.into(),
            variables: HashMap::new(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.variables.get(key)
    }

    /// Substitutes {{variable}} patterns in text
    pub fn substitute(&self, text: &str) -> String {
        let mut result = text.to_string();
        for (key, value) in &self.variables {
            let pattern = format!("{{{{{}}}}}", key);
            result = result.replace(&pattern, value);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_request_is_blank() {
        let req = Request::default();
        assert!(req.url.is_empty());
        assert!(req.name.is_empty());
        assert_eq!(req.method, HttpMethod::GET);
    }

    #[test]
    fn test_method_body_rules() {
        assert!(!HttpMethod::GET.allows_body());
        assert!(!HttpMethod::HEAD.allows_body());
        assert!(!HttpMethod::OPTIONS.allows_body());
        assert!(HttpMethod::DELETE.allows_body());
        assert!(!HttpMethod::DELETE.implies_json_content_type());
        assert!(HttpMethod::PATCH.implies_json_content_type());
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!("options".parse::<HttpMethod>(), Ok(HttpMethod::OPTIONS));
        assert!("TRACE".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_environment_substitute() {
        let mut env = Environment::new("dev");
        env.set("host", "api.example.com");
        env.set("version", "v2");
        assert_eq!(
            env.substitute("https://{{host}}/{{version}}/users?q={{missing}}"),
            "https://api.example.com/v2/users?q={{missing}}"
        );
    }

    #[test]
    fn test_request_deserializes_from_descriptor_json() {
        let json = r#"{
            "id": "r1",
            "name": "Create user",
            "method": "POST",
            "url": "https://{{host}}/users",
            "headers": [{"key": "X-Trace", "value": "1", "enabled": false}],
            "body": {"type": "x-www-form-urlencoded", "content": [{"key": "name", "value": "john"}]},
            "auth": {"type": "apiKey", "key": "X-Api-Key", "value": "secret", "location": "query"},
            "settings": {"timeoutMs": 5000, "validateSSL": false}
        }"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert_eq!(req.method, HttpMethod::POST);
        assert!(!req.headers[0].enabled);
        assert_eq!(
            req.body,
            RequestBody::UrlEncoded(vec![FormField::text("name", "john")])
        );
        assert_eq!(
            req.auth,
            AuthType::ApiKey {
                key: "X-Api-Key".into(),
                value: "secret".into(),
                location: ApiKeyLocation::Query,
            }
        );
        let settings = req.settings.unwrap();
        assert_eq!(settings.timeout_ms, Some(5000));
        assert_eq!(settings.validate_ssl, Some(false));
        assert_eq!(settings.follow_redirects, None);
    }
}
