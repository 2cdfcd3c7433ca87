//! cURL import and export

use anyhow::{anyhow, bail, Result};

use crate::builder::{adjust_url_for_api_key, build_url, graphql_payload};
use crate::error::BuildError;
use crate::models::{
    ApiKeyLocation, AuthType, FormField, Header, HttpMethod, Request, RequestBody, RequestSettings,
};
use crate::resolver::{resolve_with, VariableResolver};

/// Quote for a POSIX shell
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Format a request as a cURL command.
///
/// Placeholders are resolved and query parameters (including an API key sent
/// in the query) are folded into the final URL.
pub fn build_curl_command(
    request: &Request,
    resolver: Option<&dyn VariableResolver>,
) -> Result<String, BuildError> {
    let url = adjust_url_for_api_key(build_url(request, resolver)?, request, resolver);
    let mut parts = vec![format!("curl -X {}", request.method.as_str())];

    let mut has_content_type = false;
    for header in request.headers.iter().filter(|h| h.enabled) {
        let name = resolve_with(resolver, &header.key);
        if name.trim().is_empty() {
            continue;
        }
        has_content_type |= name.trim().eq_ignore_ascii_case("content-type");
        let value = resolve_with(resolver, &header.value);
        parts.push(format!("-H {}", shell_quote(&format!("{}: {}", name.trim(), value))));
    }

    match &request.auth {
        AuthType::Basic { username, password } => {
            let credentials = format!(
                "{}:{}",
                resolve_with(resolver, username),
                resolve_with(resolver, password)
            );
            parts.push(format!("-u {}", shell_quote(&credentials)));
        }
        AuthType::Bearer { token } => {
            let header = format!("Authorization: Bearer {}", resolve_with(resolver, token));
            parts.push(format!("-H {}", shell_quote(&header)));
        }
        AuthType::ApiKey {
            key,
            value,
            location: ApiKeyLocation::Header,
        } if !key.trim().is_empty() => {
            let header = format!(
                "{}: {}",
                resolve_with(resolver, key),
                resolve_with(resolver, value)
            );
            parts.push(format!("-H {}", shell_quote(&header)));
        }
        _ => {}
    }

    if request.method.allows_body() {
        match &request.body {
            RequestBody::Json(text) if !text.trim().is_empty() => {
                if !has_content_type && request.method.implies_json_content_type() {
                    parts.push("-H 'Content-Type: application/json'".to_string());
                }
                parts.push(format!("-d {}", shell_quote(&resolve_with(resolver, text))));
            }
            RequestBody::Raw(text) if !text.is_empty() => {
                parts.push(format!("-d {}", shell_quote(&resolve_with(resolver, text))));
            }
            RequestBody::GraphQl(body) => {
                if !has_content_type {
                    parts.push("-H 'Content-Type: application/json'".to_string());
                }
                parts.push(format!("-d {}", shell_quote(&graphql_payload(body, resolver))));
            }
            RequestBody::UrlEncoded(fields) => {
                for field in fields.iter().filter(|f| f.enabled) {
                    let key = resolve_with(resolver, &field.key);
                    if key.trim().is_empty() {
                        continue;
                    }
                    let pair = format!("{}={}", key, resolve_with(resolver, &field.value));
                    parts.push(format!("--data-urlencode {}", shell_quote(&pair)));
                }
            }
            RequestBody::FormData(fields) => {
                for field in fields.iter().filter(|f| f.enabled) {
                    let key = resolve_with(resolver, &field.key);
                    if key.trim().is_empty() {
                        continue;
                    }
                    // -F reads a leading @ or < as a file reference, text goes through --form-string
                    let (flag, entry) = match &field.file {
                        Some(file) => ("-F", format!("{}=@{}", key, file.file_name)),
                        None => (
                            "--form-string",
                            format!("{}={}", key, resolve_with(resolver, &field.value)),
                        ),
                    };
                    parts.push(format!("{} {}", flag, shell_quote(&entry)));
                }
            }
            _ => {}
        }
    }

    if let Some(settings) = &request.settings {
        if settings.validate_ssl == Some(false) {
            parts.push("-k".to_string());
        }
        if settings.follow_redirects == Some(true) {
            parts.push("-L".to_string());
        }
        if let Some(max) = settings.max_redirects {
            parts.push(format!("--max-redirs {}", max));
        }
        if let Some(ms) = settings.timeout_ms {
            parts.push(format!("-m {}", ms as f64 / 1000.0));
        }
        if let Some(agent) = settings.user_agent.as_deref().filter(|a| !a.trim().is_empty()) {
            parts.push(format!("-A {}", shell_quote(agent)));
        }
    }

    parts.push(shell_quote(url.as_str()));
    Ok(parts.join(" \\\n  "))
}

/// Parse a cURL command into a Request
pub fn parse_curl(input: &str) -> Result<Request> {
    let mut request = Request::default();
    let mut url: Option<String> = None;
    let mut method_set = false;
    let mut settings = RequestSettings::default();
    let mut data: Vec<String> = Vec::new();

    // Remove line continuations and normalize
    let normalized = input.replace("\\\r\n", " ").replace("\\\n", " ");

    let mut tokens = tokenize(&normalized)?;

    // Skip 'curl' command if present
    if tokens.first().map(|s| s.as_str()) == Some("curl") {
        tokens.remove(0);
    }

    let mut iter = tokens.into_iter();
    while let Some(token) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .ok_or_else(|| anyhow!("Missing value for {}", flag))
        };

        match token.as_str() {
            "-X" | "--request" => {
                let raw = value(&token)?;
                request.method = raw.parse().map_err(|e: String| anyhow!(e))?;
                method_set = true;
            }
            "-H" | "--header" => {
                let header = parse_header(&value(&token)?)?;
                if header.key.eq_ignore_ascii_case("authorization") {
                    if let Some(token) = bearer_token(&header.value) {
                        request.auth = AuthType::Bearer { token };
                        continue;
                    }
                }
                // Don't add duplicate headers
                if !request
                    .headers
                    .iter()
                    .any(|h| h.key.eq_ignore_ascii_case(&header.key))
                {
                    request.headers.push(header);
                }
            }
            "-d" | "--data" | "--data-raw" | "--data-binary" | "--data-ascii" => {
                data.push(value(&token)?);
            }
            "--data-urlencode" => {
                let raw = value(&token)?;
                let (key, val) = split_pair(&raw);
                push_field(&mut request.body, FormField::text(key, val), false);
            }
            "-F" | "--form" | "--form-string" => {
                let raw = value(&token)?;
                let (key, val) = split_pair(&raw);
                push_field(&mut request.body, FormField::text(key, val), true);
            }
            "-u" | "--user" => {
                let (username, password) = split_credentials(&value(&token)?);
                request.auth = AuthType::Basic { username, password };
            }
            "-A" | "--user-agent" => settings.user_agent = Some(value(&token)?),
            "-k" | "--insecure" => settings.validate_ssl = Some(false),
            "-L" | "--location" => settings.follow_redirects = Some(true),
            "--max-redirs" => {
                let raw = value(&token)?;
                settings.max_redirects = Some(
                    raw.parse()
                        .map_err(|_| anyhow!("Invalid --max-redirs value: {}", raw))?,
                );
            }
            "-m" | "--max-time" => {
                let raw = value(&token)?;
                let secs: f64 = raw
                    .parse()
                    .map_err(|_| anyhow!("Invalid --max-time value: {}", raw))?;
                settings.timeout_ms = Some((secs * 1000.0).round() as u64);
            }
            "--url" => url = Some(value(&token)?),
            "--compressed" | "-s" | "--silent" | "-v" | "--verbose" | "-i" | "--include" => {
                // Ignored flags
            }
            _ if token.starts_with('-') => {
                tracing::debug!(flag = %token, "ignoring unsupported curl flag");
            }
            _ => url = Some(token),
        }
    }

    request.url = url.ok_or_else(|| anyhow!("No URL found in curl command"))?;

    if !data.is_empty() {
        let text = data.join("&");
        request.body = if serde_json::from_str::<serde_json::Value>(&text).is_ok() {
            RequestBody::Json(text)
        } else {
            RequestBody::Raw(text)
        };
    }

    // Infer POST if a body was given without a method
    if !method_set && !matches!(request.body, RequestBody::None) {
        request.method = HttpMethod::POST;
    }

    if settings != RequestSettings::default() {
        request.settings = Some(settings);
    }

    Ok(request)
}

fn push_field(body: &mut RequestBody, field: FormField, multipart: bool) {
    match (body, multipart) {
        (RequestBody::FormData(fields), true) | (RequestBody::UrlEncoded(fields), false) => {
            fields.push(field)
        }
        (body, true) => *body = RequestBody::FormData(vec![field]),
        (body, false) => *body = RequestBody::UrlEncoded(vec![field]),
    }
}

fn bearer_token(value: &str) -> Option<String> {
    let (scheme, token) = value.trim().split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim().to_string())
}

fn parse_header(s: &str) -> Result<Header> {
    match s.split_once(':') {
        Some((key, value)) if !key.trim().is_empty() => Ok(Header::new(key.trim(), value.trim())),
        _ => bail!("Invalid header format: {}", s),
    }
}

fn split_pair(s: &str) -> (String, String) {
    match s.split_once('=') {
        Some((key, value)) => (key.to_string(), value.to_string()),
        None => (s.to_string(), String::new()),
    }
}

fn split_credentials(s: &str) -> (String, String) {
    match s.split_once(':') {
        Some((user, pass)) => (user.to_string(), pass.to_string()),
        None => (s.to_string(), String::new()),
    }
}

/// Tokenize a curl command, respecting quotes
fn tokenize(input: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut escape_next = false;
    let mut quoted = false;

    for c in input.chars() {
        if escape_next {
            current.push(c);
            escape_next = false;
            continue;
        }

        match c {
            '\\' if !in_single_quote => {
                escape_next = true;
            }
            '\'' if !in_double_quote => {
                in_single_quote = !in_single_quote;
                quoted = true;
            }
            '"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
                quoted = true;
            }
            ' ' | '\t' | '\n' | '\r' if !in_single_quote && !in_double_quote => {
                if !current.is_empty() || quoted {
                    tokens.push(std::mem::take(&mut current));
                    quoted = false;
                }
            }
            _ => {
                current.push(c);
            }
        }
    }

    if in_single_quote || in_double_quote {
        bail!("Unterminated quote in curl command");
    }

    if !current.is_empty() || quoted {
        tokens.push(current);
    }

    Ok(tokens)
}
