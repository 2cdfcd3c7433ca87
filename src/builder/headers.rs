//! Header construction: user headers, auth, content type, user agent, cookies.

use base64::Engine;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Url;

use crate::error::BuildError;
use crate::models::{ApiKeyLocation, AuthType, Request};
use crate::resolver::{resolve_with, CookieProvider, VariableResolver};
use crate::settings::EffectiveSettings;

/// Ordered header list. Names keep their original case and may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    entries: Vec<(String, String)>,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replace every entry named `name` (case-insensitive) with a single one.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.entries.push((name, value.into()));
    }

    /// Value of the last entry named `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<(String, String)> {
        self.entries
    }
}

fn check_header(name: &str, value: &str) -> Result<(), BuildError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|e| BuildError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    HeaderValue::from_str(value).map_err(|e| BuildError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    Ok(())
}

/// Basic credentials as sent in `Authorization`
pub fn basic_auth_value(username: &str, password: &str) -> String {
    let credentials = format!("{}:{}", username, password);
    format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(credentials)
    )
}

/// Build the concrete header set.
///
/// `default_content_type` is only added when the request carries no explicit
/// `Content-Type`.
pub fn build_headers(
    request: &Request,
    resolver: Option<&dyn VariableResolver>,
    settings: &EffectiveSettings,
    url: &Url,
    default_content_type: Option<&str>,
    cookies: Option<&dyn CookieProvider>,
) -> Result<HeaderSet, BuildError> {
    let mut headers = HeaderSet::new();

    for header in request.headers.iter().filter(|h| h.enabled) {
        let name = resolve_with(resolver, &header.key);
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let value = resolve_with(resolver, &header.value);
        check_header(name, &value)?;
        headers.append(name, value);
    }

    match &request.auth {
        AuthType::Basic { username, password } => {
            let value = basic_auth_value(
                &resolve_with(resolver, username),
                &resolve_with(resolver, password),
            );
            headers.set("Authorization", value);
        }
        AuthType::Bearer { token } => {
            let value = format!("Bearer {}", resolve_with(resolver, token));
            check_header("Authorization", &value)?;
            headers.set("Authorization", value);
        }
        AuthType::ApiKey {
            key,
            value,
            location: ApiKeyLocation::Header,
        } => {
            let key = resolve_with(resolver, key);
            let key = key.trim();
            if !key.is_empty() {
                let value = resolve_with(resolver, value);
                check_header(key, &value)?;
                headers.set(key, value);
            }
        }
        AuthType::ApiKey { .. } | AuthType::None => {}
    }

    if let Some(content_type) = default_content_type {
        if !headers.contains("Content-Type") {
            headers.append("Content-Type", content_type);
        }
    }

    if !headers.contains("User-Agent") {
        check_header("User-Agent", &settings.user_agent)?;
        headers.append("User-Agent", settings.user_agent.clone());
    }

    if let (Some(cookies), Some(host)) = (cookies, url.host_str()) {
        let cookie = cookies.cookie_header(host);
        if !cookie.trim().is_empty() {
            check_header("Cookie", &cookie)?;
            headers.append("Cookie", cookie);
        }
    }

    Ok(headers)
}
