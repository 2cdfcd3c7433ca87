//! URL construction: template resolution, query parameters, API keys in the query.

use reqwest::Url;

use crate::error::BuildError;
use crate::models::{ApiKeyLocation, AuthType, Request};
use crate::resolver::{resolve_with, VariableResolver};

/// Parse a resolved URL, accepting only absolute http(s) URLs.
pub(crate) fn parse_absolute(raw: &str) -> Result<Url, BuildError> {
    let trimmed = raw.trim();
    let malformed = |reason: &str| BuildError::MalformedUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };
    if trimmed.is_empty() {
        return Err(malformed("URL is empty"));
    }
    let url = Url::parse(trimmed).map_err(|e| malformed(&e.to_string()))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(malformed("only absolute http:// and https:// URLs are supported"));
    }
    Ok(url)
}

/// Resolve the URL template and append enabled query parameters in order.
pub fn build_url(
    request: &Request,
    resolver: Option<&dyn VariableResolver>,
) -> Result<Url, BuildError> {
    let mut url = parse_absolute(&resolve_with(resolver, &request.url))?;

    let params: Vec<(String, String)> = request
        .params
        .iter()
        .filter(|p| p.enabled)
        .map(|p| (resolve_with(resolver, &p.key), resolve_with(resolver, &p.value)))
        .filter(|(key, _)| !key.trim().is_empty())
        .collect();

    if !params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &params {
            pairs.append_pair(key, value);
        }
    }

    Ok(url)
}

/// Inject the API key into the query string when the auth mode asks for it.
pub fn adjust_url_for_api_key(
    mut url: Url,
    request: &Request,
    resolver: Option<&dyn VariableResolver>,
) -> Url {
    if let AuthType::ApiKey {
        key,
        value,
        location: ApiKeyLocation::Query,
    } = &request.auth
    {
        let key = resolve_with(resolver, key);
        if !key.trim().is_empty() {
            url.query_pairs_mut()
                .append_pair(&key, &resolve_with(resolver, value));
        }
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HttpMethod, QueryParam};

    #[test]
    fn test_enabled_params_only() {
        let mut req = Request::new(HttpMethod::GET, "https://api.example.com/users");
        req.params = vec![
            QueryParam::new("limit", "10"),
            QueryParam::disabled("offset", ""),
        ];
        let url = build_url(&req, None).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/users?limit=10");
    }

    #[test]
    fn test_no_params_leaves_url_untouched() {
        let req = Request::new(HttpMethod::GET, "https://api.example.com/users");
        let url = build_url(&req, None).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/users");
    }

    #[test]
    fn test_params_append_to_existing_query_and_resolve() {
        let resolver = |text: &str| text.replace("{{page}}", "3").replace("{{host}}", "h.io");
        let req = Request::new(HttpMethod::GET, "https://{{host}}/items?sort=asc")
            .with_param("page", "{{page}}")
            .with_param("q", "a b&c");
        let url = build_url(&req, Some(&resolver)).unwrap();
        assert_eq!(url.as_str(), "https://h.io/items?sort=asc&page=3&q=a+b%26c");
    }

    #[test]
    fn test_param_key_resolving_to_empty_is_dropped() {
        let resolver = |text: &str| text.replace("{{k}}", "");
        let req = Request::new(HttpMethod::GET, "https://x.io/")
            .with_param("{{k}}", "value")
            .with_param("page", "2");
        let url = build_url(&req, Some(&resolver)).unwrap();
        assert_eq!(url.query(), Some("page=2"));
    }

    #[test]
    fn test_duplicate_params_are_kept() {
        let req = Request::new(HttpMethod::GET, "https://x.io/")
            .with_param("tag", "a")
            .with_param("tag", "b");
        let url = build_url(&req, None).unwrap();
        assert_eq!(url.query(), Some("tag=a&tag=b"));
    }

    #[test]
    fn test_malformed_urls() {
        for raw in ["", "   ", "not a url", "api.example.com/users", "ftp://x.io/file"] {
            let req = Request::new(HttpMethod::GET, raw);
            assert!(
                matches!(build_url(&req, None), Err(BuildError::MalformedUrl { .. })),
                "expected {raw:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_api_key_in_query() {
        let req = Request::new(HttpMethod::GET, "https://x.io/data").with_auth(AuthType::ApiKey {
            key: "api_key".into(),
            value: "{{key}}".into(),
            location: ApiKeyLocation::Query,
        });
        let resolver = |text: &str| text.replace("{{key}}", "s3cret");
        let url = build_url(&req, Some(&resolver)).unwrap();
        let url = adjust_url_for_api_key(url, &req, Some(&resolver));
        assert_eq!(url.as_str(), "https://x.io/data?api_key=s3cret");
    }

    #[test]
    fn test_api_key_in_header_leaves_url_alone() {
        let req = Request::new(HttpMethod::GET, "https://x.io/data").with_auth(AuthType::ApiKey {
            key: "X-Api-Key".into(),
            value: "v".into(),
            location: ApiKeyLocation::Header,
        });
        let url = adjust_url_for_api_key(build_url(&req, None).unwrap(), &req, None);
        assert_eq!(url.as_str(), "https://x.io/data");
    }
}
