//! Descriptor validation. Collects every problem instead of stopping at the first.

use crate::builder::url::parse_absolute;
use crate::error::{BuildError, ValidationError};
use crate::models::{AuthType, Request, RequestBody};
use crate::resolver::{resolve_with, VariableResolver};

const GRAPHQL_PREFIXES: [&str; 4] = ["query", "mutation", "subscription", "{"];

pub fn validate(request: &Request, resolver: Option<&dyn VariableResolver>) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let url = resolve_with(resolver, &request.url);
    if url.trim().is_empty() {
        errors.push(ValidationError::new("url", "URL is required"));
    } else if let Err(BuildError::MalformedUrl { reason, .. }) = parse_absolute(&url) {
        errors.push(ValidationError::new(
            "url",
            format!("Invalid URL '{}': {}", url.trim(), reason),
        ));
    }

    match &request.auth {
        AuthType::Basic { username, .. } if resolve_with(resolver, username).trim().is_empty() => {
            errors.push(ValidationError::new(
                "auth",
                "Username is required for Basic authentication",
            ));
        }
        AuthType::Bearer { token } if resolve_with(resolver, token).trim().is_empty() => {
            errors.push(ValidationError::new(
                "auth",
                "Token is required for Bearer authentication",
            ));
        }
        AuthType::ApiKey { key, .. } if resolve_with(resolver, key).trim().is_empty() => {
            errors.push(ValidationError::new("auth", "Key name is required for API Key authentication"));
        }
        _ => {}
    }

    match &request.body {
        RequestBody::Json(text) => {
            let text = resolve_with(resolver, text);
            if !text.trim().is_empty() {
                if let Err(e) = serde_json::from_str::<serde_json::Value>(&text) {
                    errors.push(ValidationError::new("body", format!("Invalid JSON body: {}", e)));
                }
            }
        }
        RequestBody::FormData(fields) => {
            if !fields.iter().any(|f| f.enabled) {
                errors.push(ValidationError::new(
                    "body",
                    "Form data requires at least one enabled field",
                ));
            }
        }
        RequestBody::GraphQl(body) => {
            let query = resolve_with(resolver, &body.query);
            let trimmed = query.trim_start().to_lowercase();
            if trimmed.is_empty() {
                errors.push(ValidationError::new("body", "GraphQL query is required"));
            } else if !GRAPHQL_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
                errors.push(ValidationError::new(
                    "body",
                    "GraphQL query must start with 'query', 'mutation', 'subscription' or '{'",
                ));
            }
        }
        RequestBody::None | RequestBody::Raw(_) | RequestBody::UrlEncoded(_) => {}
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FormField, GraphQlBody, HttpMethod};

    fn messages(request: &Request) -> Vec<String> {
        validate(request, None).into_iter().map(|e| e.message).collect()
    }

    #[test]
    fn test_valid_request_has_no_errors() {
        let req = Request::new(HttpMethod::POST, "https://api.example.com/users")
            .with_body(RequestBody::Json(r#"{"name":"a"}"#.into()))
            .with_auth(AuthType::Bearer { token: "t".into() });
        assert!(validate(&req, None).is_empty());
    }

    #[test]
    fn test_collects_all_violations() {
        let req = Request::new(HttpMethod::POST, "")
            .with_body(RequestBody::Json("{not json".into()))
            .with_auth(AuthType::Basic {
                username: " ".into(),
                password: "p".into(),
            });
        let errors = validate(&req, None);
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["url", "auth", "body"]);
        assert_eq!(errors[0].message, "URL is required");
        assert!(errors[2].message.starts_with("Invalid JSON body"));
    }

    #[test]
    fn test_url_checked_after_resolution() {
        let req = Request::new(HttpMethod::GET, "{{base}}/users");
        assert_eq!(validate(&req, None).len(), 1);
        let resolver = |text: &str| text.replace("{{base}}", "https://api.example.com");
        assert!(validate(&req, Some(&resolver)).is_empty());
    }

    #[test]
    fn test_empty_bearer_token() {
        let req = Request::new(HttpMethod::GET, "https://x.io").with_auth(AuthType::Bearer { token: String::new() });
        assert_eq!(messages(&req), vec!["Token is required for Bearer authentication"]);
    }

    #[test]
    fn test_api_key_needs_a_name() {
        let req = Request::new(HttpMethod::GET, "https://x.io").with_auth(AuthType::ApiKey {
            key: "{{name}}".into(),
            value: "secret".into(),
            location: Default::default(),
        });
        assert_eq!(messages(&req), vec!["Key name is required for API Key authentication"]);
        let resolver = |text: &str| text.replace("{{name}}", "X-Api-Key");
        assert!(validate(&req, Some(&resolver)).is_empty());
    }

    #[test]
    fn test_empty_json_body_is_allowed() {
        let req = Request::new(HttpMethod::POST, "https://x.io").with_body(RequestBody::Json("  ".into()));
        assert!(validate(&req, None).is_empty());
    }

    #[test]
    fn test_form_data_needs_enabled_field() {
        let req = Request::new(HttpMethod::POST, "https://x.io").with_body(RequestBody::FormData(vec![FormField {
            enabled: false,
            ..FormField::text("a", "b")
        }]));
        assert_eq!(messages(&req), vec!["Form data requires at least one enabled field"]);
    }

    #[test]
    fn test_graphql_query_shape() {
        let gql = |query: &str| {
            Request::new(HttpMethod::POST, "https://x.io/graphql").with_body(RequestBody::GraphQl(GraphQlBody {
                query: query.into(),
                ..GraphQlBody::default()
            }))
        };
        assert!(validate(&gql("QUERY Users { id }"), None).is_empty());
        assert!(validate(&gql("  { users { id } }"), None).is_empty());
        assert!(validate(&gql("mutation { x }"), None).is_empty());
        assert_eq!(messages(&gql("")), vec!["GraphQL query is required"]);
        assert_eq!(messages(&gql("fetch users")).len(), 1);
    }
}
