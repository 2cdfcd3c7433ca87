//! Request builder - turns a descriptor into a concrete, sendable request
//!
//! Pure: no I/O. Every string field goes through the resolver exactly once
//! per build and the descriptor is never modified.

pub mod body;
pub mod headers;
pub mod url;
pub mod validate;

use reqwest::Url;

use crate::error::{BuildError, ValidationError};
use crate::models::{HttpMethod, Request};
use crate::resolver::{CookieProvider, VariableResolver};
use crate::settings::EffectiveSettings;

pub use body::{graphql_operation_name, graphql_payload, BodyPayload};
pub use headers::HeaderSet;
pub use url::{adjust_url_for_api_key, build_url};
pub use validate::validate;

/// Output of a successful build
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: HeaderSet,
    pub body: Option<BodyPayload>,
    pub settings: EffectiveSettings,
}

/// Builds one request from a descriptor plus the collaborators it needs.
pub struct RequestBuilder<'a> {
    request: &'a Request,
    settings: EffectiveSettings,
    resolver: Option<&'a dyn VariableResolver>,
    cookies: Option<&'a dyn CookieProvider>,
    boundary: String,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(request: &'a Request, settings: EffectiveSettings) -> Self {
        RequestBuilder {
            request,
            settings,
            resolver: None,
            cookies: None,
            boundary: body::generate_boundary(),
        }
    }

    pub fn resolver(mut self, resolver: Option<&'a dyn VariableResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn cookies(mut self, cookies: Option<&'a dyn CookieProvider>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn validate(&self) -> Vec<ValidationError> {
        validate::validate(self.request, self.resolver)
    }

    /// URL with query parameters, without any API key
    pub fn build_url(&self) -> Result<Url, BuildError> {
        url::build_url(self.request, self.resolver)
    }

    pub fn adjust_url_for_api_key(&self, url: Url) -> Url {
        url::adjust_url_for_api_key(url, self.request, self.resolver)
    }

    pub fn build_headers(&self, url: &Url) -> Result<HeaderSet, BuildError> {
        let content_type = body::implied_content_type(self.request, &self.boundary);
        headers::build_headers(
            self.request,
            self.resolver,
            &self.settings,
            url,
            content_type.as_deref(),
            self.cookies,
        )
    }

    pub fn build_body(&self) -> Result<Option<BodyPayload>, BuildError> {
        body::build_body(self.request, self.resolver, &self.boundary)
    }

    /// Validate, then build URL, headers and body.
    pub fn build(self) -> Result<BuiltRequest, BuildError> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(BuildError::Validation(errors));
        }

        let url = self.adjust_url_for_api_key(self.build_url()?);
        let headers = self.build_headers(&url)?;
        let body = self.build_body()?;

        Ok(BuiltRequest {
            method: self.request.method,
            url,
            headers,
            body,
            settings: self.settings,
        })
    }
}
