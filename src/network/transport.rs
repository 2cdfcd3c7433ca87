//! Transport contract shared by the Standard and Native backends.
//!
//! Only the fields this engine uses cross this boundary: no reqwest type
//! leaks into the rest of the crate.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Url;
use tokio_util::sync::CancellationToken;

use crate::builder::BuiltRequest;
use crate::error::{ErrorKind, TransportError};
use crate::models::HttpMethod;
use crate::network::errors::{classify_reqwest, error_chain_message};
use crate::settings::{ClientCertificate, GlobalSettings, ProxyAuth};

/// Which backend implementation is in use
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Standard,
    Native,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Standard => "standard",
            TransportKind::Native => "native",
        }
    }
}

/// Proxy chosen for one call
#[derive(Clone, Debug, PartialEq)]
pub struct ProxyTarget {
    pub url: String,
    pub auth: Option<ProxyAuth>,
}

/// Per-call transport options
#[derive(Clone, Debug, PartialEq)]
pub struct TransportOptions {
    pub timeout: Duration,
    pub follow_redirects: bool,
    pub max_redirects: u32,
    pub validate_ssl: bool,
    pub proxy: Option<ProxyTarget>,
    pub client_certificate: Option<ClientCertificate>,
}

impl TransportOptions {
    /// Options for `built`, with proxy and certificate picked for its host.
    pub fn for_request(built: &BuiltRequest, global: &GlobalSettings) -> Self {
        let host = built.url.host_str().unwrap_or_default();
        let proxy = global.proxy.url_for(host).map(|url| ProxyTarget {
            url: url.to_string(),
            auth: global.proxy.auth.clone(),
        });
        TransportOptions {
            timeout: built.settings.timeout,
            follow_redirects: built.settings.follow_redirects,
            max_redirects: built.settings.max_redirects,
            validate_ssl: built.settings.validate_ssl,
            proxy,
            client_certificate: global.client_certificates.select_for(host).cloned(),
        }
    }
}

/// A fully built request handed to a transport
#[derive(Clone, Debug)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    pub options: TransportOptions,
}

impl TransportRequest {
    pub fn from_built(built: BuiltRequest, global: &GlobalSettings) -> Self {
        let options = TransportOptions::for_request(&built, global);
        TransportRequest {
            method: built.method,
            url: built.url,
            headers: built.headers.into_vec(),
            body: built.body.map(|b| b.into_bytes()),
            options,
        }
    }
}

/// What a transport hands to the normalizer
#[derive(Clone, Debug)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    /// In wire order; duplicates allowed
    pub headers: Vec<(String, String)>,
    /// Body bytes, or the error hit while reading them after the headers arrived
    pub body: Result<Bytes, String>,
    pub final_url: Option<String>,
}

/// A network backend. Must be safe for concurrent in-flight calls.
#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Send one request. Observes `cancel` until the body is fully read.
    async fn send(
        &self,
        request: TransportRequest,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError>;
}

pub(crate) fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::GET => reqwest::Method::GET,
        HttpMethod::POST => reqwest::Method::POST,
        HttpMethod::PUT => reqwest::Method::PUT,
        HttpMethod::PATCH => reqwest::Method::PATCH,
        HttpMethod::DELETE => reqwest::Method::DELETE,
        HttpMethod::HEAD => reqwest::Method::HEAD,
        HttpMethod::OPTIONS => reqwest::Method::OPTIONS,
    }
}

/// Apply method, headers and body to a client
pub(crate) fn prepare(client: &reqwest::Client, request: TransportRequest) -> reqwest::RequestBuilder {
    let mut builder = client.request(to_reqwest_method(request.method), request.url);
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = request.body {
        builder = builder.body(body);
    }
    builder
}

pub(crate) fn collect_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// Read the body of a received response, honoring cancellation and an
/// optional body-read budget.
pub(crate) async fn read_response(
    response: reqwest::Response,
    cancel: &CancellationToken,
    body_budget: Option<Duration>,
) -> Result<RawResponse, TransportError> {
    let status = response.status();
    let status_text = status.canonical_reason().unwrap_or_default().to_string();
    let headers = collect_headers(response.headers());
    let final_url = Some(response.url().to_string());

    let read = async {
        match body_budget {
            Some(budget) => tokio::time::timeout(budget, response.bytes())
                .await
                .map_err(|_| {
                    TransportError::new(
                        ErrorKind::RequestTimeout,
                        format!("Response body not received within {} ms", budget.as_millis()),
                    )
                }),
            None => Ok(response.bytes().await),
        }
    };

    let body = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(TransportError::cancelled()),
        read = read => read?,
    };

    let body = match body {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.is_timeout() => return Err(classify_reqwest(&e)),
        Err(e) => Err(error_chain_message(&e)),
    };

    Ok(RawResponse {
        status: status.as_u16(),
        status_text,
        headers,
        body,
        final_url,
    })
}
