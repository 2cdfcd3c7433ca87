//! Native transport - persistent dispatchers with per-call TLS, proxy,
//! redirect limits and client certificates.
//!
//! Plain calls reuse a pooled client keyed by (SSL validation, redirect policy,
//! connect timeout).
//! Calls that need a proxy or a client certificate get a dedicated client that
//! lives for that call only.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorKind, TransportError};
use crate::network::certs::load_identity;
use crate::network::errors::classify_reqwest;
use crate::network::transport::{
    prepare, read_response, ProxyTarget, RawResponse, Transport, TransportKind, TransportOptions,
    TransportRequest,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct DispatcherKey {
    validate_ssl: bool,
    follow_redirects: bool,
    max_redirects: u32,
    // Connect timeout is baked into the client, so it has to be part of the key
    connect_timeout: Duration,
}

impl DispatcherKey {
    fn from_options(options: &TransportOptions) -> Self {
        DispatcherKey {
            validate_ssl: options.validate_ssl,
            follow_redirects: options.follow_redirects,
            max_redirects: options.max_redirects,
            connect_timeout: options.timeout,
        }
    }
}

/// Follows at most `max` redirects, then hands back the last 3xx response.
pub(crate) fn redirect_policy(follow: bool, max: u32) -> reqwest::redirect::Policy {
    if !follow {
        return reqwest::redirect::Policy::none();
    }
    reqwest::redirect::Policy::custom(move |attempt| {
        // `previous` holds every URL requested so far, the original included
        if attempt.previous().len() > max as usize {
            attempt.stop()
        } else {
            attempt.follow()
        }
    })
}

fn base_builder(key: DispatcherKey) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(!key.validate_ssl)
        .redirect(redirect_policy(key.follow_redirects, key.max_redirects))
        .connect_timeout(key.connect_timeout)
        .no_proxy()
}

fn build_proxy(target: &ProxyTarget) -> Result<reqwest::Proxy, reqwest::Error> {
    let proxy = reqwest::Proxy::all(target.url.as_str())?;
    Ok(match &target.auth {
        Some(auth) if !auth.username.is_empty() => proxy.basic_auth(&auth.username, &auth.password),
        _ => proxy,
    })
}

#[derive(Debug, Default)]
pub struct NativeTransport {
    dispatchers: Mutex<HashMap<DispatcherKey, reqwest::Client>>,
}

impl NativeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn pooled(&self, key: DispatcherKey) -> Result<reqwest::Client, TransportError> {
        let mut dispatchers = match self.dispatchers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(client) = dispatchers.get(&key) {
            return Ok(client.clone());
        }
        let client = base_builder(key).build().map_err(client_error)?;
        tracing::debug!(?key, "created native dispatcher");
        dispatchers.insert(key, client.clone());
        Ok(client)
    }

    /// Client for a call that carries a proxy and/or a client certificate.
    async fn dedicated(&self, options: &TransportOptions) -> Result<reqwest::Client, TransportError> {
        let mut builder = base_builder(DispatcherKey::from_options(options));

        if let Some(target) = &options.proxy {
            match build_proxy(target) {
                Ok(proxy) => {
                    tracing::debug!(proxy = %target.url, "routing request through proxy");
                    builder = builder.proxy(proxy);
                }
                Err(e) => {
                    let err = TransportError::new(ErrorKind::ProxyConfiguration, e.to_string());
                    tracing::warn!(error = %err, "continuing without proxy");
                }
            }
        }

        if let Some(cert) = &options.client_certificate {
            match load_identity(cert).await {
                Ok(identity) => {
                    tracing::debug!(certificate = %cert.name, "using client certificate");
                    builder = builder.identity(identity);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "continuing without client certificate");
                }
            }
        }

        builder.build().map_err(client_error)
    }
}

fn client_error(e: reqwest::Error) -> TransportError {
    TransportError::new(ErrorKind::Network, format!("Failed to create HTTP client: {}", e))
}

#[async_trait]
impl Transport for NativeTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Native
    }

    async fn send(
        &self,
        request: TransportRequest,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError> {
        let options = request.options.clone();
        let client = if options.proxy.is_some() || options.client_certificate.is_some() {
            self.dedicated(&options).await?
        } else {
            self.pooled(DispatcherKey::from_options(&options))?
        };

        let budget = options.timeout;
        let pending = tokio::time::timeout(budget, prepare(&client, request).send());

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::cancelled()),
            result = pending => match result {
                Err(_) => {
                    return Err(TransportError::new(
                        ErrorKind::RequestTimeout,
                        format!("No response headers within {} ms", budget.as_millis()),
                    ))
                }
                Ok(result) => result.map_err(|e| classify_reqwest(&e))?,
            },
        };

        read_response(response, cancel, Some(budget)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ProxyAuth;

    fn options() -> TransportOptions {
        TransportOptions {
            timeout: Duration::from_secs(5),
            follow_redirects: true,
            max_redirects: 3,
            validate_ssl: true,
            proxy: None,
            client_certificate: None,
        }
    }

    #[test]
    fn test_dispatchers_are_reused() {
        let transport = NativeTransport::new();
        let key = DispatcherKey::from_options(&options());
        transport.pooled(key).unwrap();
        transport.pooled(key).unwrap();
        let other = DispatcherKey {
            max_redirects: 0,
            ..key
        };
        transport.pooled(other).unwrap();
        assert_eq!(transport.dispatchers.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_timeout_selects_its_own_dispatcher() {
        let transport = NativeTransport::new();
        let mut short = options();
        short.timeout = Duration::from_millis(100);
        let mut long = options();
        long.timeout = Duration::from_millis(1500);

        let short_key = DispatcherKey::from_options(&short);
        let long_key = DispatcherKey::from_options(&long);
        assert_ne!(short_key, long_key);
        assert_eq!(long_key.connect_timeout, Duration::from_millis(1500));

        transport.pooled(short_key).unwrap();
        transport.pooled(long_key).unwrap();
        assert_eq!(transport.dispatchers.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_proxy_with_credentials() {
        let target = ProxyTarget {
            url: "http://proxy.local:3128".into(),
            auth: Some(ProxyAuth {
                username: "u".into(),
                password: "p".into(),
            }),
        };
        assert!(build_proxy(&target).is_ok());
    }

    #[tokio::test]
    async fn test_bad_proxy_url_degrades_to_direct() {
        let transport = NativeTransport::new();
        let mut opts = options();
        opts.proxy = Some(ProxyTarget {
            url: "::not a proxy::".into(),
            auth: None,
        });
        assert!(transport.dedicated(&opts).await.is_ok());
    }
}
