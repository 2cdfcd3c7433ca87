//! Standard transport - a fetch-style adapter over pooled reqwest clients
//!
//! Redirects are either followed (reqwest's default policy) or returned as-is.
//! Proxy and client certificate settings are not applied by this backend,
//! and proxies from the process environment are ignored as well.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorKind, TransportError};
use crate::network::errors::classify_reqwest;
use crate::network::transport::{
    prepare, read_response, RawResponse, Transport, TransportKind, TransportRequest,
};

/// Client variations this backend can express
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct ClientProfile {
    validate_ssl: bool,
    follow_redirects: bool,
}

#[derive(Debug, Default)]
pub struct StandardTransport {
    clients: Mutex<HashMap<ClientProfile, reqwest::Client>>,
}

impl StandardTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self, profile: ClientProfile) -> Result<reqwest::Client, TransportError> {
        let mut clients = match self.clients.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(client) = clients.get(&profile) {
            return Ok(client.clone());
        }

        let redirect = if profile.follow_redirects {
            reqwest::redirect::Policy::default()
        } else {
            reqwest::redirect::Policy::none()
        };
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!profile.validate_ssl)
            .redirect(redirect)
            .no_proxy()
            .build()
            .map_err(|e| {
                TransportError::new(ErrorKind::Network, format!("Failed to create HTTP client: {}", e))
            })?;
        tracing::debug!(?profile, "created standard HTTP client");
        clients.insert(profile, client.clone());
        Ok(client)
    }
}

#[async_trait]
impl Transport for StandardTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Standard
    }

    async fn send(
        &self,
        request: TransportRequest,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError> {
        let options = request.options.clone();
        if options.proxy.is_some() || options.client_certificate.is_some() {
            tracing::debug!("standard transport ignores proxy and client certificate settings");
        }

        let client = self.client(ClientProfile {
            validate_ssl: options.validate_ssl,
            follow_redirects: options.follow_redirects,
        })?;
        let pending = prepare(&client, request).timeout(options.timeout).send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::cancelled()),
            result = pending => result.map_err(|e| classify_reqwest(&e))?,
        };

        // The per-request timeout above also bounds the body read
        read_response(response, cancel, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clients_are_pooled_per_profile() {
        let transport = StandardTransport::new();
        let strict = ClientProfile {
            validate_ssl: true,
            follow_redirects: true,
        };
        let lax = ClientProfile {
            validate_ssl: false,
            follow_redirects: true,
        };
        transport.client(strict).unwrap();
        transport.client(strict).unwrap();
        transport.client(lax).unwrap();
        assert_eq!(transport.clients.lock().unwrap().len(), 2);
    }
}
