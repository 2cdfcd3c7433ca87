//! Client certificate loading for mutual TLS.
//!
//! Files are read on every call that needs them; nothing is cached.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::settings::ClientCertificate;

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid client certificate '{name}': {reason}")]
    Invalid { name: String, reason: String },
}

async fn read_pem(path: &Path) -> Result<Vec<u8>, CertificateError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| CertificateError::Read {
            path: path.to_path_buf(),
            source,
        })
}

/// Load certificate and key PEM files into a TLS identity.
pub async fn load_identity(cert: &ClientCertificate) -> Result<reqwest::Identity, CertificateError> {
    if cert.passphrase.as_deref().is_some_and(|p| !p.is_empty()) {
        tracing::warn!(
            certificate = %cert.name,
            "passphrase-protected keys are not supported; the key file must be unencrypted PEM"
        );
    }

    let mut pem = read_pem(&cert.cert_path).await?;
    if !pem.ends_with(b"\n") {
        pem.push(b'\n');
    }
    pem.extend_from_slice(&read_pem(&cert.key_path).await?);

    reqwest::Identity::from_pem(&pem).map_err(|e| CertificateError::Invalid {
        name: cert.name.clone(),
        reason: e.to_string(),
    })
}
