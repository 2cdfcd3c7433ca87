//! Process-wide settings and the per-request settings merge.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{
    default_user_agent, CONFIG_DIR_NAME, DEFAULT_MAX_MATERIALIZE_BYTES, DEFAULT_MAX_REDIRECTS,
    DEFAULT_TIMEOUT_MS, SETTINGS_FILE_NAME,
};
use crate::models::Request;

/// Credentials embedded into the proxy connection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProxyAuth {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Proxy configuration. Disabled or empty means no proxy at all.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyConfig {
    pub enabled: bool,
    pub url: Option<String>,
    pub auth: Option<ProxyAuth>,
    pub bypass_list: Vec<String>,
}

impl ProxyConfig {
    /// The proxy URL to use for `host`, if any.
    pub fn url_for(&self, host: &str) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        let url = self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
        if self.bypasses(host) {
            return None;
        }
        Some(url)
    }

    /// Whether `host` matches an entry of the bypass list
    pub fn bypasses(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.bypass_list.iter().any(|entry| {
            let entry = entry.trim().to_ascii_lowercase();
            if entry.is_empty() {
                return false;
            }
            if entry == "*" {
                return true;
            }
            let suffix = entry
                .strip_prefix("*.")
                .or_else(|| entry.strip_prefix('.'));
            match suffix {
                Some(domain) => host == domain || host.ends_with(&format!(".{}", domain)),
                None => host == entry,
            }
        })
    }
}

/// A client certificate registered by the user
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCertificate {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Host the certificate applies to; unset matches every host
    #[serde(default)]
    pub host: Option<String>,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    #[serde(default)]
    pub passphrase: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ClientCertificate {
    /// Unset host, exact host, or parent domain of `target`.
    pub fn matches_host(&self, target: &str) -> bool {
        let Some(host) = self.host.as_deref().map(str::trim).filter(|h| !h.is_empty()) else {
            return true;
        };
        let host = host.to_ascii_lowercase();
        let target = target.to_ascii_lowercase();
        target == host || target.ends_with(&format!(".{}", host))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientCertificateConfig {
    pub enabled: bool,
    pub certificates: Vec<ClientCertificate>,
}

impl ClientCertificateConfig {
    /// First enabled certificate matching `host`, in list order.
    pub fn select_for(&self, host: &str) -> Option<&ClientCertificate> {
        if !self.enabled {
            return None;
        }
        self.certificates
            .iter()
            .filter(|cert| cert.enabled)
            .find(|cert| cert.matches_host(host))
    }
}

fn default_true() -> bool {
    true
}

/// Process-wide defaults
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalSettings {
    pub timeout_ms: u64,
    pub follow_redirects: bool,
    pub max_redirects: u32,
    #[serde(rename = "validateSSL")]
    pub validate_ssl: bool,
    pub user_agent: String,
    pub proxy: ProxyConfig,
    pub client_certificates: ClientCertificateConfig,
    /// Binary bodies above this size are reported without base64 data
    pub max_materialize_bytes: usize,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        GlobalSettings {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            follow_redirects: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            validate_ssl: true,
            user_agent: default_user_agent(),
            proxy: ProxyConfig::default(),
            client_certificates: ClientCertificateConfig::default(),
            max_materialize_bytes: DEFAULT_MAX_MATERIALIZE_BYTES,
        }
    }
}

/// Settings in effect for one execution
#[derive(Clone, Debug, PartialEq)]
pub struct EffectiveSettings {
    pub timeout: Duration,
    pub follow_redirects: bool,
    pub max_redirects: u32,
    pub validate_ssl: bool,
    pub user_agent: String,
}

/// Merge per-request settings over the process defaults, field by field.
pub fn resolve(request: &Request, defaults: &GlobalSettings) -> EffectiveSettings {
    let overrides = request.settings.clone().unwrap_or_default();
    EffectiveSettings {
        timeout: Duration::from_millis(overrides.timeout_ms.unwrap_or(defaults.timeout_ms)),
        follow_redirects: overrides
            .follow_redirects
            .unwrap_or(defaults.follow_redirects),
        max_redirects: overrides.max_redirects.unwrap_or(defaults.max_redirects),
        validate_ssl: overrides.validate_ssl.unwrap_or(defaults.validate_ssl),
        user_agent: overrides
            .user_agent
            .filter(|ua| !ua.trim().is_empty())
            .unwrap_or_else(|| defaults.user_agent.clone()),
    }
}

/// Shared, explicitly mutable settings handed to the executor.
///
/// Readers take a snapshot per execution, so updates apply to the next
/// request without a restart.
#[derive(Clone, Debug, Default)]
pub struct RuntimeConfig {
    inner: Arc<RwLock<GlobalSettings>>,
}

impl RuntimeConfig {
    pub fn new(settings: GlobalSettings) -> Self {
        RuntimeConfig {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Copy of the current settings
    pub fn snapshot(&self) -> GlobalSettings {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut GlobalSettings)) {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard);
    }

    /// Load settings from a YAML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        let settings: GlobalSettings = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing settings in {}", path.display()))?;
        Ok(Self::new(settings))
    }

    /// Load `~/.freeman/settings.yaml`, or defaults when it does not exist
    pub fn load_default() -> Result<Self> {
        match default_settings_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// Location of the user settings file
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR_NAME).join(SETTINGS_FILE_NAME))
}
