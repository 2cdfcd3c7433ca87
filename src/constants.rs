//! Engine constants
//!
//! Centralized location for magic strings and configuration defaults.

/// Default request timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default number of redirects followed before the last 3xx is returned
pub const DEFAULT_MAX_REDIRECTS: u32 = 5;

/// Binary bodies larger than this are not base64-materialized
pub const DEFAULT_MAX_MATERIALIZE_BYTES: usize = 10 * 1024 * 1024;

/// Maximum entries kept by the in-memory history
pub const MAX_HISTORY: usize = 50;

/// Directory under the home directory holding engine settings
pub const CONFIG_DIR_NAME: &str = ".freeman";

/// Settings file name inside [`CONFIG_DIR_NAME`]
pub const SETTINGS_FILE_NAME: &str = "settings.yaml";

/// Environment variable forcing a transport backend (`standard` or `native`)
pub const TRANSPORT_ENV_VAR: &str = "FREEMAN_TRANSPORT";

/// Environment variable marking the process as sandboxed
pub const SANDBOX_ENV_VAR: &str = "FREEMAN_SANDBOX";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default User-Agent sent when neither the request nor the settings override it
pub fn default_user_agent() -> String {
    format!("Freeman/{}", APP_VERSION)
}
