use crate::core::market::Endpoints;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::env;
use std::time::Duration;

/// Upper bound the exchange accepts for `recvWindow`, in milliseconds.
pub const MAX_RECV_WINDOW: u64 = 60_000;

const DEFAULT_RECV_WINDOW: u64 = 5_000;

/// API key pair for signed endpoints
#[derive(Debug, Clone)]
pub struct Credentials {
    api_key: Secret<String>,
    secret_key: Secret<String>,
}

// Never expose secrets in serialization
impl Serialize for Credentials {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("Credentials", 2)?;
        state.serialize_field("apiKey", "[REDACTED]")?;
        state.serialize_field("secretKey", "[REDACTED]")?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for Credentials {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct CredentialsHelper {
            api_key: String,
            secret_key: String,
        }

        let helper = CredentialsHelper::deserialize(deserializer)?;
        Ok(Self::new(helper.api_key, helper.secret_key))
    }
}

impl Credentials {
    #[must_use]
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            secret_key: Secret::new(secret_key.into()),
        }
    }

    /// Get API key (use carefully - exposes secret)
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Get secret key (use carefully - exposes secret)
    pub fn secret_key(&self) -> &str {
        self.secret_key.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.api_key.expose_secret().is_empty() || self.secret_key.expose_secret().is_empty()
    }
}

/// Options applied by the request client to every signed call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientOptions {
    /// Inject `timestamp` into signed calls that do not carry one.
    #[serde(default = "default_true")]
    pub auto_timestamp: bool,
    /// Always overwrite `timestamp`, even when the caller supplied one.
    #[serde(default)]
    pub replace_timestamp: bool,
    /// Injected as `recvWindow` unless the caller set it.
    #[serde(default = "default_recv_window")]
    pub recv_window: Option<u64>,
}

fn default_true() -> bool {
    true
}

#[allow(clippy::unnecessary_wraps)]
fn default_recv_window() -> Option<u64> {
    Some(DEFAULT_RECV_WINDOW)
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            auto_timestamp: true,
            replace_timestamp: false,
            recv_window: Some(DEFAULT_RECV_WINDOW),
        }
    }
}

impl ClientOptions {
    #[must_use]
    pub fn recv_window(mut self, recv_window: Option<u64>) -> Self {
        self.recv_window = recv_window;
        self
    }

    #[must_use]
    pub const fn auto_timestamp(mut self, auto_timestamp: bool) -> Self {
        self.auto_timestamp = auto_timestamp;
        self
    }

    #[must_use]
    pub const fn replace_timestamp(mut self, replace_timestamp: bool) -> Self {
        self.replace_timestamp = replace_timestamp;
        self
    }

    /// `recvWindow` must be a natural number no greater than 60000.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.recv_window {
            Some(window) if !(1..=MAX_RECV_WINDOW).contains(&window) => {
                Err(ConfigError::InvalidRecvWindow(window.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Parse and validate options from loosely typed JSON.
    ///
    /// Missing fields take their defaults. A `recvWindow` that is not a non-negative
    /// integer is rejected the same way as one outside `[1, 60000]`.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        if let Some(window) = value.get("recvWindow") {
            if !window.is_null() && window.as_u64().is_none() {
                return Err(ConfigError::InvalidRecvWindow(window.to_string()));
            }
        }

        let options: Self = serde_json::from_value(value)
            .map_err(|e| ConfigError::InvalidConfiguration(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }
}

/// Settings for the authenticated push-data connection
#[derive(Debug, Clone)]
pub struct UserDataStreamConfig {
    /// Period of the listen-key keepalive call
    pub keepalive_interval: Duration,
    /// Socket connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Capacity of the broadcast channel handed to subscribers
    pub message_buffer_size: usize,
}

impl Default for UserDataStreamConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(15 * 60),
            connect_timeout_ms: 10_000,
            message_buffer_size: 1024,
        }
    }
}

impl UserDataStreamConfig {
    #[must_use]
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }
}

/// Everything a market needs at construction time
#[derive(Debug, Clone, Default)]
pub struct MarketOptions {
    pub account_connection: Option<Credentials>,
    pub client_options: Option<ClientOptions>,
    pub is_testnet: bool,
    /// Overrides the built-in REST and stream hosts.
    pub endpoints: Option<Endpoints>,
    pub stream: UserDataStreamConfig,
}

impl MarketOptions {
    /// Create options with API credentials
    #[must_use]
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            account_connection: Some(Credentials::new(api_key, secret_key)),
            ..Self::default()
        }
    }

    /// Options for public endpoints only
    #[must_use]
    pub fn read_only() -> Self {
        Self::default()
    }

    /// Create options from environment variables
    ///
    /// Expected environment variables:
    /// - `{PREFIX}_API_KEY` (e.g., `BINANCE_API_KEY`)
    /// - `{PREFIX}_SECRET_KEY` (e.g., `BINANCE_SECRET_KEY`)
    /// - `{PREFIX}_TESTNET` (optional, defaults to false)
    /// - `{PREFIX}_RECV_WINDOW` (optional)
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let prefix = prefix.to_uppercase();
        let api_key_var = format!("{}_API_KEY", prefix);
        let secret_key_var = format!("{}_SECRET_KEY", prefix);
        let testnet_var = format!("{}_TESTNET", prefix);
        let recv_window_var = format!("{}_RECV_WINDOW", prefix);

        let api_key = env::var(&api_key_var)
            .map_err(|_| ConfigError::MissingEnvironmentVariable(api_key_var))?;

        let secret_key = env::var(&secret_key_var)
            .map_err(|_| ConfigError::MissingEnvironmentVariable(secret_key_var))?;

        let is_testnet = env::var(&testnet_var)
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        let client_options = match env::var(&recv_window_var) {
            Ok(raw) => {
                let window = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidRecvWindow(raw.clone()))?;
                let options = ClientOptions::default().recv_window(Some(window));
                options.validate()?;
                Some(options)
            }
            Err(_) => None,
        };

        Ok(Self {
            account_connection: Some(Credentials::new(api_key, secret_key)),
            client_options,
            is_testnet,
            ..Self::default()
        })
    }

    /// Create options from a `.env` file and environment variables
    ///
    /// **Security Warning**: Never commit .env files to version control!
    #[cfg(feature = "env-file")]
    pub fn from_env_file(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_env_file_with_path(prefix, ".env")
    }

    /// Create options from a specific `.env` file path
    #[cfg(feature = "env-file")]
    pub fn from_env_file_with_path(prefix: &str, env_file_path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(_) => {}
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {
                // no file, fall back to the process environment
            }
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }

        Self::from_env(prefix)
    }

    #[must_use]
    pub const fn testnet(mut self, is_testnet: bool) -> Self {
        self.is_testnet = is_testnet;
        self
    }

    #[must_use]
    pub fn client_options(mut self, options: ClientOptions) -> Self {
        self.client_options = Some(options);
        self
    }

    #[must_use]
    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    #[must_use]
    pub fn stream_config(mut self, stream: UserDataStreamConfig) -> Self {
        self.stream = stream;
        self
    }

    /// Check if these options carry usable credentials
    pub fn has_credentials(&self) -> bool {
        self.account_connection
            .as_ref()
            .is_some_and(|credentials| !credentials.is_empty())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("The recvWindow must be a natural number no greater than 60000, got {0}")]
    InvalidRecvWindow(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_options() {
        let options = ClientOptions::default();
        assert!(options.auto_timestamp);
        assert!(!options.replace_timestamp);
        assert_eq!(options.recv_window, Some(5000));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_recv_window_bounds() {
        for window in [0, 60_001, u64::MAX] {
            let options = ClientOptions::default().recv_window(Some(window));
            assert!(
                matches!(options.validate(), Err(ConfigError::InvalidRecvWindow(_))),
                "recvWindow {} should be rejected",
                window
            );
        }

        for window in [1, 5_000, 60_000] {
            let options = ClientOptions::default().recv_window(Some(window));
            assert!(options.validate().is_ok(), "recvWindow {} should pass", window);
        }

        assert!(ClientOptions::default().recv_window(None).validate().is_ok());
    }

    #[test]
    fn test_from_value_rejects_non_integers() {
        for raw in [json!(5000.5), json!(-1), json!("5000"), json!(60_001)] {
            let result = ClientOptions::from_value(json!({ "recvWindow": raw }));
            assert!(
                matches!(result, Err(ConfigError::InvalidRecvWindow(_))),
                "{} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_from_value_applies_defaults() {
        let options = ClientOptions::from_value(json!({ "replaceTimestamp": true })).unwrap();
        assert!(options.auto_timestamp);
        assert!(options.replace_timestamp);
        assert_eq!(options.recv_window, Some(5000));

        let options = ClientOptions::from_value(json!({ "recvWindow": 60000 })).unwrap();
        assert_eq!(options.recv_window, Some(60_000));
    }

    #[test]
    fn test_credentials_are_redacted() {
        let credentials = Credentials::new("my-api-key", "my-secret");
        let serialized = serde_json::to_string(&credentials).unwrap();
        assert!(!serialized.contains("my-api-key"));
        assert!(!serialized.contains("my-secret"));
        assert!(!format!("{:?}", credentials).contains("my-secret"));
    }

    #[test]
    fn test_credentials_deserialize_from_camel_case() {
        let credentials: Credentials =
            serde_json::from_value(json!({ "apiKey": "A", "secretKey": "B" })).unwrap();
        assert_eq!(credentials.api_key(), "A");
        assert_eq!(credentials.secret_key(), "B");
    }

    #[test]
    fn test_has_credentials() {
        assert!(MarketOptions::new("key", "secret").has_credentials());
        assert!(!MarketOptions::new("", "secret").has_credentials());
        assert!(!MarketOptions::read_only().has_credentials());
    }
}
