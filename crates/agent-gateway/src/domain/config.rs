//! Endpoint configuration with validation.
//!
//! Loaded once at process start and handed to [`crate::AgentEndpoint`] by
//! value. Nothing in the request path reads the environment.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable holding the bearer credential.
pub const ENV_API_PASSWORD: &str = "API_PASSWORD";
/// Environment variable holding the bind host.
pub const ENV_API_HOST: &str = "API_HOST";
/// Environment variable overriding the host advertised in the agent card.
pub const ENV_PUBLIC_HOST: &str = "AGENT_PUBLIC_HOST";
/// Environment variable enabling the per-request timeout (seconds).
pub const ENV_REQUEST_TIMEOUT: &str = "REQUEST_TIMEOUT_SECS";
/// Environment variable for the request body limit (bytes).
pub const ENV_MAX_BODY_BYTES: &str = "MAX_BODY_BYTES";
/// Environment variable for the shutdown grace period (seconds).
pub const ENV_SHUTDOWN_GRACE: &str = "SHUTDOWN_GRACE_SECS";

/// Shared secret presented as `Authorization: Bearer <token>`.
///
/// Empty values are treated as unset. The secret is never printed: `Debug`
/// only reports whether one is configured.
#[derive(Clone, Default)]
pub struct ApiPassword(Option<Arc<str>>);

impl ApiPassword {
    /// Wrap a secret. An empty string yields an unset password.
    pub fn new(secret: impl AsRef<str>) -> Self {
        let secret = secret.as_ref();
        if secret.is_empty() {
            Self(None)
        } else {
            Self(Some(Arc::from(secret)))
        }
    }

    /// No password configured: every protected request is rejected.
    pub fn unset() -> Self {
        Self(None)
    }

    pub fn is_configured(&self) -> bool {
        self.0.is_some()
    }

    pub(crate) fn expose(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl fmt::Debug for ApiPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_configured() {
            write!(f, "ApiPassword(<redacted>)")
        } else {
            write!(f, "ApiPassword(<unset>)")
        }
    }
}

/// Listener host: an IP literal or a DNS name resolved at bind time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindHost {
    Ip(IpAddr),
    Name(String),
}

impl BindHost {
    /// Wildcard address (`0.0.0.0` or `::`).
    pub fn is_unspecified(&self) -> bool {
        matches!(self, BindHost::Ip(ip) if ip.is_unspecified())
    }
}

impl Default for BindHost {
    fn default() -> Self {
        BindHost::Ip(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }
}

impl FromStr for BindHost {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(BindHost::Ip(ip));
        }
        // RFC 1123 host name: dot-separated labels of letters, digits and hyphens.
        let valid_label = |label: &str| {
            (1..=63).contains(&label.len())
                && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
                && !label.starts_with('-')
                && !label.ends_with('-')
        };
        let name = s.strip_suffix('.').unwrap_or(s);
        if name.len() <= 253 && name.split('.').all(valid_label) {
            Ok(BindHost::Name(name.to_ascii_lowercase()))
        } else {
            Err(format!("'{}' is neither an IP address nor a host name", s))
        }
    }
}

/// Renders in `host:port` position, so IPv6 gets brackets.
impl fmt::Display for BindHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindHost::Ip(IpAddr::V6(v6)) => write!(f, "[{}]", v6),
            BindHost::Ip(IpAddr::V4(v4)) => write!(f, "{}", v4),
            BindHost::Name(name) => f.write_str(name),
        }
    }
}

/// Complete configuration for one agent endpoint.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Listener configuration
    pub http: HttpConfig,
    /// Bearer credential (fail-closed when unset)
    pub api_password: ApiPassword,
    /// Request validation limits
    pub limits: LimitsConfig,
    /// Timeout configuration
    pub timeouts: TimeoutConfig,
}

impl AgentConfig {
    /// Defaults for an endpoint listening on `port`, with no credential.
    pub fn with_port(port: u16) -> Self {
        Self {
            http: HttpConfig {
                port,
                ..HttpConfig::default()
            },
            api_password: ApiPassword::unset(),
            limits: LimitsConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }

    /// Load configuration from the process environment.
    pub fn from_env(default_port: u16) -> Result<Self, ConfigError> {
        Self::from_lookup(default_port, |key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Unset keys fall back to defaults; keys that are set but unparsable are
    /// errors.
    pub fn from_lookup<F>(default_port: u16, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::with_port(default_port);

        config.api_password = ApiPassword::new(lookup(ENV_API_PASSWORD).unwrap_or_default());

        if let Some(host) = parse_var::<BindHost, _>(&lookup, ENV_API_HOST)? {
            config.http.host = host;
        }
        config.http.public_host = lookup(ENV_PUBLIC_HOST)
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());

        if let Some(bytes) = parse_var::<usize, _>(&lookup, ENV_MAX_BODY_BYTES)? {
            config.limits.max_request_size = bytes;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, ENV_REQUEST_TIMEOUT)? {
            config.timeouts.request = Some(Duration::from_secs(secs));
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, ENV_SHUTDOWN_GRACE)? {
            config.timeouts.shutdown_grace = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_request_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_request_size cannot be 0".into(),
            ));
        }

        if let Some(request) = self.timeouts.request {
            if request.is_zero() {
                return Err(ConfigError::InvalidTimeout(
                    "request timeout cannot be 0".into(),
                ));
            }
        }

        if self.timeouts.shutdown_grace.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "shutdown grace period cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Listener address as `host:port`; host names are resolved by the bind.
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }

    /// Base URL advertised in the agent card for a listener on `port`.
    pub fn public_url(&self, port: u16) -> String {
        let host = match &self.http.public_host {
            Some(host) => host.clone(),
            None if self.http.host.is_unspecified() => "localhost".to_string(),
            None => self.http.host.to_string(),
        };
        format!("http://{}:{}/", host, port)
    }
}

/// Listener configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Bind host (default: 0.0.0.0)
    pub host: BindHost,
    /// Port
    pub port: u16,
    /// Host name advertised in the agent card instead of the bind address
    pub public_host: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: BindHost::default(),
            port: 0,
            public_host: None,
        }
    }
}

/// Request limits configuration
#[derive(Debug, Clone)]
pub struct LimitsConfig {
    /// Max request body size in bytes (default: 1MB)
    pub max_request_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_size: 1024 * 1024,
        }
    }
}

/// Timeout configuration
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Per-request timeout on the message route (None = unbounded)
    pub request: Option<Duration>,
    /// How long in-flight requests may run after shutdown begins
    pub shutdown_grace: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request: None,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed
    #[error("invalid value for {key}: {reason}")]
    InvalidVar { key: String, reason: String },
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| ConfigError::InvalidVar {
                    key: key.to_string(),
                    reason: e.to_string(),
                })
        }
        _ => Ok(None),
    }
}
