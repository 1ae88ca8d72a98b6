//! Supervisor configuration.

use agent_gateway::domain::config::ENV_SHUTDOWN_GRACE;
use agent_gateway::ConfigError;
use builtin_agents::AgentKind;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable for the readiness timeout (seconds).
pub const ENV_STARTUP_TIMEOUT: &str = "STARTUP_TIMEOUT_SECS";
/// Environment variable selecting the [`RestartPolicy`].
pub const ENV_RESTART_POLICY: &str = "RESTART_POLICY";
/// Environment variable capping restarts per worker.
pub const ENV_MAX_RESTARTS: &str = "MAX_RESTARTS";

/// What happens when a running worker exits on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Record the exit; the other workers keep serving.
    #[default]
    Never,
    /// Respawn workers that exit unsuccessfully, up to `max_restarts` times.
    OnFailure,
}

impl FromStr for RestartPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "never" | "no" => Ok(Self::Never),
            "on-failure" | "on_failure" => Ok(Self::OnFailure),
            other => Err(format!(
                "unknown restart policy '{}' (expected never or on-failure)",
                other
            )),
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => f.write_str("never"),
            Self::OnFailure => f.write_str("on-failure"),
        }
    }
}

/// One endpoint to run as a worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub kind: AgentKind,
    pub port: u16,
}

impl EndpointDescriptor {
    pub fn new(kind: AgentKind, port: u16) -> Self {
        Self { kind, port }
    }

    /// Prefix used for this worker's forwarded output.
    pub fn name(&self) -> &'static str {
        self.kind.display_name()
    }

    /// Every built-in agent on its default port.
    pub fn defaults() -> Vec<Self> {
        AgentKind::ALL
            .iter()
            .map(|kind| Self::new(*kind, kind.default_port()))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Started in order.
    pub endpoints: Vec<EndpointDescriptor>,
    /// Worker executable. `None` re-executes the current binary.
    pub program: Option<PathBuf>,
    /// Extra environment for every worker, on top of the inherited one.
    pub worker_env: Vec<(String, String)>,
    /// Delay between consecutive spawns
    pub stagger: Duration,
    /// How long every worker has to announce readiness
    pub startup_timeout: Duration,
    /// How long a worker may take to stop before it is killed
    pub shutdown_grace: Duration,
    pub restart_policy: RestartPolicy,
    pub max_restarts: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            endpoints: EndpointDescriptor::defaults(),
            program: None,
            worker_env: Vec::new(),
            stagger: Duration::from_secs(1),
            startup_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(10),
            restart_policy: RestartPolicy::Never,
            max_restarts: 3,
        }
    }
}

impl SupervisorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        for endpoint in &mut config.endpoints {
            if let Some(port) = parse_var::<u16, _>(&lookup, endpoint.kind.port_env())? {
                endpoint.port = port;
            }
        }

        if let Some(secs) = parse_var::<u64, _>(&lookup, ENV_SHUTDOWN_GRACE)? {
            config.shutdown_grace = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, ENV_STARTUP_TIMEOUT)? {
            config.startup_timeout = Duration::from_secs(secs);
        }
        if let Some(policy) = parse_var::<RestartPolicy, _>(&lookup, ENV_RESTART_POLICY)? {
            config.restart_policy = policy;
        }
        if let Some(max) = parse_var::<u32, _>(&lookup, ENV_MAX_RESTARTS)? {
            config.max_restarts = max;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.startup_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "startup timeout cannot be 0".into(),
            ));
        }
        if self.shutdown_grace.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "shutdown grace period cannot be 0".into(),
            ));
        }
        let mut ports: Vec<u16> = self
            .endpoints
            .iter()
            .map(|e| e.port)
            .filter(|p| *p != 0)
            .collect();
        ports.sort_unstable();
        if ports.windows(2).any(|w| w[0] == w[1]) {
            return Err(ConfigError::InvalidLimit(
                "two endpoints share a port".into(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidVar {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        _ => Ok(None),
    }
}
