//! Built-in agents served by the runtime.
//!
//! | Kind | Default port | Skill |
//! |------|--------------|-------|
//! | `calculator` | 9000 | `arithmetic` |
//! | `factor` | 9001 | `factorization` |
//!
//! Both answer JSON-RPC `message/send` with a single-text-part A2A message
//! and report tool failures as JSON-RPC errors.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod calculator;
pub mod factor;
pub mod message;

use agent_gateway::AgentHandler;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use calculator::CalculatorAgent;
pub use factor::FactorAgent;

/// Crate version, advertised in agent cards.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("unknown agent kind '{0}' (expected calculator or factor)")]
    UnknownKind(String),
    #[error("failed to initialise agent: {0}")]
    Init(String),
}

/// Which built-in agent to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentKind {
    Calculator,
    Factor,
}

impl AgentKind {
    pub const ALL: [AgentKind; 2] = [AgentKind::Calculator, AgentKind::Factor];

    pub fn default_port(self) -> u16 {
        match self {
            AgentKind::Calculator => 9000,
            AgentKind::Factor => 9001,
        }
    }

    /// Environment variable overriding the supervised port.
    pub fn port_env(self) -> &'static str {
        match self {
            AgentKind::Calculator => "CALCULATOR_PORT",
            AgentKind::Factor => "FACTOR_PORT",
        }
    }

    /// Subcommand name.
    pub fn as_str(self) -> &'static str {
        match self {
            AgentKind::Calculator => "calculator",
            AgentKind::Factor => "factor",
        }
    }

    /// Display name, matching the agent card.
    pub fn display_name(self) -> &'static str {
        match self {
            AgentKind::Calculator => "Calculator Agent",
            AgentKind::Factor => "Factor Agent",
        }
    }

    pub fn handler(self) -> Result<Arc<dyn AgentHandler>, AgentError> {
        Ok(match self {
            AgentKind::Calculator => Arc::new(CalculatorAgent::new()?),
            AgentKind::Factor => Arc::new(FactorAgent::new()?),
        })
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "calculator" => Ok(AgentKind::Calculator),
            "factor" => Ok(AgentKind::Factor),
            other => Err(AgentError::UnknownKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in AgentKind::ALL {
            assert_eq!(kind.as_str().parse::<AgentKind>().unwrap(), kind);
        }
        assert!("Calculator".parse::<AgentKind>().is_ok());
        assert!(matches!(
            "weather".parse::<AgentKind>(),
            Err(AgentError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_handler_names_match_kind() {
        for kind in AgentKind::ALL {
            let handler = kind.handler().unwrap();
            assert_eq!(handler.profile().name, kind.display_name());
        }
    }

    #[test]
    fn test_default_ports_distinct() {
        assert_eq!(AgentKind::Calculator.default_port(), 9000);
        assert_eq!(AgentKind::Factor.default_port(), 9001);
    }
}
