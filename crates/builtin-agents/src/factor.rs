//! Factor agent: lists every divisor of the first number in a message.

use agent_gateway::{AgentHandler, AgentProfile, AgentSkill, ApiError, ApiResult, RpcRequest};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::message::{incoming_text, AgentMessage};
use crate::AgentError;

/// Largest accepted input. Divisors are found by trial division up to the
/// square root, so this bounds the work per request at one million steps.
pub const MAX_FACTOR_INPUT: u64 = 1_000_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FactorError {
    #[error("No number found in the input text.")]
    NoNumber,
    #[error("Please provide a positive integer greater than 0.")]
    NotPositive,
    #[error("Please provide a number no larger than {}.", MAX_FACTOR_INPUT)]
    TooLarge,
}

/// `i * i <= n` without overflowing near `u64::MAX`.
fn within_root(i: u64, n: u64) -> bool {
    i <= n / i
}

/// All divisors of `n` in ascending order.
pub fn factors(n: u64) -> Vec<u64> {
    let mut low = Vec::new();
    let mut high = Vec::new();

    let mut i = 1u64;
    while within_root(i, n) {
        if n % i == 0 {
            low.push(i);
            if i != n / i {
                high.push(n / i);
            }
        }
        i += 1;
    }

    low.extend(high.into_iter().rev());
    low
}

/// Factor agent
pub struct FactorAgent {
    digits: Regex,
}

impl FactorAgent {
    pub fn new() -> Result<Self, AgentError> {
        let digits = Regex::new(r"[0-9]+").map_err(|e| AgentError::Init(e.to_string()))?;
        Ok(Self { digits })
    }

    /// `"The factors of N are: 1, …, N"` for the first number in `text`.
    pub fn answer(&self, text: &str) -> Result<String, FactorError> {
        let digits = self
            .digits
            .find(text)
            .ok_or(FactorError::NoNumber)?
            .as_str()
            .trim_start_matches('0');

        if digits.is_empty() {
            return Err(FactorError::NotPositive);
        }
        let number = digits
            .parse::<u64>()
            .ok()
            .filter(|n| *n <= MAX_FACTOR_INPUT)
            .ok_or(FactorError::TooLarge)?;

        let listed = factors(number)
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("The factors of {} are: {}", number, listed))
    }
}

#[async_trait]
impl AgentHandler for FactorAgent {
    fn profile(&self) -> AgentProfile {
        AgentProfile {
            name: "Factor Agent".to_string(),
            description:
                "A factor agent that extracts numbers from input and returns all possible factors."
                    .to_string(),
            version: crate::VERSION.to_string(),
            skills: vec![AgentSkill {
                id: "factorization".to_string(),
                name: "Factorization".to_string(),
                description: "Finds every divisor of the first number in the input text."
                    .to_string(),
                tags: vec!["math".to_string(), "factors".to_string()],
                examples: vec!["What are the factors of 28?".to_string()],
            }],
        }
    }

    async fn handle(&self, request: &RpcRequest) -> ApiResult<Value> {
        let (message, text) = incoming_text(request)?;
        let answer = self
            .answer(&text)
            .map_err(|e| ApiError::server_error(e.to_string()))?;
        AgentMessage::reply_to(&message, answer).into_value()
    }
}
