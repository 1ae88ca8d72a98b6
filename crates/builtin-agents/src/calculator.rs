//! Calculator agent: evaluates the arithmetic expression found in a message.
//!
//! Supported syntax: `+ - * / % ^`, parentheses, unary minus and decimal
//! literals. `^` is right-associative and binds tighter than unary minus, so
//! `-2^2` is `-4`.

use agent_gateway::{AgentHandler, AgentProfile, AgentSkill, ApiError, ApiResult, RpcRequest};
use std::borrow::Cow;

use async_trait::async_trait;
use regex::{Captures, Regex};
use serde_json::Value;
use tracing::debug;

use crate::message::{incoming_text, AgentMessage};
use crate::AgentError;

/// Nesting limit for parentheses and unary operators.
const MAX_DEPTH: usize = 64;

/// Evaluation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalcError {
    #[error("no arithmetic expression found")]
    Empty,
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("expression nested too deeply")]
    TooDeep,
    #[error("result is not a finite number")]
    NotFinite,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, CalcError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        let token = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| CalcError::InvalidNumber(literal.clone()))?;
                tokens.push((Token::Num(value), pos));
                continue;
            }
            '+' => Token::Plus,
            '-' | '−' => Token::Minus,
            '*' | '×' => Token::Star,
            '/' | '÷' => Token::Slash,
            '%' => Token::Percent,
            '^' => Token::Caret,
            '(' => Token::LParen,
            ')' => Token::RParen,
            other => return Err(CalcError::UnexpectedChar(other, pos)),
        };
        tokens.push((token, pos));
        chars.next();
    }

    Ok(tokens)
}

/// Recursive-descent evaluator over a token slice.
struct Parser<'a> {
    source: &'a str,
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).map(|(t, _)| *t)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    fn descend(&mut self) -> Result<(), CalcError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(CalcError::TooDeep);
        }
        Ok(())
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, CalcError> {
        let mut value = self.term()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.advance();
            let rhs = self.term()?;
            value = if op == Token::Plus { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    // term := unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<f64, CalcError> {
        let mut value = self.unary()?;
        while let Some(op @ (Token::Star | Token::Slash | Token::Percent)) = self.peek() {
            self.advance();
            let rhs = self.unary()?;
            value = match op {
                Token::Star => value * rhs,
                _ if rhs == 0.0 => return Err(CalcError::DivisionByZero),
                Token::Slash => value / rhs,
                _ => value % rhs,
            };
        }
        Ok(value)
    }

    // unary := ('-' | '+') unary | power
    fn unary(&mut self) -> Result<f64, CalcError> {
        match self.peek() {
            Some(op @ (Token::Minus | Token::Plus)) => {
                self.advance();
                self.descend()?;
                let value = self.unary()?;
                self.depth -= 1;
                Ok(if op == Token::Minus { -value } else { value })
            }
            _ => self.power(),
        }
    }

    // power := atom ('^' unary)?
    fn power(&mut self) -> Result<f64, CalcError> {
        let base = self.atom()?;
        if self.peek() == Some(Token::Caret) {
            self.advance();
            self.descend()?;
            let exponent = self.unary()?;
            self.depth -= 1;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    // atom := number | '(' expr ')'
    fn atom(&mut self) -> Result<f64, CalcError> {
        match self.advance() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                self.descend()?;
                let value = self.expr()?;
                self.depth -= 1;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    Some(_) => Err(self.unexpected(self.pos - 1)),
                    None => Err(CalcError::UnexpectedEnd),
                }
            }
            Some(_) => Err(self.unexpected(self.pos - 1)),
            None => Err(CalcError::UnexpectedEnd),
        }
    }

    fn unexpected(&self, index: usize) -> CalcError {
        self.tokens
            .get(index)
            .and_then(|(_, pos)| {
                let c = self.source.get(*pos..)?.chars().next()?;
                Some(CalcError::UnexpectedChar(c, *pos))
            })
            .unwrap_or(CalcError::UnexpectedEnd)
    }
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expression: &str) -> Result<f64, CalcError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(CalcError::Empty);
    }

    let mut parser = Parser {
        source: expression,
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.unexpected(parser.pos));
    }
    if !value.is_finite() {
        return Err(CalcError::NotFinite);
    }
    Ok(value)
}

/// Render without a trailing `.0` for integral values.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        // Avoid "-0".
        format!("{:.0}", value + 0.0)
    } else {
        let rounded = format!("{:.10}", value);
        rounded.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Trim whitespace and sentence punctuation around a matched run. A leading
/// period survives only as the start of a decimal like `.5`.
fn strip_periods(run: &str) -> &str {
    let mut run = run.trim().trim_end_matches('.').trim_end();
    while let Some(rest) = run.strip_prefix('.') {
        if rest.starts_with(|c: char| c.is_ascii_digit()) {
            break;
        }
        run = rest.trim_start();
    }
    run
}

/// Calculator agent
pub struct CalculatorAgent {
    expression: Regex,
    grouped: Regex,
}

impl CalculatorAgent {
    pub fn new() -> Result<Self, AgentError> {
        // A run of operators, parentheses and numbers that contains a digit.
        let expression = Regex::new(r"[-+*/%^().0-9\s×÷−]*[0-9][-+*/%^().0-9\s×÷−]*")
            .map_err(|e| AgentError::Init(e.to_string()))?;
        // Thousands-grouped integers such as `1,000,000`.
        let grouped = Regex::new(r"\b[0-9]{1,3}(?:,[0-9]{3})+\b")
            .map_err(|e| AgentError::Init(e.to_string()))?;
        Ok(Self {
            expression,
            grouped,
        })
    }

    /// Pick the longest arithmetic run out of free text.
    pub fn extract_expression<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.expression
            .find_iter(text)
            .map(|m| strip_periods(m.as_str()))
            .filter(|s| !s.is_empty())
            .max_by_key(|s| s.len())
    }

    /// Drop the separators from thousands-grouped integers.
    pub fn ungroup<'a>(&self, text: &'a str) -> Cow<'a, str> {
        self.grouped
            .replace_all(text, |caps: &Captures| caps[0].replace(',', ""))
    }

    /// Answer a free-text question with `"<expr> = <value>"`.
    pub fn answer(&self, text: &str) -> Result<String, CalcError> {
        let text = self.ungroup(text);
        let expression = self.extract_expression(&text).ok_or(CalcError::Empty)?;
        let value = evaluate(expression)?;
        Ok(format!("{} = {}", expression, format_number(value)))
    }
}

#[async_trait]
impl AgentHandler for CalculatorAgent {
    fn profile(&self) -> AgentProfile {
        AgentProfile {
            name: "Calculator Agent".to_string(),
            description: "A calculator agent that can perform basic arithmetic operations."
                .to_string(),
            version: crate::VERSION.to_string(),
            skills: vec![AgentSkill {
                id: "arithmetic".to_string(),
                name: "Arithmetic".to_string(),
                description: "Evaluates arithmetic expressions with + - * / % ^ and parentheses."
                    .to_string(),
                tags: vec!["math".to_string(), "calculator".to_string()],
                examples: vec!["What is 10 * 11?".to_string(), "(2 + 3) ^ 2".to_string()],
            }],
        }
    }

    async fn handle(&self, request: &RpcRequest) -> ApiResult<Value> {
        let (message, text) = incoming_text(request)?;
        let answer = self.answer(&text).map_err(|e| {
            debug!(error = %e, "Calculation failed");
            ApiError::server_error(format!("Could not evaluate expression: {}", e))
        })?;
        AgentMessage::reply_to(&message, answer).into_value()
    }
}
