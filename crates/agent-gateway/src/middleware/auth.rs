//! Bearer-token authentication.
//!
//! Every path except the agent card requires `Authorization: Bearer <token>`
//! matching the configured [`ApiPassword`]. When no password is configured
//! the gate fails closed.

use crate::domain::config::ApiPassword;
use crate::service::AGENT_CARD_PATH;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::fmt;
use std::sync::Arc;
use tower::{Layer, Service};
use tracing::{trace, warn};

/// Authentication configuration
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    /// Expected bearer token
    pub api_password: ApiPassword,
}

/// Why a request was turned away. Only used for logging; clients always see
/// the same response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// No password configured for this endpoint
    NotConfigured,
    /// No `Authorization` header
    MissingHeader,
    /// Header present but not `Bearer <token>`
    MalformedHeader,
    /// Token does not match
    InvalidToken,
}

impl fmt::Display for AuthRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::NotConfigured => "no API password configured",
            Self::MissingHeader => "missing authorization header",
            Self::MalformedHeader => "malformed authorization header",
            Self::InvalidToken => "invalid token",
        };
        f.write_str(reason)
    }
}

/// Authentication layer
#[derive(Clone)]
pub struct AuthLayer {
    config: Arc<AuthConfig>,
}

impl AuthLayer {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            config: Arc::clone(&self.config),
        }
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    config: Arc<AuthConfig>,
}

impl<S> Service<Request<Body>> for AuthService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let config = Arc::clone(&self.config);
        // Take the service that was driven to readiness, leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            if is_public_path(req.uri().path()) {
                trace!(path = req.uri().path(), "Public path, skipping authentication");
                return inner.call(req).await;
            }

            if let Err(rejection) = authorize(&req, &config) {
                warn!(
                    path = req.uri().path(),
                    reason = %rejection,
                    "Request rejected by authentication"
                );
                return Ok(unauthorized_response());
            }

            inner.call(req).await
        })
    }
}

/// Only the capability document is reachable without credentials.
pub fn is_public_path(path: &str) -> bool {
    path == AGENT_CARD_PATH
}

/// Check the bearer token of a request against the configured password.
pub fn authorize<B>(req: &Request<B>, config: &AuthConfig) -> Result<(), AuthRejection> {
    let expected = config
        .api_password
        .expose()
        .ok_or(AuthRejection::NotConfigured)?;

    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthRejection::MissingHeader)?
        .to_str()
        .map_err(|_| AuthRejection::MalformedHeader)?;

    let token = bearer_token(value).ok_or(AuthRejection::MalformedHeader)?;

    if constant_time_compare(token, expected) {
        Ok(())
    } else {
        Err(AuthRejection::InvalidToken)
    }
}

/// Extract `<token>` from `Bearer <token>`. The scheme is case-insensitive.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

/// Constant-time string comparison to prevent timing attacks
///
/// Both inputs are padded to the same length with different fill bytes, so
/// neither the position of the first differing byte nor the length of the
/// expected secret changes the amount of work done.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;

    let max_len = std::cmp::max(a.len(), b.len());

    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];

    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = (a.len() as u64).ct_eq(&(b.len() as u64));
    let contents_equal = a_padded.ct_eq(&b_padded);

    (lengths_equal & contents_equal).into()
}

/// Identical for every rejection reason.
fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(serde_json::json!({
            "error": "Unauthorized",
            "message": "Invalid or missing API password"
        })),
    )
        .into_response()
}
