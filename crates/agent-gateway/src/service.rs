//! Agent endpoint: one listener serving the agent card and the JSON-RPC
//! message route for a single [`AgentHandler`].

use crate::domain::config::AgentConfig;
use crate::domain::error::{ApiError, GatewayError};
use crate::domain::types::{AgentCard, RpcRequest, RpcResponse};
use crate::middleware::{AuthConfig, AuthLayer, TimeoutLayer, TracingLayer};
use crate::ports::AgentHandler;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Discovery route, the only path reachable without credentials.
pub const AGENT_CARD_PATH: &str = "/.well-known/agent-card.json";

/// A configured endpoint, ready to bind.
pub struct AgentEndpoint {
    config: Arc<AgentConfig>,
    handler: Arc<dyn AgentHandler>,
}

impl AgentEndpoint {
    /// Create an endpoint. Fails if the configuration is invalid.
    pub fn new(config: AgentConfig, handler: Arc<dyn AgentHandler>) -> Result<Self, GatewayError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            handler,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Name advertised in the agent card.
    pub fn name(&self) -> String {
        self.handler.profile().name
    }

    /// Build the HTTP router. `port` is the port advertised in the card.
    pub fn router(&self, port: u16) -> Router {
        let profile = self.handler.profile();
        let card = AgentCard::from_profile(&profile, self.config.public_url(port));

        let state = EndpointState {
            handler: Arc::clone(&self.handler),
            card: Arc::new(card),
            name: Arc::from(profile.name.as_str()),
            version: Arc::from(profile.version.as_str()),
        };

        let rpc_route = match self.config.timeouts.request {
            Some(limit) => post(handle_rpc).layer(TimeoutLayer::new(limit)),
            None => post(handle_rpc),
        };

        Router::new()
            .route(AGENT_CARD_PATH, get(agent_card))
            .route("/", rpc_route)
            .route("/health", get(health_check))
            .layer(DefaultBodyLimit::max(self.config.limits.max_request_size))
            .layer(AuthLayer::new(AuthConfig {
                api_password: self.config.api_password.clone(),
            }))
            .layer(TracingLayer::new(&profile.name))
            .with_state(state)
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, GatewayError> {
        let addr = self.config.http_addr();
        let bound = TcpListener::bind(addr.as_str()).await;
        bound.map_err(|source| GatewayError::Bind { addr, source })
    }

    /// Serve on `listener` until `shutdown` resolves.
    ///
    /// After `shutdown` resolves no new connections are accepted. In-flight
    /// requests get the configured grace period; if they are still running
    /// when it elapses the server is dropped and
    /// [`GatewayError::ShutdownTimeout`] is returned.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr().map_err(GatewayError::Serve)?;
        let router = self.router(local_addr.port());
        let grace = self.config.timeouts.shutdown_grace;

        let card_url = format!(
            "{}{}",
            self.config
                .public_url(local_addr.port())
                .trim_end_matches('/'),
            AGENT_CARD_PATH
        );
        info!(
            agent = %self.name(),
            addr = %local_addr,
            card = %card_url,
            "Agent endpoint listening"
        );

        let (draining_tx, draining_rx) = oneshot::channel::<()>();
        let signal = async move {
            shutdown.await;
            info!("Shutdown requested, draining in-flight requests");
            let _ = draining_tx.send(());
        };

        let server = axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .into_future();
        tokio::pin!(server);

        let grace_timer = async move {
            match draining_rx.await {
                Ok(()) => tokio::time::sleep(grace).await,
                // Server finished without a shutdown request.
                Err(_) => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            result = &mut server => {
                result.map_err(GatewayError::Serve)?;
                info!("Agent endpoint stopped");
                Ok(())
            }
            _ = grace_timer => {
                warn!(
                    grace_ms = grace.as_millis() as u64,
                    "Grace period elapsed with requests in flight"
                );
                Err(GatewayError::ShutdownTimeout(grace))
            }
        }
    }
}

/// Shared, immutable per-endpoint state.
#[derive(Clone)]
struct EndpointState {
    handler: Arc<dyn AgentHandler>,
    card: Arc<AgentCard>,
    name: Arc<str>,
    version: Arc<str>,
}

async fn agent_card(State(state): State<EndpointState>) -> Json<AgentCard> {
    Json(state.card.as_ref().clone())
}

async fn health_check(State(state): State<EndpointState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "agent": &*state.name,
        "version": &*state.version,
    }))
}

/// Handle JSON-RPC request
async fn handle_rpc(State(state): State<EndpointState>, body: Bytes) -> Response {
    let value: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "Rejected unparsable body");
            return rpc_reply(
                StatusCode::BAD_REQUEST,
                RpcResponse::failure(None, ApiError::parse_error(e.to_string())),
            );
        }
    };

    let request = match RpcRequest::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "Rejected invalid envelope");
            return rpc_reply(StatusCode::BAD_REQUEST, RpcResponse::failure(None, e));
        }
    };

    match state.handler.handle(&request).await {
        Ok(result) => rpc_reply(StatusCode::OK, RpcResponse::success(request.id, result)),
        Err(error) => {
            warn!(
                method = %request.method,
                id = %request.id,
                code = error.code,
                "Handler reported failure"
            );
            rpc_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                RpcResponse::failure(Some(request.id), error),
            )
        }
    }
}

fn rpc_reply(status: StatusCode, body: RpcResponse) -> Response {
    (status, Json(body)).into_response()
}
