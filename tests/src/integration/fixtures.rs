//! Test fixtures: a built-in agent served on an ephemeral loopback port.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use agent_gateway::{
    AgentConfig, AgentEndpoint, AgentHandler, AgentProfile, ApiPassword, ApiResult,
    GatewayError, RpcRequest, AGENT_CARD_PATH,
};
use async_trait::async_trait;
use builtin_agents::AgentKind;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Delegates to another handler and counts invocations.
pub struct CountingHandler {
    inner: Arc<dyn AgentHandler>,
    calls: Arc<AtomicUsize>,
}

impl CountingHandler {
    pub fn new(inner: Arc<dyn AgentHandler>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

#[async_trait]
impl AgentHandler for CountingHandler {
    fn profile(&self) -> AgentProfile {
        self.inner.profile()
    }

    async fn handle(&self, request: &RpcRequest) -> ApiResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.handle(request).await
    }
}

/// A served endpoint. Dropping it without [`RunningAgent::stop`] aborts the
/// server task.
pub struct RunningAgent {
    pub addr: SocketAddr,
    calls: Arc<AtomicUsize>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), GatewayError>>,
}

impl RunningAgent {
    /// Serve `kind` on 127.0.0.1 with an optional credential.
    pub async fn start(kind: AgentKind, password: Option<&str>) -> Self {
        let mut config = AgentConfig::with_port(0);
        config.http.host = "127.0.0.1".parse().unwrap();
        config.api_password = password.map(ApiPassword::new).unwrap_or_default();

        let (handler, calls) = CountingHandler::new(kind.handler().unwrap());
        let endpoint = AgentEndpoint::new(config, Arc::new(handler)).unwrap();
        let listener = endpoint.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(endpoint.serve(listener, async move {
            let _ = shutdown_rx.await;
        }));

        Self {
            addr,
            calls,
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn card_url(&self) -> String {
        self.url(AGENT_CARD_PATH)
    }

    /// POST a raw JSON-RPC body to `/`.
    pub async fn post(&self, token: Option<&str>, body: &Value) -> reqwest::Response {
        let mut request = reqwest::Client::new().post(self.url("/")).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.unwrap()
    }

    /// `message/send` with a single text part; returns status and body.
    pub async fn send_text(&self, token: Option<&str>, text: &str) -> (u16, Value) {
        let response = self.post(token, &message_send("req-1", text)).await;
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    /// Request a graceful stop and wait for the server task.
    pub async fn stop(mut self) -> Result<(), GatewayError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        (&mut self.task).await.unwrap()
    }
}

impl Drop for RunningAgent {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// JSON-RPC `message/send` envelope carrying `text`.
pub fn message_send(id: &str, text: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "message/send",
        "params": {
            "message": {
                "kind": "message",
                "role": "user",
                "messageId": format!("msg-{}", id),
                "parts": [{"kind": "text", "text": text}]
            }
        }
    })
}
