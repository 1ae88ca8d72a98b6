//! # Supervisor Process Tests
//!
//! Drive a [`ProcessSupervisor`] against the real `agent-runtime` binary.
//! Workers bind port 0 on loopback and report the chosen address on their
//! readiness line, so tests never race for ports.

use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use agent_runtime::{
    exit, EndpointDescriptor, ProcessSupervisor, RestartPolicy, SupervisorConfig,
    SupervisorStatus, WorkerExit, WorkerInfo,
};
use builtin_agents::AgentKind;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};

const PASSWORD: &str = "secret1";

fn program() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_agent-runtime"))
}

fn worker_env() -> Vec<(String, String)> {
    vec![
        ("API_PASSWORD".to_string(), PASSWORD.to_string()),
        ("API_HOST".to_string(), "127.0.0.1".to_string()),
        ("SHUTDOWN_GRACE_SECS".to_string(), "5".to_string()),
        ("AGENT_LOG".to_string(), "warn".to_string()),
    ]
}

fn test_config(endpoints: Vec<EndpointDescriptor>) -> SupervisorConfig {
    SupervisorConfig {
        endpoints,
        program: Some(program()),
        worker_env: worker_env(),
        stagger: Duration::from_millis(100),
        startup_timeout: Duration::from_secs(30),
        shutdown_grace: Duration::from_secs(5),
        ..SupervisorConfig::default()
    }
}

fn both_agents() -> Vec<EndpointDescriptor> {
    vec![
        EndpointDescriptor::new(AgentKind::Calculator, 0),
        EndpointDescriptor::new(AgentKind::Factor, 0),
    ]
}

struct Harness {
    supervisor: Arc<ProcessSupervisor>,
    interrupts: mpsc::Sender<()>,
    task: JoinHandle<i32>,
}

impl Harness {
    fn start(config: SupervisorConfig) -> Self {
        let supervisor = Arc::new(ProcessSupervisor::new(config));
        let (interrupts, rx) = mpsc::channel(4);
        let runner = Arc::clone(&supervisor);
        let task = tokio::spawn(async move { runner.run(rx).await });
        Self {
            supervisor,
            interrupts,
            task,
        }
    }

    async fn wait_for<F>(&self, what: &str, predicate: F) -> Vec<WorkerInfo>
    where
        F: Fn(&ProcessSupervisor) -> bool,
    {
        let deadline = Instant::now() + Duration::from_secs(30);
        while !predicate(self.supervisor.as_ref()) {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            sleep(Duration::from_millis(50)).await;
        }
        self.supervisor.workers()
    }

    async fn wait_running(&self) -> Vec<WorkerInfo> {
        self.wait_for("Running", |s| s.status() == SupervisorStatus::Running)
            .await
    }

    async fn interrupt_and_join(self) -> (i32, Arc<ProcessSupervisor>) {
        self.interrupts.send(()).await.unwrap();
        let code = timeout(Duration::from_secs(30), self.task)
            .await
            .expect("supervisor did not stop")
            .unwrap();
        (code, self.supervisor)
    }
}

async fn send_message(addr: SocketAddr, token: &str, text: &str) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(format!("http://{}/", addr))
        .bearer_auth(token)
        .json(&json!({
            "jsonrpc": "2.0",
            "id": "t-1",
            "method": "message/send",
            "params": {"message": {"role": "user", "parts": [{"kind": "text", "text": text}]}}
        }))
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

fn signal_pid(pid: u32, signal: &str) {
    let status = std::process::Command::new("kill")
        .args([&format!("-{}", signal), &pid.to_string()])
        .status()
        .unwrap();
    assert!(status.success());
}

fn kill_pid(pid: u32) {
    signal_pid(pid, "KILL");
}

#[cfg(unix)]
fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// The binary run with no subcommand, stderr captured line by line.
#[cfg(unix)]
struct SupervisorBinary {
    child: tokio::process::Child,
    lines: mpsc::UnboundedReceiver<String>,
    calculator: SocketAddr,
}

#[cfg(unix)]
impl SupervisorBinary {
    fn spawn(shutdown_grace_secs: u64) -> Self {
        use std::process::Stdio;
        use tokio::io::{AsyncBufReadExt, BufReader};

        let calculator_port = free_port();
        let mut child = tokio::process::Command::new(program())
            .envs(worker_env())
            .env("AGENT_LOG", "info")
            .env("SHUTDOWN_GRACE_SECS", shutdown_grace_secs.to_string())
            .env("CALCULATOR_PORT", calculator_port.to_string())
            .env("FACTOR_PORT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .unwrap();

        // Keep draining even after the test stops listening.
        let stderr = child.stderr.take().unwrap();
        let (tx, lines) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                let _ = tx.send(line);
            }
        });

        Self {
            child,
            lines,
            calculator: SocketAddr::from(([127, 0, 0, 1], calculator_port)),
        }
    }

    async fn wait_for_line(&mut self, needle: &str) {
        let lines = &mut self.lines;
        let found = timeout(Duration::from_secs(30), async move {
            while let Some(line) = lines.recv().await {
                if line.contains(needle) {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false);
        assert!(found, "supervisor never logged {:?}", needle);
    }

    fn signal(&self, signal: &str) {
        signal_pid(self.child.id().unwrap(), signal);
    }

    async fn exit_code(mut self) -> Option<i32> {
        timeout(Duration::from_secs(30), self.child.wait())
            .await
            .expect("supervisor did not exit")
            .unwrap()
            .code()
    }
}

#[tokio::test]
async fn test_two_workers_serve_and_stop_on_interrupt() {
    let harness = Harness::start(test_config(both_agents()));
    let workers = harness.wait_running().await;

    assert_eq!(workers.len(), 2);
    assert_eq!(workers[0].name, "Calculator Agent");
    assert_eq!(workers[1].name, "Factor Agent");
    let calculator = workers[0].addr.unwrap();
    let factor = workers[1].addr.unwrap();
    assert_ne!(calculator, factor);

    let (status, body) = send_message(calculator, PASSWORD, "What is 10 * 11?").await;
    assert_eq!(status, 200);
    assert!(body["result"]["parts"][0]["text"].as_str().unwrap().contains("110"));

    let (status, body) = send_message(factor, PASSWORD, "factors of 12").await;
    assert_eq!(status, 200);
    assert_eq!(
        body["result"]["parts"][0]["text"],
        "The factors of 12 are: 1, 2, 3, 4, 6, 12"
    );

    let (status, _) = send_message(calculator, "wrong", "What is 10 * 11?").await;
    assert_eq!(status, 401);

    let card: Value = reqwest::get(format!("http://{}/.well-known/agent-card.json", factor))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(card["name"], "Factor Agent");

    let (code, supervisor) = harness.interrupt_and_join().await;
    assert_eq!(code, exit::SUCCESS);
    assert_eq!(supervisor.status(), SupervisorStatus::Stopped);
    assert!(supervisor
        .workers()
        .iter()
        .all(|w| w.exit == Some(WorkerExit::Success)));

    // Listeners are gone once the supervisor returns.
    assert!(reqwest::get(format!("http://{}/health", calculator)).await.is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn test_killed_worker_leaves_other_serving() {
    let harness = Harness::start(test_config(both_agents()));
    let workers = harness.wait_running().await;
    let calculator = workers[0].addr.unwrap();

    kill_pid(workers[1].pid.unwrap());
    let workers = harness
        .wait_for("factor exit", |s| s.workers()[1].exit.is_some())
        .await;
    assert_eq!(workers[1].exit, Some(WorkerExit::Failed(None)));
    assert_eq!(workers[1].restarts, 0);
    assert_eq!(harness.supervisor.status(), SupervisorStatus::Running);

    let (status, body) = send_message(calculator, PASSWORD, "2 + 3").await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["parts"][0]["text"], "2 + 3 = 5");

    // A crashed worker makes the overall run unsuccessful.
    let (code, supervisor) = harness.interrupt_and_join().await;
    assert_eq!(code, exit::FAILURE);
    assert_eq!(supervisor.workers()[0].exit, Some(WorkerExit::Success));
}

#[cfg(unix)]
#[tokio::test]
async fn test_on_failure_policy_restarts_worker() {
    let config = SupervisorConfig {
        restart_policy: RestartPolicy::OnFailure,
        max_restarts: 1,
        ..test_config(vec![EndpointDescriptor::new(AgentKind::Factor, 0)])
    };
    let harness = Harness::start(config);
    let first = harness.wait_running().await;
    kill_pid(first[0].pid.unwrap());

    let workers = harness
        .wait_for("restart", |s| {
            let workers = s.workers();
            let w = &workers[0];
            w.restarts == 1 && w.addr.is_some() && w.exit.is_none()
        })
        .await;
    assert_ne!(workers[0].pid, first[0].pid);

    let (status, _) = send_message(workers[0].addr.unwrap(), PASSWORD, "factors of 7").await;
    assert_eq!(status, 200);

    // Restart budget spent: the next crash is only recorded.
    kill_pid(workers[0].pid.unwrap());
    let workers = harness
        .wait_for("second exit", |s| s.workers()[0].exit.is_some())
        .await;
    assert_eq!(workers[0].restarts, 1);

    let code = timeout(Duration::from_secs(30), harness.task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(code, exit::FAILURE);
}

#[tokio::test]
async fn test_bind_failure_aborts_startup() {
    let taken = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let harness = Harness::start(test_config(vec![
        EndpointDescriptor::new(AgentKind::Calculator, 0),
        EndpointDescriptor::new(AgentKind::Factor, port),
    ]));
    let code = timeout(Duration::from_secs(30), harness.task)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(code, exit::FAILURE);
    let supervisor = harness.supervisor;
    assert_eq!(supervisor.status(), SupervisorStatus::Stopped);
    let workers = supervisor.workers();
    assert_eq!(workers[1].exit, Some(WorkerExit::Failed(Some(exit::CONFIG))));
    // The healthy worker was stopped, not left behind.
    assert!(workers[0].exit.is_some());
    drop(taken);
}

#[tokio::test]
async fn test_worker_binary_bind_conflict_exits_with_config_code() {
    let taken = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let status = tokio::process::Command::new(program())
        .args(["calculator", "--port", &port.to_string()])
        .env("API_HOST", "127.0.0.1")
        .env("API_PASSWORD", PASSWORD)
        .status()
        .await
        .unwrap();

    assert_eq!(status.code(), Some(exit::CONFIG));
    drop(taken);
}

#[tokio::test]
async fn test_worker_binary_rejects_invalid_config() {
    let status = tokio::process::Command::new(program())
        .args(["factor", "--port", "0"])
        .env("API_HOST", "127.0.0.1")
        .env("REQUEST_TIMEOUT_SECS", "soon")
        .status()
        .await
        .unwrap();

    assert_eq!(status.code(), Some(exit::CONFIG));
}

#[cfg(unix)]
#[tokio::test]
async fn test_binary_stops_cleanly_on_sigint() {
    let mut supervisor = SupervisorBinary::spawn(5);
    supervisor.wait_for_line("All workers ready").await;

    let (status, body) = send_message(supervisor.calculator, PASSWORD, "6 * 7").await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["parts"][0]["text"], "6 * 7 = 42");

    supervisor.signal("INT");
    assert_eq!(supervisor.exit_code().await, Some(exit::SUCCESS));
}

#[cfg(unix)]
#[tokio::test]
async fn test_binary_second_sigterm_kills_workers() {
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    let mut supervisor = SupervisorBinary::spawn(60);
    supervisor.wait_for_line("All workers ready").await;

    // A request whose body never completes keeps the calculator draining.
    let mut stalled = TcpStream::connect(supervisor.calculator).await.unwrap();
    let head = format!(
        "POST / HTTP/1.1\r\nHost: {}\r\nAuthorization: Bearer {}\r\n\
         Content-Type: application/json\r\nContent-Length: 100\r\n\r\n{{",
        supervisor.calculator, PASSWORD
    );
    stalled.write_all(head.as_bytes()).await.unwrap();
    sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    supervisor.signal("TERM");
    supervisor.wait_for_line("Shutting down").await;
    sleep(Duration::from_millis(200)).await;
    supervisor.signal("TERM");

    assert_eq!(supervisor.exit_code().await, Some(exit::FAILURE));
    // Killed, not drained for the full grace period.
    assert!(started.elapsed() < Duration::from_secs(30));
    drop(stalled);
}
