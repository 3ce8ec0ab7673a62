//! Client transports
//!
//! A transport turns a connection into a pair of message channels. The client
//! only ever sees decoded JSON values; framing stays inside the transport.

use std::{collections::HashMap, path::PathBuf, process::Stdio, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, Command},
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::mcp::{server::handle_json_rpc_value, session::Session};
use crate::server::McpServer;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is already connected")]
    AlreadyConnected,
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("child process did not expose {0}")]
    MissingPipe(&'static str),
    #[error("transport i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Both halves of an open connection.
#[derive(Debug)]
pub struct TransportChannel {
    pub outgoing: mpsc::Sender<Value>,
    pub incoming: mpsc::Receiver<Value>,
}

#[async_trait]
pub trait ClientTransport: Send + Sync {
    async fn connect(&mut self) -> Result<TransportChannel, TransportError>;
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Talks to a server living in the same process, with its own session.
pub struct InProcessTransport {
    server: Arc<McpServer>,
    task: Option<JoinHandle<()>>,
}

impl InProcessTransport {
    pub fn new(server: Arc<McpServer>) -> Self {
        Self { server, task: None }
    }
}

#[async_trait]
impl ClientTransport for InProcessTransport {
    async fn connect(&mut self) -> Result<TransportChannel, TransportError> {
        if self.task.is_some() {
            return Err(TransportError::AlreadyConnected);
        }

        let (client_tx, mut server_rx) = mpsc::channel::<Value>(CHANNEL_CAPACITY);
        let (server_tx, client_rx) = mpsc::channel::<Value>(CHANNEL_CAPACITY);
        let server = Arc::clone(&self.server);

        self.task = Some(tokio::spawn(async move {
            let session = Session::new();
            // Messages are handled in arrival order so the handshake cannot race.
            while let Some(message) = server_rx.recv().await {
                if let Some(response) =
                    handle_json_rpc_value(&server, Some(&session), message).await
                {
                    if server_tx.send(response).await.is_err() {
                        break;
                    }
                }
            }
            session.close();
            debug!("in-process session ended");
        }));

        Ok(TransportChannel {
            outgoing: client_tx,
            incoming: client_rx,
        })
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }
}

/// Launches a server as a child process and speaks line-delimited JSON over
/// its stdin and stdout. The child's stderr is inherited.
#[derive(Debug)]
pub struct StdioTransport {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,
    child: Option<Child>,
    tasks: Vec<JoinHandle<()>>,
}

impl StdioTransport {
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: HashMap::new(),
            cwd: None,
            child: None,
            tasks: Vec::new(),
        }
    }

    pub fn python(script: &str) -> Self {
        Self::new("python", [script])
    }

    pub fn node(script: &str) -> Self {
        Self::new("node", [script])
    }

    pub fn uv_run(script: &str) -> Self {
        Self::new("uv", ["run", script])
    }

    pub fn uvx(tool: &str) -> Self {
        Self::new("uvx", [tool])
    }

    /// `-y` skips the install prompt so the child never blocks on stdin.
    pub fn npx(package: &str) -> Self {
        Self::new("npx", ["-y", package])
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl ClientTransport for StdioTransport {
    async fn connect(&mut self) -> Result<TransportChannel, TransportError> {
        if self.child.is_some() {
            return Err(TransportError::AlreadyConnected);
        }

        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|source| TransportError::Spawn {
            command: self.command.clone(),
            source,
        })?;
        let mut stdin = child.stdin.take().ok_or(TransportError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(TransportError::MissingPipe("stdout"))?;
        info!(command = %self.command, args = ?self.args, "spawned stdio server");

        let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<Value>(CHANNEL_CAPACITY);
        let (incoming_tx, incoming_rx) = mpsc::channel::<Value>(CHANNEL_CAPACITY);

        let writer = tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                let mut line = message.to_string();
                line.push('\n');
                if let Err(err) = stdin.write_all(line.as_bytes()).await {
                    warn!(error = %err, "failed writing to child stdin");
                    break;
                }
                if let Err(err) = stdin.flush().await {
                    warn!(error = %err, "failed flushing child stdin");
                    break;
                }
            }
        });

        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<Value>(line) {
                            Ok(message) => {
                                if incoming_tx.send(message).await.is_err() {
                                    break;
                                }
                            }
                            Err(err) => warn!(error = %err, "ignoring non-JSON line from child"),
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!(error = %err, "failed reading child stdout");
                        break;
                    }
                }
            }
            debug!("child stdout closed");
        });

        self.child = Some(child);
        self.tasks = vec![writer, reader];

        Ok(TransportChannel {
            outgoing: outgoing_tx,
            incoming: incoming_rx,
        })
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some(mut child) = self.child.take() {
            if child.try_wait()?.is_none() {
                child.kill().await?;
            }
            info!(command = %self.command, "stopped stdio server");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::errors::ResourceError;

    #[test]
    fn launcher_constructors_build_expected_commands() {
        let uv = StdioTransport::uv_run("server.py");
        assert_eq!(uv.command(), "uv");
        assert_eq!(uv.args(), ["run", "server.py"]);

        let npx = StdioTransport::npx("@acme/server");
        assert_eq!(npx.command(), "npx");
        assert_eq!(npx.args(), ["-y", "@acme/server"]);

        assert_eq!(StdioTransport::python("s.py").command(), "python");
        assert_eq!(StdioTransport::node("s.js").args(), ["s.js"]);
        assert_eq!(StdioTransport::uvx("tool").args(), ["tool"]);
    }

    #[tokio::test]
    async fn in_process_transport_answers_ping() {
        let mut server = McpServer::new("in-process");
        server
            .resource("memo://a", || async { Ok::<_, ResourceError>("a") })
            .expect("valid uri");
        let mut transport = InProcessTransport::new(Arc::new(server));

        let mut channel = transport.connect().await.expect("connect");
        channel
            .outgoing
            .send(json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" }))
            .await
            .expect("send");
        let response = channel.incoming.recv().await.expect("response");
        assert_eq!(response["id"], 1);
        assert!(response["result"].is_object());

        assert!(matches!(
            transport.connect().await,
            Err(TransportError::AlreadyConnected)
        ));
        transport.close().await.expect("close");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdio_transport_frames_lines() {
        let mut transport = StdioTransport::new("cat", Vec::<String>::new());
        let mut channel = transport.connect().await.expect("spawn cat");

        let message = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
        channel.outgoing.send(message.clone()).await.expect("send");
        assert_eq!(channel.incoming.recv().await, Some(message));

        transport.close().await.expect("close");
    }

    #[tokio::test]
    async fn missing_command_fails_to_spawn() {
        let mut transport = StdioTransport::new("definitely-not-a-real-binary-42", ["x"]);
        let err = transport.connect().await.expect_err("spawn should fail");
        assert!(matches!(err, TransportError::Spawn { .. }));
    }
}
