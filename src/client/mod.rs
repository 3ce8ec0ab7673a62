//! MCP client
//!
//! `Client` drives one connection: it performs the handshake, correlates
//! responses with callers by request id and answers the few requests a server
//! may send back.

pub mod transports;

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicI64, Ordering},
        Arc,
    },
    time::Duration,
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rust_mcp_sdk::schema::{
    CallToolResult, ContentBlock, InitializeResult, ListResourceTemplatesResult,
    ListResourcesResult, ListToolsResult, ReadResourceContent, ReadResourceResult, Resource,
    ResourceTemplate, Tool,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot, Mutex},
    task::JoinHandle,
    time::timeout,
};
use tracing::{debug, info, warn};

use crate::domain::resources::ResourceContent;
use crate::mcp::{
    rpc::{json_rpc_error, json_rpc_result, METHOD_NOT_FOUND},
    server::LATEST_PROTOCOL_VERSION,
};

pub use transports::{ClientTransport, InProcessTransport, StdioTransport, TransportError};

type PendingResponses = Arc<Mutex<HashMap<i64, oneshot::Sender<Result<Value, ClientError>>>>>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("connection closed")]
    Closed,
    #[error("`{method}` timed out after {after:?}")]
    Timeout { method: String, after: Duration },
    #[error("server returned error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_name: String,
    pub client_version: String,
    pub protocol_version: String,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_name: env!("CARGO_PKG_NAME").to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// One entry of a `resources/read` answer, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadContent {
    pub uri: String,
    pub mime_type: Option<String>,
    pub content: ResourceContent,
}

impl TryFrom<ReadResourceContent> for ReadContent {
    type Error = ClientError;

    fn try_from(entry: ReadResourceContent) -> Result<Self, Self::Error> {
        match entry {
            ReadResourceContent::TextResourceContents(text) => Ok(Self {
                uri: text.uri,
                mime_type: text.mime_type,
                content: ResourceContent::Text(text.text),
            }),
            ReadResourceContent::BlobResourceContents(blob) => {
                let bytes = STANDARD
                    .decode(&blob.blob)
                    .map_err(|err| ClientError::InvalidResponse(format!("{}: {err}", blob.uri)))?;
                Ok(Self {
                    uri: blob.uri,
                    mime_type: blob.mime_type,
                    content: ResourceContent::Binary(bytes),
                })
            }
        }
    }
}

/// Concatenated text of the text blocks in a tool result.
pub fn tool_result_text(result: &CallToolResult) -> String {
    result
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::TextContent(text) => Some(text.text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Request plumbing shared by the handshake and the public calls.
struct Connection {
    config: ClientConfig,
    outgoing: mpsc::Sender<Value>,
    pending: PendingResponses,
    closed: Arc<AtomicBool>,
    next_id: AtomicI64,
}

pub struct Client {
    connection: Connection,
    server_info: InitializeResult,
    transport: Mutex<Box<dyn ClientTransport>>,
    reader: JoinHandle<()>,
}

impl Client {
    /// Opens `transport` and completes the initialize handshake.
    pub async fn connect<T>(transport: T, config: ClientConfig) -> Result<Self, ClientError>
    where
        T: ClientTransport + 'static,
    {
        let mut transport: Box<dyn ClientTransport> = Box::new(transport);
        let channel = transport.connect().await?;

        let pending: PendingResponses = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_loop(
            channel.incoming,
            Arc::clone(&pending),
            Arc::clone(&closed),
            channel.outgoing.clone(),
        ));

        let connection = Connection {
            config,
            outgoing: channel.outgoing,
            pending,
            closed,
            next_id: AtomicI64::new(1),
        };

        let server_info = match connection.initialize().await {
            Ok(server_info) => server_info,
            Err(err) => {
                reader.abort();
                if let Err(close_err) = transport.close().await {
                    debug!(error = %close_err, "closing transport after failed handshake");
                }
                return Err(err);
            }
        };
        info!(
            server = %server_info.server_info.name,
            protocol_version = %server_info.protocol_version,
            "client connected"
        );

        Ok(Self {
            connection,
            server_info,
            transport: Mutex::new(transport),
            reader,
        })
    }

    /// The server's answer to `initialize`.
    pub fn server_info(&self) -> &InitializeResult {
        &self.server_info
    }

    pub async fn ping(&self) -> Result<(), ClientError> {
        self.connection.request("ping", None).await.map(|_| ())
    }

    pub async fn list_resources(&self) -> Result<Vec<Resource>, ClientError> {
        let result: ListResourcesResult =
            decode(self.connection.request("resources/list", None).await?)?;
        Ok(result.resources)
    }

    pub async fn list_resource_templates(&self) -> Result<Vec<ResourceTemplate>, ClientError> {
        let result: ListResourceTemplatesResult =
            decode(self.connection.request("resources/templates/list", None).await?)?;
        Ok(result.resource_templates)
    }

    pub async fn read_resource(&self, uri: &str) -> Result<Vec<ReadContent>, ClientError> {
        let result: ReadResourceResult = decode(
            self.connection
                .request("resources/read", Some(json!({ "uri": uri })))
                .await?,
        )?;

        result
            .contents
            .into_iter()
            .map(ReadContent::try_from)
            .collect()
    }

    pub async fn list_tools(&self) -> Result<Vec<Tool>, ClientError> {
        let result: ListToolsResult = decode(self.connection.request("tools/list", None).await?)?;
        Ok(result.tools)
    }

    /// Tool-reported failures come back as `Ok` with `is_error` set.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<CallToolResult, ClientError> {
        decode(
            self.connection
                .request(
                    "tools/call",
                    Some(json!({ "name": name, "arguments": arguments })),
                )
                .await?,
        )
    }

    pub async fn close(self) -> Result<(), ClientError> {
        self.reader.abort();
        fail_pending(&self.connection.pending, &self.connection.closed).await;
        self.transport.lock().await.close().await?;
        info!("client closed");
        Ok(())
    }
}

impl Connection {
    async fn initialize(&self) -> Result<InitializeResult, ClientError> {
        let result = self
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": self.config.protocol_version,
                    "capabilities": {},
                    "clientInfo": {
                        "name": self.config.client_name,
                        "version": self.config.client_version,
                    }
                })),
            )
            .await?;
        let info: InitializeResult = decode(result)?;
        self.notify("notifications/initialized", None).await?;
        Ok(info)
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            if self.closed.load(Ordering::Acquire) {
                return Err(ClientError::Closed);
            }
            pending.insert(id, sender);
        }

        let mut message = json!({ "jsonrpc": "2.0", "id": id, "method": method });
        if let Some(params) = params {
            message["params"] = params;
        }

        if self.outgoing.send(message).await.is_err() {
            self.pending.lock().await.remove(&id);
            return Err(ClientError::Closed);
        }

        match timeout(self.config.request_timeout, receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ClientError::Closed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(ClientError::Timeout {
                    method: method.to_string(),
                    after: self.config.request_timeout,
                })
            }
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), ClientError> {
        let mut message = json!({ "jsonrpc": "2.0", "method": method });
        if let Some(params) = params {
            message["params"] = params;
        }
        self.outgoing
            .send(message)
            .await
            .map_err(|_| ClientError::Closed)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.connection.config)
            .field("server", &self.server_info.server_info.name)
            .finish_non_exhaustive()
    }
}

async fn read_loop(
    mut incoming: mpsc::Receiver<Value>,
    pending: PendingResponses,
    closed: Arc<AtomicBool>,
    outgoing: mpsc::Sender<Value>,
) {
    while let Some(message) = incoming.recv().await {
        route_incoming(message, &pending, &outgoing).await;
    }
    debug!("transport stopped delivering messages");
    fail_pending(&pending, &closed).await;
}

async fn route_incoming(
    message: Value,
    pending: &PendingResponses,
    outgoing: &mpsc::Sender<Value>,
) {
    let id = message.get("id").cloned();

    if let Some(method) = message.get("method").and_then(Value::as_str) {
        let Some(id) = id else {
            debug!(method, "server notification");
            return;
        };
        let reply = if method == "ping" {
            json_rpc_result(Some(id), json!({}))
        } else {
            json_rpc_error(Some(id), METHOD_NOT_FOUND, "Method not found")
        };
        if outgoing.send(reply).await.is_err() {
            warn!(method, "could not answer server request");
        }
        return;
    }

    let Some(request_id) = id.as_ref().and_then(Value::as_i64) else {
        warn!(?id, "dropping response with unknown id");
        return;
    };
    let Some(sender) = pending.lock().await.remove(&request_id) else {
        warn!(id = request_id, "dropping response for unknown request");
        return;
    };

    let outcome = match (message.get("result"), message.get("error")) {
        (Some(result), _) => Ok(result.clone()),
        (None, Some(error)) => Err(ClientError::Rpc {
            code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            data: error.get("data").cloned(),
        }),
        (None, None) => Err(ClientError::InvalidResponse(
            "response has neither result nor error".to_string(),
        )),
    };
    let _ = sender.send(outcome);
}

async fn fail_pending(pending: &PendingResponses, closed: &AtomicBool) {
    let mut pending = pending.lock().await;
    closed.store(true, Ordering::Release);
    for (_, sender) in pending.drain() {
        let _ = sender.send(Err(ClientError::Closed));
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ClientError> {
    serde_json::from_value(value).map_err(|err| ClientError::InvalidResponse(err.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_mcp_sdk::macros;
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::domain::{
        errors::{ResourceError, ToolError},
        resource_types::BinaryResource,
        resources::ResourceMeta,
        templates::{ResourceTemplate as UriTemplate, TemplateParams},
    };
    use crate::server::McpServer;

    #[macros::mcp_tool(name = "divide", description = "Divide two numbers")]
    #[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
    pub struct DivideTool {
        pub dividend: f64,
        pub divisor: f64,
    }

    fn server() -> Arc<McpServer> {
        let mut server = McpServer::new("client-test").with_version("9.9.9");
        server
            .resource("memo://greeting", || async { Ok::<_, ResourceError>("hello") })
            .expect("valid uri");
        server.add_resource(BinaryResource::new(
            ResourceMeta::builder().uri("memo://bytes"),
            vec![0_u8, 159, 146, 150],
        )
        .expect("binary resource"));
        server.add_template(
            UriTemplate::new("memo://notes/{topic}", |params: TemplateParams| async move {
                Ok::<_, ResourceError>(format!("notes on {}", params["topic"]))
            })
            .expect("valid template")
            .with_description("Notes by topic"),
        );
        server.tool(DivideTool::tool(), |args: DivideTool| async move {
            if args.divisor == 0.0 {
                return Err(ToolError::validation("divisor must not be zero"));
            }
            Ok(args.dividend / args.divisor)
        });
        Arc::new(server)
    }

    async fn connect() -> Client {
        Client::connect(InProcessTransport::new(server()), ClientConfig::default())
            .await
            .expect("connect")
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    #[tokio::test]
    async fn handshake_reports_server_identity() {
        let client = connect().await;
        assert!(client.server_info().capabilities.tools.is_some());
        assert_eq!(client.server_info().server_info.name, "client-test");
        assert_eq!(client.server_info().server_info.version, "9.9.9");
        assert_eq!(client.server_info().protocol_version, LATEST_PROTOCOL_VERSION);
        client.ping().await.expect("ping");
        client.close().await.expect("close");
    }

    #[tokio::test]
    async fn lists_and_reads_resources() {
        let client = connect().await;

        let resources = client.list_resources().await.expect("list");
        let uris: Vec<_> = resources.iter().map(|r| r.uri.as_str()).collect();
        assert_eq!(uris, ["memo://greeting", "memo://bytes"]);
        assert_eq!(resources[0].name, "memo://greeting");

        let text = client.read_resource("memo://greeting").await.expect("read");
        assert_eq!(text[0].content, ResourceContent::Text("hello".to_string()));

        let bytes = client.read_resource("memo://bytes").await.expect("read");
        assert_eq!(bytes[0].content, ResourceContent::Binary(vec![0, 159, 146, 150]));
        assert_eq!(bytes[0].mime_type.as_deref(), Some("application/octet-stream"));
    }

    #[tokio::test]
    async fn lists_and_reads_templates() {
        let client = connect().await;

        let templates = client.list_resource_templates().await.expect("list templates");
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].uri_template, "memo://notes/{topic}");
        assert_eq!(templates[0].description.as_deref(), Some("Notes by topic"));

        let notes = client.read_resource("memo://notes/rust").await.expect("read");
        assert_eq!(notes[0].uri, "memo://notes/rust");
        assert_eq!(notes[0].content, ResourceContent::Text("notes on rust".to_string()));
    }

    #[tokio::test]
    async fn unknown_resource_is_an_rpc_error() {
        let client = connect().await;
        let err = client
            .read_resource("memo://missing")
            .await
            .expect_err("unknown resource");
        match err {
            ClientError::Rpc { code, data, .. } => {
                assert_eq!(code, i64::from(METHOD_NOT_FOUND));
                assert_eq!(
                    data.and_then(|data| data.get("code").cloned()),
                    Some(json!("resource_not_found"))
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn calls_tools_and_surfaces_tool_errors() {
        let client = connect().await;

        let tools = client.list_tools().await.expect("list tools");
        assert_eq!(tools[0].name, "divide");
        assert_eq!(tools[0].input_schema.type_(), "object");
        assert!(tools[0].input_schema.required.contains(&"divisor".to_string()));

        let outcome = client
            .call_tool("divide", args(json!({ "dividend": 9.0, "divisor": 3.0 })))
            .await
            .expect("call");
        assert_ne!(outcome.is_error, Some(true));
        assert_eq!(tool_result_text(&outcome), "3.0");

        let failed = client
            .call_tool("divide", args(json!({ "dividend": 1.0, "divisor": 0.0 })))
            .await
            .expect("call");
        assert_eq!(failed.is_error, Some(true));
        assert!(tool_result_text(&failed).contains("divisor must not be zero"));
    }

    #[tokio::test]
    async fn requests_fail_after_transport_closes() {
        let client = connect().await;
        client.transport.lock().await.close().await.expect("close transport");

        let err = client.ping().await.expect_err("closed");
        assert!(matches!(err, ClientError::Closed));
    }

    #[tokio::test]
    async fn answers_server_ping_and_rejects_other_requests() {
        let pending: PendingResponses = Arc::new(Mutex::new(HashMap::new()));
        let (tx, mut rx) = mpsc::channel(4);

        route_incoming(
            json!({ "jsonrpc": "2.0", "id": "s-1", "method": "ping" }),
            &pending,
            &tx,
        )
        .await;
        let reply = rx.recv().await.expect("ping reply");
        assert_eq!(reply["id"], "s-1");
        assert!(reply["result"].is_object());

        route_incoming(
            json!({ "jsonrpc": "2.0", "id": 5, "method": "sampling/createMessage" }),
            &pending,
            &tx,
        )
        .await;
        let reply = rx.recv().await.expect("error reply");
        assert_eq!(reply["error"]["code"], METHOD_NOT_FOUND);
    }
}
