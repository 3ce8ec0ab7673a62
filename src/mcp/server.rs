//! The central Model Context Protocol engine
//!
//! Provides the primary MCP JSON-RPC decoding, method execution routing, capabilities
//! negotiation (`initialize`), and session lifecycle enforcement for stateful transports.

use rust_mcp_sdk::schema::{
    CallToolRequest, Implementation, InitializeRequest, InitializeResult, JsonrpcMessage,
    JsonrpcRequest, ListResourcesRequest, ListToolsRequest, PingRequest, ReadResourceRequest,
    ServerCapabilities, ServerCapabilitiesResources, ServerCapabilitiesTools,
};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::errors::AppError;
use crate::mcp::{
    methods::{
        handle_resources_read, handle_tools_call, list_resource_templates, list_resources,
        list_tools,
    },
    rpc::{
        app_error_to_json_rpc, is_json_rpc_error, json_rpc_error, json_rpc_result,
        request_id_to_value, serialized_result, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
        NOT_INITIALIZED,
    },
    session::{Session, SessionRejection},
};
use crate::server::McpServer;

pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2025-06-18", "2025-03-26", "2024-11-05"];
pub const LATEST_PROTOCOL_VERSION: &str = SUPPORTED_PROTOCOL_VERSIONS[0];

/// Handles a decoded payload that may be a single message or a batch.
/// Batch entries are handled in order; notifications leave no entry and a
/// batch made only of notifications yields `None`.
pub async fn handle_json_rpc_payload(
    server: &McpServer,
    session: Option<&Session>,
    payload: Value,
) -> Option<Value> {
    let Value::Array(batch) = payload else {
        return handle_json_rpc_value(server, session, payload).await;
    };

    if batch.is_empty() {
        return Some(Value::Array(vec![json_rpc_error(
            None,
            INVALID_REQUEST,
            "Invalid Request",
        )]));
    }

    let mut responses = Vec::new();
    for item in batch {
        if let Some(response) = handle_json_rpc_value(server, session, item).await {
            responses.push(response);
        }
    }

    (!responses.is_empty()).then_some(Value::Array(responses))
}

/// Handles one decoded JSON-RPC message. Returns `None` when nothing must be
/// sent back (notifications and stray responses).
pub async fn handle_json_rpc_value(
    server: &McpServer,
    session: Option<&Session>,
    payload: Value,
) -> Option<Value> {
    if !payload.is_object() {
        return Some(json_rpc_error(None, INVALID_REQUEST, "Invalid Request"));
    }

    let request_id = payload.get("id").cloned();
    let parsed: JsonrpcMessage = match serde_json::from_value(payload) {
        Ok(message) => message,
        Err(_) => return Some(json_rpc_error(request_id, INVALID_REQUEST, "Invalid Request")),
    };

    match parsed {
        JsonrpcMessage::Request(request) => {
            if let Err(error_response) = validate_request_shape(&request) {
                return Some(error_response);
            }

            let request_id = request_id_to_value(request.id);
            if request.method.trim().is_empty() {
                return Some(json_rpc_error(Some(request_id), INVALID_REQUEST, "Invalid Request"));
            }

            if let Some(session) = session {
                match session.admit(&request.method) {
                    Ok(()) => {}
                    Err(SessionRejection::NotInitialized) => {
                        return Some(json_rpc_error(
                            Some(request_id),
                            NOT_INITIALIZED,
                            "Server not initialized",
                        ))
                    }
                    Err(SessionRejection::AlreadyInitialized) => {
                        return Some(already_initialized(Some(request_id)))
                    }
                    Err(SessionRejection::Closed) => {
                        return Some(json_rpc_error(
                            Some(request_id),
                            INVALID_REQUEST,
                            "Session closed",
                        ))
                    }
                }
            }

            Some(
                handle_json_rpc_request(
                    server,
                    session,
                    Some(request_id),
                    request.method,
                    request.params.map(Value::Object),
                )
                .await,
            )
        }
        JsonrpcMessage::Notification(notification) => {
            handle_notification(session, &notification.method);
            None
        }
        JsonrpcMessage::ResultResponse(_) | JsonrpcMessage::ErrorResponse(_) => {
            debug!(id = ?request_id, "ignoring response message sent to server");
            None
        }
    }
}

pub fn validate_request_shape(request: &JsonrpcRequest) -> Result<(), Value> {
    let request_id = Some(request_id_to_value(request.id.clone()));
    let payload = serde_json::to_value(request)
        .map_err(|_| json_rpc_error(request_id.clone(), INVALID_REQUEST, "Invalid Request"))?;

    let valid = match request.method.as_str() {
        "tools/call" => serde_json::from_value::<CallToolRequest>(payload).is_ok(),
        "resources/read" => serde_json::from_value::<ReadResourceRequest>(payload).is_ok(),
        "tools/list" => serde_json::from_value::<ListToolsRequest>(payload).is_ok(),
        "resources/list" => serde_json::from_value::<ListResourcesRequest>(payload).is_ok(),
        "ping" => serde_json::from_value::<PingRequest>(payload).is_ok(),
        "initialize" => serde_json::from_value::<InitializeRequest>(payload).is_ok(),
        _ => true,
    };

    if valid {
        Ok(())
    } else {
        Err(json_rpc_error(request_id, INVALID_PARAMS, "Invalid params"))
    }
}

pub async fn handle_json_rpc_request(
    server: &McpServer,
    session: Option<&Session>,
    id: Option<Value>,
    method: String,
    params: Option<Value>,
) -> Value {
    let audit_params = redact_audit_params(params.as_ref());

    let response = match method.as_str() {
        "initialize" => match negotiate_protocol_version(params.as_ref()) {
            Ok(protocol_version) => match session.map(|s| s.mark_initializing(protocol_version)) {
                Some(Err(SessionRejection::AlreadyInitialized)) => already_initialized(id),
                Some(Err(_)) => json_rpc_error(id, INVALID_REQUEST, "Session closed"),
                Some(Ok(())) | None => {
                    serialized_result(id, &initialize_result(server, protocol_version))
                }
            },
            Err(err) => app_error_to_json_rpc(id, err),
        },
        "ping" => json_rpc_result(id, json!({})),
        "tools/list" => list_tools(server, id),
        "tools/call" => handle_tools_call(server, id, params).await,
        "resources/list" => list_resources(server, id),
        "resources/templates/list" => list_resource_templates(server, id),
        "resources/read" => handle_resources_read(server, id, params).await,
        _ => json_rpc_error(id, METHOD_NOT_FOUND, "Method not found"),
    };

    info!(
        method = %method,
        params = %audit_params,
        outcome = if is_json_rpc_error(&response) { "failure" } else { "success" },
        "mcp action audited"
    );

    response
}

fn already_initialized(id: Option<Value>) -> Value {
    json_rpc_error(id, INVALID_REQUEST, "Server already initialized")
}

fn handle_notification(session: Option<&Session>, method: &str) {
    match method {
        "notifications/initialized" => {
            if let Some(session) = session {
                session.mark_ready();
            }
            info!("client completed initialization");
        }
        "notifications/cancelled" => debug!("client cancelled a request"),
        other => debug!(method = other, "ignoring notification"),
    }
}

fn initialize_result(server: &McpServer, protocol_version: &str) -> InitializeResult {
    InitializeResult {
        server_info: Implementation {
            name: server.name().to_string(),
            version: server.version().to_string(),
            title: None,
            description: None,
            icons: vec![],
            website_url: None,
        },
        capabilities: ServerCapabilities {
            tools: Some(ServerCapabilitiesTools {
                list_changed: Some(false),
            }),
            resources: Some(ServerCapabilitiesResources {
                subscribe: Some(false),
                list_changed: Some(false),
            }),
            prompts: None,
            ..Default::default()
        },
        protocol_version: protocol_version.to_string(),
        instructions: server.instructions().map(str::to_string),
        meta: None,
    }
}

/// Echoes a supported offered version, otherwise answers with the latest one.
pub fn negotiate_protocol_version(params: Option<&Value>) -> Result<&'static str, AppError> {
    let offered_version = params
        .and_then(Value::as_object)
        .and_then(|object| object.get("protocolVersion"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|version| !version.is_empty())
        .ok_or_else(|| {
            AppError::bad_request(
                "invalid_protocol_version",
                "initialize params.protocolVersion is required",
            )
        })?;

    let negotiated = SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .find(|supported| **supported == offered_version)
        .copied()
        .unwrap_or(LATEST_PROTOCOL_VERSION);

    if negotiated != offered_version {
        info!(
            offered = offered_version,
            negotiated, "client offered unsupported protocol version"
        );
    }

    Ok(negotiated)
}

pub fn redact_audit_params(params: Option<&Value>) -> Value {
    params.map(redact_audit_value).unwrap_or(Value::Null)
}

pub fn redact_audit_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| {
                    if is_sensitive_key(key) {
                        (key.clone(), Value::String("[REDACTED]".to_string()))
                    } else {
                        (key.clone(), redact_audit_value(item))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_audit_value).collect()),
        _ => value.clone(),
    }
}

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.trim().to_ascii_lowercase();
    matches!(
        normalized.as_str(),
        "authorization" | "bearer" | "api_key" | "apikey"
    ) || normalized.contains("token")
        || normalized.contains("secret")
        || normalized.contains("password")
        || normalized.contains("credential")
}
