//! Resource and tool method handlers
//!
//! Each handler decodes its params, calls into the `McpServer` registry and
//! formats the JSON-RPC response.

use rust_mcp_sdk::schema::{
    CallToolRequestParams, CallToolResult, ContentBlock, ListResourceTemplatesResult,
    ListResourcesResult, ListToolsResult, ReadResourceRequestParams, ReadResourceResult,
    TextContent,
};
use serde_json::{json, Value};
use tracing::warn;

use crate::domain::{errors::ToolError, tools::render_tool_output};
use crate::mcp::rpc::{
    app_error_to_json_rpc, json_rpc_error, serialized_result, INVALID_PARAMS,
};
use crate::server::McpServer;

pub fn list_resources(server: &McpServer, id: Option<Value>) -> Value {
    serialized_result(
        id,
        &ListResourcesResult {
            meta: None,
            next_cursor: None,
            resources: server
                .list_resources()
                .iter()
                .map(|resource| resource.meta().to_descriptor())
                .collect(),
        },
    )
}

pub fn list_resource_templates(server: &McpServer, id: Option<Value>) -> Value {
    serialized_result(
        id,
        &ListResourceTemplatesResult {
            meta: None,
            next_cursor: None,
            resource_templates: server
                .list_templates()
                .iter()
                .map(|template| template.to_descriptor())
                .collect(),
        },
    )
}

pub fn list_tools(server: &McpServer, id: Option<Value>) -> Value {
    serialized_result(
        id,
        &ListToolsResult {
            meta: None,
            next_cursor: None,
            tools: server.list_tools(),
        },
    )
}

pub async fn handle_resources_read(
    server: &McpServer,
    id: Option<Value>,
    params: Option<Value>,
) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
    };

    let resource_read: ReadResourceRequestParams = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
    };

    match server.resolve_resource(&resource_read.uri).await {
        Ok(resolved) => serialized_result(
            id,
            &ReadResourceResult {
                contents: vec![resolved
                    .content
                    .into_read_content(&resolved.uri, &resolved.mime_type)],
                meta: None,
            },
        ),
        Err(err) => app_error_to_json_rpc(id, err.into()),
    }
}

pub async fn handle_tools_call(
    server: &McpServer,
    id: Option<Value>,
    params: Option<Value>,
) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
    };

    let tool_call: CallToolRequestParams = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
    };

    let arguments = tool_call.arguments.unwrap_or_default();
    match server.call_tool(&tool_call.name, arguments).await {
        Ok(output) => serialized_result(id, &tool_result(&output)),
        Err(err @ (ToolError::Validation(_) | ToolError::Execution(_))) => {
            warn!(tool = %tool_call.name, error = %err, "tool reported an error");
            serialized_result(id, &tool_error_result(&err))
        }
        Err(err) => app_error_to_json_rpc(id, err.into()),
    }
}

fn tool_result(output: &Value) -> CallToolResult {
    CallToolResult {
        content: vec![ContentBlock::from(TextContent::new(
            render_tool_output(output),
            None,
            None,
        ))],
        is_error: None,
        meta: None,
        structured_content: output.as_object().cloned(),
    }
}

fn tool_error_result(err: &ToolError) -> CallToolResult {
    CallToolResult {
        content: vec![ContentBlock::from(TextContent::new(err.to_string(), None, None))],
        is_error: Some(true),
        meta: None,
        structured_content: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_output_is_also_structured() {
        let result = tool_result(&json!({ "deleted": true }));
        assert_eq!(
            result.structured_content.as_ref().and_then(|map| map.get("deleted")),
            Some(&json!(true))
        );
        assert!(result.is_error.is_none());
    }

    #[test]
    fn scalar_output_has_no_structured_content() {
        let result = tool_result(&json!(true));
        assert!(result.structured_content.is_none());
    }

    #[test]
    fn tool_errors_are_flagged() {
        let result = tool_error_result(&ToolError::validation("Path must be in root"));
        assert_eq!(result.is_error, Some(true));
    }
}
