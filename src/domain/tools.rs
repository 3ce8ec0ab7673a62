//! Invokable tools
//!
//! A tool pairs a protocol descriptor (usually generated with
//! `#[macros::mcp_tool]`) with an async handler. Arguments arrive as a JSON
//! object and are deserialized into the handler's argument type.

use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use rust_mcp_sdk::schema::Tool;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::domain::{errors::ToolError, BoxFuture};

pub type ToolArguments = Map<String, Value>;

type ToolFn = Arc<dyn Fn(ToolArguments) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync>;

#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> &Tool;

    async fn call(&self, arguments: ToolArguments) -> Result<Value, ToolError>;

    fn name(&self) -> &str {
        &self.definition().name
    }
}

/// A tool backed by an async function over a typed argument struct.
#[derive(Clone)]
pub struct FunctionTool {
    definition: Tool,
    handler: ToolFn,
}

impl FunctionTool {
    pub fn new<A, F, Fut, R>(definition: Tool, handler: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ToolError>> + Send + 'static,
        R: Serialize,
    {
        let handler = Arc::new(handler);
        let handler: ToolFn = Arc::new(move |arguments: ToolArguments| {
            let handler = handler.clone();
            Box::pin(async move {
                let arguments: A = serde_json::from_value(Value::Object(arguments))
                    .map_err(|err| ToolError::InvalidArguments(err.to_string()))?;
                let output = handler(arguments).await?;
                serde_json::to_value(output).map_err(ToolError::execution)
            })
        });

        Self {
            definition,
            handler,
        }
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.definition.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ToolHandler for FunctionTool {
    fn definition(&self) -> &Tool {
        &self.definition
    }

    async fn call(&self, arguments: ToolArguments) -> Result<Value, ToolError> {
        (self.handler)(arguments).await
    }
}

/// Renders a tool's JSON output as the text block shown to clients.
pub fn render_tool_output(output: &Value) -> String {
    match output {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
