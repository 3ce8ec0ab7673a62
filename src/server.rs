//! User-facing server registry
//!
//! `McpServer` is where applications bind resources and tools before handing
//! the server to a transport. Registration happens during setup; afterwards
//! the server is shared read-only behind an `Arc`.

use std::{future::Future, sync::Arc};

use rust_mcp_sdk::schema::Tool;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::info;

use crate::domain::{
    errors::{ResourceError, ToolError},
    registry::{ResolvedContent, ResourceManager, ToolManager},
    resource_types::FunctionResource,
    resources::{IntoResourceContent, Resource, ResourceContent, ResourceMeta},
    templates::ResourceTemplate,
    tools::{FunctionTool, ToolArguments, ToolHandler},
    uri::UriInput,
};

pub struct McpServer {
    name: String,
    version: String,
    instructions: Option<String>,
    resources: ResourceManager,
    tools: ToolManager,
}

impl McpServer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
            resources: ResourceManager::new(),
            tools: ToolManager::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn add_resource<R>(&mut self, resource: R) -> Arc<dyn Resource>
    where
        R: Resource + 'static,
    {
        self.resources.add_resource(Arc::new(resource))
    }

    /// Binds `producer` to `uri`; the resource name defaults to the URI.
    pub fn resource<F, Fut, R>(
        &mut self,
        uri: impl Into<UriInput>,
        producer: F,
    ) -> Result<Arc<dyn Resource>, ResourceError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ResourceError>> + Send + 'static,
        R: IntoResourceContent + 'static,
    {
        let meta = ResourceMeta::new(uri)?;
        Ok(self.resource_with(meta, producer))
    }

    pub fn resource_with<F, Fut, R>(&mut self, meta: ResourceMeta, producer: F) -> Arc<dyn Resource>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ResourceError>> + Send + 'static,
        R: IntoResourceContent + 'static,
    {
        self.add_resource(FunctionResource::new(meta, producer))
    }

    pub fn add_template(&mut self, template: ResourceTemplate) -> Arc<ResourceTemplate> {
        self.resources.add_template(template)
    }

    pub fn add_tool_handler<T>(&mut self, tool: T) -> Arc<dyn ToolHandler>
    where
        T: ToolHandler + 'static,
    {
        self.tools.add_tool(Arc::new(tool))
    }

    /// Binds `handler` to the tool described by `definition`.
    pub fn tool<A, F, Fut, R>(&mut self, definition: Tool, handler: F) -> Arc<dyn ToolHandler>
    where
        A: DeserializeOwned + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ToolError>> + Send + 'static,
        R: Serialize,
    {
        self.add_tool_handler(FunctionTool::new(definition, handler))
    }

    pub fn list_resources(&self) -> Vec<Arc<dyn Resource>> {
        self.resources.list_resources()
    }

    pub fn list_templates(&self) -> Vec<Arc<ResourceTemplate>> {
        self.resources.list_templates()
    }

    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools.list_tools()
    }

    pub async fn read_resource(&self, uri: &str) -> Result<ResourceContent, ResourceError> {
        Ok(self.resolve_resource(uri).await?.content)
    }

    pub async fn resolve_resource(&self, uri: &str) -> Result<ResolvedContent, ResourceError> {
        self.resources.read(uri).await
    }

    pub async fn call_tool(&self, name: &str, arguments: ToolArguments) -> Result<Value, ToolError> {
        let result = self.tools.call_tool(name, arguments).await;
        info!(
            tool = name,
            outcome = if result.is_ok() { "success" } else { "failure" },
            "tool invoked"
        );
        result
    }
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer")
            .field("name", &self.name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}
