//! Registration-ordered resource and tool tables

use std::sync::Arc;

use indexmap::{map::Entry, IndexMap};
use rust_mcp_sdk::schema::Tool;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::{
    errors::{ResourceError, ToolError},
    resources::{Resource, ResourceContent},
    templates::ResourceTemplate,
    tools::{ToolArguments, ToolHandler},
    uri::ResourceUri,
};

/// Content read from the registry together with the metadata needed to
/// describe it on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContent {
    pub uri: String,
    pub mime_type: String,
    pub content: ResourceContent,
}

#[derive(Default)]
pub struct ResourceManager {
    resources: IndexMap<String, Arc<dyn Resource>>,
    templates: IndexMap<String, Arc<ResourceTemplate>>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers under the normalized URI; an existing entry wins.
    pub fn add_resource(&mut self, resource: Arc<dyn Resource>) -> Arc<dyn Resource> {
        let key = resource.meta().uri().to_string();
        match self.resources.entry(key) {
            Entry::Occupied(existing) => {
                warn!(uri = %existing.key(), "resource already registered, keeping existing");
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                debug!(uri = %slot.key(), name = resource.meta().name(), "resource registered");
                slot.insert(resource).clone()
            }
        }
    }

    pub fn add_template(&mut self, template: ResourceTemplate) -> Arc<ResourceTemplate> {
        match self.templates.entry(template.uri_template().to_string()) {
            Entry::Occupied(existing) => {
                warn!(
                    uri_template = %existing.key(),
                    "resource template already registered, keeping existing"
                );
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                debug!(uri_template = %slot.key(), "resource template registered");
                slot.insert(Arc::new(template)).clone()
            }
        }
    }

    pub fn list_resources(&self) -> Vec<Arc<dyn Resource>> {
        self.resources.values().cloned().collect()
    }

    pub fn list_templates(&self) -> Vec<Arc<ResourceTemplate>> {
        self.templates.values().cloned().collect()
    }

    pub fn get_resource(&self, uri: &str) -> Option<Arc<dyn Resource>> {
        if let Some(resource) = self.resources.get(uri) {
            return Some(resource.clone());
        }

        let normalized = ResourceUri::parse(uri).ok()?;
        self.resources.get(normalized.as_str()).cloned()
    }

    /// Exact resources first, then templates in registration order.
    pub async fn read(&self, uri: &str) -> Result<ResolvedContent, ResourceError> {
        if let Some(resource) = self.get_resource(uri) {
            let content = resource.read().await?;
            return Ok(ResolvedContent {
                uri: resource.meta().uri().to_string(),
                mime_type: resource.meta().mime_type().to_string(),
                content,
            });
        }

        for template in self.templates.values() {
            if let Some(params) = template.matches(uri) {
                debug!(uri, uri_template = template.uri_template(), "resource template matched");
                let content = template.read(params).await?;
                return Ok(ResolvedContent {
                    uri: uri.to_string(),
                    mime_type: template.mime_type().to_string(),
                    content,
                });
            }
        }

        Err(ResourceError::NotFound(uri.to_string()))
    }
}

#[derive(Default)]
pub struct ToolManager {
    tools: IndexMap<String, Arc<dyn ToolHandler>>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tool(&mut self, tool: Arc<dyn ToolHandler>) -> Arc<dyn ToolHandler> {
        match self.tools.entry(tool.name().to_string()) {
            Entry::Occupied(existing) => {
                warn!(tool = %existing.key(), "tool already registered, keeping existing");
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                debug!(tool = %slot.key(), "tool registered");
                slot.insert(tool).clone()
            }
        }
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).cloned()
    }

    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools
            .values()
            .map(|tool| tool.definition().clone())
            .collect()
    }

    pub async fn call_tool(&self, name: &str, arguments: ToolArguments) -> Result<Value, ToolError> {
        let tool = self
            .get_tool(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.call(arguments).await
    }
}
