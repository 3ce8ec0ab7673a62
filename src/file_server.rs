//! Demonstration server exposing one directory
//!
//! The directory itself is published as `dir://<label>`, each top-level file
//! as `file://<label>/<name>`, and files created later are reachable through
//! the `file://<label>/{name}` template. The `delete_file` tool removes files
//! that live directly inside the root.

use std::path::{Path, PathBuf};

use rust_mcp_sdk::macros;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::domain::{
    errors::{ResourceError, ToolError},
    resource_types::DirectoryResource,
    resources::{ResourceContent, ResourceMeta},
    templates::ResourceTemplate,
};
use crate::server::McpServer;

pub const FILE_NOT_FOUND: &str = "File not found";

#[derive(Debug, Error)]
pub enum FileServerError {
    #[error("cannot open root directory {path}: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

#[macros::mcp_tool(
    name = "delete_file",
    description = "Delete a file that lives directly inside the served directory"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct DeleteFileTool {
    /// Path of the file to delete. Relative paths are taken from the served
    /// directory.
    pub path: String,
}

/// Derives the URI host label from the root directory's name.
pub fn root_label(root: &Path) -> String {
    let label: String = root
        .file_name()
        .map(|name| name.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();

    if label.is_empty() {
        "root".to_string()
    } else {
        label
    }
}

pub async fn build_file_server(
    name: &str,
    root: impl AsRef<Path>,
) -> Result<McpServer, FileServerError> {
    let requested = root.as_ref().to_path_buf();
    let root_error = |source| FileServerError::Root {
        path: requested.clone(),
        source,
    };
    let root = tokio::fs::canonicalize(&requested)
        .await
        .map_err(root_error)?;
    let label = root_label(&root);
    let mut server = McpServer::new(name).with_instructions(format!(
        "Files of {} are available as file://{label}/<name>.",
        root.display()
    ));

    server.add_resource(DirectoryResource::new(
        ResourceMeta::builder()
            .uri(format!("dir://{label}"))
            .description("List the files in the served directory"),
        root.clone(),
    )?);

    for file_name in top_level_files(&root).await.map_err(root_error)? {
        let path = root.join(&file_name);
        let meta = ResourceMeta::builder()
            .uri(format!("file://{label}/{file_name}"))
            .description(format!("Read the {file_name} file"))
            .build()?;
        server.resource_with(meta, move || read_or_sentinel(path.clone()));
    }

    let template_root = root.clone();
    server.add_template(
        ResourceTemplate::new(format!("file://{label}/{{name}}"), move |params| {
            let root = template_root.clone();
            async move {
                let name = params.get("name").cloned().unwrap_or_default();
                if name == "." || name == ".." {
                    return Err(ResourceError::NotFound(format!("file://{name}")));
                }
                read_or_sentinel(root.join(name)).await
            }
        })?
        .with_name("file")
        .with_description("Read any file directly inside the served directory"),
    );

    let tool_root = root.clone();
    server.tool(DeleteFileTool::tool(), move |args: DeleteFileTool| {
        let root = tool_root.clone();
        async move { delete_file(&root, &args.path).await }
    });

    info!(root = %root.display(), label = %label, "file server ready");
    Ok(server)
}

async fn top_level_files(root: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

async fn read_or_sentinel(path: PathBuf) -> Result<ResourceContent, ResourceError> {
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => Ok(ResourceContent::Text(text)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Ok(ResourceContent::Text(FILE_NOT_FOUND.to_string()))
        }
        Err(err) => Err(ResourceError::read(path.display().to_string(), err)),
    }
}

async fn delete_file(root: &Path, path: &str) -> Result<bool, ToolError> {
    let outside = || ToolError::validation(format!("Path must be in {}: {path}", root.display()));

    let target = root.join(path);
    let parent = target.parent().ok_or_else(outside)?;
    let parent = tokio::fs::canonicalize(parent)
        .await
        .map_err(|_| outside())?;
    if parent != root {
        return Err(outside());
    }

    tokio::fs::remove_file(&target)
        .await
        .map_err(ToolError::execution)?;
    info!(path, "file deleted");
    Ok(true)
}
