//! Concrete resource variants

use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::domain::{
    errors::ResourceError,
    resources::{IntoResourceContent, Resource, ResourceContent, ResourceMeta, ResourceMetaBuilder},
    utils::{glob_to_regex, BINARY_MIME_TYPE, JSON_MIME_TYPE},
    BoxFuture,
};

type Producer =
    Arc<dyn Fn() -> BoxFuture<'static, Result<ResourceContent, ResourceError>> + Send + Sync>;

/// A resource with fixed text content.
#[derive(Debug, Clone)]
pub struct TextResource {
    meta: ResourceMeta,
    text: String,
}

impl TextResource {
    pub fn new(meta: ResourceMeta, text: impl Into<String>) -> Self {
        Self {
            meta,
            text: text.into(),
        }
    }
}

#[async_trait]
impl Resource for TextResource {
    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    async fn read(&self) -> Result<ResourceContent, ResourceError> {
        Ok(ResourceContent::Text(self.text.clone()))
    }
}

/// A resource with fixed binary content.
#[derive(Debug, Clone)]
pub struct BinaryResource {
    meta: ResourceMeta,
    data: Vec<u8>,
}

impl BinaryResource {
    pub fn new(builder: ResourceMetaBuilder, data: Vec<u8>) -> Result<Self, ResourceError> {
        Ok(Self {
            meta: builder.default_mime_type(BINARY_MIME_TYPE).build()?,
            data,
        })
    }
}

#[async_trait]
impl Resource for BinaryResource {
    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    async fn read(&self) -> Result<ResourceContent, ResourceError> {
        Ok(ResourceContent::Binary(self.data.clone()))
    }
}

/// A resource whose content is computed by a producer on every read.
#[derive(Clone)]
pub struct FunctionResource {
    meta: ResourceMeta,
    producer: Producer,
}

impl FunctionResource {
    pub fn new<F, Fut, R>(meta: ResourceMeta, producer: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ResourceError>> + Send + 'static,
        R: IntoResourceContent,
    {
        let producer: Producer = Arc::new(move || {
            let pending = producer();
            Box::pin(async move { pending.await?.into_content() })
        });

        Self { meta, producer }
    }
}

impl std::fmt::Debug for FunctionResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionResource")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Resource for FunctionResource {
    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    async fn read(&self) -> Result<ResourceContent, ResourceError> {
        (self.producer)().await
    }
}

/// A resource backed by a file on disk.
#[derive(Debug, Clone)]
pub struct FileResource {
    meta: ResourceMeta,
    path: PathBuf,
    is_binary: bool,
}

impl FileResource {
    pub fn new(meta: ResourceMeta, path: impl Into<PathBuf>) -> Result<Self, ResourceError> {
        let path = path.into();
        ensure_absolute(meta.uri().as_str(), &path)?;

        Ok(Self {
            meta,
            path,
            is_binary: false,
        })
    }

    pub fn binary(mut self) -> Self {
        self.is_binary = true;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Resource for FileResource {
    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    async fn read(&self) -> Result<ResourceContent, ResourceError> {
        let uri = self.meta.uri().as_str();
        debug!(uri, path = %self.path.display(), "reading file resource");

        if self.is_binary {
            let data = tokio::fs::read(&self.path)
                .await
                .map_err(|err| ResourceError::read(uri, err))?;
            return Ok(ResourceContent::Binary(data));
        }

        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|err| ResourceError::read(uri, err))?;
        Ok(ResourceContent::Text(text))
    }
}

/// A resource listing the files of a directory as a JSON array of paths.
#[derive(Debug, Clone)]
pub struct DirectoryResource {
    meta: ResourceMeta,
    path: PathBuf,
    recursive: bool,
    pattern: Option<Regex>,
}

impl DirectoryResource {
    pub fn new(builder: ResourceMetaBuilder, path: impl Into<PathBuf>) -> Result<Self, ResourceError> {
        let meta = builder.default_mime_type(JSON_MIME_TYPE).build()?;
        let path = path.into();
        ensure_absolute(meta.uri().as_str(), &path)?;

        Ok(Self {
            meta,
            path,
            recursive: false,
            pattern: None,
        })
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Restricts the listing to file names matching a `*`/`?` pattern.
    pub fn pattern(mut self, pattern: &str) -> Result<Self, ResourceError> {
        let compiled = glob_to_regex(pattern).map_err(|err| {
            ResourceError::read(self.meta.uri().as_str(), format!("invalid pattern: {err}"))
        })?;
        self.pattern = Some(compiled);
        Ok(self)
    }

    async fn list_files(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut pending = vec![self.path.clone()];

        while let Some(directory) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&directory).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();

                if file_type.is_dir() {
                    if self.recursive {
                        pending.push(path);
                    }
                    continue;
                }

                if file_type.is_file() && self.matches(&path) {
                    files.push(path);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    fn matches(&self, path: &Path) -> bool {
        let Some(pattern) = self.pattern.as_ref() else {
            return true;
        };

        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| pattern.is_match(name))
    }
}

#[async_trait]
impl Resource for DirectoryResource {
    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    async fn read(&self) -> Result<ResourceContent, ResourceError> {
        let uri = self.meta.uri().as_str();
        let files = self
            .list_files()
            .await
            .map_err(|err| ResourceError::read(uri, err))?;

        files
            .into_iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>()
            .into_content()
    }
}

fn ensure_absolute(uri: &str, path: &Path) -> Result<(), ResourceError> {
    if path.is_absolute() {
        return Ok(());
    }

    Err(ResourceError::read(
        uri,
        format!("path must be absolute: {}", path.display()),
    ))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn meta(uri: &str) -> ResourceMeta {
        ResourceMeta::new(uri).expect("valid resource")
    }

    #[tokio::test]
    async fn text_resource_returns_its_text() {
        let resource = TextResource::new(meta("memo://greeting"), "hello");
        let content = resource.read().await.expect("read text");
        assert_eq!(content, ResourceContent::Text("hello".to_string()));
    }

    #[tokio::test]
    async fn binary_resource_defaults_to_octet_stream() {
        let resource = BinaryResource::new(ResourceMeta::builder().uri("blob://logo"), vec![0, 1, 2])
            .expect("valid resource");
        assert_eq!(resource.meta().mime_type(), BINARY_MIME_TYPE);
        assert_eq!(
            resource.read().await.expect("read bytes"),
            ResourceContent::Binary(vec![0, 1, 2])
        );
    }

    #[tokio::test]
    async fn function_resource_runs_producer_on_every_read() {
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let calls = counter.clone();
        let resource = FunctionResource::new(meta("counter://value"), move || {
            let calls = calls.clone();
            async move {
                let value = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                Ok::<_, ResourceError>(value.to_string())
            }
        });

        assert_eq!(resource.read().await.expect("first").as_text(), Some("1"));
        assert_eq!(resource.read().await.expect("second").as_text(), Some("2"));
    }

    #[tokio::test]
    async fn file_resource_reads_text_and_reports_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("notes.txt");
        fs::write(&path, "line one").expect("write file");

        let resource =
            FileResource::new(meta("file://notes/notes.txt"), path.clone()).expect("absolute path");
        assert_eq!(
            resource.read().await.expect("read file").as_text(),
            Some("line one")
        );

        fs::remove_file(&path).expect("remove file");
        let error = resource.read().await.expect_err("missing file");
        assert!(matches!(error, ResourceError::Read { .. }));
    }

    #[test]
    fn file_resource_rejects_relative_path() {
        let error = FileResource::new(meta("file://notes/notes.txt"), "notes.txt")
            .expect_err("relative path");
        assert!(error.to_string().contains("absolute"));
    }

    #[tokio::test]
    async fn directory_resource_lists_matching_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join("a.md"), "a").expect("write a");
        fs::write(dir.path().join("b.txt"), "b").expect("write b");
        fs::create_dir(dir.path().join("nested")).expect("create nested");
        fs::write(dir.path().join("nested").join("c.md"), "c").expect("write c");

        let flat = DirectoryResource::new(ResourceMeta::builder().uri("dir://docs"), dir.path())
            .expect("valid resource");
        assert_eq!(flat.meta().mime_type(), JSON_MIME_TYPE);
        let listed: Vec<String> =
            serde_json::from_str(flat.read().await.expect("list").as_text().expect("text"))
                .expect("json array");
        assert_eq!(listed.len(), 2);

        let markdown = DirectoryResource::new(ResourceMeta::builder().uri("dir://docs"), dir.path())
            .expect("valid resource")
            .recursive(true)
            .pattern("*.md")
            .expect("valid pattern");
        let listed: Vec<String> =
            serde_json::from_str(markdown.read().await.expect("list").as_text().expect("text"))
                .expect("json array");
        let names: Vec<String> = listed
            .iter()
            .filter_map(|path| Path::new(path).file_name())
            .map(|name| name.to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"a.md".to_string()));
        assert!(names.contains(&"c.md".to_string()));
    }
}
