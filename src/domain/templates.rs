//! URI-templated resources
//!
//! A template such as `weather://{city}/current` matches concrete URIs and
//! hands the extracted parameters to its producer.

use std::{collections::HashMap, future::Future, sync::Arc};

use regex::Regex;
use rust_mcp_sdk::schema;

use crate::domain::{
    errors::ResourceError,
    resources::{IntoResourceContent, ResourceContent},
    utils::{normalize_mime_type, normalize_name},
    BoxFuture,
};

pub type TemplateParams = HashMap<String, String>;

type TemplateProducer = Arc<
    dyn Fn(TemplateParams) -> BoxFuture<'static, Result<ResourceContent, ResourceError>>
        + Send
        + Sync,
>;

#[derive(Clone)]
pub struct ResourceTemplate {
    uri_template: String,
    name: String,
    description: Option<String>,
    mime_type: String,
    matcher: Regex,
    params: Vec<String>,
    producer: TemplateProducer,
}

impl ResourceTemplate {
    pub fn new<F, Fut, R>(uri_template: impl Into<String>, producer: F) -> Result<Self, ResourceError>
    where
        F: Fn(TemplateParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ResourceError>> + Send + 'static,
        R: IntoResourceContent,
    {
        let uri_template = uri_template.into();
        let (matcher, params) = compile_template(&uri_template)?;
        let producer: TemplateProducer = Arc::new(move |params| {
            let pending = producer(params);
            Box::pin(async move { pending.await?.into_content() })
        });

        Ok(Self {
            name: uri_template.clone(),
            uri_template,
            description: None,
            mime_type: normalize_mime_type(None)?,
            matcher,
            params,
            producer,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        if let Some(name) = normalize_name(Some(name.into())) {
            self.name = name;
        }
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Result<Self, ResourceError> {
        self.mime_type = normalize_mime_type(Some(mime_type.into()))?;
        Ok(self)
    }

    pub fn uri_template(&self) -> &str {
        &self.uri_template
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn matches(&self, uri: &str) -> Option<TemplateParams> {
        let captures = self.matcher.captures(uri)?;
        Some(
            self.params
                .iter()
                .filter_map(|param| {
                    captures
                        .name(param)
                        .map(|value| (param.clone(), value.as_str().to_string()))
                })
                .collect(),
        )
    }

    pub async fn read(&self, params: TemplateParams) -> Result<ResourceContent, ResourceError> {
        (self.producer)(params).await
    }

    pub fn to_descriptor(&self) -> schema::ResourceTemplate {
        schema::ResourceTemplate {
            annotations: None,
            description: self.description.clone(),
            icons: vec![],
            meta: None,
            mime_type: Some(self.mime_type.clone()),
            name: self.name.clone(),
            title: None,
            uri_template: self.uri_template.clone(),
        }
    }
}

impl std::fmt::Debug for ResourceTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceTemplate")
            .field("uri_template", &self.uri_template)
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static placeholder pattern"))
}

fn compile_template(uri_template: &str) -> Result<(Regex, Vec<String>), ResourceError> {
    let mut pattern = String::from("^");
    let mut params = Vec::new();
    let mut last = 0;

    for captures in placeholder_regex().captures_iter(uri_template) {
        let (Some(whole), Some(param)) = (captures.get(0), captures.get(1)) else {
            continue;
        };

        let param = param.as_str().to_string();
        if params.contains(&param) {
            return Err(ResourceError::InvalidTemplate(format!(
                "duplicate parameter {param} in {uri_template}"
            )));
        }

        let literal = &uri_template[last..whole.start()];
        if has_brace(literal) {
            return Err(unbalanced(uri_template));
        }
        pattern.push_str(&regex::escape(literal));
        pattern.push_str(&format!("(?P<{param}>[^/]+)"));
        params.push(param);
        last = whole.end();
    }

    if params.is_empty() {
        return Err(ResourceError::InvalidTemplate(format!(
            "{uri_template} has no parameters"
        )));
    }

    let literal_tail = &uri_template[last..];
    if has_brace(literal_tail) {
        return Err(unbalanced(uri_template));
    }

    pattern.push_str(&regex::escape(literal_tail));
    pattern.push('$');

    let matcher = Regex::new(&pattern)
        .map_err(|err| ResourceError::InvalidTemplate(format!("{uri_template}: {err}")))?;
    Ok((matcher, params))
}

fn has_brace(literal: &str) -> bool {
    literal.contains(['{', '}'])
}

fn unbalanced(uri_template: &str) -> ResourceError {
    ResourceError::InvalidTemplate(format!("unbalanced braces in {uri_template}"))
}
