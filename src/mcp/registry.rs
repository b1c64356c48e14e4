//! MCP Tool and Resource Registry
//!
//! Tools are keyed by name, resources by URI template. Both catalogs are
//! shared by every connection: mutation takes the exclusive lock for the
//! duration of the change only, lookups clone an `Arc` out of the lock so
//! no invocation ever runs while a catalog lock is held.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::context::ToolContext;
use super::filter::CapabilityFilter;
use super::protocol::{
    ResourceContent, ResourceDefinition, ResourceTemplateDefinition, ToolDefinition,
    ToolsCallResult, DEFAULT_MIME_TYPE,
};
use super::uri_template::{UriParams, UriTemplate, UriTemplateError};
use super::{resources, tools};
use crate::kanban::{GenerationError, StoreError};

// ============================================================================
// Capability errors
// ============================================================================

/// Error returned by a tool invocation or a resource read.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// The caller sent arguments the capability cannot use.
    #[error("{0}")]
    InvalidArguments(String),

    /// The addressed domain object does not exist or is not visible.
    #[error("{0}")]
    NotFound(String),

    /// Anything else. Logged server-side, never sent to the client.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl From<StoreError> for CapabilityError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::BoardNotFound(_) | StoreError::CardNotFound(_) => {
                CapabilityError::NotFound(err.to_string())
            }
            StoreError::InvalidColumn { .. } | StoreError::InvalidCard(_) => {
                CapabilityError::InvalidArguments(err.to_string())
            }
            StoreError::Backend(e) => CapabilityError::Failed(e),
        }
    }
}

impl From<GenerationError> for CapabilityError {
    fn from(err: GenerationError) -> Self {
        CapabilityError::Failed(anyhow::Error::new(err).context("text generation failed"))
    }
}

impl From<serde_json::Error> for CapabilityError {
    fn from(err: serde_json::Error) -> Self {
        CapabilityError::Failed(anyhow::Error::new(err).context("failed to serialize result"))
    }
}

/// Deserialize tool arguments, treating a missing object as empty.
pub fn parse_arguments<T: DeserializeOwned>(arguments: Value) -> Result<T, CapabilityError> {
    let arguments = if arguments.is_null() {
        Value::Object(Default::default())
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| CapabilityError::InvalidArguments(e.to_string()))
}

/// Parse a numeric id captured from a URI. Anything unparsable cannot
/// address an existing object, so it is reported as not found.
pub fn parse_id_param(params: &UriParams, name: &str, uri: &str) -> Result<u64, CapabilityError> {
    params
        .get(name)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| CapabilityError::NotFound(format!("Resource not found: {uri}")))
}

// ============================================================================
// Capability traits
// ============================================================================

/// Result type for tool execution
pub type ToolResult = Result<ToolsCallResult, CapabilityError>;

/// Result type for resource read
pub type ResourceResult = Result<ResourceContent, CapabilityError>;

/// Tool category for rate limiting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolCategory {
    Read,
    Write,
    Generate,
}

impl ToolCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCategory::Read => "read",
            ToolCategory::Write => "write",
            ToolCategory::Generate => "generate",
        }
    }
}

#[async_trait]
pub trait McpTool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    fn category(&self) -> ToolCategory {
        ToolCategory::Read
    }

    async fn invoke(&self, ctx: &ToolContext, arguments: Value) -> ToolResult;
}

#[async_trait]
pub trait McpResource: Send + Sync {
    fn definition(&self) -> ResourceDefinition;

    fn template(&self) -> &UriTemplate;

    async fn read(&self, ctx: &ToolContext, uri: &str, params: &UriParams) -> ResourceResult;
}

// ============================================================================
// Catalogs
// ============================================================================

/// Ordered entries unique by key. Re-inserting a key replaces the entry
/// in place, keeping its original position.
struct Entries<T: ?Sized> {
    items: RwLock<Vec<(String, Arc<T>)>>,
}

impl<T: ?Sized> Entries<T> {
    fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<(String, Arc<T>)>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<(String, Arc<T>)>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn upsert(items: &mut Vec<(String, Arc<T>)>, key: String, value: Arc<T>) -> bool {
        match items.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => {
                slot.1 = value;
                true
            }
            None => {
                items.push((key, value));
                false
            }
        }
    }

    fn insert(&self, key: String, value: Arc<T>) -> bool {
        Self::upsert(&mut self.write(), key, value)
    }

    fn get(&self, key: &str) -> Option<Arc<T>> {
        self.read()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| Arc::clone(v))
    }

    fn snapshot(&self) -> Vec<Arc<T>> {
        self.read().iter().map(|(_, v)| Arc::clone(v)).collect()
    }

    fn len(&self) -> usize {
        self.read().len()
    }

    fn clear(&self) {
        self.write().clear();
    }

    /// Insert `defaults` only if the catalog is empty. The emptiness check
    /// and the inserts happen under one exclusive lock.
    fn fill_if_empty<E>(
        &self,
        defaults: impl FnOnce() -> Result<Vec<(String, Arc<T>)>, E>,
    ) -> Result<bool, E> {
        let mut items = self.write();
        if !items.is_empty() {
            return Ok(false);
        }
        for (key, value) in defaults()? {
            Self::upsert(&mut items, key, value);
        }
        Ok(true)
    }
}

/// Registry of callable tools, keyed by name.
pub struct ToolCatalog {
    entries: Entries<dyn McpTool>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self {
            entries: Entries::new(),
        }
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&self, tool: Arc<dyn McpTool>) {
        let name = tool.definition().name;
        if self.entries.insert(name.clone(), tool) {
            debug!("Replaced MCP tool {}", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn McpTool>> {
        self.entries.get(name)
    }

    /// Look up a tool the connection is allowed to call. Disabled tools
    /// are indistinguishable from missing ones.
    pub fn lookup(&self, name: &str, filter: &CapabilityFilter) -> Option<Arc<dyn McpTool>> {
        if !filter.tool_enabled(name) {
            return None;
        }
        self.get(name)
    }

    /// Public definitions in registration order.
    pub fn list(&self, filter: Option<&CapabilityFilter>) -> Vec<ToolDefinition> {
        self.entries
            .snapshot()
            .iter()
            .map(|tool| tool.definition())
            .filter(|def| filter.map_or(true, |f| f.tool_enabled(&def.name)))
            .collect()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Populate the built-in tools. No-op if anything is registered already.
    pub fn load_defaults(&self) -> bool {
        let loaded = self
            .entries
            .fill_if_empty(|| {
                Ok::<_, std::convert::Infallible>(
                    tools::default_tools()
                        .into_iter()
                        .map(|tool| (tool.definition().name, tool))
                        .collect(),
                )
            })
            .unwrap_or_else(|never| match never {});
        if loaded {
            debug!("Loaded {} default MCP tools", self.len());
        }
        loaded
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry of readable resources, keyed by URI template.
pub struct ResourceCatalog {
    entries: Entries<dyn McpResource>,
}

impl ResourceCatalog {
    pub fn new() -> Self {
        Self {
            entries: Entries::new(),
        }
    }

    /// Register a resource, replacing any resource with the same template.
    /// New templates are matched after all existing ones.
    pub fn register(&self, resource: Arc<dyn McpResource>) {
        let key = resource.template().as_str().to_string();
        if self.entries.insert(key.clone(), resource) {
            debug!("Replaced MCP resource {}", key);
        }
    }

    pub fn get(&self, template: &str) -> Option<Arc<dyn McpResource>> {
        self.entries.get(template)
    }

    /// Find the first resource, in registration order, whose template
    /// matches `uri` and which the filter allows.
    pub fn resolve(
        &self,
        uri: &str,
        filter: Option<&CapabilityFilter>,
    ) -> Option<(Arc<dyn McpResource>, UriParams)> {
        self.entries.snapshot().into_iter().find_map(|resource| {
            if let Some(f) = filter {
                if !f.resource_enabled(&resource.definition().name) {
                    return None;
                }
            }
            let params = resource.template().extract(uri)?;
            Some((resource, params))
        })
    }

    pub fn list(&self, filter: Option<&CapabilityFilter>) -> Vec<ResourceDefinition> {
        self.entries
            .snapshot()
            .iter()
            .map(|resource| resource.definition())
            .filter(|def| filter.map_or(true, |f| f.resource_enabled(&def.name)))
            .collect()
    }

    /// Definitions of parameterised resources only.
    pub fn templates(&self, filter: Option<&CapabilityFilter>) -> Vec<ResourceTemplateDefinition> {
        self.entries
            .snapshot()
            .iter()
            .filter(|resource| resource.template().has_params())
            .map(|resource| resource.definition())
            .filter(|def| filter.map_or(true, |f| f.resource_enabled(&def.name)))
            .map(ResourceTemplateDefinition::from)
            .collect()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Populate the built-in resources. No-op if anything is registered already.
    pub fn load_defaults(&self) -> Result<bool, UriTemplateError> {
        let loaded = self.entries.fill_if_empty(|| {
            Ok(resources::default_resources()?
                .into_iter()
                .map(|resource| (resource.template().as_str().to_string(), resource))
                .collect())
        })?;
        if loaded {
            debug!("Loaded {} default MCP resources", self.len());
        }
        Ok(loaded)
    }
}

impl Default for ResourceCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// The tool and resource catalogs, constructed once at startup and shared
/// by every connection.
#[derive(Default)]
pub struct McpRegistry {
    pub tools: ToolCatalog,
    pub resources: ResourceCatalog,
}

impl McpRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Result<Self, UriTemplateError> {
        let registry = Self::new();
        registry.ensure_defaults()?;
        Ok(registry)
    }

    /// Populate each catalog with its defaults if it is still empty.
    pub fn ensure_defaults(&self) -> Result<(), UriTemplateError> {
        self.tools.load_defaults();
        self.resources.load_defaults()?;
        Ok(())
    }

    /// Empty both catalogs.
    pub fn reset(&self) {
        self.tools.clear();
        self.resources.clear();
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }
}

// ============================================================================
// Builder helpers
// ============================================================================

/// Boxed future for async tool execution
pub type ToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

/// Tool handler function type
pub type ToolHandler = Arc<dyn Fn(ToolContext, Value) -> ToolFuture + Send + Sync>;

/// Boxed future for async resource read
pub type ResourceFuture = Pin<Box<dyn Future<Output = ResourceResult> + Send>>;

/// Resource handler function type
pub type ResourceHandler =
    Arc<dyn Fn(ToolContext, String, UriParams) -> ResourceFuture + Send + Sync>;

/// A tool backed by a closure.
pub struct FnTool {
    definition: ToolDefinition,
    category: ToolCategory,
    handler: ToolHandler,
}

#[async_trait]
impl McpTool for FnTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    fn category(&self) -> ToolCategory {
        self.category
    }

    async fn invoke(&self, ctx: &ToolContext, arguments: Value) -> ToolResult {
        (self.handler)(ctx.clone(), arguments).await
    }
}

/// Builder for registering a tool
pub struct ToolBuilder {
    name: String,
    description: String,
    input_schema: Value,
    category: ToolCategory,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
            category: ToolCategory::Read,
        }
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn category(mut self, cat: ToolCategory) -> Self {
        self.category = cat;
        self
    }

    pub fn build<F, Fut>(self, handler: F) -> Arc<dyn McpTool>
    where
        F: Fn(ToolContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        Arc::new(FnTool {
            definition: ToolDefinition::new(self.name, self.description, self.input_schema),
            category: self.category,
            handler: Arc::new(move |ctx, params| Box::pin(handler(ctx, params))),
        })
    }
}

/// A resource backed by a closure.
pub struct FnResource {
    template: UriTemplate,
    name: String,
    description: String,
    mime_type: String,
    handler: ResourceHandler,
}

#[async_trait]
impl McpResource for FnResource {
    fn definition(&self) -> ResourceDefinition {
        ResourceDefinition {
            uri: self.template.as_str().to_string(),
            name: self.name.clone(),
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
        }
    }

    fn template(&self) -> &UriTemplate {
        &self.template
    }

    async fn read(&self, ctx: &ToolContext, uri: &str, params: &UriParams) -> ResourceResult {
        (self.handler)(ctx.clone(), uri.to_string(), params.clone()).await
    }
}

/// Builder for registering a resource
pub struct ResourceBuilder {
    uri_template: String,
    name: String,
    description: String,
    mime_type: String,
}

impl ResourceBuilder {
    pub fn new(uri_template: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri_template: uri_template.into(),
            name: name.into(),
            description: String::new(),
            mime_type: DEFAULT_MIME_TYPE.to_string(),
        }
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = mime.into();
        self
    }

    pub fn build<F, Fut>(self, handler: F) -> Result<Arc<dyn McpResource>, UriTemplateError>
    where
        F: Fn(ToolContext, String, UriParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResourceResult> + Send + 'static,
    {
        Ok(Arc::new(FnResource {
            template: UriTemplate::parse(&self.uri_template)?,
            name: self.name,
            description: self.description,
            mime_type: self.mime_type,
            handler: Arc::new(move |ctx, uri, params| Box::pin(handler(ctx, uri, params))),
        }))
    }
}
