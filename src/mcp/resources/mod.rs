//! MCP Resources
//!
//! Built-in `kanban://` resources. Templates are matched in registration
//! order, so more specific templates come first.

pub mod boards;
pub mod schemas;

use std::sync::Arc;

use super::registry::McpResource;
use super::uri_template::UriTemplateError;

/// The built-in resource set, in match order.
pub fn default_resources() -> Result<Vec<Arc<dyn McpResource>>, UriTemplateError> {
    let mut resources = boards::resources()?;
    resources.push(Arc::new(schemas::CardSchemaResource::new()?));
    Ok(resources)
}
