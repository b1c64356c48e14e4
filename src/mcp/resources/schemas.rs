//! Card Schema Resource
//!
//! `kanban://schemas/card/{card_type}` returns the JSON Schema an agent
//! should follow when creating a card of that type.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::kanban::CardType;
use crate::mcp::context::ToolContext;
use crate::mcp::protocol::{ResourceContent, ResourceDefinition};
use crate::mcp::registry::{CapabilityError, McpResource, ResourceResult};
use crate::mcp::uri_template::{UriParams, UriTemplate, UriTemplateError};

const TEMPLATE: &str = "kanban://schemas/card/{card_type}";
const SCHEMA_MIME_TYPE: &str = "application/schema+json";

pub struct CardSchemaResource {
    template: UriTemplate,
}

impl CardSchemaResource {
    pub fn new() -> Result<Self, UriTemplateError> {
        Ok(Self {
            template: UriTemplate::parse(TEMPLATE)?,
        })
    }
}

#[async_trait]
impl McpResource for CardSchemaResource {
    fn definition(&self) -> ResourceDefinition {
        ResourceDefinition {
            uri: TEMPLATE.to_string(),
            name: "card_schema".to_string(),
            description: "JSON Schema of a card of the given type (task, bug, feature, note)"
                .to_string(),
            mime_type: SCHEMA_MIME_TYPE.to_string(),
        }
    }

    fn template(&self) -> &UriTemplate {
        &self.template
    }

    async fn read(&self, _ctx: &ToolContext, uri: &str, params: &UriParams) -> ResourceResult {
        let card_type: CardType = params
            .get("card_type")
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| CapabilityError::NotFound(format!("Resource not found: {uri}")))?;

        Ok(ResourceContent {
            uri: uri.to_string(),
            mime_type: SCHEMA_MIME_TYPE.to_string(),
            text: serde_json::to_string_pretty(&card_schema(card_type))?,
        })
    }
}

fn card_schema(card_type: CardType) -> Value {
    let mut properties = json!({
        "board_id": { "type": "integer" },
        "title": { "type": "string", "minLength": 1 },
        "column": { "type": "string" },
        "description": { "type": "string" },
        "card_type": { "const": card_type.as_str() }
    });

    let extra = match card_type {
        CardType::Bug => Some((
            "description",
            "Steps to reproduce, expected and actual behaviour",
        )),
        CardType::Feature => Some(("description", "User value and acceptance criteria")),
        CardType::Task | CardType::Note => None,
    };
    if let Some((field, hint)) = extra {
        properties[field]["description"] = Value::String(hint.to_string());
    }

    let mut required = vec!["board_id", "title"];
    if matches!(card_type, CardType::Bug | CardType::Feature) {
        required.push("description");
    }

    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": format!("{} card", card_type),
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}
