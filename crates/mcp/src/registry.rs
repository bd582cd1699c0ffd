//! Conversion between `rmcp`'s wire-level tool shape and the
//! transport-agnostic [`McpToolDescriptor`] the rest of Bifrost works with.

use rmcp::model::Tool;
use schema::McpToolDescriptor;

/// Converts a tool advertised by a downstream server's `initialize`
/// response into our descriptor shape, tagging it with the owning
/// client's ID so invocations can be routed back.
pub fn describe(client_id: &str, tool: &Tool) -> anyhow::Result<McpToolDescriptor> {
    let schema_value = serde_json::Value::Object((*tool.input_schema).clone());
    let input_schema = serde_json::from_value(schema_value)?;

    Ok(McpToolDescriptor {
        name: tool.name.to_string(),
        description: tool.description.as_deref().unwrap_or_default().to_string(),
        input_schema,
        client_id: client_id.to_string(),
    })
}
