//! Tool descriptor types shared between the MCP manager and the gateway's
//! tool-calling orchestration, decoupled from any particular transport.

use schemars::Schema;
use serde::{Deserialize, Serialize};

use crate::tool::UnifiedTool;

/// A tool as registered with the MCP manager: its schema plus enough
/// identity to route an invocation back to the owning client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Schema,
    /// ID of the MCP client that owns this tool.
    pub client_id: String,
}

impl McpToolDescriptor {
    /// Converts this descriptor into the model-facing tool shape,
    /// namespacing the name as `"{client_id}__{name}"` so tools from
    /// different clients never collide.
    pub fn into_unified_tool(self) -> UnifiedTool {
        use crate::tool::UnifiedFunction;

        UnifiedTool {
            function: UnifiedFunction {
                name: format!("{}__{}", self.client_id, self.name),
                description: self.description,
                parameters: Box::new(self.input_schema),
                strict: None,
            },
        }
    }
}

/// Splits a namespaced tool name (`"{client_id}__{tool}"`) back into its
/// parts. Returns `None` if the name doesn't contain the separator, which
/// means it isn't an MCP-backed tool at all (e.g. an in-process tool
/// registered without a client prefix).
pub fn split_namespaced_tool_name(name: &str) -> Option<(&str, &str)> {
    name.split_once("__")
}
