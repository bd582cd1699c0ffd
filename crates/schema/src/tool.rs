//! Tool/function-calling types shared by chat, responses and MCP.

use schemars::Schema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool the model may call, also known as a "function" in some provider
/// wire formats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedTool {
    pub function: UnifiedFunction,
}

/// Function specification for a tool: what it's called, what it does, and
/// the JSON-schema of arguments it accepts. The model generates arguments
/// conforming to `parameters`; it is the caller's job to validate them
/// before execution, since providers do not guarantee strict conformance
/// unless `strict` is set and supported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedFunction {
    pub name: String,
    pub description: String,
    pub parameters: Box<Schema>,
    /// OpenAI strict mode: when true, every property must be required and
    /// `additionalProperties` must be false. Ignored by providers that
    /// don't support it.
    #[serde(default)]
    pub strict: Option<bool>,
}

/// Controls whether/which tools the model must use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnifiedToolChoice {
    Mode(UnifiedToolChoiceMode),
    Specific { function: UnifiedFunctionChoice },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnifiedToolChoiceMode {
    None,
    Auto,
    /// Also spelled `"required"` (OpenAI) or `"any"` (Anthropic).
    #[serde(alias = "required", alias = "any")]
    Required,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedFunctionChoice {
    pub name: String,
}

/// A completed tool call surfaced on an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedToolCall {
    pub id: String,
    pub function: UnifiedFunctionCall,
}

impl UnifiedToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<UnifiedArguments>) -> Self {
        Self {
            id: id.into(),
            function: UnifiedFunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedFunctionCall {
    pub name: String,
    pub arguments: UnifiedArguments,
}

/// Function arguments, preserved in whichever shape the upstream provider
/// used (OpenAI sends a JSON-encoded string; Anthropic sends parsed JSON)
/// to avoid a round-trip through serialization during conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnifiedArguments {
    String(String),
    Value(Value),
}

impl From<Value> for UnifiedArguments {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<String> for UnifiedArguments {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl UnifiedArguments {
    /// Parses the arguments as JSON regardless of the wire representation
    /// they arrived in. Tool executors call this rather than matching on
    /// the variant directly.
    pub fn as_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::String(s) => serde_json::from_str(s),
            Self::Value(v) => Ok(v.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::String(s) => s.is_empty(),
            Self::Value(Value::Null) => true,
            Self::Value(_) => false,
        }
    }
}
