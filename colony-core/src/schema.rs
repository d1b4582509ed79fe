//! Tool schemas.
//!
//! A declarative description of a callable tool: name, description, and a
//! flat parameter list. Schemas are frozen into the agent record at creation
//! time; provider adapters lower them to whatever wire shape the model API
//! expects.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Schema of a single tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParam {
    pub name: String,
    /// JSON-schema type name: "string", "number", "boolean", "array", ...
    #[serde(rename = "type")]
    pub param_type: String,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    /// Item schema for array parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Value>,
}

impl ToolParam {
    pub fn string(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            param_type: "string".into(),
            description: description.into(),
            required,
            items: None,
        }
    }

    pub fn number(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            param_type: "number".into(),
            description: description.into(),
            required,
            items: None,
        }
    }

    pub fn string_array(
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: "array".into(),
            description: description.into(),
            required,
            items: Some(serde_json::json!({"type": "string"})),
        }
    }
}

/// Schema of a callable tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ToolParam>,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: ToolParam) -> Self {
        self.parameters.push(param);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_round_trip() {
        let schema = ToolSchema::new("calculator", "Perform basic arithmetic")
            .with_param(ToolParam::string("operation", "add, subtract", true))
            .with_param(ToolParam::number("a", "First operand", true));
        let json = serde_json::to_string(&schema).unwrap();
        let back: ToolSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
        assert_eq!(back.parameters.len(), 2);
    }

    #[test]
    fn array_param_carries_item_schema() {
        let param = ToolParam::string_array("tools", "Tool names", true);
        let value = serde_json::to_value(&param).unwrap();
        assert_eq!(value["type"], "array");
        assert_eq!(value["items"]["type"], "string");
    }
}
