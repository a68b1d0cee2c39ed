//! Conversions between MCP tool shapes and the assistant's tool contract.

use rmcp::model::{CallToolResult, Tool as McpToolInfo};
use serde_json::Value;

use assistant_core::tool::{ParameterSchema, ToolResult, ToolSchema};

/// Model-facing schema; parameters come from the JSON Schema `properties`
pub fn tool_schema(tool: &McpToolInfo, session: &str) -> ToolSchema {
    let required: Vec<&str> = tool
        .input_schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let parameters = tool
        .input_schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .map(|(name, prop)| {
                    let param_type = prop.get("type").and_then(Value::as_str).unwrap_or("object");
                    let description = prop.get("description").and_then(Value::as_str).unwrap_or_default();
                    if required.contains(&name.as_str()) {
                        ParameterSchema::required(name, param_type, description)
                    } else {
                        ParameterSchema::optional(name, param_type, description)
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    ToolSchema {
        name: tool.name.to_string(),
        description: tool.description.as_deref().unwrap_or_default().to_string(),
        parameters,
        category: Some(session.to_string()),
    }
}

/// Text parts joined by newlines; other content kinds are skipped
pub fn tool_result(name: &str, result: &CallToolResult) -> ToolResult {
    let text = result
        .content
        .iter()
        .filter_map(|c| c.as_text().map(|t| t.text.as_str()))
        .collect::<Vec<_>>()
        .join("\n");

    if result.is_error == Some(true) {
        ToolResult::failure(name, text)
    } else {
        ToolResult::success(name, text)
    }
}
