//! MCP protocol types.
//!
//! This module defines the JSON-RPC message types used by MCP and the tool
//! result envelope returned to callers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// MCP tool definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Call tool request parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Tool result envelope.
///
/// Policy denials and execution failures are carried here with
/// `is_error: true`; they are normal results, not protocol errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResponse {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl CallToolResponse {
    /// A successful result with the given text blocks.
    pub fn text_blocks(blocks: impl IntoIterator<Item = String>) -> Self {
        Self {
            content: blocks
                .into_iter()
                .map(|text| ToolContent::Text { text })
                .collect(),
            is_error: false,
        }
    }

    /// An error result: one text block beginning with the reason.
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: format!("Error: {}", reason.into()),
            }],
            is_error: true,
        }
    }
}

/// Tool response content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_envelope_shape() {
        let response = CallToolResponse::error("access to table 'prod.users' is denied");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["isError"], json!(true));
        assert_eq!(value["content"][0]["type"], json!("text"));
        let text = value["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("Error: "));
    }

    #[test]
    fn success_envelope_shape() {
        let response =
            CallToolResponse::text_blocks(["[]".to_string(), "Query execution time: 3ms".into()]);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["isError"], json!(false));
        assert_eq!(value["content"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn parses_call_tool_params() {
        let params: CallToolParams = serde_json::from_value(json!({
            "name": "mysql_query",
            "arguments": { "sql": "SELECT 1" }
        }))
        .unwrap();
        assert_eq!(params.name, "mysql_query");
        assert_eq!(params.arguments["sql"], json!("SELECT 1"));
    }
}
