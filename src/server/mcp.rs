// image-convert/src/server/mcp.rs
//! JSON-RPC 2.0 dispatcher for the MCP tool server, shared by the stdio and
//! SSE transports.

use super::ServerConfig;
use crate::core::request::ConversionRequest;
use crate::core::{ConversionResult, ConvertError};
use serde_json::{json, Map, Value};

pub const SERVER_NAME: &str = "image-convert-mcp";
/// Newest first; the first entry is offered to clients we don't recognize.
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2025-06-18", "2025-03-26", "2024-11-05"];

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

const SINGLE_TOOL: &str = "convert_image_single";
const BATCH_TOOL: &str = "convert_image_batch";

struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

pub struct McpServer {
    config: ServerConfig,
}

impl McpServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Handles one raw message. `None` means nothing should be sent back
    /// (notifications and client responses).
    pub async fn handle_message(&self, message: &str) -> Option<Value> {
        match serde_json::from_str::<Value>(message) {
            Ok(value) => self.handle_value(value).await,
            Err(e) => Some(parse_error(e)),
        }
    }

    pub async fn handle_value(&self, message: Value) -> Option<Value> {
        let Some(object) = message.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::new(INVALID_REQUEST, "Invalid Request: expected a JSON object"),
            ));
        };

        let id = object.get("id").cloned();
        let Some(method) = object.get("method").and_then(Value::as_str) else {
            if object.contains_key("result") || object.contains_key("error") {
                return None;
            }
            return Some(error_response(
                id.unwrap_or(Value::Null),
                RpcError::new(INVALID_REQUEST, "Invalid Request: missing method"),
            ));
        };

        let Some(id) = id else {
            log::debug!("Received notification {}", method);
            return None;
        };

        let params = object.get("params").cloned().unwrap_or(Value::Null);
        log::debug!("Handling {} (id {})", method, id);

        let outcome = match method {
            "initialize" => Ok(initialize(&params)),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tool_definitions() })),
            "tools/call" => self.call_tool(&params).await,
            other => Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            )),
        };

        Some(match outcome {
            Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            Err(error) => error_response(id, error),
        })
    }

    async fn call_tool(&self, params: &Value) -> Result<Value, RpcError> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::new(INVALID_PARAMS, "Missing tool name"))?;
        let arguments = match params.get("arguments") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(arguments) => arguments.clone(),
        };

        let outcome = match name {
            SINGLE_TOOL => self.convert_single(&arguments).await,
            BATCH_TOOL => self.convert_batch(&arguments).await,
            other => {
                return Err(RpcError::new(
                    INVALID_PARAMS,
                    format!("Unknown tool: {}", other),
                ))
            }
        };

        Ok(match outcome {
            Ok(text) => tool_result(text, false),
            Err(e) => {
                let text = if e.is_validation() {
                    format!("Validation Error: {}", e)
                } else if e.is_conversion() {
                    format!("Conversion Error: {}", e)
                } else {
                    format!("Unexpected Error: {}", e)
                };
                log::error!("{} failed: {}", name, text);
                tool_result(text, true)
            }
        })
    }

    async fn convert_single(&self, arguments: &Value) -> crate::core::Result<String> {
        let request = ConversionRequest::from_params(arguments)?;
        let result = self.config.convert_single(request).await?;
        Ok(single_summary(&result))
    }

    async fn convert_batch(&self, arguments: &Value) -> crate::core::Result<String> {
        let request = ConversionRequest::from_params(arguments)?;
        let results = self.config.convert_batch(request).await?;
        batch_summary(&results)
    }
}

fn initialize(params: &Value) -> Value {
    let requested = params.get("protocolVersion").and_then(Value::as_str);
    let version = requested
        .filter(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(v))
        .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0]);

    json!({
        "protocolVersion": version,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
    })
}

/// `-32700` response for input that is not a JSON-RPC message at all.
pub fn parse_error(detail: impl std::fmt::Display) -> Value {
    error_response(
        Value::Null,
        RpcError::new(PARSE_ERROR, format!("Parse error: {}", detail)),
    )
}

fn error_response(id: Value, error: RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": error.code, "message": error.message },
    })
}

fn tool_result(text: String, is_error: bool) -> Value {
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": is_error,
    })
}

fn single_summary(result: &ConversionResult) -> String {
    let mut text = String::from("Image conversion successful!\n\n");
    text.push_str(&format!("Input: {}\n", result.input().display()));
    if let Some(webp) = result.webp() {
        text.push_str(&format!("WebP: {}\n", webp.display()));
    }
    if let Some(avif) = result.avif() {
        text.push_str(&format!("AVIF: {}\n", avif.display()));
    }
    text
}

fn batch_summary(results: &[ConversionResult]) -> crate::core::Result<String> {
    let failed = results.iter().filter(|r| r.is_failed()).count();

    let mut text = String::from("Batch conversion complete!\n");
    text.push_str(&format!(
        "Successfully converted: {} images\n",
        results.len() - failed
    ));
    if failed > 0 {
        text.push_str(&format!("Failed: {} images\n", failed));
    }

    let listing = serde_json::to_string_pretty(results)
        .map_err(|e| ConvertError::Encode(format!("Failed to render results: {}", e)))?;
    text.push_str("\nResults:\n");
    text.push_str(&listing);
    Ok(text)
}

/// `tools/list` entries with JSON-schema inputs.
pub fn tool_definitions() -> Vec<Value> {
    vec![
        json!({
            "name": SINGLE_TOOL,
            "description": "Convert a single image to WebP and/or AVIF format",
            "inputSchema": input_schema("Path to the input image file", false),
        }),
        json!({
            "name": BATCH_TOOL,
            "description": "Convert multiple images in a directory to WebP and/or AVIF format",
            "inputSchema": input_schema("Path to directory containing images", true),
        }),
    ]
}

fn input_schema(input_description: &str, batch: bool) -> Value {
    let mut properties = json!({
        "input_path": { "type": "string", "description": input_description },
        "output_dir": {
            "type": "string",
            "description": "Directory for output files (default: same as input)",
        },
        "format": {
            "type": "string",
            "enum": ["webp", "avif", "both"],
            "default": "both",
            "description": "Output format",
        },
        "webp_quality": {
            "type": "integer", "minimum": 1, "maximum": 100, "default": 80,
            "description": "WebP quality (1-100)",
        },
        "avif_quality": {
            "type": "integer", "minimum": 1, "maximum": 100, "default": 50,
            "description": "AVIF quality (1-100)",
        },
        "quality": {
            "type": "integer", "minimum": 1, "maximum": 100,
            "description": "Quality for both formats, applied after any preset",
        },
        "lossless": {
            "type": "boolean", "default": false,
            "description": "Enable lossless compression for WebP",
        },
        "max_width": {
            "type": "integer", "minimum": 1,
            "description": "Maximum output width (maintains aspect ratio)",
        },
        "max_height": {
            "type": "integer", "minimum": 1,
            "description": "Maximum output height (maintains aspect ratio)",
        },
        "preset": {
            "type": "string",
            "enum": crate::presets::preset_names(),
            "description": "Named preset applied over the other options",
        },
    });

    if batch {
        properties["workers"] = json!({
            "type": "integer", "minimum": 0,
            "description": "Number of parallel workers (0 or omitted: CPU count)",
        });
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": ["input_path"],
    })
}
