//! MCP server implementation.
//!
//! A stdio JSON-RPC loop exposing one tool, `mysql_query`. Each call runs
//! the full authorization pipeline; denials come back as error envelopes in
//! the tool result, never as transport errors.

use std::io::{BufRead, Write};

use serde_json::{Value, json};

use tollgate_core::config::PermissionsConfig;

use crate::error::McpError;
use crate::executor::{ExecutionMode, QueryExecutor};
use crate::protocol::{CallToolParams, JsonRpcRequest, JsonRpcResponse, ToolDefinition};
use tollgate_sql::{SqlAnalyzer, StatementKind};

use sqlx::MySqlPool;

/// Name of the single query tool this server exposes.
pub const QUERY_TOOL_NAME: &str = "mysql_query";

/// The MCP server.
pub struct McpServer {
    executor: QueryExecutor,
    analyzer: SqlAnalyzer,
    strict: bool,
}

impl McpServer {
    /// Create a server over a connection pool and a permissions snapshot.
    pub fn new(pool: MySqlPool, permissions: PermissionsConfig) -> Self {
        let strict = permissions.strict_read_only;
        Self {
            executor: QueryExecutor::new(pool, permissions),
            analyzer: SqlAnalyzer::new(),
            strict,
        }
    }

    /// Run the server on stdio until the input stream closes.
    pub async fn run_stdio(&self) -> Result<(), McpError> {
        tracing::info!("starting MCP server with stdio transport");

        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        let mut stdout_lock = stdout.lock();

        for line in stdin.lock().lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
                Ok(request) => self.handle_request(request).await,
                Err(e) => JsonRpcResponse::error(None, -32700, format!("parse error: {e}")),
            };
            let response_json = serde_json::to_string(&response)?;

            writeln!(stdout_lock, "{}", response_json)?;
            stdout_lock.flush()?;
        }

        Ok(())
    }

    /// Handle a JSON-RPC request.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "initialized" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_list_tools(id),
            "tools/call" => self.handle_call_tool(id, request.params).await,
            "shutdown" => JsonRpcResponse::success(id, json!({})),
            _ => JsonRpcResponse::error(id, -32601, format!("Method not found: {}", request.method)),
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        let result = json!({
            "protocolVersion": "2024-11-05",
            "serverInfo": {
                "name": "tollgate-mcp",
                "version": env!("CARGO_PKG_VERSION")
            },
            "capabilities": {
                "tools": {}
            }
        });
        JsonRpcResponse::success(id, result)
    }

    fn handle_list_tools(&self, id: Option<Value>) -> JsonRpcResponse {
        let tools = tool_definitions();
        match serde_json::to_value(&tools) {
            Ok(tools) => JsonRpcResponse::success(id, json!({ "tools": tools })),
            Err(e) => JsonRpcResponse::error(id, -32603, format!("serialization failed: {e}")),
        }
    }

    async fn handle_call_tool(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: CallToolParams = match params {
            Some(params) => match serde_json::from_value(params) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(id, -32602, format!("invalid params: {e}"));
                }
            },
            None => return JsonRpcResponse::error(id, -32602, "missing params"),
        };

        if params.name != QUERY_TOOL_NAME {
            return JsonRpcResponse::error(id, -32602, format!("unknown tool: {}", params.name));
        }

        let Some(sql) = params.arguments.get("sql").and_then(Value::as_str) else {
            return JsonRpcResponse::error(id, -32602, "missing required argument: sql");
        };
        let bound_params: Vec<Value> = params
            .arguments
            .get("params")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        match self.dispatch(sql, &bound_params).await {
            Ok(result) => match serde_json::to_value(&result) {
                Ok(value) => JsonRpcResponse::success(id, value),
                Err(e) => JsonRpcResponse::error(id, -32603, format!("serialization failed: {e}")),
            },
            // Pool-level faults are the one case that is not a result
            // envelope; surface them as an internal JSON-RPC error.
            Err(e) => JsonRpcResponse::error(id, -32603, e.to_string()),
        }
    }

    /// Route one query through classification, mode selection, and the
    /// executor.
    pub async fn dispatch(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<crate::protocol::CallToolResponse, crate::executor::ExecutorError> {
        let mode = match self.analyzer.classify_sql(sql) {
            Ok(kind) => select_mode(self.strict, kind),
            Err(e) => return Ok(crate::protocol::CallToolResponse::error(e.to_string())),
        };
        self.executor.run(sql, params, mode).await
    }
}

/// Pick the execution mode for a classified statement.
///
/// Strict configuration routes everything through strict read-only, which
/// then rejects writes regardless of the allow flags.
fn select_mode(strict: bool, kind: StatementKind) -> ExecutionMode {
    if strict {
        ExecutionMode::StrictReadOnly
    } else if kind.is_write() || kind.is_ddl() {
        ExecutionMode::Write
    } else {
        ExecutionMode::ReadOnly
    }
}

fn tool_definitions() -> Vec<ToolDefinition> {
    vec![ToolDefinition {
        name: QUERY_TOOL_NAME.to_string(),
        description: Some(
            "Run a SQL statement against the mediated MySQL database. Reads run in a \
             rolled-back read-only transaction; writes require the corresponding allow \
             flag and run in a committed transaction."
                .to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "The SQL statement to execute (exactly one statement)"
                },
                "params": {
                    "type": "array",
                    "items": { "type": ["string", "number", "boolean", "null"] },
                    "description": "Optional bound parameters for ? placeholders"
                }
            },
            "required": ["sql"]
        }),
    }]
}
