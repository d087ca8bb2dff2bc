//! # tollgate-mcp
//!
//! MCP (Model Context Protocol) server and query executor for Tollgate.
//!
//! This crate exposes the mediated database to a calling agent as a single
//! MCP tool and enforces the authorization pipeline on every call:
//!
//! ```text
//! AI agent
//!    │
//!    │ MCP protocol (tools/call: mysql_query)
//!    ▼
//! ┌──────────────────────┐
//! │ Tollgate MCP server  │
//! │ 1. Parse (exactly    │  ← tollgate-sql
//! │    one statement)    │
//! │ 2. Classify          │  ← tollgate-sql
//! │ 3. Denylist check    │  ← tollgate-policy
//! │ 4. Execute under the │
//! │    selected mode     │
//! └──────────┬───────────┘
//!            │
//!            ▼
//!     Upstream MySQL
//! ```
//!
//! Execution modes and their transaction discipline:
//!
//! | Mode             | Gate                              | Transaction        |
//! |------------------|-----------------------------------|--------------------|
//! | `Unrestricted`   | single statement only             | none               |
//! | `ReadOnly`       | writes need their allow flag      | always rolled back |
//! | `StrictReadOnly` | reads only, flags ignored         | always rolled back |
//! | `Write`          | insert/update/delete/ddl by flag  | commit or rollback |
//!
//! Policy denials are normal results (`isError: true` envelopes), never
//! panics or thrown errors; only connection-acquisition faults surface as
//! [`ExecutorError`].

pub mod error;
pub mod executor;
pub mod format;
pub mod protocol;
pub mod server;

// Re-export sqlx pool types so binaries do not need a direct sqlx dependency.
pub use sqlx::MySqlPool;
pub use sqlx::mysql::MySqlPoolOptions;

pub use error::McpError;
pub use executor::{ExecutionMode, ExecutorError, QueryExecutor};
pub use format::{WriteSummary, to_pretty_json};
pub use protocol::{
    CallToolParams, CallToolResponse, JsonRpcRequest, JsonRpcResponse, ToolContent, ToolDefinition,
};
pub use server::McpServer;
