// Bitbucket MCP Server - Model Context Protocol server for Bitbucket pull request review
// Fetches and filters pull request diffs and posts inline comments anchored by line or code snippet

pub mod bitbucket;
pub mod config;
pub mod diff;
pub mod errors;
pub mod logging;
pub mod mcp;
pub mod tools;

pub use config::McpConfig;
pub use errors::{McpError, McpResult};
pub use mcp::McpServer;
pub use tools::ToolManager;
