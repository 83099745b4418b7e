// MCP Error Types
use crate::diff::{CodeMatch, MatchError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

pub type McpResult<T> = Result<T, McpError>;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Code snippet \"{snippet}\" not found in {file_path}")]
    SnippetNotFound { snippet: String, file_path: String },

    #[error("Code snippet \"{snippet}\" matches {} lines in {file_path}", .matches.len())]
    AmbiguousSnippet {
        snippet: String,
        file_path: String,
        matches: Vec<CodeMatch>,
    },

    /// Bitbucket rejected or failed the request; reported as a tool error result
    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpErrorResponse {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl McpError {
    /// Attach the snippet and file to a matcher failure.
    pub fn from_match(err: MatchError, snippet: &str, file_path: &str) -> Self {
        match err {
            MatchError::NotFound => McpError::SnippetNotFound {
                snippet: snippet.to_string(),
                file_path: file_path.to_string(),
            },
            MatchError::Ambiguous { matches } => McpError::AmbiguousSnippet {
                snippet: snippet.to_string(),
                file_path: file_path.to_string(),
                matches,
            },
        }
    }

    pub fn to_jsonrpc_error(&self) -> McpErrorResponse {
        match self {
            McpError::ParseError(_) => McpErrorResponse {
                code: -32700,
                message: self.to_string(),
                data: None,
            },
            McpError::ToolNotFound(msg) => McpErrorResponse {
                code: -32601,
                message: msg.clone(),
                data: None,
            },
            McpError::InvalidArguments(msg) => McpErrorResponse {
                code: -32602,
                message: msg.clone(),
                data: None,
            },
            McpError::SnippetNotFound { .. } => McpErrorResponse {
                code: -32602,
                message: self.to_string(),
                data: None,
            },
            McpError::AmbiguousSnippet {
                snippet,
                file_path,
                matches,
            } => McpErrorResponse {
                code: -32602,
                message: self.to_string(),
                data: Some(json!({
                    "code_snippet": snippet,
                    "file_path": file_path,
                    "matches": matches.iter().map(|m| json!({
                        "line_number": m.line_number,
                        "line_type": m.line_type,
                        "preview": m.preview,
                        "confidence": m.confidence,
                        "context": m.context,
                    })).collect::<Vec<_>>(),
                    "suggestion": "To resolve, either: 1) add search_context with lines before/after the target, \
                                   2) set match_strategy to \"best\" to pick the highest-confidence match, \
                                   or 3) pass line_number directly",
                })),
            },
            _ => McpErrorResponse {
                code: -32603,
                message: self.to_string(),
                data: None,
            },
        }
    }
}
