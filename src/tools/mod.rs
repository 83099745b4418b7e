// Tools Module - MCP tools for reviewing Bitbucket pull requests
pub mod args;
pub mod comments;
pub mod manager;
pub mod review;
pub mod service_trait;
pub mod suggestion;

pub use comments::CommentTools;
pub use manager::ToolManager;
pub use review::ReviewTools;
pub use service_trait::ToolService;
pub use suggestion::format_suggestion_comment;

use crate::{
    bitbucket::{ApiError, Dialect},
    errors::McpError,
};
use tracing::error;

/// Turn an API failure into the message the model sees.
pub(crate) fn api_failure(err: ApiError, context: &str, dialect: Dialect) -> McpError {
    error!(status = ?err.status(), error = %err, "Bitbucket {} API call failed while {}", dialect.label(), context);
    McpError::ProviderError(err.describe(context, dialect))
}

/// Object schema with the pull-request coordinates every tool takes.
pub(crate) fn pull_request_schema(properties: serde_json::Value, required: &[&str]) -> serde_json::Value {
    let mut props = serde_json::json!({
        "workspace": {
            "type": "string",
            "description": "Bitbucket workspace (Cloud) or project key (Server), e.g. \"PROJ\""
        },
        "repository": {
            "type": "string",
            "description": "Repository slug (e.g., \"my-repo\")"
        },
        "pull_request_id": {
            "type": "number",
            "description": "Pull request ID"
        }
    });
    if let (Some(base), serde_json::Value::Object(extra)) = (props.as_object_mut(), properties) {
        base.extend(extra);
    }

    let mut all_required = vec!["workspace", "repository", "pull_request_id"];
    all_required.extend_from_slice(required);

    serde_json::json!({
        "type": "object",
        "properties": props,
        "required": all_required
    })
}
