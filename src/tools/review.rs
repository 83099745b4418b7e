// Review Tools - pull request diff retrieval with optional file filtering
use super::{
    api_failure,
    args::{parse_args, GetPullRequestDiffArgs},
    pull_request_schema,
    service_trait::ToolService,
};
use crate::{
    bitbucket::DiffSource,
    diff::{filter_sections, parse_diff_into_sections, reconstruct_diff, FilterMetadata, FilterOptions},
    errors::{McpError, McpResult},
    mcp::McpTool,
};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub struct ReviewTools {
    source: Arc<dyn DiffSource>,
}

#[derive(Debug, Serialize)]
struct FilterReport<'a> {
    #[serde(flatten)]
    metadata: &'a FilterMetadata,
    filters_applied: FiltersApplied<'a>,
}

#[derive(Debug, Serialize)]
struct FiltersApplied<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    file_path: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    include_patterns: Vec<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    exclude_patterns: Vec<&'a str>,
}

impl<'a> FiltersApplied<'a> {
    fn from_options(options: &'a FilterOptions) -> Self {
        Self {
            file_path: options.file_path.as_deref().filter(|p| !p.is_empty()),
            include_patterns: options.include_patterns.iter().map(String::as_str).collect(),
            exclude_patterns: options.exclude_patterns.iter().map(String::as_str).collect(),
        }
    }
}

impl ReviewTools {
    pub fn new(source: Arc<dyn DiffSource>) -> Self {
        Self { source }
    }

    async fn get_pull_request_diff(&self, args: GetPullRequestDiffArgs) -> McpResult<Value> {
        let pr = args.pull_request();
        let diff = self
            .source
            .fetch_diff(&pr, args.context_lines)
            .await
            .map_err(|e| {
                api_failure(
                    e,
                    &format!("getting diff for {}", pr.describe()),
                    self.source.dialect(),
                )
            })?;

        let options = args.filter_options();
        if options.is_empty() {
            return Ok(json!({
                "message": "Pull request diff retrieved successfully",
                "pull_request_id": pr.pull_request_id,
                "diff": diff,
            }));
        }

        let filtered = filter_sections(parse_diff_into_sections(&diff), &options);
        info!(
            total = filtered.metadata.total_files,
            included = filtered.metadata.included_files,
            "Filtered diff for {}",
            pr.describe()
        );

        let report = FilterReport {
            metadata: &filtered.metadata,
            filters_applied: FiltersApplied::from_options(&options),
        };

        Ok(json!({
            "message": "Pull request diff retrieved successfully",
            "pull_request_id": pr.pull_request_id,
            "diff": reconstruct_diff(&filtered.sections),
            "filter_metadata": report,
        }))
    }
}

#[async_trait]
impl ToolService for ReviewTools {
    fn id(&self) -> &'static str {
        "review"
    }

    fn list_tools(&self) -> Vec<McpTool> {
        vec![McpTool {
            name: "get_pull_request_diff".to_string(),
            description: "Get the diff/changes for a pull request, optionally narrowed to one file or to glob patterns"
                .to_string(),
            input_schema: pull_request_schema(
                json!({
                    "context_lines": {
                        "type": "number",
                        "description": "Number of context lines around changes (optional, default: 3)"
                    },
                    "include_patterns": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Glob patterns of files to keep (e.g., [\"*.rs\", \"src/**/*.ts\"])"
                    },
                    "exclude_patterns": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Glob patterns of files to drop (e.g., [\"*.lock\", \"dist/**\"])"
                    },
                    "file_path": {
                        "type": "string",
                        "description": "Return only this file's diff; overrides the patterns"
                    }
                }),
                &[],
            ),
        }]
    }

    async fn call_tool(&self, tool: &str, args: Value) -> McpResult<Value> {
        match tool {
            "get_pull_request_diff" => self.get_pull_request_diff(parse_args(tool, args)?).await,
            _ => Err(McpError::ToolNotFound(format!("Unknown review tool: {tool}"))),
        }
    }
}
