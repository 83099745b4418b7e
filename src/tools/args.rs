// Tool Arguments - typed views of the `arguments` object of tools/call
use crate::{
    bitbucket::PullRequestRef,
    diff::{FilterOptions, LineType, MatchStrategy, SearchContext},
    errors::{McpError, McpResult},
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

pub const DEFAULT_CONTEXT_LINES: u32 = 3;

fn default_context_lines() -> u32 {
    DEFAULT_CONTEXT_LINES
}

/// Deserialize tool arguments, reporting mismatches as invalid arguments.
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> McpResult<T> {
    let args = if args.is_null() { Value::Object(Default::default()) } else { args };
    serde_json::from_value(args)
        .map_err(|e| McpError::InvalidArguments(format!("Invalid arguments for {tool}: {e}")))
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetPullRequestDiffArgs {
    pub workspace: String,
    pub repository: String,
    pub pull_request_id: u64,
    #[serde(default = "default_context_lines")]
    pub context_lines: u32,
    #[serde(default)]
    pub include_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub file_path: Option<String>,
}

impl GetPullRequestDiffArgs {
    pub fn pull_request(&self) -> PullRequestRef {
        PullRequestRef {
            workspace: self.workspace.clone(),
            repository: self.repository.clone(),
            pull_request_id: self.pull_request_id,
        }
    }

    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions {
            include_patterns: self.include_patterns.clone(),
            exclude_patterns: self.exclude_patterns.clone(),
            file_path: self.file_path.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddCommentArgs {
    pub workspace: String,
    pub repository: String,
    pub pull_request_id: u64,
    pub comment_text: String,
    #[serde(default)]
    pub parent_comment_id: Option<u64>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub line_number: Option<u32>,
    #[serde(default)]
    pub line_type: Option<LineType>,
    #[serde(default)]
    pub suggestion: Option<String>,
    #[serde(default)]
    pub suggestion_end_line: Option<u32>,
    #[serde(default)]
    pub code_snippet: Option<String>,
    #[serde(default)]
    pub search_context: Option<SearchContext>,
    #[serde(default)]
    pub match_strategy: MatchStrategy,
}

impl AddCommentArgs {
    pub fn pull_request(&self) -> PullRequestRef {
        PullRequestRef {
            workspace: self.workspace.clone(),
            repository: self.repository.clone(),
            pull_request_id: self.pull_request_id,
        }
    }

    /// Cross-field rules serde cannot express.
    pub fn validate(&self) -> McpResult<()> {
        let invalid = |msg: &str| Err(McpError::InvalidArguments(msg.to_string()));
        let has_file = self.file_path.as_deref().is_some_and(|p| !p.is_empty());

        if self.line_number.is_some() && !has_file {
            return invalid("line_number requires file_path");
        }

        if let Some(snippet) = &self.code_snippet {
            if !has_file {
                return invalid("code_snippet requires file_path");
            }
            if snippet.trim().is_empty() {
                return invalid("code_snippet must not be empty");
            }
        }

        if self.suggestion.is_some()
            && (!has_file || (self.line_number.is_none() && self.code_snippet.is_none()))
        {
            return invalid("suggestion requires file_path and either line_number or code_snippet");
        }

        Ok(())
    }
}
