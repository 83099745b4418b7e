// Comment Tools - general, inline, and suggestion comments on pull requests
use super::{
    api_failure,
    args::{parse_args, AddCommentArgs, DEFAULT_CONTEXT_LINES},
    pull_request_schema,
    service_trait::ToolService,
    suggestion::format_suggestion_comment,
};
use crate::{
    bitbucket::{DiffSource, InlineAnchor, NewComment, PostedComment, PullRequestRef},
    diff::{
        extract_file, parse_diff_into_sections, resolve_match, CodeMatch, CodeMatcher, LineType,
        MatchStrategy, SearchContext,
    },
    errors::{McpError, McpResult},
    mcp::McpTool,
};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

pub struct CommentTools {
    source: Arc<dyn DiffSource>,
    matcher: CodeMatcher,
}

#[derive(Debug, Serialize)]
struct CommentSummary<'a> {
    #[serde(flatten)]
    comment: &'a PostedComment,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line_type: Option<LineType>,
}

impl CommentTools {
    pub fn new(source: Arc<dyn DiffSource>, matcher: CodeMatcher) -> Self {
        Self { source, matcher }
    }

    async fn add_comment(&self, args: AddCommentArgs) -> McpResult<Value> {
        args.validate()?;
        let pr = args.pull_request();
        let file_path = args.file_path.as_deref().filter(|p| !p.is_empty());

        let mut line_number = args.line_number;
        let mut line_type = args.line_type;
        let mut code_match = None;

        // An explicit line number always wins over a snippet
        if let (Some(snippet), Some(path), None) = (args.code_snippet.as_deref(), file_path, line_number) {
            let found = self
                .locate_snippet(
                    &pr,
                    path,
                    snippet,
                    args.search_context.as_ref(),
                    args.match_strategy,
                )
                .await?;
            info!(
                line = found.line_number,
                line_type = found.line_type.as_str(),
                confidence = found.confidence,
                "Resolved code snippet in {}",
                path
            );
            line_number = Some(found.line_number);
            line_type = Some(found.line_type);
            code_match = Some(found);
        }

        let inline = match (file_path, line_number) {
            (Some(path), Some(line)) => Some(InlineAnchor {
                path: path.to_string(),
                line,
                line_type: line_type.unwrap_or_default(),
            }),
            _ => None,
        };

        let text = match args.suggestion.as_deref() {
            Some(suggestion) => format_suggestion_comment(
                &args.comment_text,
                suggestion,
                line_number,
                args.suggestion_end_line,
            ),
            None => args.comment_text.clone(),
        };

        let comment = NewComment {
            text,
            parent_id: args.parent_comment_id,
            inline,
        };

        let context = match &comment.inline {
            Some(anchor) => format!("adding inline comment on {} to {}", anchor.path, pr.describe()),
            None => format!("adding comment to {}", pr.describe()),
        };
        let posted = self
            .source
            .post_comment(&pr, &comment)
            .await
            .map_err(|e| api_failure(e, &context, self.source.dialect()))?;

        let message = if args.suggestion.is_some() {
            "Comment with code suggestion added successfully"
        } else if comment.inline.is_some() {
            "Inline comment added successfully"
        } else {
            "Comment added successfully"
        };

        let summary = CommentSummary {
            comment: &posted,
            file_path: comment.inline.as_ref().map(|a| a.path.as_str()),
            line_number: comment.inline.as_ref().map(|a| a.line),
            line_type: comment.inline.as_ref().map(|a| a.line_type),
        };

        let mut response = json!({
            "message": message,
            "comment": summary,
        });
        if let Some(found) = code_match {
            response["code_match"] = json!({
                "line_number": found.line_number,
                "line_type": found.line_type,
                "confidence": found.confidence,
                "hunk_info": found.hunk_info,
            });
            if let Some(position) = found.sequential_position {
                response["code_match"]["sequential_position"] = json!(position);
            }
        }

        Ok(response)
    }

    /// Fetch the diff and resolve `snippet` inside `file_path`'s section.
    async fn locate_snippet(
        &self,
        pr: &PullRequestRef,
        file_path: &str,
        snippet: &str,
        search_context: Option<&SearchContext>,
        strategy: MatchStrategy,
    ) -> McpResult<CodeMatch> {
        let diff = self
            .source
            .fetch_diff(pr, DEFAULT_CONTEXT_LINES)
            .await
            .map_err(|e| {
                api_failure(
                    e,
                    &format!("getting diff for {}", pr.describe()),
                    self.source.dialect(),
                )
            })?;

        let sections = parse_diff_into_sections(&diff);
        let section = extract_file(&sections, file_path).ok_or_else(|| {
            McpError::InvalidArguments(format!(
                "File {} is not part of the diff for {}",
                file_path,
                pr.describe()
            ))
        })?;

        let matches = self
            .matcher
            .find_matches(&section.content, snippet, search_context);
        debug!(count = matches.len(), ?strategy, "Snippet candidates in {}", file_path);

        resolve_match(matches, strategy).map_err(|err| McpError::from_match(err, snippet, file_path))
    }
}

#[async_trait]
impl ToolService for CommentTools {
    fn id(&self) -> &'static str {
        "comments"
    }

    fn list_tools(&self) -> Vec<McpTool> {
        vec![McpTool {
            name: "add_comment".to_string(),
            description: "Add a comment to a pull request: general, inline on a line, or anchored by a code snippet, \
                          optionally with a code suggestion"
                .to_string(),
            input_schema: pull_request_schema(
                json!({
                    "comment_text": {
                        "type": "string",
                        "description": "Comment text"
                    },
                    "parent_comment_id": {
                        "type": "number",
                        "description": "Parent comment ID for replies (optional)"
                    },
                    "file_path": {
                        "type": "string",
                        "description": "File path for inline comment (optional, e.g., \"src/main.js\")"
                    },
                    "line_number": {
                        "type": "number",
                        "description": "Line number for inline comment (optional, requires file_path)"
                    },
                    "line_type": {
                        "type": "string",
                        "description": "Type of line for inline comment: ADDED, REMOVED, or CONTEXT (optional, default: CONTEXT)",
                        "enum": ["ADDED", "REMOVED", "CONTEXT"]
                    },
                    "suggestion": {
                        "type": "string",
                        "description": "Replacement code rendered as an applicable suggestion (requires file_path and line_number or code_snippet)"
                    },
                    "suggestion_end_line": {
                        "type": "number",
                        "description": "Last line the suggestion replaces, for multi-line suggestions (optional)"
                    },
                    "code_snippet": {
                        "type": "string",
                        "description": "Exact code line to anchor the comment on, used instead of line_number (requires file_path)"
                    },
                    "search_context": {
                        "type": "object",
                        "description": "Lines expected around code_snippet, to tell repeated occurrences apart",
                        "properties": {
                            "before": { "type": "array", "items": { "type": "string" } },
                            "after": { "type": "array", "items": { "type": "string" } }
                        }
                    },
                    "match_strategy": {
                        "type": "string",
                        "description": "How to handle several matches: strict fails and lists them, best picks the highest confidence (default: strict)",
                        "enum": ["strict", "best"]
                    }
                }),
                &["comment_text"],
            ),
        }]
    }

    async fn call_tool(&self, tool: &str, args: Value) -> McpResult<Value> {
        match tool {
            "add_comment" => self.add_comment(parse_args(tool, args)?).await,
            _ => Err(McpError::ToolNotFound(format!("Unknown comment tool: {tool}"))),
        }
    }
}
