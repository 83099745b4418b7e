// Bitbucket Types - normalized values plus the per-dialect wire shapes
use crate::diff::LineType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which REST API family the configured instance speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// bitbucket.org, REST 2.0
    Cloud,
    /// Bitbucket Server / Data Center, REST 1.0
    Server,
}

impl Dialect {
    pub fn label(&self) -> &'static str {
        match self {
            Dialect::Cloud => "Cloud",
            Dialect::Server => "Server",
        }
    }

    /// Which settings to check when the API rejects our credentials
    pub fn credential_hint(&self) -> &'static str {
        match self {
            Dialect::Cloud => "BITBUCKET_USERNAME and BITBUCKET_APP_PASSWORD",
            Dialect::Server => "BITBUCKET_TOKEN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    /// Cloud workspace or Server project key
    pub workspace: String,
    pub repository: String,
    pub pull_request_id: u64,
}

impl PullRequestRef {
    pub fn describe(&self) -> String {
        format!(
            "pull request {} in {}/{}",
            self.pull_request_id, self.workspace, self.repository
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineAnchor {
    pub path: String,
    pub line: u32,
    pub line_type: LineType,
}

/// A comment about to be posted, independent of dialect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub text: String,
    pub parent_id: Option<u64>,
    pub inline: Option<InlineAnchor>,
}

/// A comment as returned by either dialect
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostedComment {
    pub id: u64,
    pub text: String,
    pub author: String,
    pub created_on: String,
}

// Bitbucket Server wire types

#[derive(Debug, Serialize)]
pub(crate) struct ServerCommentRequest<'a> {
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<ServerAnchor<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerAnchor<'a> {
    pub line: u32,
    pub line_type: LineType,
    pub file_type: &'static str,
    pub path: &'a str,
    pub diff_type: &'static str,
}

impl<'a> ServerAnchor<'a> {
    pub fn from_inline(anchor: &'a InlineAnchor) -> Self {
        Self {
            line: anchor.line,
            line_type: anchor.line_type,
            file_type: if anchor.line_type == LineType::Removed { "FROM" } else { "TO" },
            path: &anchor.path,
            diff_type: "EFFECTIVE",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerComment {
    pub id: u64,
    #[serde(default)]
    pub text: String,
    pub author: ServerUser,
    /// Epoch milliseconds
    pub created_date: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerUser {
    pub display_name: String,
}

// Bitbucket Cloud wire types

#[derive(Debug, Serialize)]
pub(crate) struct CloudCommentRequest<'a> {
    pub content: CloudContentRequest<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline: Option<CloudInline<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CloudContentRequest<'a> {
    pub raw: &'a str,
}

/// Removed lines anchor on the old side (`from`), everything else on the new side (`to`)
#[derive(Debug, Serialize)]
pub(crate) struct CloudInline<'a> {
    pub path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<u32>,
}

impl<'a> CloudInline<'a> {
    pub fn from_inline(anchor: &'a InlineAnchor) -> Self {
        let removed = anchor.line_type == LineType::Removed;
        Self {
            path: &anchor.path,
            from: removed.then_some(anchor.line),
            to: (!removed).then_some(anchor.line),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ParentRef {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub struct CloudComment {
    pub id: u64,
    pub content: CloudContent,
    pub user: CloudUser,
    pub created_on: String,
}

#[derive(Debug, Deserialize)]
pub struct CloudContent {
    #[serde(default)]
    pub raw: String,
}

#[derive(Debug, Deserialize)]
pub struct CloudUser {
    pub display_name: String,
}

/// Comment payload tagged by the dialect that produced it
#[derive(Debug)]
pub enum CommentResponse {
    Server(ServerComment),
    Cloud(CloudComment),
}

impl From<CommentResponse> for PostedComment {
    fn from(response: CommentResponse) -> Self {
        match response {
            CommentResponse::Server(c) => PostedComment {
                id: c.id,
                text: c.text,
                author: c.author.display_name,
                created_on: DateTime::<Utc>::from_timestamp_millis(c.created_date)
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_default(),
            },
            CommentResponse::Cloud(c) => PostedComment {
                id: c.id,
                text: c.content.raw,
                author: c.user.display_name,
                created_on: c.created_on,
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use similar_asserts::assert_eq;

    fn anchor(line_type: LineType) -> InlineAnchor {
        InlineAnchor {
            path: "src/app.rs".to_string(),
            line: 42,
            line_type,
        }
    }

    #[test]
    fn server_anchor_file_side() {
        let removed = anchor(LineType::Removed);
        let value = serde_json::to_value(ServerAnchor::from_inline(&removed)).unwrap();
        assert_eq!(
            value,
            json!({
                "line": 42,
                "lineType": "REMOVED",
                "fileType": "FROM",
                "path": "src/app.rs",
                "diffType": "EFFECTIVE"
            })
        );

        let added = anchor(LineType::Added);
        let value = serde_json::to_value(ServerAnchor::from_inline(&added)).unwrap();
        assert_eq!(value["fileType"], json!("TO"));
    }

    #[test]
    fn cloud_inline_side() {
        let removed = anchor(LineType::Removed);
        assert_eq!(
            serde_json::to_value(CloudInline::from_inline(&removed)).unwrap(),
            json!({ "path": "src/app.rs", "from": 42 })
        );

        let context = anchor(LineType::Context);
        assert_eq!(
            serde_json::to_value(CloudInline::from_inline(&context)).unwrap(),
            json!({ "path": "src/app.rs", "to": 42 })
        );
    }

    #[test]
    fn normalizes_server_comment() {
        let raw: ServerComment = serde_json::from_value(json!({
            "id": 7,
            "text": "Looks good",
            "author": { "displayName": "Jane Doe", "name": "jdoe" },
            "createdDate": 1_700_000_000_000i64
        }))
        .unwrap();

        let posted = PostedComment::from(CommentResponse::Server(raw));
        assert_eq!(posted.author, "Jane Doe");
        assert_eq!(posted.created_on, "2023-11-14T22:13:20+00:00");
    }

    #[test]
    fn normalizes_cloud_comment() {
        let raw: CloudComment = serde_json::from_value(json!({
            "id": 9,
            "content": { "raw": "Nit" },
            "user": { "display_name": "Sam" },
            "created_on": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        let posted = PostedComment::from(CommentResponse::Cloud(raw));
        assert_eq!(
            posted,
            PostedComment {
                id: 9,
                text: "Nit".to_string(),
                author: "Sam".to_string(),
                created_on: "2024-01-01T00:00:00Z".to_string(),
            }
        );
    }
}
