// Diff Source - the per-dialect capability behind the review tools
use super::client::{ApiClient, ApiError};
use super::types::*;
use async_trait::async_trait;
use std::sync::Arc;

/// Where pull-request diffs come from and where comments go.
///
/// Implementations hide every Cloud/Server difference; callers only see diff text
/// and normalized comments.
#[async_trait]
pub trait DiffSource: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Raw unified diff for the pull request
    async fn fetch_diff(&self, pr: &PullRequestRef, context_lines: u32) -> Result<String, ApiError>;

    async fn post_comment(
        &self,
        pr: &PullRequestRef,
        comment: &NewComment,
    ) -> Result<PostedComment, ApiError>;
}

/// bitbucket.org REST 2.0
pub struct CloudDiffSource {
    client: ApiClient,
}

impl CloudDiffSource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn pull_request_path(pr: &PullRequestRef) -> String {
        format!(
            "/repositories/{}/{}/pullrequests/{}",
            pr.workspace, pr.repository, pr.pull_request_id
        )
    }
}

#[async_trait]
impl DiffSource for CloudDiffSource {
    fn dialect(&self) -> Dialect {
        Dialect::Cloud
    }

    async fn fetch_diff(&self, pr: &PullRequestRef, context_lines: u32) -> Result<String, ApiError> {
        let path = format!("{}/diff", Self::pull_request_path(pr));
        self.client
            .get_text(&path, &[("context", context_lines.to_string())])
            .await
    }

    async fn post_comment(
        &self,
        pr: &PullRequestRef,
        comment: &NewComment,
    ) -> Result<PostedComment, ApiError> {
        let path = format!("{}/comments", Self::pull_request_path(pr));
        let body = CloudCommentRequest {
            content: CloudContentRequest { raw: &comment.text },
            parent: comment.parent_id.map(|id| ParentRef { id }),
            inline: comment.inline.as_ref().map(CloudInline::from_inline),
        };

        let raw: CloudComment = self.client.post_json(&path, &body).await?;
        Ok(CommentResponse::Cloud(raw).into())
    }
}

/// Bitbucket Server / Data Center REST 1.0
pub struct ServerDiffSource {
    client: ApiClient,
}

impl ServerDiffSource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn pull_request_path(pr: &PullRequestRef) -> String {
        format!(
            "/rest/api/1.0/projects/{}/repos/{}/pull-requests/{}",
            pr.workspace, pr.repository, pr.pull_request_id
        )
    }
}

#[async_trait]
impl DiffSource for ServerDiffSource {
    fn dialect(&self) -> Dialect {
        Dialect::Server
    }

    async fn fetch_diff(&self, pr: &PullRequestRef, context_lines: u32) -> Result<String, ApiError> {
        let path = format!("{}/diff", Self::pull_request_path(pr));
        self.client
            .get_text(&path, &[("contextLines", context_lines.to_string())])
            .await
    }

    async fn post_comment(
        &self,
        pr: &PullRequestRef,
        comment: &NewComment,
    ) -> Result<PostedComment, ApiError> {
        let path = format!("{}/comments", Self::pull_request_path(pr));
        let body = ServerCommentRequest {
            text: &comment.text,
            parent: comment.parent_id.map(|id| ParentRef { id }),
            anchor: comment.inline.as_ref().map(ServerAnchor::from_inline),
        };

        let raw: ServerComment = self.client.post_json(&path, &body).await?;
        Ok(CommentResponse::Server(raw).into())
    }
}

/// Pick the implementation matching the client's credentials.
pub fn source_for(client: ApiClient) -> Arc<dyn DiffSource> {
    match client.dialect() {
        Dialect::Cloud => Arc::new(CloudDiffSource::new(client)),
        Dialect::Server => Arc::new(ServerDiffSource::new(client)),
    }
}
