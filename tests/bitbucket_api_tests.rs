//! HTTP mock tests for the Cloud and Server diff sources.
//!
//! Uses wiremock to stand in for both Bitbucket REST dialects.

use bitbucket_mcp_server::bitbucket::{
    source_for, ApiClient, ApiError, Credentials, Dialect, DiffSource, InlineAnchor, NewComment,
    PullRequestRef,
};
use bitbucket_mcp_server::diff::LineType;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{basic_auth, bearer_token, body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DIFF: &str = "diff --git a/a.txt b/a.txt\n--- a/a.txt\n+++ b/a.txt\n@@ -1 +1 @@\n-x\n+y\n";

fn cloud_source(server: &MockServer) -> Arc<dyn DiffSource> {
    let credentials = Credentials::Basic {
        username: "me".to_string(),
        password: "app-pass".to_string(),
    };
    source_for(ApiClient::new(server.uri(), credentials, Duration::from_secs(5)).unwrap())
}

fn server_source(server: &MockServer) -> Arc<dyn DiffSource> {
    let credentials = Credentials::Bearer {
        token: "http-token".to_string(),
    };
    source_for(ApiClient::new(server.uri(), credentials, Duration::from_secs(5)).unwrap())
}

fn pull_request() -> PullRequestRef {
    PullRequestRef {
        workspace: "PROJ".to_string(),
        repository: "repo".to_string(),
        pull_request_id: 17,
    }
}

// =============================================================================
// Diff retrieval
// =============================================================================

#[tokio::test]
async fn test_cloud_diff_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repositories/PROJ/repo/pullrequests/17/diff"))
        .and(query_param("context", "5"))
        .and(basic_auth("me", "app-pass"))
        .and(header("accept", "text/plain"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DIFF))
        .expect(1)
        .mount(&server)
        .await;

    let source = cloud_source(&server);
    assert_eq!(source.dialect(), Dialect::Cloud);

    let diff = source.fetch_diff(&pull_request(), 5).await.unwrap();
    assert_eq!(diff, DIFF);
}

#[tokio::test]
async fn test_server_diff_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/api/1.0/projects/PROJ/repos/repo/pull-requests/17/diff"))
        .and(query_param("contextLines", "3"))
        .and(bearer_token("http-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DIFF))
        .expect(1)
        .mount(&server)
        .await;

    let source = server_source(&server);
    assert_eq!(source.dialect(), Dialect::Server);

    let diff = source.fetch_diff(&pull_request(), 3).await.unwrap();
    assert_eq!(diff, DIFF);
}

// =============================================================================
// Comments
// =============================================================================

#[tokio::test]
async fn test_cloud_inline_comment_on_removed_line() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repositories/PROJ/repo/pullrequests/17/comments"))
        .and(body_json(json!({
            "content": { "raw": "Why remove this?" },
            "inline": { "path": "src/a.rs", "from": 12 }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 555,
            "content": { "raw": "Why remove this?" },
            "user": { "display_name": "Cloud Reviewer" },
            "created_on": "2024-03-01T12:00:00.000000+00:00"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let comment = NewComment {
        text: "Why remove this?".to_string(),
        parent_id: None,
        inline: Some(InlineAnchor {
            path: "src/a.rs".to_string(),
            line: 12,
            line_type: LineType::Removed,
        }),
    };

    let posted = cloud_source(&server)
        .post_comment(&pull_request(), &comment)
        .await
        .unwrap();

    assert_eq!(posted.id, 555);
    assert_eq!(posted.author, "Cloud Reviewer");
    assert_eq!(posted.created_on, "2024-03-01T12:00:00.000000+00:00");
}

#[tokio::test]
async fn test_server_reply_with_anchor() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/api/1.0/projects/PROJ/repos/repo/pull-requests/17/comments"))
        .and(body_json(json!({
            "text": "Agreed",
            "parent": { "id": 9 },
            "anchor": {
                "line": 4,
                "lineType": "ADDED",
                "fileType": "TO",
                "path": "src/a.rs",
                "diffType": "EFFECTIVE"
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 31,
            "version": 0,
            "text": "Agreed",
            "author": { "name": "jdoe", "displayName": "Jane Doe" },
            "createdDate": 1_700_000_000_000i64
        })))
        .expect(1)
        .mount(&server)
        .await;

    let comment = NewComment {
        text: "Agreed".to_string(),
        parent_id: Some(9),
        inline: Some(InlineAnchor {
            path: "src/a.rs".to_string(),
            line: 4,
            line_type: LineType::Added,
        }),
    };

    let posted = server_source(&server)
        .post_comment(&pull_request(), &comment)
        .await
        .unwrap();

    assert_eq!(posted.id, 31);
    assert_eq!(posted.author, "Jane Doe");
    assert_eq!(posted.created_on, "2023-11-14T22:13:20+00:00");
}

// =============================================================================
// Error mapping
// =============================================================================

#[tokio::test]
async fn test_server_error_body_message() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/api/1.0/projects/PROJ/repos/repo/pull-requests/17/diff"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "errors": [{ "context": null, "message": "Pull request 17 does not exist", "exceptionName": null }]
        })))
        .mount(&server)
        .await;

    let err = server_source(&server)
        .fetch_diff(&pull_request(), 3)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(err.message(), "Pull request 17 does not exist");
    assert_eq!(
        err.describe("getting diff for pull request 17 in PROJ/repo", Dialect::Server),
        "Not found: getting diff for pull request 17 in PROJ/repo"
    );
}

#[tokio::test]
async fn test_cloud_error_body_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repositories/PROJ/repo/pullrequests/17/comments"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "type": "error",
            "error": { "message": "inline.path: file not in diff" }
        })))
        .mount(&server)
        .await;

    let comment = NewComment {
        text: "x".to_string(),
        parent_id: None,
        inline: None,
    };
    let err = cloud_source(&server)
        .post_comment(&pull_request(), &comment)
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Status { status: 400, .. }));
    assert_eq!(
        err.describe("adding comment", Dialect::Cloud),
        "Bitbucket API error: inline.path: file not in diff"
    );
}

#[tokio::test]
async fn test_plain_text_error_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway from proxy"))
        .mount(&server)
        .await;

    let err = cloud_source(&server)
        .fetch_diff(&pull_request(), 3)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(502));
    assert_eq!(err.message(), "Bad Gateway from proxy");
}
