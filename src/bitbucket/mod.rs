// Bitbucket Module - REST access for Cloud and Server
pub mod client;
pub mod source;
pub mod types;

pub use client::{ApiClient, ApiError, Credentials};
pub use source::{source_for, CloudDiffSource, DiffSource, ServerDiffSource};
pub use types::{Dialect, InlineAnchor, NewComment, PostedComment, PullRequestRef};
