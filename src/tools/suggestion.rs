// Suggestion Formatting - fenced `suggestion` blocks Bitbucket renders as applicable changes

/// Append a suggestion block to a review comment.
///
/// The line range is only mentioned when it spans more than one line.
pub fn format_suggestion_comment(
    comment_text: &str,
    suggestion: &str,
    start_line: Option<u32>,
    end_line: Option<u32>,
) -> String {
    let line_info = match (start_line, end_line) {
        (Some(start), Some(end)) if end > start => format!(" (lines {start}-{end})"),
        _ => String::new(),
    };

    format!("{comment_text}{line_info}\n\n```suggestion\n{suggestion}\n```")
}
