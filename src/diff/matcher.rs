// Code Matcher - resolves a literal code snippet to a line inside diff hunks
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static HUNK_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("static regex"));

const PREVIEW_MARKER: &str = "> ";
const PREVIEW_INDENT: &str = "  ";
const CONTEXT_LINES: usize = 2;

/// Which side of the diff a line belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LineType {
    Added,
    Removed,
    #[default]
    Context,
}

impl LineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineType::Added => "ADDED",
            LineType::Removed => "REMOVED",
            LineType::Context => "CONTEXT",
        }
    }
}

/// Expected neighbour lines used to rank repeated occurrences
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchContext {
    #[serde(default)]
    pub before: Vec<String>,
    #[serde(default)]
    pub after: Vec<String>,
}

/// How to settle a snippet that occurs more than once
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    /// Refuse to pick; report every candidate
    #[default]
    Strict,
    /// Take the highest-confidence candidate
    Best,
}

/// Configuration for match confidence scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    /// Score every exact match starts with
    pub base: f64,
    /// Added per fully matching side of the search context
    pub context_weight: f64,
    /// Added when the matched line is an ADDED line
    pub added_bonus: f64,
    /// Upper clamp
    pub max: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            base: 0.5,
            context_weight: 0.3,
            added_bonus: 0.1,
            max: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchContext {
    pub lines_before: Vec<String>,
    pub lines_after: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HunkInfo {
    /// 0-based index of the hunk within the scanned text
    pub hunk_index: usize,
    pub destination_start: u32,
    /// 1-based position of the line among the hunk's body lines
    pub line_in_hunk: u32,
}

/// A located occurrence of a snippet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeMatch {
    /// Destination line for ADDED/CONTEXT, source line for REMOVED
    pub line_number: u32,
    pub line_type: LineType,
    pub confidence: f64,
    pub preview: String,
    pub context: MatchContext,
    /// Count of ADDED lines seen so far, this one included
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequential_position: Option<u32>,
    pub hunk_info: HunkInfo,
}

#[derive(Debug, Clone, Error)]
pub enum MatchError {
    #[error("Code snippet not found in diff")]
    NotFound,

    #[error("Code snippet found at {} locations", .matches.len())]
    Ambiguous { matches: Vec<CodeMatch> },
}

/// Position counters for the hunk currently being walked
struct HunkCursor {
    index: usize,
    src_start: u32,
    dest_start: u32,
    src_pos: u32,
    dest_pos: u32,
    /// Body lines still owed to each side by the header lengths
    src_remaining: u32,
    dest_remaining: u32,
    line_in_hunk: u32,
}

impl HunkCursor {
    /// `None` when the header is malformed or its numbers do not fit a line number.
    fn from_header(line: &str, index: usize) -> Option<Self> {
        let caps = HUNK_HEADER.captures(line)?;
        let length = |group: usize| match caps.get(group) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(1),
        };

        Some(Self {
            index,
            src_start: caps[1].parse().ok()?,
            dest_start: caps[3].parse().ok()?,
            src_pos: 0,
            dest_pos: 0,
            src_remaining: length(2)?,
            dest_remaining: length(4)?,
            line_in_hunk: 0,
        })
    }

    /// Consume one body line, returning its type and file line number.
    ///
    /// `None` means the line does not belong to this hunk: the header lengths are
    /// used up for its side, or the number would overflow.
    fn advance(&mut self, prefix: u8) -> Option<(LineType, u32)> {
        let step = match prefix {
            b'+' if self.dest_remaining > 0 => {
                let number = self.dest_start.checked_add(self.dest_pos)?;
                self.dest_remaining -= 1;
                self.dest_pos += 1;
                (LineType::Added, number)
            }
            b'-' if self.src_remaining > 0 => {
                let number = self.src_start.checked_add(self.src_pos)?;
                self.src_remaining -= 1;
                self.src_pos += 1;
                (LineType::Removed, number)
            }
            b' ' if self.src_remaining > 0 && self.dest_remaining > 0 => {
                let number = self.dest_start.checked_add(self.dest_pos)?;
                self.src_remaining -= 1;
                self.dest_remaining -= 1;
                self.src_pos += 1;
                self.dest_pos += 1;
                (LineType::Context, number)
            }
            _ => return None,
        };
        self.line_in_hunk = self.line_in_hunk.saturating_add(1);
        Some(step)
    }

    fn is_exhausted(&self) -> bool {
        self.src_remaining == 0 && self.dest_remaining == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct CodeMatcher {
    weights: ConfidenceWeights,
}

impl CodeMatcher {
    pub fn new(weights: ConfidenceWeights) -> Self {
        Self { weights }
    }

    /// Every hunk line whose content equals `snippet` after trimming.
    ///
    /// Single pass over the diff. A hunk ends once the line counts in its header are
    /// used up, or at a blank line or a file header; lines outside a hunk are never
    /// matched.
    pub fn find_matches(
        &self,
        diff: &str,
        snippet: &str,
        search_context: Option<&SearchContext>,
    ) -> Vec<CodeMatch> {
        let target = snippet.trim();
        if target.is_empty() {
            return Vec::new();
        }

        let lines: Vec<&str> = diff.lines().collect();
        let mut matches = Vec::new();
        let mut cursor: Option<HunkCursor> = None;
        let mut hunks_seen = 0;
        let mut added_seen = 0u32;

        for (index, line) in lines.iter().enumerate() {
            if line.starts_with("@@") {
                // an unreadable header still opens a hunk, just not one we can number
                cursor = HunkCursor::from_header(line, hunks_seen);
                hunks_seen += 1;
                continue;
            }

            if line.is_empty() || line.starts_with("diff --git") || is_file_header(&lines, index) {
                cursor = None;
                continue;
            }

            let Some(hunk) = cursor.as_mut() else {
                continue;
            };

            // "\ No newline at end of file"
            if line.starts_with('\\') {
                continue;
            }

            let Some((line_type, line_number)) = hunk.advance(line.as_bytes()[0]) else {
                cursor = None;
                continue;
            };
            if line_type == LineType::Added {
                added_seen = added_seen.saturating_add(1);
            }

            let hunk_info = HunkInfo {
                hunk_index: hunk.index,
                destination_start: hunk.dest_start,
                line_in_hunk: hunk.line_in_hunk,
            };
            if hunk.is_exhausted() {
                cursor = None;
            }

            if line[1..].trim() != target {
                continue;
            }

            matches.push(CodeMatch {
                line_number,
                line_type,
                confidence: self.calculate_confidence(&lines, index, search_context, line_type),
                preview: build_preview(&lines, index),
                context: MatchContext {
                    lines_before: lines[index.saturating_sub(CONTEXT_LINES)..index]
                        .iter()
                        .map(|l| diff_content(l).to_string())
                        .collect(),
                    lines_after: lines[index + 1..(index + 1 + CONTEXT_LINES).min(lines.len())]
                        .iter()
                        .map(|l| diff_content(l).to_string())
                        .collect(),
                },
                sequential_position: (line_type == LineType::Added).then_some(added_seen),
                hunk_info,
            });
        }

        matches
    }

    /// Weighted-sum score for the match at `match_index` within `lines`.
    pub fn calculate_confidence(
        &self,
        lines: &[&str],
        match_index: usize,
        search_context: Option<&SearchContext>,
        line_type: LineType,
    ) -> f64 {
        let mut score = self.weights.base;

        if let Some(ctx) = search_context {
            if !ctx.before.is_empty() {
                // closest expected line first
                let matched = ctx
                    .before
                    .iter()
                    .rev()
                    .enumerate()
                    .filter(|(offset, expected)| {
                        match_index
                            .checked_sub(offset + 1)
                            .and_then(|i| lines.get(i))
                            .is_some_and(|actual| same_content(actual, expected))
                    })
                    .count();
                score += matched as f64 / ctx.before.len() as f64 * self.weights.context_weight;
            }

            if !ctx.after.is_empty() {
                let matched = ctx
                    .after
                    .iter()
                    .enumerate()
                    .filter(|(offset, expected)| {
                        lines
                            .get(match_index + 1 + offset)
                            .is_some_and(|actual| same_content(actual, expected))
                    })
                    .count();
                score += matched as f64 / ctx.after.len() as f64 * self.weights.context_weight;
            }
        }

        if line_type == LineType::Added {
            score += self.weights.added_bonus;
        }

        score.min(self.weights.max)
    }
}

/// Pick a single match from the candidates according to `strategy`.
pub fn resolve_match(
    matches: Vec<CodeMatch>,
    strategy: MatchStrategy,
) -> Result<CodeMatch, MatchError> {
    if matches.len() > 1 && strategy == MatchStrategy::Strict {
        return Err(MatchError::Ambiguous { matches });
    }

    let mut best: Option<CodeMatch> = None;
    for candidate in matches {
        // strict comparison keeps the earliest of equal scores
        if best.as_ref().map_or(true, |b| candidate.confidence > b.confidence) {
            best = Some(candidate);
        }
    }
    best.ok_or(MatchError::NotFound)
}

/// `--- ` directly followed by `+++ ` starts the next file of a header-less diff.
fn is_file_header(lines: &[&str], index: usize) -> bool {
    lines[index].starts_with("--- ")
        && lines
            .get(index + 1)
            .is_some_and(|next| next.starts_with("+++ "))
}

/// Line content without its diff prefix.
fn diff_content(line: &str) -> &str {
    match line.as_bytes().first() {
        Some(b'+' | b'-' | b' ') => &line[1..],
        _ => line,
    }
}

fn same_content(actual: &str, expected: &str) -> bool {
    diff_content(actual).trim() == expected.trim()
}

fn build_preview(lines: &[&str], index: usize) -> String {
    let start = index.saturating_sub(1);
    let end = (index + 1).min(lines.len() - 1);

    (start..=end)
        .map(|i| {
            let marker = if i == index { PREVIEW_MARKER } else { PREVIEW_INDENT };
            format!("{marker}{}", lines[i])
        })
        .collect::<Vec<_>>()
        .join("\n")
}
