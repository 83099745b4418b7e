// Diff Parser - splits unified diffs into per-file sections
use globset::{GlobBuilder, GlobMatcher};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// `diff --git a/<path> b/<path>`, or the `src://`/`dst://` form emitted by Bitbucket Server
static GIT_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^diff --git (?:a/|src://)(.+?) (?:b/|dst://)(.+?)$").expect("static regex")
});

static NEW_SIDE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+\+\+ (?:b/|dst://)(.+)$").expect("static regex"));

static OLD_SIDE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^--- (?:a/|src://)(.+)$").expect("static regex"));

/// Only this many leading lines of a chunk are inspected for status markers.
const STATUS_SCAN_LINES: usize = 10;

/// One file's worth of a unified diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSection {
    /// Destination path (source path for deleted files)
    pub file_path: String,
    /// Source path when the file was renamed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    /// Raw diff text for this file, header and hunks included
    pub content: String,
    pub is_new: bool,
    pub is_deleted: bool,
    pub is_renamed: bool,
    pub is_binary: bool,
}

impl DiffSection {
    /// True when either side of the section is exactly `path`.
    pub fn matches_path(&self, path: &str) -> bool {
        self.file_path == path || self.old_path.as_deref() == Some(path)
    }

    fn parse(chunk: &str) -> Option<Self> {
        let lines: Vec<&str> = chunk.lines().collect();
        let header = lines.first()?.trim_end_matches('\r');

        let mut file_path = None;
        let mut old_path = None;
        let mut is_new = false;
        let mut is_deleted = false;
        let mut is_renamed = false;
        let mut is_binary = false;

        if let Some(caps) = GIT_HEADER.captures(header) {
            let a_path = caps[1].to_string();
            file_path = Some(caps[2].to_string());

            for line in lines.iter().take(STATUS_SCAN_LINES).skip(1) {
                if line.starts_with("new file mode") {
                    is_new = true;
                } else if line.starts_with("deleted file mode") {
                    is_deleted = true;
                    file_path = Some(a_path.clone());
                } else if let Some(from) = line.strip_prefix("rename from ") {
                    is_renamed = true;
                    old_path = Some(from.to_string());
                } else if line.contains("Binary files") && line.contains("differ") {
                    is_binary = true;
                } else if line.starts_with("--- ") {
                    if line.contains("/dev/null") {
                        is_new = true;
                    }
                } else if line.starts_with("+++ ") && line.contains("/dev/null") {
                    is_deleted = true;
                }
            }
        }

        // No usable git header: fall back to the ---/+++ file lines
        if file_path.is_none() {
            for line in lines.iter().take_while(|l| !l.starts_with("@@")) {
                if line.starts_with("+++ ") {
                    if line.contains("/dev/null") {
                        is_deleted = true;
                    }
                    if let Some(caps) = NEW_SIDE.captures(line) {
                        file_path = Some(caps[1].to_string());
                        break;
                    }
                } else if line.starts_with("--- ") {
                    if line.contains("/dev/null") {
                        is_new = true;
                    }
                    if let Some(caps) = OLD_SIDE.captures(line) {
                        file_path = Some(caps[1].to_string());
                    }
                }
            }
        }

        let file_path = file_path.filter(|p| !p.is_empty())?;

        Some(Self {
            file_path,
            old_path,
            content: chunk.strip_suffix('\n').unwrap_or(chunk).to_string(),
            is_new,
            is_deleted,
            is_renamed,
            is_binary,
        })
    }
}

/// Split a unified diff into file sections.
///
/// Chunks that yield no file path are skipped; this never fails.
pub fn parse_diff_into_sections(diff: &str) -> Vec<DiffSection> {
    split_file_chunks(diff)
        .into_iter()
        .filter_map(DiffSection::parse)
        .collect()
}

/// Each chunk starts at a `diff --git` line; text before the first header is its own chunk.
fn split_file_chunks(diff: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut begin = 0;
    let mut offset = 0;

    for line in diff.split_inclusive('\n') {
        if offset > 0 && line.starts_with("diff --git") {
            chunks.push(&diff[begin..offset]);
            begin = offset;
        }
        offset += line.len();
    }
    chunks.push(&diff[begin..]);

    chunks.retain(|chunk| !chunk.trim().is_empty());
    chunks
}

/// Which sections to keep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterOptions {
    #[serde(default)]
    pub include_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// Exact path; takes precedence over the patterns when set
    #[serde(default)]
    pub file_path: Option<String>,
}

impl FilterOptions {
    pub fn is_empty(&self) -> bool {
        self.include_patterns.is_empty() && self.exclude_patterns.is_empty() && self.exact_path().is_none()
    }

    fn exact_path(&self) -> Option<&str> {
        self.file_path.as_deref().filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterMetadata {
    pub total_files: usize,
    pub included_files: usize,
    pub excluded_files: usize,
    pub excluded_file_list: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FilteredResult {
    pub sections: Vec<DiffSection>,
    pub metadata: FilterMetadata,
}

/// Narrow sections by exact path, or by exclude-then-include glob patterns.
pub fn filter_sections(sections: Vec<DiffSection>, options: &FilterOptions) -> FilteredResult {
    let total_files = sections.len();
    let mut excluded_file_list = Vec::new();
    let mut kept = Vec::with_capacity(total_files);

    if let Some(path) = options.exact_path() {
        for section in sections {
            if section.matches_path(path) {
                kept.push(section);
            } else {
                excluded_file_list.push(section.file_path);
            }
        }
    } else {
        let excludes = compile_patterns(&options.exclude_patterns);
        let includes = compile_patterns(&options.include_patterns);

        // Exclude hits are listed before include misses
        let mut not_included = Vec::new();
        for section in sections {
            if excludes.iter().any(|p| p.matches(&section.file_path)) {
                excluded_file_list.push(section.file_path);
            } else if options.include_patterns.is_empty()
                || includes.iter().any(|p| p.matches(&section.file_path))
            {
                kept.push(section);
            } else {
                not_included.push(section.file_path);
            }
        }
        excluded_file_list.append(&mut not_included);
    }

    FilteredResult {
        metadata: FilterMetadata {
            total_files,
            included_files: kept.len(),
            excluded_files: total_files - kept.len(),
            excluded_file_list,
        },
        sections: kept,
    }
}

/// Find the section for a single file (destination or rename source).
pub fn extract_file<'a>(sections: &'a [DiffSection], path: &str) -> Option<&'a DiffSection> {
    sections.iter().find(|section| section.matches_path(path))
}

/// Join sections back into diff text.
pub fn reconstruct_diff(sections: &[DiffSection]) -> String {
    sections
        .iter()
        .map(|section| section.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// A shell glob; patterns without `/` also match against the base name.
struct PathPattern {
    glob: GlobMatcher,
    match_base: bool,
}

impl PathPattern {
    fn compile(pattern: &str) -> Option<Self> {
        match GlobBuilder::new(pattern).literal_separator(true).build() {
            Ok(glob) => Some(Self {
                glob: glob.compile_matcher(),
                match_base: !pattern.contains('/'),
            }),
            Err(err) => {
                warn!(pattern, error = %err, "Ignoring invalid glob pattern");
                None
            }
        }
    }

    fn matches(&self, path: &str) -> bool {
        if self.glob.is_match(path) {
            return true;
        }
        self.match_base
            && path
                .rsplit('/')
                .next()
                .is_some_and(|base| self.glob.is_match(base))
    }
}

fn compile_patterns(patterns: &[String]) -> Vec<PathPattern> {
    patterns
        .iter()
        .filter_map(|p| PathPattern::compile(p))
        .collect()
}
