// Diff Module - dialect-agnostic unified diff handling
pub mod matcher;
pub mod parser;

pub use matcher::{
    resolve_match, CodeMatch, CodeMatcher, ConfidenceWeights, HunkInfo, LineType, MatchContext,
    MatchError, MatchStrategy, SearchContext,
};
pub use parser::{
    extract_file, filter_sections, parse_diff_into_sections, reconstruct_diff, DiffSection,
    FilterMetadata, FilterOptions, FilteredResult,
};
