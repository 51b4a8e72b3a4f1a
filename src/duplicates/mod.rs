//! Duplicate detection.
//!
//! - [`groups`]: group keys, duplicate groups and size bucketing
//! - [`finder`]: the walk → size → prehash → full hash pipeline
//! - [`near`]: advisory near-duplicate video matching

pub mod finder;
pub mod groups;
pub mod near;

pub use finder::{
    phase2_prehash, phase3_fullhash, DuplicateFinder, FinderConfig, FinderError, FullhashStats,
    HashPhaseConfig, PrehashBuckets, PrehashStats, ScanOutcome, ScanSummary,
};
pub use groups::{group_by_size, DuplicateGroup, GroupKey, GroupingStats};
pub use near::{
    find_near_duplicates, match_signatures, NearConfig, NearDuplicateCandidate,
    NearDuplicateReport, ProbedVideo, SkipReason, DEFAULT_TOLERANCE_MS,
};
