pub mod file_info;
pub mod ignore_rules;
pub mod indexer;
pub mod walker;

pub use file_info::{count_lines, digest_bytes, unix_timestamp};
pub use ignore_rules::IgnoreMatcher;
pub use indexer::{FileOutcome, IndexStats, Indexer};
pub use walker::FileWalker;
