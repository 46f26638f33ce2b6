pub mod store;

pub use store::{FileIndexData, PendingReference, SearchOptions, SymbolStore};
