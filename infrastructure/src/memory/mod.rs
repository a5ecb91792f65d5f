//! Project memory adapters

mod local;

pub use local::LocalMemorySearch;
