pub mod caching;
pub mod dataset;
pub mod error;
pub mod moves;
pub mod neighborhood;
pub mod objective;
pub mod rng;
pub mod search;
pub mod solution;
pub mod tabu;

// Re-export commonly used types for convenience
pub use error::{OptionExt, Result, ResultExt, SearchError};
