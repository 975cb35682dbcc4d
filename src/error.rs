//! # Error Types
//!
//! This module defines custom error types for the subset search library.
//! It provides specific error variants for the failure scenarios that may
//! occur while configuring or running a search.
//!
//! Configuration problems (invalid bounds, zero-sized tabu histories,
//! missing stop criteria, ...) are reported synchronously from constructors
//! and builders. Runtime failures inside a running search are captured once
//! and surface through [`crate::search::SearchListener::search_failed`] as
//! well as the `Err` returned by `start`. Algorithmic dead ends, such as a
//! neighborhood without a single admissible move, are *not* errors: searches
//! treat them as normal termination.
//!
//! ## Examples
//!
//! Using the `Result` type:
//!
//! ```rust
//! use coresel::error::{Result, SearchError};
//!
//! fn some_function() -> Result<()> {
//!     // Function implementation
//!     Ok(())
//! }
//!
//! fn caller() {
//!     match some_function() {
//!         Ok(_) => println!("Success!"),
//!         Err(e) => println!("Error: {}", e),
//!     }
//! }
//! ```
//!
//! Using the `ResultExt` trait to add context to errors:
//!
//! ```rust
//! use coresel::error::{Result, ResultExt};
//! use std::fs::File;
//!
//! fn read_config_file(path: &str) -> Result<()> {
//!     File::open(path).context("Failed to open config file")
//!         .and_then(|_file| {
//!             // Read file contents
//!             Ok(())
//!         })
//! }
//! ```
//!
//! Using the `?` operator with automatic error conversion:
//!
//! ```rust
//! use coresel::error::Result;
//! use std::fs::File;
//! use std::io::Read;
//!
//! fn read_config(path: &str) -> Result<String> {
//!     let mut file = File::open(path)?; // io::Error automatically converts to SearchError
//!     let mut contents = String::new();
//!     file.read_to_string(&mut contents)?; // io::Error automatically converts to SearchError
//!     Ok(contents)
//! }
//! ```

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Represents errors that can occur in the subset search library.
///
/// This enum provides specific error variants for the different failure
/// scenarios that may occur while configuring or running a search.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Error that occurs when an invalid configuration is provided.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error that occurs when a solution is mutated inconsistently, for
    /// example selecting an index that is already selected.
    #[error("Solution error: {0}")]
    Solution(String),

    /// Error that occurs when a dataset fails validation.
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Error that occurs when an objective function produces an unusable
    /// value, such as NaN or infinity.
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Error that occurs inside a parallel worker or replica. The first
    /// failure stops the whole search; subsequent identical failures are
    /// suppressed.
    #[error("Worker error: {0}")]
    Worker(String),

    /// Error that occurs when an I/O operation fails.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A generic error with a custom message.
    #[error("{0}")]
    Other(String),
}

/// A specialized Result type for subset search operations.
///
/// This type is a convenience wrapper around `std::result::Result` with the
/// error type fixed to `SearchError`.
///
/// ## Examples
///
/// ```rust
/// use coresel::error::{Result, SearchError};
///
/// fn may_fail() -> Result<i32> {
///     // Some operation that might fail
///     Ok(42)
/// }
/// ```
pub type Result<T> = std::result::Result<T, SearchError>;

/// Extension trait for Result to add context to errors.
///
/// This trait provides a convenient way to add context to errors when
/// converting from one error type to `SearchError`.
///
/// ## Examples
///
/// ```rust
/// use coresel::error::ResultExt;
/// use std::fs::File;
///
/// fn read_file(path: &str) -> coresel::error::Result<()> {
///     File::open(path).context("Failed to open file")?;
///     Ok(())
/// }
/// ```
pub trait ResultExt<T, E> {
    /// Adds context to an error.
    ///
    /// This method converts the error to a `SearchError` with the provided context.
    ///
    /// ## Arguments
    ///
    /// * `context` - A string providing context for the error.
    ///
    /// ## Returns
    ///
    /// A `Result<T, SearchError>` with the original value or a contextualized error.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| SearchError::Other(format!("{}: {}", context, e)))
    }
}

/// Extension trait for Option to convert to Result with a custom error.
///
/// ## Examples
///
/// ```rust
/// use coresel::error::{OptionExt, SearchError};
///
/// fn largest(values: &[i32]) -> coresel::error::Result<i32> {
///     values.iter().max().cloned().ok_or_else_search(||
///         SearchError::Other("no values".to_string())
///     )
/// }
/// ```
pub trait OptionExt<T> {
    /// Converts an Option to a Result using a closure to generate the error.
    ///
    /// ## Arguments
    ///
    /// * `err_fn` - A closure that returns a `SearchError`.
    ///
    /// ## Returns
    ///
    /// A `Result<T, SearchError>` with the original value or the generated error.
    fn ok_or_else_search<F>(self, err_fn: F) -> Result<T>
    where
        F: FnOnce() -> SearchError;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_else_search<F>(self, err_fn: F) -> Result<T>
    where
        F: FnOnce() -> SearchError,
    {
        self.ok_or_else(err_fn)
    }
}

/// Utility function to convert a standard error to a SearchError with context.
///
/// ## Arguments
///
/// * `error` - The error to convert.
/// * `context` - A string providing context for the error.
///
/// ## Returns
///
/// A `SearchError` with the context and error message.
///
/// ## Examples
///
/// ```rust
/// use coresel::error::to_search_error;
/// use std::io;
///
/// fn example() -> coresel::error::Result<()> {
///     let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
///     Err(to_search_error(io_error, "Failed to read configuration"))
/// }
/// ```
pub fn to_search_error<E: StdError>(error: E, context: &str) -> SearchError {
    SearchError::Other(format!("{}: {}", context, error))
}
