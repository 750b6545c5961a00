/// Core Module for Sequel
///
/// Shared infrastructure: the dynamically-typed value model, parameter
/// binding, error types, and the database adapter layer.

pub mod db;
pub mod error;
pub mod params;
pub mod value;

// Re-export commonly used types for convenience
pub use error::{DriverError, Result, SequelError};
