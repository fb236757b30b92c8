//! Small shared helpers.

pub mod glob;

pub use glob::{glob_match, literal_prefix};
