//! Shared hook types and the error-context idiom used across all tendril crates.

pub mod error;
pub mod hooks;

pub use error::FromMessage;
