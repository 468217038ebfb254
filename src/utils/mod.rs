//! Small shared utilities.
pub mod devlog;
