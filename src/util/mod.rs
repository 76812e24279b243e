//! Utility functions for common operations.
//!
//! This module provides reusable utilities for:
//!
//! - **Text cleanup**: stripping control characters and collapsing whitespace
//!   in feed-supplied text before it lands in a note
//! - **Markdown escaping**: keeping film titles from breaking link syntax
//! - **Atomic writes**: whole-file replacement for notes and the settings file
//!
//! # Examples
//!
//! ```
//! use filmlog::util::{collapse_whitespace, escape_link_text};
//!
//! assert_eq!(collapse_whitespace("  Past   Lives \n"), "Past Lives");
//! assert_eq!(escape_link_text("[REC]"), "\\[REC\\]");
//! ```

mod fs;
mod text;

pub use fs::atomic_write;
pub use text::{collapse_whitespace, escape_link_text, strip_control_chars};
