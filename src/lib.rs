//! Merge a Letterboxd member's diary feed into a markdown note.
//!
//! A sync fetches `{base}/{username}/rss/`, renders each diary entry as a
//! list line or callout block, and splices the entries the note does not
//! already contain into its body. Running it twice changes nothing.

pub mod config;
pub mod feed;
pub mod render;
pub mod sync;
pub mod util;
pub mod vault;
