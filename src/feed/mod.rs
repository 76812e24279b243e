//! Member diary feeds: fetching, parsing, and the entry model.
//!
//! - [`fetcher`] - HTTP retrieval of `{base}/{username}/rss/` with a size cap
//! - [`parser`] - RSS items to [`DiaryEntry`] values, including the
//!   `letterboxd:` namespaced fields
//! - [`description`] - poster and review paragraphs from an item's HTML body
//!
//! # Example
//!
//! ```ignore
//! use filmlog::feed::{build_client, feed_url, fetch_feed, parse_feed};
//!
//! let client = build_client()?;
//! let url = feed_url("https://letterboxd.com", "someone")?;
//! let bytes = fetch_feed(&client, &url, "someone").await?;
//! let entries = parse_feed(&bytes)?.entries;
//! ```

mod description;
mod fetcher;
mod parser;
mod types;

pub use description::{is_watched_notice, Description};
pub use fetcher::{build_client, feed_url, fetch_feed, FetchError, DEFAULT_BASE_URL};
pub use parser::{parse_feed, FeedParseError, ParseResult};
pub use types::{DiaryEntry, Rating};

#[cfg(test)]
pub(crate) use types::sample_entry;
