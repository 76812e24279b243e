//! RSS parsing for member diary feeds.
//!
//! Generic feed libraries drop namespaced item fields, and the diary data
//! lives almost entirely in the `letterboxd:` namespace, so items are read
//! with a `quick-xml` event loop.

use chrono::DateTime;
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

use super::types::{DiaryEntry, Rating};
use crate::util::{collapse_whitespace, strip_control_chars};

/// Errors that can occur while parsing a diary feed.
#[derive(Debug, Error)]
pub enum FeedParseError {
    #[error("feed payload is empty")]
    EmptyPayload,

    #[error("XML parse error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    /// Well-formed XML that is not an RSS document.
    #[error("document has no RSS <channel>")]
    NotRss,
}

/// Outcome of parsing a feed.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    /// Diary entries in feed order (newest first, as published).
    pub entries: Vec<DiaryEntry>,
    /// Items skipped because they are not diary entries (lists, stories) or
    /// lack a link.
    pub skipped: usize,
}

#[derive(Debug, Default)]
struct ItemBuilder {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    pub_date: Option<String>,
    watched_date: Option<String>,
    rewatch: Option<String>,
    film_title: Option<String>,
    film_year: Option<String>,
    member_rating: Option<String>,
    description: Option<String>,
}

impl ItemBuilder {
    fn set(&mut self, field: &[u8], value: String) {
        let slot = match field {
            b"title" => &mut self.title,
            b"link" => &mut self.link,
            b"guid" => &mut self.guid,
            b"pubDate" => &mut self.pub_date,
            b"letterboxd:watchedDate" => &mut self.watched_date,
            b"letterboxd:rewatch" => &mut self.rewatch,
            b"letterboxd:filmTitle" => &mut self.film_title,
            b"letterboxd:filmYear" => &mut self.film_year,
            b"letterboxd:memberRating" => &mut self.member_rating,
            b"description" => &mut self.description,
            _ => return,
        };
        *slot = Some(value);
    }

    fn build(self) -> Option<DiaryEntry> {
        let film_title = clean_line(self.film_title.as_deref()?);
        let link = self.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty())?;
        if film_title.is_empty() {
            return None;
        }

        let published = self.pub_date.as_deref().and_then(|raw| {
            DateTime::parse_from_rfc2822(raw.trim())
                .map_err(|e| tracing::debug!(raw = %raw, error = %e, "Unparsable pubDate"))
                .ok()
        });

        Some(DiaryEntry {
            title: self
                .title
                .as_deref()
                .map(clean_line)
                .unwrap_or_else(|| film_title.clone()),
            link,
            guid: self.guid.map(|g| g.trim().to_string()).unwrap_or_default(),
            published,
            watched_date: self
                .watched_date
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            film_year: self.film_year.and_then(|y| y.trim().parse().ok()),
            rating: self.member_rating.as_deref().and_then(Rating::parse),
            rewatch: self
                .rewatch
                .is_some_and(|r| r.trim().eq_ignore_ascii_case("yes")),
            description: self.description.filter(|d| !d.trim().is_empty()),
            film_title,
        })
    }
}

fn clean_line(raw: &str) -> String {
    collapse_whitespace(&strip_control_chars(raw))
}

/// Parse a diary feed.
///
/// Items without a `letterboxd:filmTitle` or a link are skipped and counted,
/// not treated as errors.
///
/// # Security
///
/// SEC-002: `quick-xml` (0.37) never expands `<!ENTITY>` declarations, only
/// the five XML builtins and character references. Custom entities in text
/// are kept as raw text.
pub fn parse_feed(bytes: &[u8]) -> Result<ParseResult, FeedParseError> {
    let trimmed = bytes.trim_ascii_start();
    if trimmed.is_empty() {
        return Err(FeedParseError::EmptyPayload);
    }

    let mut reader = Reader::from_reader(trimmed);
    reader.config_mut().trim_text(true);

    let mut result = ParseResult::default();
    let mut buf = Vec::new();
    let mut saw_channel = false;
    let mut item: Option<ItemBuilder> = None;
    // Element currently being read inside an <item>, and its text so far
    let mut field: Option<(Vec<u8>, String)> = None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| FeedParseError::Xml {
                position: reader.error_position(),
                message: e.to_string(),
            })?;

        match event {
            Event::Start(e) => {
                let name = e.name();
                match name.as_ref() {
                    b"channel" => saw_channel = true,
                    b"item" => {
                        item = Some(ItemBuilder::default());
                        field = None;
                    }
                    other if item.is_some() && field.is_none() => {
                        field = Some((other.to_vec(), String::new()));
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                if let Some((_, text)) = field.as_mut() {
                    let unescaped = e
                        .unescape()
                        .map(|cow| cow.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&e).into_owned());
                    text.push_str(&unescaped);
                }
            }
            Event::CData(e) => {
                if let Some((_, text)) = field.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(e) => {
                let name = e.name();
                if name.as_ref() == b"item" {
                    field = None;
                    if let Some(builder) = item.take() {
                        match builder.build() {
                            Some(entry) => result.entries.push(entry),
                            None => result.skipped += 1,
                        }
                    }
                } else if field.as_ref().is_some_and(|(open, _)| open == name.as_ref()) {
                    if let (Some((open, text)), Some(builder)) = (field.take(), item.as_mut()) {
                        builder.set(&open, text);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_channel {
        return Err(FeedParseError::NotRss);
    }

    Ok(result)
}
