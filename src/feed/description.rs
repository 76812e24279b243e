//! Extraction of the poster and review paragraphs from an item's HTML body.
//!
//! Descriptions are small HTML fragments:
//!
//! ```text
//! <p><img src="https://a.ltrbxd.com/.../poster.jpg"/></p>
//! <p>Watched on Friday January 5, 2024.</p>
//! ```
//!
//! or, for reviews, one or more text paragraphs in place of the notice.

use chrono::NaiveDate;
use quick_xml::escape::resolve_html5_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::util::{collapse_whitespace, strip_control_chars};

/// Poster URL and review paragraphs of one diary item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Description {
    pub poster: Option<String>,
    /// Review paragraphs in document order. Line breaks (`<br>`) inside a
    /// paragraph are kept as `\n`.
    pub paragraphs: Vec<String>,
}

impl Description {
    /// Parse a description fragment.
    ///
    /// Markup that cannot be tokenized yields an empty description: no poster
    /// and no review text.
    pub fn parse(html: &str) -> Self {
        match parse_fragment(html) {
            Ok(description) => description,
            Err(e) => {
                tracing::debug!(error = %e, "Unparsable description markup, ignoring it");
                Self::default()
            }
        }
    }

    pub fn has_review(&self) -> bool {
        !self.paragraphs.is_empty()
    }

    /// Review paragraphs joined with `separator`, `None` when there is no
    /// review.
    pub fn review_text(&self, separator: &str) -> Option<String> {
        self.has_review().then(|| self.paragraphs.join(separator))
    }
}

/// Whether a paragraph is the feed's own notice, such as
/// `Watched on Friday January 5, 2024.`, rather than text the member wrote.
pub fn is_watched_notice(paragraph: &str) -> bool {
    let text = paragraph.trim();
    let Some(rest) = ["Watched on ", "Rewatched on "].iter().find_map(|prefix| {
        text.get(..prefix.len())
            .filter(|head| head.eq_ignore_ascii_case(prefix))
            .map(|_| &text[prefix.len()..])
    }) else {
        return false;
    };
    let date = rest.trim_end().trim_end_matches('.');
    NaiveDate::parse_from_str(date, "%A %B %d, %Y").is_ok()
}

fn parse_fragment(html: &str) -> Result<Description, quick_xml::Error> {
    let mut reader = Reader::from_str(html);
    // HTML void elements like <br> are not always self-closed
    reader.config_mut().check_end_names = false;

    let mut description = Description::default();
    let mut paragraph: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"p" => paragraph = Some(String::new()),
                b"img" => {
                    if description.poster.is_none() {
                        description.poster = image_source(&e, &reader);
                    }
                }
                b"br" => {
                    if let Some(text) = paragraph.as_mut() {
                        text.push('\n');
                    }
                }
                _ => {}
            },
            Event::Text(e) => {
                if let Some(text) = paragraph.as_mut() {
                    let unescaped = e
                        .unescape_with(resolve_html5_entity)
                        .map(|cow| cow.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&e).into_owned());
                    text.push_str(&unescaped);
                }
            }
            Event::CData(e) => {
                if let Some(text) = paragraph.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"p" => {
                if let Some(raw) = paragraph.take() {
                    if let Some(text) = finish_paragraph(&raw) {
                        description.paragraphs.push(text);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(description)
}

fn finish_paragraph(raw: &str) -> Option<String> {
    let clean = strip_control_chars(raw);
    let lines: Vec<String> = clean
        .split('\n')
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return None;
    }

    let text = lines.join("\n");
    if is_watched_notice(&text) {
        return None;
    }
    Some(text)
}

fn image_source(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Option<String> {
    e.attributes()
        .filter_map(Result::ok)
        .find(|attr| attr.key.as_ref() == b"src")
        .and_then(|attr| {
            attr.decode_and_unescape_value(reader.decoder())
                .ok()
                .map(|value| value.trim().to_string())
        })
        .filter(|src| src.starts_with("https://") || src.starts_with("http://"))
}
