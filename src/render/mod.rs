//! Rendering diary entries as markdown.
//!
//! Rendering is a pure function of an entry and [`RenderOptions`]. The exact
//! text it produces is what the merge uses to recognize entries already in
//! the note, so any change to these templates shows up as "new" lines on the
//! next sync.

mod date;
mod stars;

use serde::{Deserialize, Serialize};

use crate::feed::{Description, DiaryEntry};
use crate::util::{collapse_whitespace, escape_link_text, strip_control_chars};

pub use date::{display_date, is_valid_pattern};
pub use stars::StarStyle;

/// Callout type used for block-style entries.
pub const CALLOUT_TYPE: &str = "letterboxd";

/// Prefix of per-entry block reference tags (`^letterboxd568742046`).
pub const REFERENCE_PREFIX: &str = "letterboxd";

/// Shape of a rendered entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStyle {
    /// One markdown list item per entry.
    #[default]
    List,
    /// One `> [!letterboxd]` callout per entry, with the review text.
    Callout,
}

impl DisplayStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Callout => "callout",
        }
    }
}

impl std::fmt::Display for DisplayStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DisplayStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "list" => Ok(Self::List),
            "callout" => Ok(Self::Callout),
            other => Err(format!(
                "unknown display style '{other}' (expected list or callout)"
            )),
        }
    }
}

/// Everything that shapes the rendered text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub style: DisplayStyle,
    pub stars: StarStyle,
    /// Embed the poster image.
    pub poster: bool,
    /// Append a `^letterboxd<tag>` block reference.
    pub reference_tag: bool,
    /// strftime pattern for the date; `None` passes the feed's date through.
    pub date_format: Option<String>,
    /// Wrap the date in `[[...]]` so it links to a daily note.
    pub link_dates: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            style: DisplayStyle::List,
            stars: StarStyle::Filled,
            poster: false,
            reference_tag: false,
            date_format: None,
            link_dates: true,
        }
    }
}

/// Render every entry, preserving order.
pub fn render_entries(entries: &[DiaryEntry], options: &RenderOptions) -> Vec<String> {
    entries.iter().map(|e| render_entry(e, options)).collect()
}

/// Render one entry.
///
/// List style yields a single line. Callout style yields a block ending in a
/// newline, so consecutive callouts stay separated by a blank line.
pub fn render_entry(entry: &DiaryEntry, options: &RenderOptions) -> String {
    let description = entry
        .description
        .as_deref()
        .map(Description::parse)
        .unwrap_or_default();

    match options.style {
        DisplayStyle::List => render_list_item(entry, &description, options),
        DisplayStyle::Callout => render_callout(entry, &description, options),
    }
}

fn render_list_item(
    entry: &DiaryEntry,
    description: &Description,
    options: &RenderOptions,
) -> String {
    let film = film_link(entry);
    let date = date_suffix(entry, options);
    let stars = entry.rating.map(|r| options.stars.render(r));
    let rewatch = if entry.rewatch { " (rewatch)" } else { "" };

    let mut line = match (description.review_text(" "), stars) {
        (Some(review), stars) => {
            let stars = stars.map(|s| format!(" ({s})")).unwrap_or_default();
            format!(
                "- Reviewed {film}{date}{stars}{rewatch}: {}",
                collapse_whitespace(&review)
            )
        }
        (None, Some(stars)) => format!("- Gave {stars} to {film}{date}{rewatch}"),
        (None, None) => {
            let verb = if entry.rewatch { "Rewatched" } else { "Watched" };
            format!("- {verb} {film}{date}")
        }
    };

    if options.poster {
        if let Some(poster) = description.poster.as_deref() {
            line.push_str(&format!(" ![poster]({})", link_target(poster)));
        }
    }
    if options.reference_tag {
        line.push_str(&format!(" ^{REFERENCE_PREFIX}{}", entry.reference_tag()));
    }
    line
}

fn render_callout(
    entry: &DiaryEntry,
    description: &Description,
    options: &RenderOptions,
) -> String {
    let film = film_link(entry);
    let date = date_suffix(entry, options);
    let verb = match (description.has_review(), entry.rewatch) {
        (true, false) => "Reviewed",
        (true, true) => "Rewatched and reviewed",
        (false, false) => "Watched",
        (false, true) => "Rewatched",
    };

    let mut lines = vec![format!("> [!{CALLOUT_TYPE}] {verb} {film}{date}")];
    if let Some(rating) = entry.rating {
        lines.push(format!("> {}", options.stars.render(rating)));
    }
    if options.poster {
        if let Some(poster) = description.poster.as_deref() {
            lines.push(">".to_string());
            lines.push(format!("> ![poster]({})", link_target(poster)));
        }
    }
    for paragraph in &description.paragraphs {
        lines.push(">".to_string());
        lines.extend(paragraph.split('\n').map(|l| format!("> {l}")));
    }
    if options.reference_tag {
        if let Some(last) = lines.last_mut() {
            last.push_str(&format!(" ^{REFERENCE_PREFIX}{}", entry.reference_tag()));
        }
    }

    let mut block = lines.join("\n");
    block.push('\n');
    block
}

/// `[Film (Year)](link)`
fn film_link(entry: &DiaryEntry) -> String {
    let title = collapse_whitespace(&strip_control_chars(&entry.film_title));
    let label = match entry.film_year {
        Some(year) => format!("{} ({year})", escape_link_text(&title)),
        None => escape_link_text(&title).into_owned(),
    };
    format!("[{label}]({})", link_target(&entry.link))
}

/// ` on [[2024-01-05]]`, or nothing when the entry has no date at all.
fn date_suffix(entry: &DiaryEntry, options: &RenderOptions) -> String {
    match display_date(entry, options.date_format.as_deref()) {
        Some(date) if options.link_dates => format!(" on [[{date}]]"),
        Some(date) => format!(" on {date}"),
        None => String::new(),
    }
}

/// Link destinations with spaces or parentheses need angle brackets.
fn link_target(url: &str) -> String {
    let url = url.trim();
    if url.contains([' ', '(', ')']) {
        format!("<{url}>")
    } else {
        url.to_string()
    }
}
