//! One sync run: fetch the diary, render it, and merge it into the note.
//!
//! The note is written once, after the merge is complete. A failure at any
//! earlier step leaves the note exactly as it was.
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::{ConfigError, Settings, SettingsStore};
use crate::feed::{feed_url, fetch_feed, parse_feed, DiaryEntry, FeedParseError, FetchError};
use crate::render::render_entries;
use crate::vault::{merge, DocumentStore, SortDirection, StoreError};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Could not fetch the diary feed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Could not read the diary feed: {0}")]
    Parse(#[from] FeedParseError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-run switches from the command line.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Compute the merged note but do not write it.
    pub dry_run: bool,
    /// Only consider the N most recent feed entries.
    pub limit: Option<usize>,
}

/// What a run did.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    /// Vault-relative path of the note.
    pub path: PathBuf,
    /// Diary entries taken from the feed (after `limit`).
    pub fetched: usize,
    /// Feed items that were not diary entries.
    pub ignored: usize,
    /// Lines or blocks added to the note.
    pub added: usize,
    /// Rendered items already present in the note.
    pub duplicates: usize,
    /// The note did not exist before this run.
    pub created: bool,
    /// The note was written. False on a dry run or when nothing was added.
    pub written: bool,
    /// The configured sort differs from the one the note was last synced with.
    pub direction_changed: bool,
    /// Merged note contents, on a dry run.
    pub preview: Option<String>,
}

/// Run a sync against `vault`, recording the sort direction in `settings_store`.
pub async fn run_sync<D, S>(
    settings: &Settings,
    client: &reqwest::Client,
    vault: &D,
    settings_store: &S,
    options: &SyncOptions,
) -> Result<SyncReport, SyncError>
where
    D: DocumentStore + ?Sized,
    S: SettingsStore + ?Sized,
{
    let username = settings.validate_username()?;
    let url = feed_url(&settings.feed_base_url, username)?;
    let path = settings.note_path();

    tracing::info!(username = %username, note = %path.display(), "Starting sync");

    let bytes = fetch_feed(client, &url, username).await?;
    let parsed = parse_feed(&bytes)?;

    let mut entries = parsed.entries;
    if let Some(limit) = options.limit {
        // Feed order is newest first
        entries.truncate(limit);
    }
    order_entries(&mut entries, settings.sort);

    let rendered = render_entries(&entries, &settings.render_options());
    let existing = vault.read(&path)?;

    let direction_changed = existing.is_some()
        && settings
            .last_sort
            .is_some_and(|previous| previous != settings.sort);
    if direction_changed {
        tracing::warn!(
            previous = ?settings.last_sort,
            current = %settings.sort,
            note = %path.display(),
            "Sort direction changed since the last sync; existing entries keep their order"
        );
    }

    let outcome = merge(&rendered, existing.as_deref(), settings.sort);

    let mut report = SyncReport {
        path: path.clone(),
        fetched: entries.len(),
        ignored: parsed.skipped,
        added: outcome.added,
        duplicates: outcome.skipped,
        created: existing.is_none(),
        written: false,
        direction_changed,
        preview: None,
    };

    if options.dry_run {
        tracing::info!(added = report.added, "Dry run, note left untouched");
        report.preview = Some(outcome.content);
        return Ok(report);
    }

    if existing.is_some() && outcome.added == 0 {
        tracing::info!(note = %path.display(), "Note already up to date");
    } else {
        if existing.is_none() {
            ensure_parent(vault, &path)?;
        }
        vault.write(&path, &outcome.content)?;
        report.written = true;
        tracing::info!(
            note = %path.display(),
            added = report.added,
            duplicates = report.duplicates,
            "Note updated"
        );
    }

    record_direction(settings_store, settings.sort);
    Ok(report)
}

/// Arrange entries in the note's reading order.
///
/// Entries are ordered by watched date, then publication time. Entries with
/// neither sort before dated ones in ascending order. Ties keep feed order,
/// oldest first.
pub fn order_entries(entries: &mut [DiaryEntry], direction: SortDirection) {
    // Feed order is newest first; flip it so ties come out oldest first
    entries.reverse();
    entries.sort_by_cached_key(DiaryEntry::chronological_key);
    if direction == SortDirection::Descending {
        entries.reverse();
    }
}

fn ensure_parent<D: DocumentStore + ?Sized>(vault: &D, path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => vault.create_folder(parent),
        _ => Ok(()),
    }
}

/// Remember the direction used so a later change can be flagged.
///
/// The note is already written at this point, so failures are only logged.
/// Saving rewrites the whole settings file, so comments in it do not survive.
fn record_direction<S: SettingsStore + ?Sized>(store: &S, direction: SortDirection) {
    let mut stored = match store.load() {
        Ok(stored) => stored,
        Err(e) => {
            tracing::warn!(error = %e, "Could not reload settings to record the sort direction");
            return;
        }
    };
    if stored.last_sort == Some(direction) {
        return;
    }
    stored.last_sort = Some(direction);
    if let Err(e) = store.save(&stored) {
        tracing::warn!(error = %e, "Could not record the sort direction");
    }
}
