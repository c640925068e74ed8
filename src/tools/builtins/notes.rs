//! Append-only flat-file note store.
//!
//! Each note is `<YYYYMMDD_HHMMSS>_<sanitized-title>.txt` inside the notes
//! directory.  Notes are never updated or deleted; lookup is a
//! case-insensitive substring match on the filename and the
//! lexicographically last match wins, which is the newest note because the
//! timestamp prefix has a fixed width.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Local};
use tokio::io::AsyncWriteExt;

use crate::tools::sanitize_title;

/// strftime format of the filename prefix.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
/// Width of a formatted [`TIMESTAMP_FORMAT`] prefix.
pub const TIMESTAMP_WIDTH: usize = 15;

const MAX_CREATE_ATTEMPTS: usize = 3;

/// A note found by [`NoteStore::read`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub filename: String,
    pub body: String,
}

/// Flat-file note persistence rooted at one directory.
#[derive(Debug, Clone)]
pub struct NoteStore {
    dir: PathBuf,
}

/// Build the filename for a note created at `at`.
pub fn note_filename(at: &DateTime<Local>, title: &str) -> String {
    let stamp = at.format(TIMESTAMP_FORMAT).to_string();
    debug_assert_eq!(stamp.len(), TIMESTAMP_WIDTH, "note timestamp width changed");
    format!("{stamp}_{}.txt", sanitize_title(title))
}

impl NoteStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write a new note, creating the directory when needed.  Returns the
    /// path of the written file.
    ///
    /// A filename collision (same title within the same second) waits for
    /// the next second instead of overwriting.
    pub async fn create(&self, title: &str, body: &str) -> anyhow::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("cannot create {}", self.dir.display()))?;

        for _ in 0..MAX_CREATE_ATTEMPTS {
            let path = self.dir.join(note_filename(&Local::now(), title));
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(body.as_bytes())
                        .await
                        .with_context(|| format!("cannot write {}", path.display()))?;
                    file.flush().await?;
                    tracing::info!(path = %path.display(), "note saved");
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    let nanos = u64::from(Local::now().timestamp_subsec_nanos());
                    let wait = 1_000_000_000u64.saturating_sub(nanos) + 1_000_000;
                    tokio::time::sleep(Duration::from_nanos(wait)).await;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("cannot create {}", path.display()))
                }
            }
        }
        anyhow::bail!("note filename kept colliding for title '{title}'")
    }

    /// Find the newest note whose filename contains `query`
    /// (case-insensitive).
    ///
    /// `Ok(None)` means the directory exists but nothing matched.
    pub async fn read(&self, query: &str) -> anyhow::Result<Option<Note>> {
        let needle = query.to_lowercase();
        let mut rd = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("cannot read {}", self.dir.display()))?;

        let mut newest: Option<String> = None;
        while let Some(entry) = rd.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.to_lowercase().contains(&needle) {
                continue;
            }
            if newest.as_ref().is_none_or(|best| name > *best) {
                newest = Some(name);
            }
        }

        let Some(filename) = newest else {
            return Ok(None);
        };
        let body = tokio::fs::read_to_string(self.dir.join(&filename))
            .await
            .with_context(|| format!("cannot read note {filename}"))?;
        Ok(Some(Note { filename, body }))
    }

    /// Whether the notes directory exists yet.
    pub async fn exists(&self) -> bool {
        tokio::fs::metadata(&self.dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }
}
