//! Clue History
//!
//! A size-capped, append-only log of every clue sent to the display, persisted
//! as a newline-delimited file (oldest first, no header) and ranked by
//! frequency for operator suggestions.
//!
//! # Crash Safety
//!
//! Every mutation rewrites the whole retained window with the write-rename
//! pattern:
//!
//! 1. Write to `.{name}.tmp` next to the target
//! 2. `sync_all` the temp file
//! 3. Rename the temp file over the target
//!
//! A reader therefore sees either the previous file or the new one, never a
//! truncated one. A stale temp file left by a crash is ignored on load and
//! replaced by the next write.
//!
//! # Ranking
//!
//! Suggestions are ordered by occurrence count within the retained window.
//! Equal counts are ordered most-recently-added first. Evicted entries no
//! longer count.

use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Default number of retained entries
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Default number of suggestions when the caller does not ask for a count
pub const DEFAULT_SUGGESTION_COUNT: usize = 10;

/// Errors reading or writing the history file
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Filesystem operation failed
    #[error("history {action} failed for {path}: {source}")]
    Io {
        /// What was being attempted
        action: &'static str,
        /// File involved
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
}

impl HistoryError {
    fn io(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| Self::Io {
            action,
            path,
            source,
        }
    }
}

/// Persistent, capped clue log
#[derive(Debug)]
pub struct ClueHistory {
    entries: VecDeque<String>,
    capacity: usize,
    path: PathBuf,
}

impl ClueHistory {
    /// Empty history bound to `path`, without touching the filesystem
    #[must_use]
    pub fn empty(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            path: path.into(),
        }
    }

    /// Load the history file, creating it when missing
    ///
    /// Only the last `capacity` lines are retained. Bytes that are not UTF-8
    /// are replaced with U+FFFD rather than rejecting the file.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError`] if an existing file cannot be read. Failure to
    /// create a missing file is logged and tolerated.
    pub fn load(path: impl Into<PathBuf>, capacity: usize) -> Result<Self, HistoryError> {
        let mut history = Self::empty(path, capacity);

        if history.path.exists() {
            let bytes = fs::read(&history.path).map_err(HistoryError::io("read", &history.path))?;
            let content = String::from_utf8_lossy(&bytes);
            if matches!(content, Cow::Owned(_)) {
                tracing::warn!(
                    path = %history.path.display(),
                    "Clue history is not valid UTF-8, replacing bad bytes"
                );
            }
            for line in content.lines() {
                history.entries.push_back(line.trim_end_matches('\r').to_string());
            }
            history.truncate();
            tracing::info!(
                path = %history.path.display(),
                entries = history.entries.len(),
                "Loaded clue history"
            );
        } else {
            if let Some(parent) = history.path.parent() {
                if !parent.as_os_str().is_empty() {
                    if let Err(e) = fs::create_dir_all(parent) {
                        tracing::warn!(error = %e, path = %parent.display(), "Failed to create history directory");
                    }
                }
            }
            match File::create(&history.path) {
                Ok(_) => tracing::info!(path = %history.path.display(), "Created empty clue history"),
                Err(e) => tracing::warn!(
                    error = %e,
                    path = %history.path.display(),
                    "Failed to create clue history file"
                ),
            }
        }

        Ok(history)
    }

    /// Load the history, starting empty if the file cannot be read
    ///
    /// An unreadable file is first renamed to `{name}.corrupt` so the next
    /// persisted clue cannot replace it.
    pub fn load_or_set_aside(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let path = path.into();
        match Self::load(path.clone(), capacity) {
            Ok(history) => history,
            Err(e) => {
                let aside = aside_path(&path);
                match fs::rename(&path, &aside) {
                    Ok(()) => tracing::error!(
                        error = %e,
                        moved_to = %aside.display(),
                        "Unreadable clue history moved aside, starting empty"
                    ),
                    Err(rename_err) => tracing::error!(
                        error = %e,
                        rename_error = %rename_err,
                        "Unreadable clue history could not be moved aside, starting empty"
                    ),
                }
                Self::empty(path, capacity)
            }
        }
    }

    /// Path of the persisted file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Maximum retained entries
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is retained
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Retained entries, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Append a clue, evict past capacity, persist
    ///
    /// Duplicates and empty strings are recorded like any other clue.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError`] if persisting fails. The in-memory window has
    /// already been updated and stays authoritative.
    pub fn add(&mut self, clue: impl Into<String>) -> Result<(), HistoryError> {
        self.entries.push_back(clue.into());
        self.truncate();
        self.persist()
    }

    /// Up to `count` distinct clues, most frequent first
    #[must_use]
    pub fn suggestions(&self, count: usize) -> Vec<String> {
        // clue -> (occurrences, index of latest occurrence)
        let mut stats: HashMap<&str, (usize, usize)> = HashMap::new();
        for (idx, entry) in self.entries.iter().enumerate() {
            let stat = stats.entry(entry.as_str()).or_insert((0, idx));
            stat.0 += 1;
            stat.1 = idx;
        }

        let mut ranked: Vec<(&str, (usize, usize))> = stats.into_iter().collect();
        ranked.sort_by(|(_, (count_a, last_a)), (_, (count_b, last_b))| {
            count_b.cmp(count_a).then(last_b.cmp(last_a))
        });

        ranked
            .into_iter()
            .take(count)
            .map(|(clue, _)| clue.to_string())
            .collect()
    }

    /// Rewrite the file with the retained window
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError`] if the temp write or rename fails.
    pub fn persist(&self) -> Result<(), HistoryError> {
        let tmp_path = temp_path(&self.path);
        {
            let file = File::create(&tmp_path).map_err(HistoryError::io("create", &tmp_path))?;
            let mut writer = BufWriter::new(file);
            for entry in &self.entries {
                writer
                    .write_all(entry.as_bytes())
                    .and_then(|()| writer.write_all(b"\n"))
                    .map_err(HistoryError::io("write", &tmp_path))?;
            }
            writer.flush().map_err(HistoryError::io("flush", &tmp_path))?;
            writer
                .get_ref()
                .sync_all()
                .map_err(HistoryError::io("sync", &tmp_path))?;
        }

        fs::rename(&tmp_path, &self.path).map_err(HistoryError::io("rename", &self.path))?;

        tracing::debug!(
            path = %self.path.display(),
            entries = self.entries.len(),
            "Saved clue history"
        );
        Ok(())
    }

    fn truncate(&mut self) {
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }
}

/// Sibling file an unreadable history is moved to
#[must_use]
pub fn aside_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "history".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!("{name}.corrupt"))
}

/// Sibling temp file used for the write-rename step
#[must_use]
pub fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "history".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{name}.tmp"))
}
