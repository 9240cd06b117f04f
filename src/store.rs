//! Persistence of the current track and queue across restarts.
//!
//! Only the [`Snapshot`] (the current track and the queue) survives a
//! restart. Position, play state, volume and quality do not: a restored
//! session always starts paused, at full volume and the lowest quality.
//!
//! Loading never fails. A missing, unreadable, malformed or differently
//! versioned state file yields an empty snapshot, with a warning logged
//! for anything but a missing file.
//!
//! # Wire Format
//!
//! ```json
//! {
//!     "version": 1,
//!     "currentTrack": { "videoId": "abc123", "title": "...", ... },
//!     "queue": [ { "videoId": "abc123", ... }, { "videoId": "def456", ... } ]
//! }
//! ```

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{error::Result, track::Track};

/// What gets persisted of a playback session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub current_track: Option<Track>,

    #[serde(default)]
    pub queue: Vec<Track>,
}

impl Snapshot {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current_track.is_none() && self.queue.is_empty()
    }
}

/// Durable storage for a [`Snapshot`].
pub trait Store: Send {
    /// Returns the last saved snapshot, or an empty one.
    fn load(&mut self) -> Snapshot;

    /// Saves `snapshot`, replacing what was saved before.
    ///
    /// # Errors
    ///
    /// Returns an error when the snapshot could not be written.
    fn save(&mut self, snapshot: &Snapshot) -> Result<()>;
}

/// On-disk envelope around a [`Snapshot`].
#[derive(Serialize, Deserialize)]
struct Document {
    version: u32,

    #[serde(flatten)]
    snapshot: Snapshot,
}

/// Stores the snapshot as a JSON file.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Version written to and expected from the state file.
    pub const VERSION: u32 = 1;

    /// Refuse to parse state files larger than this.
    const MAX_FILE_SIZE: u64 = 4 * 1024 * 1024;

    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Snapshot> {
        let size = fs::metadata(&self.path)?.len();
        if size > Self::MAX_FILE_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("state file is too large ({size} bytes)"),
            )
            .into());
        }

        let contents = fs::read_to_string(&self.path)?;
        let document: Document = serde_json::from_str(&contents)?;
        if document.version != Self::VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "state file version {} is not supported (expected {})",
                    document.version,
                    Self::VERSION
                ),
            )
            .into());
        }

        Ok(document.snapshot)
    }
}

impl Store for FileStore {
    fn load(&mut self) -> Snapshot {
        match self.read() {
            Ok(snapshot) => {
                debug!(
                    "restored {} queued tracks from {}",
                    snapshot.queue.len(),
                    self.path.display()
                );
                snapshot
            }
            Err(e) if e.kind == crate::error::ErrorKind::NotFound => {
                debug!("no state file at {}", self.path.display());
                Snapshot::default()
            }
            Err(e) => {
                warn!("discarding state file {}: {e}", self.path.display());
                Snapshot::default()
            }
        }
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<()> {
        let document = Document {
            version: Self::VERSION,
            snapshot: snapshot.clone(),
        };
        let json = serde_json::to_string_pretty(&document)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write next to the target and rename so that a crash mid-write
        // leaves the previous state intact.
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        trace!("saved state to {}", self.path.display());
        Ok(())
    }
}

/// Keeps the snapshot in memory only.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryStore {
    pub snapshot: Option<Snapshot>,
    pub saves: usize,
}

impl Store for MemoryStore {
    fn load(&mut self) -> Snapshot {
        self.snapshot.clone().unwrap_or_default()
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.snapshot = Some(snapshot.clone());
        self.saves += 1;
        Ok(())
    }
}
