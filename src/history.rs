//! Best-effort recording of played tracks.
//!
//! Every time a track starts through [`Player::play_track`],
//! [`Player::play_next`] or [`Player::play_previous`], it is posted to the
//! user's history. The controller must not wait for that, nor care whether
//! it works: a [`Recorder`] queues the track on a channel and a background
//! task posts queued tracks one by one, logging failures.
//!
//! [`Player::play_track`]: crate::player::Player::play_track
//! [`Player::play_next`]: crate::player::Player::play_next
//! [`Player::play_previous`]: crate::player::Player::play_previous

use std::sync::Arc;

use async_trait::async_trait;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{error::Result, track::Track};

/// Service that keeps the listening history.
#[async_trait]
pub trait History: Send + Sync {
    /// Adds `track` to the history, or moves it to the top if present.
    async fn add(&self, track: &Track) -> Result<()>;
}

/// Handle to queue tracks for the history service.
#[derive(Clone, Debug)]
pub struct Recorder {
    tx: mpsc::UnboundedSender<Track>,
}

impl Recorder {
    /// Spawns a task that posts recorded tracks to `history`.
    ///
    /// The task ends when all recorders are dropped.
    #[must_use]
    pub fn spawn<H>(history: Arc<H>) -> (Self, JoinHandle<()>)
    where
        H: History + ?Sized + 'static,
    {
        let (recorder, rx) = Self::channel();
        let task = tokio::spawn(Self::run(history, rx));
        (recorder, task)
    }

    /// Creates a recorder and the receiving end of its queue, for callers
    /// that want to drain it themselves.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Track>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queues `track` for recording. Never blocks and never fails.
    pub fn record(&self, track: &Track) {
        if self.tx.send(track.clone()).is_err() {
            warn!("history is no longer recorded; dropping {track}");
        }
    }

    async fn run<H>(history: Arc<H>, mut rx: mpsc::UnboundedReceiver<Track>)
    where
        H: History + ?Sized,
    {
        while let Some(track) = rx.recv().await {
            match history.add(&track).await {
                Ok(()) => trace!("added {track} to history"),
                Err(e) => warn!("could not add {track} to history: {e}"),
            }
        }

        debug!("history recorder stopped");
    }
}
