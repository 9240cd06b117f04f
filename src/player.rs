//! The playback controller.
//!
//! [`Player`] is the single authority over playback state: the current
//! track, the queue and its position, play/pause, position, volume, quality
//! and the fullscreen flag. It is also the only component that commands the
//! player widget through its [`Adapter`].
//!
//! # Intent and fact
//!
//! The controller owns *intent*: which track, which queue, whether the user
//! wants playback. The widget owns the *fact* of whether media is actually
//! playing. The two diverge whenever the platform pauses on its own or
//! autoplay gets blocked. Reports from the widget are trusted for play/pause
//! only:
//!
//! * `playing` while the controller is paused flips it to playing
//! * `paused` while the controller is playing flips it to paused
//! * `ended` advances the queue, exactly once per report
//!
//! Reconciliation never commands the widget back, and last write wins
//! between user commands and widget reports.
//!
//! # Failures
//!
//! Widget commands are optimistic. State changes first, then the command is
//! tried; when the widget is missing, not ready or failing, that is logged
//! and otherwise ignored. A later report or user action corrects any drift.
//! Every widget command is tried in isolation, so one failing command never
//! skips the ones after it.
//!
//! # Persistence
//!
//! The current track and queue are saved through a [`Store`] whenever either
//! changes, and restored by [`Player::new`]. Nothing else is persisted.

use std::fmt;

use tokio::sync::mpsc;

use crate::{
    adapter::{Adapter, Report, Widget, WidgetState},
    error::{ErrorKind, Result},
    events::Event,
    history::Recorder,
    store::{Snapshot, Store},
    track::{Quality, Track, Volume},
};

/// The playback controller. See the [module documentation](self).
pub struct Player {
    current_track: Option<Track>,
    queue: Vec<Track>,
    queue_index: usize,

    playing: bool,
    current_time: f64,
    duration: f64,
    volume: Volume,
    quality: Quality,
    fullscreen: bool,

    adapter: Adapter,
    store: Box<dyn Store>,
    saved: Snapshot,
    history: Option<Recorder>,
    event_tx: Option<mpsc::UnboundedSender<Event>>,
}

impl Player {
    /// Creates a controller and restores the last snapshot from `store`.
    ///
    /// A restored session is paused, at position zero, full volume and the
    /// lowest quality. The queue position is that of the restored track in
    /// the restored queue, or zero.
    #[must_use]
    pub fn new(mut store: Box<dyn Store>) -> Self {
        let snapshot = store.load();

        let queue_index = snapshot
            .current_track
            .as_ref()
            .and_then(|track| Self::position_in(&snapshot.queue, track))
            .unwrap_or(0);

        if let Some(track) = &snapshot.current_track {
            info!("restored {track} with {} queued tracks", snapshot.queue.len());
        }

        Self {
            current_track: snapshot.current_track.clone(),
            queue: snapshot.queue.clone(),
            queue_index,

            playing: false,
            current_time: 0.0,
            duration: 0.0,
            volume: Volume::default(),
            quality: Quality::default(),
            fullscreen: false,

            adapter: Adapter::new(),
            store,
            saved: snapshot,
            history: None,
            event_tx: None,
        }
    }

    /// Records started tracks through `recorder`.
    #[must_use]
    pub fn with_history(mut self, recorder: Recorder) -> Self {
        self.history = Some(recorder);
        self
    }

    /// Sends state change [`Event`]s to `event_tx`.
    #[must_use]
    pub fn with_events(mut self, event_tx: mpsc::UnboundedSender<Event>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Mounts a player widget. It is commanded once it reports ready.
    pub fn mount(&mut self, widget: Box<dyn Widget>) {
        self.adapter.initialize(widget);
    }

    /// Disposes the mounted player widget. State is kept.
    pub fn unmount(&mut self) {
        self.adapter.dispose();
    }

    #[must_use]
    pub fn current_track(&self) -> Option<&Track> {
        self.current_track.as_ref()
    }

    #[must_use]
    pub fn queue(&self) -> &[Track] {
        &self.queue
    }

    #[must_use]
    pub fn queue_index(&self) -> usize {
        self.queue_index
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Playback position in seconds.
    #[must_use]
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Media length in seconds as reported by the widget once playing.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.duration
    }

    #[must_use]
    pub fn volume(&self) -> Volume {
        self.volume
    }

    #[must_use]
    pub fn quality(&self) -> Quality {
        self.quality
    }

    #[must_use]
    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.adapter.is_ready()
    }

    /// Plays `track`, replacing the queue with `queue` if given.
    ///
    /// The queue position becomes that of `track` in the new queue, or zero
    /// when `track` is not in it.
    pub fn play_track(&mut self, track: Track, queue: Option<Vec<Track>>) {
        info!("playing {track}");

        if let Some(queue) = queue {
            self.queue_index = Self::position_in(&queue, &track).unwrap_or(0);
            self.queue = queue;
            debug!(
                "queue replaced with {} tracks at position {}",
                self.queue.len(),
                self.queue_index
            );
            self.emit(Event::QueueChanged);
        }

        self.start(track);
    }

    pub fn play(&mut self) {
        self.set_playing(true);
        Self::attempt("play", self.adapter.play());
    }

    pub fn pause(&mut self) {
        self.set_playing(false);
        Self::attempt("pause", self.adapter.pause());
    }

    pub fn toggle_play_pause(&mut self) {
        if self.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Advances to the next queued track, wrapping around at the end.
    ///
    /// Does nothing when the queue is empty.
    pub fn play_next(&mut self) {
        if self.queue.is_empty() {
            debug!("queue is empty; nothing to play next");
            return;
        }

        let next = (self.queue_index + 1) % self.queue.len();
        self.skip_to(next);
    }

    /// Goes back to the previous queued track, wrapping around at the start.
    ///
    /// Does nothing when the queue is empty.
    pub fn play_previous(&mut self) {
        if self.queue.is_empty() {
            debug!("queue is empty; nothing to play previously");
            return;
        }

        let previous = if self.queue_index == 0 {
            self.queue.len() - 1
        } else {
            self.queue_index - 1
        };
        self.skip_to(previous);
    }

    /// Seeks to `seconds`. The widget clamps; the position updates right
    /// away.
    pub fn seek_to(&mut self, seconds: f64) {
        Self::attempt("seek", self.adapter.seek_to(seconds));
        self.current_time = seconds.max(0.0);
    }

    /// Sets the linear volume. The widget receives its perceptual value.
    pub fn set_volume(&mut self, volume: Volume) {
        debug!("setting volume to {volume}");
        self.volume = volume;
        Self::attempt("set volume", self.adapter.set_volume(volume));
    }

    pub fn set_quality(&mut self, quality: Quality) {
        debug!("setting quality to {quality}");
        self.quality = quality;
        Self::attempt("set quality", self.adapter.set_quality(quality));
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        self.fullscreen = fullscreen;
    }

    pub fn add_to_queue(&mut self, track: Track) {
        debug!("queueing {track}");
        self.queue.push(track);
        self.emit(Event::QueueChanged);
        self.persist();
    }

    /// Removes the track at `index`. Out of range indices are ignored.
    ///
    /// The queue position keeps pointing at the same track when an earlier
    /// track is removed. Removing the track at the position moves it back
    /// one, wrapping around, so that the next track is the one that followed
    /// the removed track.
    pub fn remove_from_queue(&mut self, index: usize) {
        if index >= self.queue.len() {
            debug!("no queued track at {index} to remove");
            return;
        }

        let removed = self.queue.remove(index);
        debug!("removed {removed} from queue");

        if self.queue.is_empty() {
            self.queue_index = 0;
        } else if index < self.queue_index {
            self.queue_index -= 1;
        } else if index == self.queue_index {
            self.queue_index = self
                .queue_index
                .checked_sub(1)
                .unwrap_or(self.queue.len() - 1);
        }
        self.queue_index = self.queue_index.min(self.queue.len().saturating_sub(1));

        self.emit(Event::QueueChanged);
        self.persist();
    }

    pub fn clear_queue(&mut self) {
        debug!("clearing queue");
        self.queue.clear();
        self.queue_index = 0;
        self.emit(Event::QueueChanged);
        self.persist();
    }

    /// Feeds a raw widget state through the adapter into the controller.
    pub fn on_widget_state(&mut self, state: WidgetState) {
        if let Some(report) = self.adapter.observe(state) {
            self.reconcile(report);
        }
    }

    /// Updates the controller from a widget report.
    pub fn reconcile(&mut self, report: Report) {
        trace!("widget reported {report}");

        match report {
            Report::Ready => self.on_ready(),
            Report::Playing => {
                match self.adapter.duration() {
                    Ok(duration) if duration.is_finite() && duration >= 0.0 => {
                        self.duration = duration;
                    }
                    Ok(_) => {}
                    Err(e) => debug!("could not get duration: {e}"),
                }

                if !self.playing {
                    debug!("widget is playing while paused; following it");
                    self.set_playing(true);
                }
            }
            Report::Paused => {
                if self.playing {
                    debug!("widget is paused while playing; following it");
                    self.set_playing(false);
                }
            }
            Report::Ended => {
                debug!("track ended");
                self.play_next();
            }
            Report::Error(e) => {
                let track = self
                    .current_track
                    .as_ref()
                    .map_or_else(|| "nothing".to_owned(), ToString::to_string);
                warn!("player widget failed playing {track}: {e}");
            }
        }
    }

    /// Samples the widget position. Call every [`Adapter::POLL_INTERVAL`].
    pub fn poll(&mut self) {
        if let Some(seconds) = self.adapter.sample() {
            let mut seconds = seconds.max(0.0);
            if self.duration > 0.0 {
                seconds = seconds.min(self.duration);
            }
            self.current_time = seconds;
        }
    }

    /// Video id of the current track, to refresh its metadata with.
    #[must_use]
    pub fn refresh_target(&self) -> Option<String> {
        self.current_track
            .as_ref()
            .map(|track| track.video_id().to_owned())
    }

    /// Replaces the current track with refreshed metadata for `video_id`.
    ///
    /// Ignored when the current track is a different video by now. A custom
    /// cover on the current track survives the refresh.
    pub fn apply_refresh(&mut self, video_id: &str, refreshed: Track) {
        let Some(current) = &self.current_track else {
            return;
        };

        if current.video_id() != video_id || refreshed.video_id() != video_id {
            debug!("discarding stale refresh for {video_id}");
            return;
        }

        let refreshed = match (current.custom_cover(), refreshed.custom_cover()) {
            (Some(cover), None) => refreshed.with_custom_cover(cover),
            _ => refreshed,
        };

        if *current != refreshed {
            debug!("refreshed details of {refreshed}");
            self.current_track = Some(refreshed);
            self.emit(Event::TrackChanged);
            self.persist();
        }
    }

    /// The snapshot that would be persisted right now.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            current_track: self.current_track.clone(),
            queue: self.queue.clone(),
        }
    }

    fn skip_to(&mut self, index: usize) {
        debug!("moving from queue position {} to {index}", self.queue_index);
        self.queue_index = index;
        let track = self.queue[index].clone();
        self.start(track);
    }

    /// Makes `track` current and playing, loads it and records it.
    fn start(&mut self, track: Track) {
        if let Some(history) = &self.history {
            history.record(&track);
        }

        self.current_time = 0.0;
        self.duration = 0.0;
        self.current_track = Some(track);
        self.set_playing(true);
        self.emit(Event::TrackChanged);
        self.load_current();
        self.persist();
    }

    /// Hands the current track to the widget: loaded and playing when
    /// playback is wanted, cued otherwise.
    fn load_current(&mut self) {
        let Some(track) = &self.current_track else {
            return;
        };

        if self.playing {
            Self::attempt("load", self.adapter.load(track.video_id()));
            Self::attempt("play", self.adapter.play());
        } else {
            Self::attempt("cue", self.adapter.cue(track.video_id()));
        }
    }

    fn on_ready(&mut self) {
        info!("player widget ready");
        self.load_current();
        Self::attempt("set volume", self.adapter.set_volume(self.volume));
        Self::attempt("set quality", self.adapter.set_quality(self.quality));
    }

    fn set_playing(&mut self, playing: bool) {
        if self.playing != playing {
            self.playing = playing;
            self.emit(if playing { Event::Play } else { Event::Pause });
        }
    }

    fn persist(&mut self) {
        let snapshot = self.snapshot();
        if snapshot == self.saved {
            return;
        }

        match self.store.save(&snapshot) {
            Ok(()) => self.saved = snapshot,
            Err(e) => error!("could not save playback state: {e}"),
        }
    }

    fn emit(&self, event: Event) {
        if let Some(event_tx) = &self.event_tx {
            if event_tx.send(event).is_err() {
                trace!("no subscribers for {event:?}");
            }
        }
    }

    /// Logs a failed widget command without propagating it.
    fn attempt(command: &str, result: Result<()>) {
        if let Err(e) = result {
            if e.kind == ErrorKind::FailedPrecondition {
                debug!("{command}: {e}");
            } else {
                warn!("{command} failed: {e}");
            }
        }
    }

    fn position_in(queue: &[Track], track: &Track) -> Option<usize> {
        queue.iter().position(|queued| queued.is_same_video(track))
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("current_track", &self.current_track)
            .field("queue_len", &self.queue.len())
            .field("queue_index", &self.queue_index)
            .field("playing", &self.playing)
            .field("current_time", &self.current_time)
            .field("duration", &self.duration)
            .field("volume", &self.volume)
            .field("quality", &self.quality)
            .field("adapter", &self.adapter)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn track(id: &str) -> Track {
        Track::new(id, format!("Song {id}"), "Artist", "", 180)
    }

    fn player_with_queue(ids: &[&str]) -> Player {
        let mut player = Player::new(Box::<MemoryStore>::default());
        let queue: Vec<_> = ids.iter().map(|id| track(id)).collect();
        player.play_track(queue[0].clone(), Some(queue));
        player
    }

    #[test]
    fn next_wraps_around() {
        let mut player = player_with_queue(&["a", "b", "c"]);
        player.play_next();
        player.play_next();
        assert_eq!(player.queue_index(), 2);

        player.play_next();
        assert_eq!(player.queue_index(), 0);
        assert_eq!(player.current_track().unwrap().video_id(), "a");
        assert!(player.is_playing());
    }

    #[test]
    fn previous_wraps_around() {
        let mut player = player_with_queue(&["a", "b", "c"]);
        player.play_previous();
        assert_eq!(player.queue_index(), 2);
        assert_eq!(player.current_track().unwrap().video_id(), "c");
    }

    #[test]
    fn track_outside_queue_starts_at_zero() {
        let mut player = Player::new(Box::<MemoryStore>::default());
        player.play_track(track("x"), Some(vec![track("a"), track("b")]));
        assert_eq!(player.queue_index(), 0);
        assert_eq!(player.current_track().unwrap().video_id(), "x");
    }

    #[test]
    fn play_track_without_queue_keeps_queue() {
        let mut player = player_with_queue(&["a", "b"]);
        player.play_next();
        player.play_track(track("x"), None);
        assert_eq!(player.queue().len(), 2);
        assert_eq!(player.queue_index(), 1);
    }

    #[test]
    fn remove_before_position_keeps_current() {
        let mut player = player_with_queue(&["a", "b", "c"]);
        player.play_next();
        player.play_next();
        player.remove_from_queue(0);
        assert_eq!(player.queue_index(), 1);
        assert_eq!(player.queue()[player.queue_index()].video_id(), "c");

        player.remove_from_queue(5);
        assert_eq!(player.queue().len(), 2);
    }

    #[test]
    fn removing_current_track_keeps_next_in_order() {
        let mut player = player_with_queue(&["a", "b", "c"]);
        player.remove_from_queue(0);
        assert_eq!(player.queue_index(), 1);
        assert_eq!(player.current_track().unwrap().video_id(), "a");

        player.play_next();
        assert_eq!(player.current_track().unwrap().video_id(), "b");

        let mut player = player_with_queue(&["a", "b", "c"]);
        player.play_next();
        player.remove_from_queue(1);
        assert_eq!(player.queue_index(), 0);
        player.play_next();
        assert_eq!(player.current_track().unwrap().video_id(), "c");
    }

    #[test]
    fn remove_last_clamps_position() {
        let mut player = player_with_queue(&["a", "b"]);
        player.play_next();
        player.remove_from_queue(1);
        assert_eq!(player.queue_index(), 0);
    }

    #[test]
    fn clear_resets_position() {
        let mut player = player_with_queue(&["a", "b", "c"]);
        player.play_next();
        player.clear_queue();
        assert!(player.queue().is_empty());
        assert_eq!(player.queue_index(), 0);
        assert_eq!(player.current_track().unwrap().video_id(), "b");
    }

    #[test]
    fn commands_without_widget_update_state() {
        let mut player = player_with_queue(&["a"]);
        player.pause();
        assert!(!player.is_playing());
        player.toggle_play_pause();
        assert!(player.is_playing());
        player.seek_to(42.0);
        assert!((player.current_time() - 42.0).abs() < f64::EPSILON);
        player.set_volume(Volume::new(30));
        assert_eq!(player.volume().linear(), 30);
        player.set_quality(Quality::High);
        assert_eq!(player.quality(), Quality::High);
    }

    #[test]
    fn stale_refresh_is_ignored() {
        let mut player = player_with_queue(&["a", "b"]);
        player.play_next();
        player.apply_refresh("a", Track::new("a", "New title", "Artist", "", 180));
        assert_eq!(player.current_track().unwrap().video_id(), "b");
        assert_eq!(player.current_track().unwrap().title(), "Song b");
    }

    #[test]
    fn refresh_keeps_custom_cover() {
        let mut player = Player::new(Box::<MemoryStore>::default());
        player.play_track(track("a").with_custom_cover("https://cover"), None);
        player.apply_refresh("a", Track::new("a", "Retitled", "Artist", "", 181));

        let current = player.current_track().unwrap();
        assert_eq!(current.title(), "Retitled");
        assert_eq!(current.custom_cover(), Some("https://cover"));
    }
}
