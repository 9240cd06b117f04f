//! Bridge between the playback controller and the system's media session.
//!
//! A media session is whatever "now playing" surface the host offers: media
//! keys, a lock screen widget, or a desktop notification area. It works in
//! two directions:
//!
//! * **Outward**, the [`Bridge`] publishes the current track's metadata on
//!   every [`Event::TrackChanged`] and the playback state on every
//!   [`Event::Play`] and [`Event::Pause`]. This is push-only: nothing is
//!   ever read back from the session.
//! * **Inward**, transport controls pressed by the user arrive as
//!   [`MediaAction`]s on a channel, which [`dispatch`] maps one to one onto
//!   controller operations.
//!
//! Hosts support different sets of actions. Registering a handler is
//! best-effort: an unsupported action is simply not available.

use std::fmt;

use tokio::sync::mpsc;

use crate::{
    error::{Error, Result},
    events::Event,
    player::Player,
    track::Track,
};

/// Transport controls a session can offer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Play,
    Pause,
    PreviousTrack,
    NextTrack,
    SeekTo,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Play,
        Action::Pause,
        Action::PreviousTrack,
        Action::NextTrack,
        Action::SeekTo,
    ];
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Play => write!(f, "play"),
            Self::Pause => write!(f, "pause"),
            Self::PreviousTrack => write!(f, "previoustrack"),
            Self::NextTrack => write!(f, "nexttrack"),
            Self::SeekTo => write!(f, "seekto"),
        }
    }
}

/// A transport control the user invoked from the session.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum MediaAction {
    Play,
    Pause,
    PreviousTrack,
    NextTrack,
    /// Seek to an absolute position in seconds.
    SeekTo(f64),
}

/// Published playback state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    Playing,
    Paused,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Playing => write!(f, "playing"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

/// "Now playing" metadata.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Metadata {
    pub title: String,
    pub artist: String,
    /// Cover URL or embedded image.
    pub artwork: String,
}

impl From<&Track> for Metadata {
    fn from(track: &Track) -> Self {
        Self {
            title: track.title().to_owned(),
            artist: track.artist().to_owned(),
            artwork: track.artwork().to_owned(),
        }
    }
}

/// The host's media session.
pub trait MediaSession: Send {
    /// Shows `metadata`, or clears the session for `None`.
    fn set_metadata(&mut self, metadata: Option<&Metadata>);

    fn set_playback_state(&mut self, state: PlaybackState);

    /// Sends `action` to `tx` whenever the user invokes it.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Unimplemented`](crate::error::ErrorKind::Unimplemented)
    /// when the host does not support `action`.
    fn set_action_handler(
        &mut self,
        action: Action,
        tx: mpsc::UnboundedSender<MediaAction>,
    ) -> Result<()>;
}

/// Mirrors controller state into a [`MediaSession`].
pub struct Bridge {
    session: Box<dyn MediaSession>,
}

impl Bridge {
    #[must_use]
    pub fn new(session: Box<dyn MediaSession>) -> Self {
        Self { session }
    }

    /// Registers handlers for all [`Action`]s that invoke `tx`.
    ///
    /// Returns the actions the session supports.
    pub fn register(&mut self, tx: &mpsc::UnboundedSender<MediaAction>) -> Vec<Action> {
        let mut supported = Vec::with_capacity(Action::ALL.len());

        for action in Action::ALL {
            match self.session.set_action_handler(action, tx.clone()) {
                Ok(()) => supported.push(action),
                Err(e) => debug!("media session action {action} unavailable: {e}"),
            }
        }

        supported
    }

    /// Publishes what `event` changed.
    pub fn handle(&mut self, event: Event, player: &Player) {
        match event {
            Event::TrackChanged => self.publish_metadata(player),
            Event::Play => self.session.set_playback_state(PlaybackState::Playing),
            Event::Pause => self.session.set_playback_state(PlaybackState::Paused),
            Event::QueueChanged => {}
        }
    }

    /// Publishes the complete current state, as after startup.
    pub fn sync(&mut self, player: &Player) {
        self.publish_metadata(player);
        self.session.set_playback_state(if player.is_playing() {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        });
    }

    fn publish_metadata(&mut self, player: &Player) {
        let metadata = player.current_track().map(Metadata::from);
        self.session.set_metadata(metadata.as_ref());
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge").finish_non_exhaustive()
    }
}

/// Invokes the controller operation that `action` stands for.
pub fn dispatch(action: MediaAction, player: &mut Player) {
    debug!("media session requested {action:?}");

    match action {
        MediaAction::Play => player.play(),
        MediaAction::Pause => player.pause(),
        MediaAction::PreviousTrack => player.play_previous(),
        MediaAction::NextTrack => player.play_next(),
        MediaAction::SeekTo(seconds) => player.seek_to(seconds),
    }
}

/// Session for hosts without a "now playing" surface, such as a terminal.
///
/// Logs what would be shown and supports no actions.
#[derive(Clone, Debug, Default)]
pub struct LogSession {
    metadata: Option<Metadata>,
}

impl MediaSession for LogSession {
    fn set_metadata(&mut self, metadata: Option<&Metadata>) {
        if self.metadata.as_ref() == metadata {
            return;
        }

        match metadata {
            Some(metadata) => info!("now playing: {} - {}", metadata.artist, metadata.title),
            None => debug!("nothing playing"),
        }
        self.metadata = metadata.cloned();
    }

    fn set_playback_state(&mut self, state: PlaybackState) {
        debug!("playback {state}");
    }

    fn set_action_handler(
        &mut self,
        action: Action,
        _tx: mpsc::UnboundedSender<MediaAction>,
    ) -> Result<()> {
        Err(Error::unimplemented(format!(
            "{action} is not supported without a media session"
        )))
    }
}
