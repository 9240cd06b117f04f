//! Adapter around an external, black-box player widget.
//!
//! The widget decodes and renders media on its own. It is an independent
//! state machine that tunetube observes but does not own:
//!
//! ```text
//! UNSTARTED -> READY -> { PLAYING <-> PAUSED } -> ENDED
//! ```
//!
//! with `BUFFERING` as a transient sub-state of playing and paused.
//!
//! The [`Adapter`] hides three things from the playback controller:
//!
//! * whether a widget is mounted at all and whether it signalled that it is
//!   ready; commands before that fail with
//!   [`ErrorKind::FailedPrecondition`](crate::error::ErrorKind::FailedPrecondition)
//! * the conversion of widget states into [`Report`]s, where buffering and
//!   cueing are swallowed so that brief stalls do not flip the play state
//! * sampling of the playback position, which the widget only exposes by
//!   polling; [`Adapter::POLL_INTERVAL`] is the sampling period

use std::{fmt, time::Duration};

use crate::{
    error::{Error, Result},
    track::{Quality, Volume},
};

/// Black-box media widget, such as an embedded video player or an external
/// player process.
///
/// Commands are best-effort. Implementations report asynchronous state
/// changes out of band as [`WidgetState`] values.
pub trait Widget: Send {
    /// Loads the video and starts playing it.
    fn load(&mut self, video_id: &str) -> Result<()>;

    /// Loads the video without starting playback.
    fn cue(&mut self, video_id: &str) -> Result<()>;

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    /// Seeks to `seconds`. Clamping to the media length is up to the widget.
    fn seek_to(&mut self, seconds: f64) -> Result<()>;

    /// Sets the output volume in percent, already perceptually scaled.
    fn set_volume(&mut self, percent: u8) -> Result<()>;

    /// Requests a streaming quality. Unsupported levels may be ignored.
    fn set_playback_quality(&mut self, quality: Quality) -> Result<()>;

    /// Playback position in seconds.
    fn current_time(&self) -> Result<f64>;

    /// Length of the loaded media in seconds, zero if unknown.
    fn duration(&self) -> Result<f64>;

    /// Tears the widget down. Called once when the adapter is disposed.
    fn destroy(&mut self) {}
}

/// Raw states as reported by a [`Widget`].
#[derive(Clone, Debug, PartialEq)]
pub enum WidgetState {
    Unstarted,
    Ready,
    Playing,
    Paused,
    Buffering,
    Cued,
    Ended,
    Error(String),
}

/// What the adapter reports to the playback controller.
#[derive(Clone, Debug, PartialEq)]
pub enum Report {
    /// The widget is ready to accept commands.
    Ready,
    /// The widget is playing.
    Playing,
    /// The widget is paused.
    Paused,
    /// The loaded media played until its end.
    Ended,
    /// The widget failed to load or play the media.
    Error(String),
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::Playing => write!(f, "playing"),
            Self::Paused => write!(f, "paused"),
            Self::Ended => write!(f, "ended"),
            Self::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// Owns the mounted [`Widget`] and tracks whether it is usable.
#[derive(Default)]
pub struct Adapter {
    widget: Option<Box<dyn Widget>>,
    ready: bool,
}

impl Adapter {
    /// Period at which the playback position is sampled.
    pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts `widget`, disposing any widget mounted before.
    ///
    /// The adapter only accepts commands after the widget reports
    /// [`WidgetState::Ready`].
    pub fn initialize(&mut self, widget: Box<dyn Widget>) {
        self.dispose();
        self.widget = Some(widget);
        debug!("player widget mounted");
    }

    /// Destroys the mounted widget, if any.
    pub fn dispose(&mut self) {
        if let Some(mut widget) = self.widget.take() {
            widget.destroy();
            debug!("player widget disposed");
        }
        self.ready = false;
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.widget.is_some()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready && self.widget.is_some()
    }

    /// Converts a widget state into a report for the controller.
    ///
    /// Returns `None` for states the controller should not react to:
    /// unstarted, cued and buffering. States arriving while no widget is
    /// mounted are dropped as well, as they belong to a disposed widget.
    pub fn observe(&mut self, state: WidgetState) -> Option<Report> {
        if self.widget.is_none() {
            trace!("ignoring widget state {state:?} without a mounted widget");
            return None;
        }

        match state {
            WidgetState::Ready => {
                self.ready = true;
                Some(Report::Ready)
            }
            WidgetState::Playing => Some(Report::Playing),
            WidgetState::Paused => Some(Report::Paused),
            WidgetState::Ended => Some(Report::Ended),
            WidgetState::Error(e) => Some(Report::Error(e)),
            WidgetState::Unstarted | WidgetState::Buffering | WidgetState::Cued => {
                trace!("widget is {state:?}");
                None
            }
        }
    }

    fn widget(&self) -> Result<&dyn Widget> {
        match &self.widget {
            Some(widget) if self.ready => Ok(widget.as_ref()),
            Some(_) => Err(Error::failed_precondition("player widget is not ready yet")),
            None => Err(Error::failed_precondition("no player widget mounted")),
        }
    }

    fn widget_mut(&mut self) -> Result<&mut dyn Widget> {
        match &mut self.widget {
            Some(widget) if self.ready => Ok(widget.as_mut()),
            Some(_) => Err(Error::failed_precondition("player widget is not ready yet")),
            None => Err(Error::failed_precondition("no player widget mounted")),
        }
    }

    pub fn load(&mut self, video_id: &str) -> Result<()> {
        self.widget_mut()?.load(video_id)
    }

    pub fn cue(&mut self, video_id: &str) -> Result<()> {
        self.widget_mut()?.cue(video_id)
    }

    pub fn play(&mut self) -> Result<()> {
        self.widget_mut()?.play()
    }

    pub fn pause(&mut self) -> Result<()> {
        self.widget_mut()?.pause()
    }

    pub fn seek_to(&mut self, seconds: f64) -> Result<()> {
        self.widget_mut()?.seek_to(seconds)
    }

    /// Forwards the [perceptual](Volume::perceptual) value of `volume`.
    pub fn set_volume(&mut self, volume: Volume) -> Result<()> {
        self.widget_mut()?.set_volume(volume.perceptual())
    }

    pub fn set_quality(&mut self, quality: Quality) -> Result<()> {
        self.widget_mut()?.set_playback_quality(quality)
    }

    pub fn current_time(&self) -> Result<f64> {
        self.widget()?.current_time()
    }

    pub fn duration(&self) -> Result<f64> {
        self.widget()?.duration()
    }

    /// Samples the playback position for the periodic position update.
    ///
    /// Returns `None` when there is nothing to sample or sampling failed.
    #[must_use]
    pub fn sample(&self) -> Option<f64> {
        if !self.is_ready() {
            return None;
        }

        match self.current_time() {
            Ok(seconds) if seconds.is_finite() => Some(seconds),
            Ok(seconds) => {
                trace!("ignoring non-finite position {seconds}");
                None
            }
            Err(e) => {
                debug!("could not sample position: {e}");
                None
            }
        }
    }
}

impl fmt::Debug for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("mounted", &self.is_mounted())
            .field("ready", &self.ready)
            .finish()
    }
}

impl Drop for Adapter {
    fn drop(&mut self) {
        self.dispose();
    }
}
