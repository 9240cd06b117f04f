//! Tracks and the playback settings that apply to them.
//!
//! A [`Track`] identifies a playable video on the platform along with the
//! metadata shown to the user. Tracks are values: they are cloned into the
//! queue, the persisted snapshot and history requests, and never changed in
//! place. Setting a custom cover produces a new `Track`.
//!
//! [`Quality`] is the requested streaming quality, and [`Volume`] the linear
//! slider position together with its perceptual mapping.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::error::Error;

/// Immutable metadata record identifying a playable video.
///
/// Serializes with the camel case field names that the backend and the
/// state file use:
///
/// ```json
/// {
///     "videoId": "dQw4w9WgXcQ",
///     "title": "Never Gonna Give You Up",
///     "artist": "Rick Astley",
///     "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg",
///     "customCover": null,
///     "duration": 213
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    video_id: String,

    #[serde(default)]
    title: String,

    #[serde(default)]
    artist: String,

    #[serde(default)]
    thumbnail: String,

    #[serde(default)]
    custom_cover: Option<String>,

    /// Whole seconds as reported by the catalog; zero when unknown.
    #[serde(default)]
    duration: u64,
}

impl Track {
    #[must_use]
    pub fn new(
        video_id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        thumbnail: impl Into<String>,
        duration: u64,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            title: title.into(),
            artist: artist.into(),
            thumbnail: thumbnail.into(),
            custom_cover: None,
            duration,
        }
    }

    /// Returns a copy of this track with `cover` as its custom cover.
    ///
    /// `cover` can be a URL or an embedded `data:` image.
    #[must_use]
    pub fn with_custom_cover(&self, cover: impl Into<String>) -> Self {
        Self {
            custom_cover: Some(cover.into()),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn artist(&self) -> &str {
        &self.artist
    }

    #[must_use]
    pub fn thumbnail(&self) -> &str {
        &self.thumbnail
    }

    #[must_use]
    pub fn custom_cover(&self) -> Option<&str> {
        self.custom_cover.as_deref()
    }

    #[must_use]
    pub fn duration(&self) -> u64 {
        self.duration
    }

    /// The image to show for this track: the custom cover if one was set,
    /// otherwise the platform thumbnail.
    #[must_use]
    pub fn artwork(&self) -> &str {
        self.custom_cover().unwrap_or(&self.thumbnail)
    }

    /// Whether `other` refers to the same video.
    #[must_use]
    pub fn is_same_video(&self, other: &Track) -> bool {
        self.video_id == other.video_id
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: \"{} - {}\"", self.video_id, self.artist, self.title)
    }
}

/// Requested streaming quality.
///
/// The widget may silently ignore levels it does not support for a given
/// video. Sessions always start at [`Quality::Low`].
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, SerializeDisplay, DeserializeFromStr,
)]
pub enum Quality {
    #[default]
    Low,
    Medium,
    High,
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

impl FromStr for Quality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "small" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" | "hd720" => Ok(Self::High),
            other => Err(Error::invalid_argument(format!(
                "unknown quality \"{other}\" (expected low, medium or high)"
            ))),
        }
    }
}

/// Linear volume slider position from 0 to 100.
///
/// The linear value is what the user sets and what the interface shows.
/// The widget receives the [perceptual](Volume::perceptual) value instead.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Volume(u8);

impl Volume {
    pub const MAX: Volume = Volume(100);
    pub const MUTED: Volume = Volume(0);

    /// Creates a volume, saturating at 100.
    #[must_use]
    pub fn new(linear: u8) -> Self {
        Self(linear.min(100))
    }

    #[must_use]
    pub fn linear(self) -> u8 {
        self.0
    }

    /// Maps the linear slider position onto an exponential loudness curve.
    ///
    /// `round((e^(2v/100) - 1) / (e^2 - 1) * 100)`, which keeps 0 at 0 and
    /// 100 at 100 and gives finer control at low volumes.
    #[must_use]
    pub fn perceptual(self) -> u8 {
        if self.0 == 0 {
            return 0;
        }

        let ratio = f64::from(self.0) / 100.0;
        let scaled = ((ratio * 2.0).exp() - 1.0) / (2.0_f64.exp() - 1.0) * 100.0;

        // Bounded to 0..=100 by construction.
        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let percent = scaled.round().clamp(0.0, 100.0) as u8;
        percent
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::MAX
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}
