use std::sync::LazyLock;

use regex_lite::Regex;

/// Formats a position or length in seconds as `M:SS`, or `H:MM:SS` from an
/// hour up.
///
/// Fractions are truncated. Zero, negative and non-finite input formats as
/// `0:00`.
///
/// # Examples
///
/// ```rust
/// use tunetube::util::format_duration;
///
/// assert_eq!(format_duration(213.9), "3:33");
/// assert_eq!(format_duration(3723.0), "1:02:03");
/// ```
#[must_use]
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0:00".to_owned();
    }

    // Truncation towards zero is the intent.
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total = seconds as u64;

    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

static VIDEO_URL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/)([^&\n?#/]+)")
        .inspect_err(|e| error!("invalid video URL pattern: {e}"))
        .ok()
});

/// Extracts the video id from a watch, short or embed link.
///
/// Returns `None` for anything else.
#[must_use]
pub fn parse_video_url(url: &str) -> Option<&str> {
    VIDEO_URL
        .as_ref()?
        .captures(url)?
        .get(1)
        .map(|m| m.as_str())
}

/// Parses a position given as seconds (`95`, `95.5`), `M:SS` or `H:MM:SS`.
#[must_use]
pub fn parse_position(position: &str) -> Option<f64> {
    let position = position.trim();
    if !position.contains(':') {
        return position
            .parse::<f64>()
            .ok()
            .filter(|seconds| seconds.is_finite() && *seconds >= 0.0);
    }

    let mut seconds = 0.0;
    let mut parts = 0;
    for part in position.split(':') {
        let value = part.parse::<u32>().ok()?;
        seconds = seconds * 60.0 + f64::from(value);
        parts += 1;
    }

    (parts <= 3).then_some(seconds)
}
