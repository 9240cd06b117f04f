//! Video search and details responses.
//!
//! The backend forwards `GET /youtube/search` and `GET /youtube/videos` to
//! the video platform's data API and returns its JSON unchanged. Only the
//! fields that make up a [`Track`] are modelled; everything else is
//! ignored.
//!
//! A search yields bare ids. Durations and the best thumbnails only come
//! with video details, so a search is always followed by a details lookup.

use std::sync::LazyLock;

use regex_lite::Regex;
use serde::Deserialize;

use crate::track::Track;

/// Response of `GET /youtube/videos`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoList {
    #[serde(default)]
    pub items: Vec<Video>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    #[serde(default)]
    pub snippet: Snippet,
    #[serde(default)]
    pub content_details: ContentDetails,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    #[serde(default)]
    pub title: String,
    /// Name of the uploading channel, shown as the artist.
    #[serde(default)]
    pub channel_title: String,
    #[serde(default)]
    pub thumbnails: Thumbnails,
}

/// Thumbnails by size, any of which may be missing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Thumbnails {
    pub medium: Option<Thumbnail>,
    pub high: Option<Thumbnail>,
    pub standard: Option<Thumbnail>,
    pub maxres: Option<Thumbnail>,
}

impl Thumbnails {
    /// URL of the largest thumbnail, or `None` without any.
    #[must_use]
    pub fn best(&self) -> Option<&str> {
        [&self.maxres, &self.standard, &self.high, &self.medium]
            .into_iter()
            .flatten()
            .map(|thumbnail| thumbnail.url.as_str())
            .next()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Thumbnail {
    pub url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ContentDetails {
    /// ISO 8601 duration such as `PT3M33S`.
    #[serde(default)]
    pub duration: String,
}

impl Video {
    /// Length in whole seconds, zero if unknown.
    #[must_use]
    pub fn seconds(&self) -> u64 {
        parse_duration(&self.content_details.duration)
    }
}

impl From<Video> for Track {
    fn from(video: Video) -> Self {
        let duration = video.seconds();
        let thumbnail = video.snippet.thumbnails.best().unwrap_or_default().to_owned();
        Track::new(
            video.id,
            video.snippet.title,
            video.snippet.channel_title,
            thumbnail,
            duration,
        )
    }
}

/// Response of `GET /youtube/search`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchList {
    #[serde(default)]
    pub items: Vec<SearchResult>,
    pub next_page_token: Option<String>,
}

impl SearchList {
    /// Ids of the videos found, in result order.
    pub fn video_ids(&self) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .filter_map(|result| result.id.video_id.as_deref())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SearchResult {
    pub id: ResourceId,
}

/// Identifies a search result. Channels and playlists carry no video id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    #[serde(default)]
    pub video_id: Option<String>,
}

static ISO_DURATION: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?")
        .inspect_err(|e| error!("invalid duration pattern: {e}"))
        .ok()
});

/// Parses an ISO 8601 duration of hours, minutes and seconds into seconds.
///
/// Returns zero for anything that does not look like `PT#H#M#S`.
#[must_use]
pub fn parse_duration(iso: &str) -> u64 {
    let Some(captures) = ISO_DURATION.as_ref().and_then(|re| re.captures(iso)) else {
        return 0;
    };

    let component = |i: usize| {
        captures
            .get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };

    component(1)
        .saturating_mul(3600)
        .saturating_add(component(2).saturating_mul(60))
        .saturating_add(component(3))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_durations() {
        assert_eq!(parse_duration("PT3M33S"), 213);
        assert_eq!(parse_duration("PT1H2M3S"), 3723);
        assert_eq!(parse_duration("PT45S"), 45);
        assert_eq!(parse_duration("PT2H"), 7200);
        assert_eq!(parse_duration("P0D"), 0);
        assert_eq!(parse_duration(""), 0);
    }

    #[test]
    fn video_becomes_track() {
        let json = r#"{
            "kind": "youtube#videoListResponse",
            "items": [{
                "id": "dQw4w9WgXcQ",
                "snippet": {
                    "title": "Never Gonna Give You Up",
                    "channelTitle": "Rick Astley",
                    "thumbnails": {
                        "medium": {"url": "https://i.ytimg.com/mq.jpg"},
                        "high": {"url": "https://i.ytimg.com/hq.jpg"}
                    }
                },
                "contentDetails": {"duration": "PT3M33S"},
                "statistics": {"viewCount": "1500000000"}
            }]
        }"#;

        let mut list: VideoList = serde_json::from_str(json).unwrap();
        let track = Track::from(list.items.remove(0));

        assert_eq!(track.video_id(), "dQw4w9WgXcQ");
        assert_eq!(track.artist(), "Rick Astley");
        assert_eq!(track.thumbnail(), "https://i.ytimg.com/hq.jpg");
        assert_eq!(track.duration(), 213);
    }

    #[test]
    fn prefers_largest_thumbnail() {
        let thumbnails: Thumbnails = serde_json::from_str(
            r#"{
                "medium": {"url": "m"},
                "standard": {"url": "s"},
                "maxres": {"url": "x"}
            }"#,
        )
        .unwrap();
        assert_eq!(thumbnails.best(), Some("x"));
        assert_eq!(Thumbnails::default().best(), None);
    }

    #[test]
    fn search_skips_non_video_results() {
        let json = r#"{
            "nextPageToken": "CAUQAA",
            "items": [
                {"id": {"kind": "youtube#video", "videoId": "a"}},
                {"id": {"kind": "youtube#channel", "channelId": "c"}},
                {"id": {"kind": "youtube#video", "videoId": "b"}}
            ]
        }"#;

        let list: SearchList = serde_json::from_str(json).unwrap();
        assert_eq!(list.video_ids().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(list.next_page_token.as_deref(), Some("CAUQAA"));
    }
}
