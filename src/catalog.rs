//! Lookup of track metadata from the video catalog.

use async_trait::async_trait;

use crate::{error::Result, track::Track};

/// Searchable catalog of playable videos.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Fetches current details of a video.
    ///
    /// Returns `Ok(None)` when the video no longer exists.
    async fn video_details(&self, video_id: &str) -> Result<Option<Track>>;

    /// Searches for music videos matching `query`, at most `max_results`.
    ///
    /// Starts at `page_token` if given, which comes from an earlier page of
    /// the same search. Short clips are left out, so fewer results may come
    /// back.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<Page>;
}

/// Search results, a page at a time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub tracks: Vec<Track>,
    /// Where the next page starts, `None` on the last page.
    pub next_page_token: Option<String>,
}

/// Fetches current details of a video.
///
/// Any failure is logged and yields `None`. What to do without details is up
/// to the caller.
pub async fn refresh<C>(catalog: &C, video_id: &str) -> Option<Track>
where
    C: Catalog + ?Sized,
{
    match catalog.video_details(video_id).await {
        Ok(Some(track)) => Some(track),
        Ok(None) => {
            warn!("video {video_id} is not available");
            None
        }
        Err(e) => {
            warn!("could not fetch details of {video_id}: {e}");
            None
        }
    }
}
