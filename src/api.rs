//! Client of the tunetube backend.
//!
//! The backend exposes, relative to its base URL:
//!
//! * `POST history` to record a played track
//! * `GET youtube/videos` and `GET youtube/search`, which proxy the video
//!   platform's data API
//!
//! [`Client`] implements [`Catalog`] and [`History`] on top of these.

use async_trait::async_trait;
use url::Url;

use crate::{
    catalog::{Catalog, Page},
    config::Config,
    error::{Error, Result},
    history::History,
    http::Client as HttpClient,
    protocol::{
        self,
        videos::{SearchList, VideoList},
    },
    track::Track,
};

pub struct Client {
    http_client: HttpClient,
    base_url: Url,
}

impl Client {
    /// Clips shorter than this are short-form videos, not songs.
    pub const MIN_TRACK_SECONDS: u64 = 60;

    /// Video category of music on the platform.
    const MUSIC_CATEGORY: &'static str = "10";

    /// Parts requested for video details.
    const VIDEO_PARTS: &'static str = "contentDetails,snippet,statistics";

    /// Creates a client for the backend at `config.api_url`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built or the base URL
    /// cannot have a path.
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config.api_url.clone();
        if base_url.cannot_be_a_base() {
            return Err(Error::invalid_argument(format!(
                "{base_url} cannot be used as API base URL"
            )));
        }

        Ok(Self {
            http_client: HttpClient::new(config)?,
            base_url,
        })
    }

    /// Joins `segments` onto the base URL path.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::internal("API base URL cannot have a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T>(&self, url: Url, origin: &str) -> Result<T>
    where
        T: for<'de> serde::Deserialize<'de> + std::fmt::Debug,
    {
        let request = self.http_client.get(url);
        let response = self.http_client.execute(request).await?;
        let body = response.error_for_status()?.text().await?;
        protocol::json(&body, origin)
    }

    async fn videos(&self, ids: &[&str]) -> Result<VideoList> {
        let mut url = self.endpoint(&["youtube", "videos"])?;
        url.query_pairs_mut()
            .append_pair("part", Self::VIDEO_PARTS)
            .append_pair("id", &ids.join(","));

        self.get(url, "youtube/videos").await
    }

    /// Builds the search URL for music videos, continuing at `page_token`.
    fn search_url(
        &self,
        query: &str,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<Url> {
        let mut url = self.endpoint(&["youtube", "search"])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("part", "snippet")
                .append_pair("q", query)
                .append_pair("type", "video")
                .append_pair("videoCategoryId", Self::MUSIC_CATEGORY)
                .append_pair("maxResults", &max_results.to_string());
            if let Some(token) = page_token {
                pairs.append_pair("pageToken", token);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl Catalog for Client {
    async fn video_details(&self, video_id: &str) -> Result<Option<Track>> {
        let list = self.videos(&[video_id]).await?;
        Ok(list.items.into_iter().next().map(Track::from))
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<Page> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::invalid_argument("search query is empty"));
        }

        let url = self.search_url(query, max_results, page_token)?;
        let found: SearchList = self.get(url, "youtube/search").await?;
        let next_page_token = found.next_page_token.clone();

        let ids: Vec<&str> = found.video_ids().collect();
        if ids.is_empty() {
            debug!("no videos found for \"{query}\"");
            return Ok(Page {
                tracks: Vec::new(),
                next_page_token,
            });
        }

        let details = self.videos(&ids).await?;
        let tracks: Vec<Track> = details
            .items
            .into_iter()
            .filter(|video| video.seconds() >= Self::MIN_TRACK_SECONDS)
            .map(Track::from)
            .collect();

        debug!(
            "found {} tracks for \"{query}\" ({} short clips left out){}",
            tracks.len(),
            ids.len().saturating_sub(tracks.len()),
            if next_page_token.is_some() {
                "; more available"
            } else {
                ""
            }
        );
        Ok(Page {
            tracks,
            next_page_token,
        })
    }
}

#[async_trait]
impl History for Client {
    async fn add(&self, track: &Track) -> Result<()> {
        let url = self.endpoint(&["history"])?;
        let request = self.http_client.post_json(url, track)?;

        self.http_client
            .execute(request)
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_url: &str) -> Config {
        Config {
            api_url: api_url.parse().unwrap(),
            ..Config::default()
        }
    }

    fn client(api_url: &str) -> Client {
        Client::new(&config(api_url)).unwrap()
    }

    #[test]
    fn endpoints_extend_base_path() {
        let api = client("http://localhost:3001/api");
        assert_eq!(
            api.endpoint(&["youtube", "videos"]).unwrap().as_str(),
            "http://localhost:3001/api/youtube/videos"
        );

        let api = client("http://localhost:3001/api/");
        assert_eq!(
            api.endpoint(&["history"]).unwrap().as_str(),
            "http://localhost:3001/api/history"
        );
    }

    #[test]
    fn search_continues_at_page_token() {
        let api = client("http://localhost:3001/api");

        let first = api.search_url("daft punk", 20, None).unwrap();
        assert_eq!(first.path(), "/api/youtube/search");
        assert!(!first.query_pairs().any(|(key, _)| key == "pageToken"));
        assert!(first
            .query_pairs()
            .any(|(key, value)| key == "q" && value == "daft punk"));

        let next = api.search_url("daft punk", 20, Some("CAUQAA")).unwrap();
        assert_eq!(
            next.query_pairs()
                .find(|(key, _)| key == "pageToken")
                .map(|(_, value)| value.into_owned())
                .as_deref(),
            Some("CAUQAA")
        );
        assert!(next
            .query_pairs()
            .any(|(key, value)| key == "videoCategoryId" && value == "10"));
    }

    #[test]
    fn rejects_opaque_base_url() {
        assert!(Client::new(&config("mailto:someone@example.com")).is_err());
    }
}
