//! Throttled HTTP access to the tunetube backend.
//!
//! Every request goes through a local rate limiter before it is sent. The
//! backend forwards search and video lookups to a platform with a daily
//! quota, and a queue full of restored tracks or a user hammering `search`
//! should not burn through it. Requests over the limit wait their turn;
//! none are dropped.
//!
//! All requests carry JSON `Accept`, the configured language and user agent,
//! and the bearer token if one is configured.
//!
//! # Example
//!
//! ```rust,ignore
//! use tunetube::http::Client;
//!
//! let client = Client::new(&config)?;
//! let response = client.execute(client.get(url)).await?;
//! ```

use std::{num::NonZeroU32, time::Duration};

use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, CONTENT_TYPE},
    Method, Request, Response, Url,
};
use serde::Serialize;

use crate::{
    config::Config,
    error::{Error, Result},
};

pub struct Client {
    /// Sends requests right away, bypassing the rate limiter.
    pub unlimited: reqwest::Client,

    rate_limiter: DefaultDirectRateLimiter,
}

impl Client {
    /// Requests allowed per [`RATE_LIMIT_WINDOW`](Self::RATE_LIMIT_WINDOW),
    /// all at once if need be.
    const RATE_LIMIT_BURST: u32 = 20;

    const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(10);

    const TCP_KEEPALIVE: Duration = Duration::from_secs(60);

    /// Upper bound on a whole request, reading the body included.
    ///
    /// Nothing in playback waits on a request, but a hung one holds up the
    /// requests throttled behind it.
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a client with headers and limits for `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the token does not fit in a header or the TLS
    /// backend cannot be initialized.
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        match HeaderValue::from_str(&config.app_lang) {
            Ok(lang) => {
                headers.insert(ACCEPT_LANGUAGE, lang);
            }
            Err(e) => debug!("not sending language {:?}: {e}", config.app_lang),
        }

        if let Some(token) = &config.token {
            let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token.as_str()))?;
            bearer.set_sensitive(true);
            headers.insert(AUTHORIZATION, bearer);
        }

        let unlimited = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(&config.user_agent)
            .tcp_keepalive(Self::TCP_KEEPALIVE)
            .timeout(Self::REQUEST_TIMEOUT)
            .build()?;

        let burst = NonZeroU32::new(Self::RATE_LIMIT_BURST)
            .ok_or_else(|| Error::internal("rate limit burst is zero"))?;
        let quota = Quota::with_period(Self::RATE_LIMIT_WINDOW / Self::RATE_LIMIT_BURST)
            .ok_or_else(|| Error::internal("rate limit window is zero"))?
            .allow_burst(burst);

        Ok(Self {
            unlimited,
            rate_limiter: governor::RateLimiter::direct(quota),
        })
    }

    #[must_use]
    pub fn get(&self, url: Url) -> Request {
        Request::new(Method::GET, url)
    }

    /// Builds a `POST` with `body` serialized as JSON.
    ///
    /// # Errors
    ///
    /// Returns error if `body` cannot be serialized.
    pub fn post_json<T>(&self, url: Url, body: &T) -> Result<Request>
    where
        T: Serialize + ?Sized,
    {
        let mut request = Request::new(Method::POST, url);
        request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        *request.body_mut() = Some(serde_json::to_vec(body)?.into());
        Ok(request)
    }

    /// Sends `request` once the rate limiter lets it through.
    ///
    /// Status codes are not checked here.
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be sent or times out.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        if self.rate_limiter.check().is_err() {
            debug!("throttling {} {}", request.method(), request.url().path());
            self.rate_limiter.until_ready().await;
        }

        trace!("{} {}", request.method(), request.url());
        let response = self.unlimited.execute(request).await?;
        trace!("{} from {}", response.status(), response.url().path());

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;

    #[test]
    fn posts_carry_json() {
        let client = Client::new(&Config::default()).unwrap();
        let url: Url = "http://localhost:3001/api/history".parse().unwrap();

        let request = client
            .post_json(url.clone(), &serde_json::json!({ "videoId": "abc" }))
            .unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.url(), &url);
        assert_eq!(
            request.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(
            request.body().and_then(reqwest::Body::as_bytes),
            Some(br#"{"videoId":"abc"}"#.as_slice())
        );
    }

    #[test]
    fn token_must_fit_a_header() {
        let config = Config {
            token: Some("abc.def".parse::<Token>().unwrap()),
            ..Config::default()
        };
        assert!(Client::new(&config).is_ok());
    }
}
