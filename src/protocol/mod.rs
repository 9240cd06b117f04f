//! Wire types of the tunetube backend.
//!
//! # Submodules
//!
//! * [`videos`] - video search and video details, as proxied by the backend
//!   from the video platform's data API
//!
//! # Shared Functionality
//!
//! [`json`] parses response bodies with consistent logging: the parsed
//! structure at TRACE level on success, and the raw body on failure.

pub mod videos;

use std::fmt::Debug;

use serde::Deserialize;

use crate::error::Result;

/// Parses and logs a JSON response body.
///
/// `origin` names the endpoint in log messages.
///
/// # Errors
///
/// Returns error if `body` is not valid JSON or does not match `T`.
pub fn json<T>(body: &str, origin: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Debug,
{
    match serde_json::from_str(body) {
        Ok(result) => {
            trace!("{origin}: {result:#?}");
            Ok(result)
        }
        Err(e) => {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
                trace!("{origin}: {json:#?}");
            } else {
                error!("{origin}: failed parsing response ({e:?})");
                trace!("{body}");
            }
            Err(e.into())
        }
    }
}
