//! Bearer token to authenticate with the backend.
//!
//! The token is read from a secrets file in TOML format:
//!
//! ```toml
//! token = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9..."
//! ```
//!
//! It never shows up in logs: `Debug` output is redacted.

use std::{fs, ops::Deref, path::Path, str::FromStr};

use veil::Redact;

use crate::error::{Error, Result};

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Redact)]
#[redact(all)]
pub struct Token(String);

impl Token {
    /// Secrets files larger than this are rejected unread.
    const MAX_FILE_SIZE: u64 = 8 * 1024;

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Loads the token from the `token` key of a secrets file.
    ///
    /// # Errors
    ///
    /// Returns error if the file does not exist, is too large, is not valid
    /// TOML or does not contain a valid token. A missing or blank token is
    /// [`NotFound`](crate::error::ErrorKind::NotFound), like a missing file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Prevent out-of-memory condition: secrets files should be small.
        let file_size = fs::metadata(path)?.len();
        if file_size > Self::MAX_FILE_SIZE {
            return Err(Error::out_of_range(format!(
                "{} is too large ({file_size} bytes)",
                path.display()
            )));
        }

        let contents = fs::read_to_string(path)?;
        let value = contents.parse::<toml::Table>()?;

        // A blank token is one that has not been filled in yet.
        match value
            .get("token")
            .and_then(toml::Value::as_str)
            .filter(|token| !token.trim().is_empty())
        {
            Some(token) => token.parse(),
            None => Err(Error::not_found(format!(
                "{} does not contain a token",
                path.display()
            ))),
        }
    }
}

impl FromStr for Token {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let token = s.trim();

        if token.is_empty() {
            return Err(Error::invalid_argument("token is empty"));
        }

        // Must fit in an `Authorization` header.
        if !token.chars().all(|c| c.is_ascii_graphic()) {
            return Err(Error::invalid_argument(
                "token contains whitespace or non-ASCII characters",
            ));
        }

        Ok(Self(token.to_owned()))
    }
}

impl Deref for Token {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
