use std::path::PathBuf;

use url::Url;

use crate::token::Token;

/// Runtime configuration of the client.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Config {
    pub app_name: String,
    pub app_version: String,
    pub app_lang: String,

    pub user_agent: String,

    /// Base URL of the backend, such as `http://localhost:3001/api`.
    pub api_url: Url,

    /// Where the current track and queue are kept between runs.
    pub state_file: PathBuf,

    /// Path to the `mpv` executable.
    pub mpv_path: PathBuf,

    /// Authenticates history requests. Anonymous without one.
    pub token: Option<Token>,
}

impl Config {
    pub const DEFAULT_API_URL: &'static str = "http://localhost:3001/api";

    pub const STATE_FILE_NAME: &'static str = "state.json";

    /// Creates a configuration with defaults for everything but `api_url`.
    #[must_use]
    pub fn with_api_url(api_url: Url) -> Self {
        let app_name = env!("CARGO_PKG_NAME").to_owned();
        let app_version = env!("CARGO_PKG_VERSION").to_owned();
        let app_lang = "en".to_owned();

        let os_name = match std::env::consts::OS {
            "macos" => "osx",
            other => other,
        };

        let user_agent = format!("{app_name}/{app_version} (Rust; {os_name}; Desktop; {app_lang})");
        trace!("user agent: {user_agent}");

        Self {
            app_name,
            app_version,
            app_lang,

            user_agent,

            api_url,
            state_file: Self::default_state_file(),
            mpv_path: PathBuf::from("mpv"),
            token: None,
        }
    }

    /// `tunetube/state.json` in the user's data directory, or in the
    /// working directory when there is none.
    #[must_use]
    pub fn default_state_file() -> PathBuf {
        match dirs::data_dir() {
            Some(dir) => dir.join(env!("CARGO_PKG_NAME")).join(Self::STATE_FILE_NAME),
            None => {
                warn!("no data directory; keeping state in the working directory");
                PathBuf::from(Self::STATE_FILE_NAME)
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let api_url = Url::parse(Self::DEFAULT_API_URL)
            .unwrap_or_else(|e| unreachable!("default API URL is invalid: {e}"));
        Self::with_api_url(api_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_names_the_client() {
        let config = Config::default();
        assert!(config
            .user_agent
            .starts_with(&format!("tunetube/{} (Rust; ", config.app_version)));
        assert_eq!(config.api_url.as_str(), "http://localhost:3001/api");
        assert!(config.state_file.ends_with(Config::STATE_FILE_NAME));
        assert!(config.token.is_none());
    }
}
