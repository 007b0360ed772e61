//! Persistent application configuration model and defaults.

use std::time::Duration;

use chrono::NaiveDate;

use crate::catalog::http::RetryPolicy;
use crate::reconcile::ranking::RankingKey;

/// Root configuration persisted to `newmusicrelease.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Genres, release date and output selection.
    pub pipeline: PipelineConfig,
    #[serde(default)]
    /// Shared 429 backoff and pacing.
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub tidal: TidalConfig,
    #[serde(default)]
    pub deezer: DeezerConfig,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_genres")]
    pub genres: Vec<String>,
    /// `YYYY-MM-DD`; empty selects the most recent Friday.
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub ranking: RankingKey,
    /// Treat a search hit whose title does not resemble the request as no match.
    #[serde(default)]
    pub strict_matching: bool,
    #[serde(default = "default_releases_file")]
    pub releases_file: String,
    /// Empty writes the digest to stdout.
    #[serde(default)]
    pub digest_file: String,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
    /// Attempts per request while throttled; 0 retries until the platform recovers.
    #[serde(default)]
    pub max_attempts: u32,
    /// Client-side pacing; 0 disables it.
    #[serde(default)]
    pub requests_per_second: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Where Spotify tokens survive between runs.
#[derive(Debug, Clone, Copy, serde::Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenStoreKind {
    /// `access_token` / `refresh_token` keys of the `[spotify]` section.
    #[default]
    Config,
    /// OS keyring entry.
    Keyring,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct SpotifyConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// One-time code from the authorization redirect.
    #[serde(default)]
    pub authorization_code: String,
    #[serde(default = "default_spotify_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub token_store: TokenStoreKind,
    #[serde(default = "default_true")]
    pub open_browser: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct TidalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct DeezerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            genres: default_genres(),
            release_date: String::new(),
            ranking: RankingKey::default(),
            strict_matching: false,
            releases_file: default_releases_file(),
            digest_file: String::new(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            backoff_secs: default_backoff_secs(),
            max_attempts: 0,
            requests_per_second: 0,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            authorization_code: String::new(),
            redirect_uri: default_spotify_redirect_uri(),
            access_token: String::new(),
            refresh_token: String::new(),
            token_store: TokenStoreKind::default(),
            open_browser: true,
        }
    }
}

impl Default for TidalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            client_id: String::new(),
            client_secret: String::new(),
        }
    }
}

impl Default for DeezerConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl PipelineConfig {
    /// Parses the configured release date; `None` when unset.
    pub fn parsed_release_date(&self) -> Result<Option<NaiveDate>, String> {
        let trimmed = self.release_date.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .map(Some)
            .map_err(|err| format!("invalid release_date '{trimmed}': {err}"))
    }
}

impl RateLimitConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            backoff: Duration::from_secs(self.backoff_secs),
            max_attempts: (self.max_attempts > 0).then_some(self.max_attempts),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_genres() -> Vec<String> {
    vec!["electro".to_string()]
}

fn default_releases_file() -> String {
    "releases.json".to_string()
}

fn default_backoff_secs() -> u64 {
    3
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_spotify_redirect_uri() -> String {
    "https://open.spotify.com".to_string()
}

/// Normalizes user-edited values: trims and dedups genres, clamps durations.
pub fn sanitize_config(config: Config) -> Config {
    let mut genres: Vec<String> = Vec::new();
    for genre in &config.pipeline.genres {
        let trimmed = genre.trim();
        if !trimmed.is_empty() && !genres.iter().any(|existing| existing == trimmed) {
            genres.push(trimmed.to_string());
        }
    }

    Config {
        pipeline: PipelineConfig {
            genres,
            release_date: config.pipeline.release_date.trim().to_string(),
            releases_file: config.pipeline.releases_file.trim().to_string(),
            digest_file: config.pipeline.digest_file.trim().to_string(),
            ..config.pipeline
        },
        rate_limit: RateLimitConfig {
            backoff_secs: config.rate_limit.backoff_secs.clamp(1, 300),
            request_timeout_secs: config.rate_limit.request_timeout_secs.clamp(1, 120),
            ..config.rate_limit
        },
        spotify: SpotifyConfig {
            client_id: config.spotify.client_id.trim().to_string(),
            client_secret: config.spotify.client_secret.trim().to_string(),
            authorization_code: config.spotify.authorization_code.trim().to_string(),
            ..config.spotify
        },
        tidal: TidalConfig {
            client_id: config.tidal.client_id.trim().to_string(),
            client_secret: config.tidal.client_secret.trim().to_string(),
            ..config.tidal
        },
        deezer: config.deezer,
    }
}
