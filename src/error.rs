//! Error types shared by the catalog clients and the pipeline driver.

use thiserror::Error;

use crate::catalog::Platform;

/// Failure of a single catalog operation.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{platform} kept answering 429 after {attempts} attempts")]
    RateLimited { platform: Platform, attempts: u32 },

    #[error("{platform} rejected the access token")]
    Unauthorized { platform: Platform },

    #[error("{platform} has no match for {query}")]
    NoMatch { platform: Platform, query: String },

    #[error("{platform} answered {status} for {url}: {body}")]
    Platform {
        platform: Platform,
        status: u16,
        url: String,
        body: String,
    },

    #[error("{platform} authentication failed: {message}")]
    Auth { platform: Platform, message: String },

    #[error("{platform} needs a one-time authorization; open {url} and copy the code parameter into authorization_code")]
    AuthorizationRequired { platform: Platform, url: String },

    #[error("{platform} is not configured: {message}")]
    Config { platform: Platform, message: String },

    #[error("{platform} request failed: {message}")]
    Transport { platform: Platform, message: String },

    #[error("{platform} returned an unreadable payload: {source}")]
    Decode {
        platform: Platform,
        #[source]
        source: serde_json::Error,
    },

    #[error("{platform} token store failed: {message}")]
    Store { platform: Platform, message: String },
}

impl CatalogError {
    /// Empty result sets are expected and logged below warning level.
    pub fn is_no_match(&self) -> bool {
        matches!(self, Self::NoMatch { .. })
    }
}

/// Failure that stops a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("primary catalog bootstrap failed: {0}")]
    Bootstrap(#[source] CatalogError),

    #[error("release source failed: {0}")]
    Source(String),

    #[error("digest delivery failed: {0}")]
    Delivery(String),
}
