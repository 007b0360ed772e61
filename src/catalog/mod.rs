//! Streaming-catalog adapter abstractions and concrete platform clients.

pub mod deezer;
pub mod http;
pub mod spotify;
pub mod tidal;

use std::fmt;

use crate::album::{DeezerAlbum, SpotifyAlbum, SpotifyArtist, TidalAlbum};
use crate::error::CatalogError;

/// External music catalog the reconciler can query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Platform {
    Spotify,
    Tidal,
    Deezer,
}

impl Platform {
    /// Section name used in the config file and keyring service names.
    pub fn config_key(self) -> &'static str {
        match self {
            Self::Spotify => "spotify",
            Self::Tidal => "tidal",
            Self::Deezer => "deezer",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Spotify => "Spotify",
            Self::Tidal => "Tidal",
            Self::Deezer => "Deezer",
        };
        f.write_str(name)
    }
}

/// Native album record returned by a platform search.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformRecord {
    Spotify(SpotifyAlbum),
    Tidal(TidalAlbum),
    Deezer(DeezerAlbum),
}

impl PlatformRecord {
    /// Album title as the platform spells it.
    pub fn title(&self) -> &str {
        match self {
            Self::Spotify(album) => &album.name,
            Self::Tidal(album) => &album.title,
            Self::Deezer(album) => &album.title,
        }
    }
}

/// Interface implemented by every catalog client.
pub trait CatalogClient {
    fn platform(&self) -> Platform;

    /// Acquires the credentials needed for subsequent calls.
    fn authenticate(&mut self) -> Result<(), CatalogError>;

    /// Renews the current credentials. Platforms without a refresh grant fail.
    fn refresh(&mut self) -> Result<(), CatalogError> {
        Err(CatalogError::Auth {
            platform: self.platform(),
            message: "token refresh is not supported".to_string(),
        })
    }

    /// Looks up the best match for one album. An empty result is `NoMatch`.
    fn search_album(
        &mut self,
        artist_name: &str,
        album_name: &str,
    ) -> Result<PlatformRecord, CatalogError>;
}

/// Spotify-only lookups used to fill popularity data.
pub trait SpotifyCatalog: CatalogClient {
    fn search_artist(&mut self, artist_name: &str) -> Result<SpotifyArtist, CatalogError>;

    /// Fetches full album objects; `ids` must not exceed the album batch cap.
    fn albums_by_id(&mut self, ids: &[String]) -> Result<Vec<SpotifyAlbum>, CatalogError>;

    /// Fetches full artist objects; `ids` must not exceed the artist batch cap.
    fn artists_by_id(&mut self, ids: &[String]) -> Result<Vec<SpotifyArtist>, CatalogError>;
}
