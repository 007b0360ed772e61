//! Release and album records threaded through the pipeline.

use serde::{Deserialize, Serialize};

use crate::catalog::PlatformRecord;

/// Separator between genre tags in [`EnrichedAlbum::genre`].
pub const GENRE_SEPARATOR: &str = ",";

const TIDAL_ALBUM_URL_BASE: &str = "https://listen.tidal.com/album";

/// One release as listed by the release calendar for a genre.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRelease {
    pub artist_name: String,
    #[serde(default)]
    pub album_name: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub album_art_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageCover {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalUrls {
    pub spotify: String,
}

/// Spotify artist object. `popularity` and `genres` are only present on full objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifyArtist {
    pub id: String,
    pub name: String,
    pub uri: String,
    pub external_urls: ExternalUrls,
    pub genres: Vec<String>,
    pub popularity: Option<u32>,
}

/// Spotify album object. Search results omit `popularity`, `genres` and `label`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifyAlbum {
    pub id: String,
    pub name: String,
    pub album_type: String,
    pub total_tracks: u32,
    pub release_date: String,
    pub uri: String,
    pub external_urls: ExternalUrls,
    pub images: Vec<ImageCover>,
    pub artists: Vec<SpotifyArtist>,
    pub genres: Vec<String>,
    pub label: Option<String>,
    pub popularity: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TidalArtist {
    pub id: String,
    pub name: String,
    pub main: bool,
}

/// Album resource from the Tidal open API search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TidalAlbum {
    pub id: String,
    pub barcode_id: String,
    pub title: String,
    pub artists: Vec<TidalArtist>,
    pub duration: u64,
    pub release_date: String,
    pub image_cover: Vec<ImageCover>,
    pub number_of_tracks: u32,
    #[serde(rename = "type")]
    pub album_type: String,
    pub copyright: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeezerArtist {
    pub id: u64,
    pub name: String,
    pub link: String,
    pub picture: String,
}

/// Album entry from the Deezer album search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeezerAlbum {
    pub id: u64,
    pub title: String,
    pub link: String,
    pub cover: String,
    pub cover_medium: String,
    pub cover_big: String,
    pub cover_xl: String,
    pub nb_tracks: u32,
    pub record_type: String,
    pub explicit_lyrics: bool,
    pub artist: DeezerArtist,
}

/// Per-platform matches collected during enrichment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlatformRecords {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spotify: Option<SpotifyAlbum>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spotify_artist: Option<SpotifyArtist>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tidal: Option<TidalAlbum>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deezer: Option<DeezerAlbum>,
}

impl PlatformRecords {
    pub fn attach(&mut self, record: PlatformRecord) {
        match record {
            PlatformRecord::Spotify(album) => self.spotify = Some(album),
            PlatformRecord::Tidal(album) => self.tidal = Some(album),
            PlatformRecord::Deezer(album) => self.deezer = Some(album),
        }
    }

    /// Fills every empty slot from `other`; filled slots are left untouched.
    pub fn adopt_missing(&mut self, other: PlatformRecords) {
        if self.spotify.is_none() {
            self.spotify = other.spotify;
        }
        if self.spotify_artist.is_none() {
            self.spotify_artist = other.spotify_artist;
        }
        if self.tidal.is_none() {
            self.tidal = other.tidal;
        }
        if self.deezer.is_none() {
            self.deezer = other.deezer;
        }
    }
}

/// Album record accumulated across dedup and enrichment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichedAlbum {
    pub artist_name: String,
    pub album_name: String,
    pub genre: String,
    pub album_art_url: String,
    pub platform_records: PlatformRecords,
}

impl From<RawRelease> for EnrichedAlbum {
    fn from(release: RawRelease) -> Self {
        let mut album = Self {
            artist_name: release.artist_name,
            album_name: release.album_name,
            genre: String::new(),
            album_art_url: release.album_art_url,
            platform_records: PlatformRecords::default(),
        };
        album.merge_genres(&release.genre);
        album
    }
}

impl EnrichedAlbum {
    pub fn genre_tags(&self) -> Vec<&str> {
        split_genre_tags(&self.genre).collect()
    }

    /// Appends every tag of `genre` not already present, keeping encounter order.
    pub fn merge_genres(&mut self, genre: &str) {
        let mut tags: Vec<String> = self.genre_tags().into_iter().map(str::to_string).collect();
        for tag in split_genre_tags(genre) {
            if !tags.iter().any(|existing| existing == tag) {
                tags.push(tag.to_string());
            }
        }
        self.genre = tags.join(GENRE_SEPARATOR);
    }

    pub fn tidal_url(&self) -> Option<String> {
        self.platform_records
            .tidal
            .as_ref()
            .filter(|album| !album.id.is_empty())
            .map(|album| format!("{TIDAL_ALBUM_URL_BASE}/{}", album.id))
    }

    pub fn spotify_url(&self) -> Option<String> {
        self.platform_records
            .spotify
            .as_ref()
            .map(|album| album.external_urls.spotify.clone())
            .filter(|url| !url.is_empty())
    }

    pub fn deezer_url(&self) -> Option<String> {
        self.platform_records
            .deezer
            .as_ref()
            .map(|album| album.link.clone())
            .filter(|url| !url.is_empty())
    }

    pub fn album_popularity(&self) -> Option<u32> {
        self.platform_records
            .spotify
            .as_ref()
            .and_then(|album| album.popularity)
    }

    pub fn artist_popularity(&self) -> Option<u32> {
        self.platform_records
            .spotify_artist
            .as_ref()
            .and_then(|artist| artist.popularity)
    }
}

fn split_genre_tags(genre: &str) -> impl Iterator<Item = &str> {
    genre
        .split(GENRE_SEPARATOR)
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
}
