//! Output of the ranked album list.

use std::io::Write;
use std::path::PathBuf;

use chrono::NaiveDate;
use log::info;
use serde::Serialize;

use crate::album::EnrichedAlbum;

/// One ranked album with its listening links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestEntry {
    pub artist_name: String,
    pub album_name: String,
    pub genre: String,
    pub album_art_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tidal_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spotify_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deezer_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_popularity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_popularity: Option<u32>,
}

impl From<&EnrichedAlbum> for DigestEntry {
    fn from(album: &EnrichedAlbum) -> Self {
        Self {
            artist_name: album.artist_name.clone(),
            album_name: album.album_name.clone(),
            genre: album.genre.clone(),
            album_art_url: album.album_art_url.clone(),
            tidal_url: album.tidal_url(),
            spotify_url: album.spotify_url(),
            deezer_url: album.deezer_url(),
            artist_popularity: album.artist_popularity(),
            album_popularity: album.album_popularity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Digest {
    pub release_date: String,
    pub genres: Vec<String>,
    pub albums: Vec<DigestEntry>,
}

impl Digest {
    pub fn new(release_date: NaiveDate, genres: &[String], albums: &[EnrichedAlbum]) -> Self {
        Self {
            release_date: release_date.format("%Y-%m-%d").to_string(),
            genres: genres.to_vec(),
            albums: albums.iter().map(DigestEntry::from).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|err| format!("failed to serialize digest: {err}"))
    }
}

pub trait Delivery {
    fn deliver(&self, digest: &Digest) -> Result<(), String>;
}

/// Writes the digest as pretty JSON to a file, or to stdout without one.
pub struct JsonDelivery {
    path: Option<PathBuf>,
}

impl JsonDelivery {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl Delivery for JsonDelivery {
    fn deliver(&self, digest: &Digest) -> Result<(), String> {
        let json = digest.to_json()?;
        match &self.path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|err| {
                        format!("failed to create digest directory {}: {err}", parent.display())
                    })?;
                }
                std::fs::write(path, json)
                    .map_err(|err| format!("failed to write digest {}: {err}", path.display()))?;
                info!(
                    "Digest with {} albums written to {}",
                    digest.albums.len(),
                    path.display()
                );
            }
            None => {
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{json}")
                    .map_err(|err| format!("failed to write digest to stdout: {err}"))?;
            }
        }
        Ok(())
    }
}
