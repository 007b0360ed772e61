//! Deezer public search client. No credentials are involved.

use log::debug;
use serde::Deserialize;

use crate::album::DeezerAlbum;
use crate::catalog::http::{CatalogHttp, HttpRequest, STATUS_OK};
use crate::catalog::{CatalogClient, Platform, PlatformRecord};
use crate::error::CatalogError;

const SEARCH_URL: &str = "https://api.deezer.com/search/album";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiError {
    #[serde(rename = "type")]
    kind: String,
    message: String,
    code: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AlbumSearchResponse {
    data: Vec<DeezerAlbum>,
    total: u64,
    error: Option<ApiError>,
}

pub struct DeezerClient {
    http: CatalogHttp,
}

impl DeezerClient {
    pub fn new(http: CatalogHttp) -> Self {
        Self { http }
    }

    fn search_query(artist_name: &str, album_name: &str) -> String {
        format!("artist:'{artist_name}' album:'{album_name}'")
    }
}

impl CatalogClient for DeezerClient {
    fn platform(&self) -> Platform {
        Platform::Deezer
    }

    fn authenticate(&mut self) -> Result<(), CatalogError> {
        Ok(())
    }

    fn search_album(
        &mut self,
        artist_name: &str,
        album_name: &str,
    ) -> Result<PlatformRecord, CatalogError> {
        let query = Self::search_query(artist_name, album_name);
        let request = HttpRequest::get(SEARCH_URL)
            .query("q", query.as_str())
            .query("limit", "1");
        let response = self.http.send(&request)?;
        if response.status != STATUS_OK {
            return Err(self.http.unexpected_status(&request, &response));
        }

        let parsed: AlbumSearchResponse = self.http.decode(&response)?;
        // Deezer reports quota and parameter errors in-band with a 200 status.
        if let Some(error) = parsed.error {
            debug!(
                "Deezer: in-band error type={} code={} message={}",
                error.kind, error.code, error.message
            );
            return Err(self.http.unexpected_status(&request, &response));
        }
        if parsed.total == 0 {
            return Err(CatalogError::NoMatch {
                platform: Platform::Deezer,
                query,
            });
        }
        parsed
            .data
            .into_iter()
            .next()
            .map(PlatformRecord::Deezer)
            .ok_or(CatalogError::NoMatch {
                platform: Platform::Deezer,
                query,
            })
    }
}
