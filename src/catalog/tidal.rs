//! Tidal open API client (client-credentials grant).

use base64::{engine::general_purpose, Engine as _};
use log::{debug, info};
use serde::Deserialize;

use crate::album::TidalAlbum;
use crate::auth::AuthSession;
use crate::catalog::http::{
    CatalogHttp, HttpRequest, STATUS_MULTI_STATUS, STATUS_OK, STATUS_UNAUTHORIZED,
};
use crate::catalog::{CatalogClient, Platform, PlatformRecord};
use crate::error::CatalogError;

const TOKEN_URL: &str = "https://auth.tidal.com/v1/oauth2/token";
const SEARCH_URL: &str = "https://openapi.tidal.com/search";
const TIDAL_MEDIA_TYPE: &str = "application/vnd.tidal.v1+json";
const COUNTRY_CODE: &str = "US";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchItem {
    id: String,
    status: u16,
    message: String,
    resource: TidalAlbum,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    albums: Option<Vec<SearchItem>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TidalCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Tidal catalog client. The token is acquired once per run and never refreshed.
pub struct TidalClient {
    http: CatalogHttp,
    credentials: TidalCredentials,
    session: Option<AuthSession>,
}

impl TidalClient {
    pub fn new(http: CatalogHttp, credentials: TidalCredentials) -> Self {
        Self {
            http,
            credentials,
            session: None,
        }
    }

    #[cfg(test)]
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    fn basic_credentials(&self) -> String {
        let raw = format!(
            "{}:{}",
            self.credentials.client_id, self.credentials.client_secret
        );
        format!("Basic {}", general_purpose::STANDARD.encode(raw))
    }

    fn access_token(&self) -> Result<&str, CatalogError> {
        self.session
            .as_ref()
            .map(|session| session.access_token.as_str())
            .ok_or_else(|| CatalogError::Auth {
                platform: Platform::Tidal,
                message: "not authenticated".to_string(),
            })
    }

    fn search_request(&self, query: &str, access_token: &str) -> HttpRequest {
        HttpRequest::get(SEARCH_URL)
            .query("query", query)
            .query("type", "ALBUMS")
            .query("offset", "0")
            .query("limit", "1")
            .query("countryCode", COUNTRY_CODE)
            .query("popularity", "WORLDWIDE")
            .header("accept", TIDAL_MEDIA_TYPE)
            .header("Content-Type", TIDAL_MEDIA_TYPE)
            .bearer(access_token)
    }
}

impl CatalogClient for TidalClient {
    fn platform(&self) -> Platform {
        Platform::Tidal
    }

    fn authenticate(&mut self) -> Result<(), CatalogError> {
        if self.credentials.client_id.is_empty() || self.credentials.client_secret.is_empty() {
            return Err(CatalogError::Config {
                platform: Platform::Tidal,
                message: "client_id and client_secret are required".to_string(),
            });
        }
        let request = HttpRequest::post(TOKEN_URL)
            .header("Authorization", self.basic_credentials())
            .form_field("grant_type", "client_credentials");
        let response = self.http.send_once(&request)?;
        if response.status != STATUS_OK {
            return Err(CatalogError::Auth {
                platform: Platform::Tidal,
                message: format!(
                    "token endpoint answered {}: {}",
                    response.status,
                    response.body_excerpt()
                ),
            });
        }
        let token: TokenResponse = self.http.decode(&response)?;
        info!("Tidal access token acquired (expires in {}s)", token.expires_in);
        self.session = Some(AuthSession {
            access_token: token.access_token,
            refresh_token: None,
            expires_in: token.expires_in,
        });
        Ok(())
    }

    fn search_album(
        &mut self,
        artist_name: &str,
        album_name: &str,
    ) -> Result<PlatformRecord, CatalogError> {
        let query = format!("{album_name} {artist_name}");
        let request = self.search_request(&query, self.access_token()?);
        let response = self.http.send(&request)?;
        match response.status {
            STATUS_MULTI_STATUS => {}
            STATUS_UNAUTHORIZED => {
                return Err(CatalogError::Unauthorized {
                    platform: Platform::Tidal,
                })
            }
            _ => return Err(self.http.unexpected_status(&request, &response)),
        }

        let parsed: SearchResponse = self.http.decode(&response)?;
        let Some(item) = parsed.albums.unwrap_or_default().into_iter().next() else {
            debug!("Tidal: empty result url={}", request.display_url());
            return Err(CatalogError::NoMatch {
                platform: Platform::Tidal,
                query,
            });
        };
        debug!(
            "Tidal: matched id={} status={} message={}",
            item.id, item.status, item.message
        );
        let mut album = item.resource;
        if !item.id.is_empty() {
            album.id = item.id;
        }
        Ok(PlatformRecord::Tidal(album))
    }
}
