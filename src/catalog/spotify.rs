//! Spotify Web API client (authorization-code grant with refresh).

use base64::{engine::general_purpose, Engine as _};
use log::{debug, info, warn};
use serde::Deserialize;

use crate::album::{SpotifyAlbum, SpotifyArtist};
use crate::auth::{AuthSession, SharedAuthStore};
use crate::catalog::http::{
    CatalogHttp, HttpRequest, HttpResponse, STATUS_OK, STATUS_UNAUTHORIZED,
};
use crate::catalog::{CatalogClient, Platform, PlatformRecord, SpotifyCatalog};
use crate::error::CatalogError;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
const API_BASE_URL: &str = "https://api.spotify.com/v1";

pub const ALBUM_BATCH_LIMIT: usize = 20;
pub const ARTIST_BATCH_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    total: u64,
}

#[derive(Debug, Deserialize)]
struct AlbumSearchResponse {
    albums: Option<Page<SpotifyAlbum>>,
}

#[derive(Debug, Deserialize)]
struct ArtistSearchResponse {
    artists: Option<Page<SpotifyArtist>>,
}

#[derive(Debug, Deserialize)]
struct SeveralAlbumsResponse {
    #[serde(default)]
    albums: Vec<Option<SpotifyAlbum>>,
}

#[derive(Debug, Deserialize)]
struct SeveralArtistsResponse {
    #[serde(default)]
    artists: Vec<Option<SpotifyArtist>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
    /// One-time code from the authorization redirect; only used without stored tokens.
    pub authorization_code: String,
    pub redirect_uri: String,
}

/// Page the user opens once to grant access; the redirect carries `?code=`.
pub fn authorization_url(credentials: &SpotifyCredentials) -> String {
    format!(
        "{AUTHORIZE_URL}?client_id={}&response_type=code&redirect_uri={}",
        urlencoding::encode(&credentials.client_id),
        urlencoding::encode(&credentials.redirect_uri)
    )
}

pub struct SpotifyClient {
    http: CatalogHttp,
    credentials: SpotifyCredentials,
    store: SharedAuthStore,
    session: Option<AuthSession>,
}

impl SpotifyClient {
    pub fn new(http: CatalogHttp, credentials: SpotifyCredentials, store: SharedAuthStore) -> Self {
        Self {
            http,
            credentials,
            store,
            session: None,
        }
    }

    fn basic_credentials(&self) -> String {
        let raw = format!(
            "{}:{}",
            self.credentials.client_id, self.credentials.client_secret
        );
        format!("Basic {}", general_purpose::STANDARD.encode(raw))
    }

    fn access_token(&self) -> Result<String, CatalogError> {
        self.session
            .as_ref()
            .map(|session| session.access_token.clone())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| CatalogError::Auth {
                platform: Platform::Spotify,
                message: "not authenticated".to_string(),
            })
    }

    fn request_token(&self, grant: &[(&str, &str)]) -> Result<AuthSession, CatalogError> {
        let mut request =
            HttpRequest::post(TOKEN_URL).header("Authorization", self.basic_credentials());
        for (key, value) in grant {
            request = request.form_field(key, *value);
        }
        let response = self.http.send_once(&request)?;
        if response.status != STATUS_OK {
            return Err(CatalogError::Auth {
                platform: Platform::Spotify,
                message: format!(
                    "token endpoint answered {}: {}",
                    response.status,
                    response.body_excerpt()
                ),
            });
        }
        let token: TokenResponse = self.http.decode(&response)?;
        Ok(AuthSession {
            access_token: token.access_token,
            refresh_token: token.refresh_token.filter(|value| !value.is_empty()),
            expires_in: token.expires_in,
        })
    }

    fn store_session(&mut self, session: AuthSession) -> Result<(), CatalogError> {
        self.store
            .borrow_mut()
            .put(Platform::Spotify, &session)
            .map_err(|message| CatalogError::Store {
                platform: Platform::Spotify,
                message,
            })?;
        let previous_refresh_token = self
            .session
            .as_ref()
            .and_then(|previous| previous.refresh_token.clone());
        let refresh_token = session.refresh_token.or(previous_refresh_token);
        self.session = Some(AuthSession {
            refresh_token,
            ..session
        });
        Ok(())
    }

    fn exchange_authorization_code(&mut self) -> Result<(), CatalogError> {
        let code = self.credentials.authorization_code.clone();
        let redirect_uri = self.credentials.redirect_uri.clone();
        let session = self.request_token(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
        ])?;
        self.store_session(session)?;
        info!("Spotify refresh_token and access_token have been acquired");
        Ok(())
    }

    /// Sends the request built by `build`; a 401 triggers one refresh and one resend.
    fn send_authorized<F>(&mut self, build: F) -> Result<(HttpRequest, HttpResponse), CatalogError>
    where
        F: Fn(&str) -> HttpRequest,
    {
        let request = build(&self.access_token()?);
        let response = self.http.send(&request)?;
        if response.status != STATUS_UNAUTHORIZED {
            return Ok((request, response));
        }

        info!("Spotify: access token rejected, refreshing before one retry");
        self.refresh()?;
        let retry_request = build(&self.access_token()?);
        let retried = self.http.send(&retry_request)?;
        if retried.status == STATUS_UNAUTHORIZED {
            warn!(
                "Spotify: token still rejected after refresh url={}",
                retry_request.display_url()
            );
            return Err(CatalogError::Unauthorized {
                platform: Platform::Spotify,
            });
        }
        Ok((retry_request, retried))
    }

    fn get_json<T, F>(&mut self, build: F) -> Result<T, CatalogError>
    where
        T: serde::de::DeserializeOwned,
        F: Fn(&str) -> HttpRequest,
    {
        let (request, response) = self.send_authorized(build)?;
        if response.status != STATUS_OK {
            return Err(self.http.unexpected_status(&request, &response));
        }
        debug!("Spotify: {} -> {}", request.display_url(), response.status);
        self.http.decode(&response)
    }

    fn check_batch(ids: &[String], limit: usize, label: &str) -> Result<(), CatalogError> {
        if ids.len() > limit {
            return Err(CatalogError::Config {
                platform: Platform::Spotify,
                message: format!("{label} batch of {} exceeds {limit} ids", ids.len()),
            });
        }
        Ok(())
    }
}

impl CatalogClient for SpotifyClient {
    fn platform(&self) -> Platform {
        Platform::Spotify
    }

    fn authenticate(&mut self) -> Result<(), CatalogError> {
        if self.credentials.client_id.is_empty() || self.credentials.client_secret.is_empty() {
            return Err(CatalogError::Config {
                platform: Platform::Spotify,
                message: "client_id and client_secret are required".to_string(),
            });
        }

        let stored = self
            .store
            .borrow()
            .get(Platform::Spotify)
            .map_err(|message| CatalogError::Store {
                platform: Platform::Spotify,
                message,
            })?;
        // A stored access token may be stale; refreshing is always safe.
        if let Some(stored) = stored.filter(AuthSession::is_refreshable) {
            debug!("Spotify: stored tokens found, refreshing");
            self.session = Some(stored);
            return self.refresh();
        }

        if self.credentials.authorization_code.is_empty() {
            return Err(CatalogError::AuthorizationRequired {
                platform: Platform::Spotify,
                url: authorization_url(&self.credentials),
            });
        }
        self.exchange_authorization_code()
    }

    fn refresh(&mut self) -> Result<(), CatalogError> {
        let refresh_token = self
            .session
            .as_ref()
            .and_then(|session| session.refresh_token.clone())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| CatalogError::Auth {
                platform: Platform::Spotify,
                message: "no refresh token available".to_string(),
            })?;
        let session = self.request_token(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ])?;
        self.store_session(session)?;
        info!("Spotify refresh_token and access_token have been refreshed");
        Ok(())
    }

    fn search_album(
        &mut self,
        artist_name: &str,
        album_name: &str,
    ) -> Result<PlatformRecord, CatalogError> {
        let query = format!("{album_name} artist:{artist_name}");
        let parsed: AlbumSearchResponse = self.get_json(|access_token| {
            HttpRequest::get(&format!("{API_BASE_URL}/search"))
                .query("q", query.as_str())
                .query("type", "album")
                .query("limit", "1")
                .bearer(access_token)
        })?;
        let page = parsed.albums.unwrap_or(Page {
            items: Vec::new(),
            total: 0,
        });
        debug!("Spotify: album search total={} query={}", page.total, query);
        page.items
            .into_iter()
            .next()
            .map(PlatformRecord::Spotify)
            .ok_or(CatalogError::NoMatch {
                platform: Platform::Spotify,
                query,
            })
    }
}

impl SpotifyCatalog for SpotifyClient {
    fn search_artist(&mut self, artist_name: &str) -> Result<SpotifyArtist, CatalogError> {
        let parsed: ArtistSearchResponse = self.get_json(|access_token| {
            HttpRequest::get(&format!("{API_BASE_URL}/search"))
                .query("q", artist_name)
                .query("type", "artist")
                .query("limit", "1")
                .bearer(access_token)
        })?;
        parsed
            .artists
            .and_then(|page| page.items.into_iter().next())
            .ok_or_else(|| CatalogError::NoMatch {
                platform: Platform::Spotify,
                query: artist_name.to_string(),
            })
    }

    fn albums_by_id(&mut self, ids: &[String]) -> Result<Vec<SpotifyAlbum>, CatalogError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Self::check_batch(ids, ALBUM_BATCH_LIMIT, "album")?;
        let joined = ids.join(",");
        let parsed: SeveralAlbumsResponse = self.get_json(|access_token| {
            HttpRequest::get(&format!("{API_BASE_URL}/albums"))
                .query("ids", joined.as_str())
                .bearer(access_token)
        })?;
        Ok(parsed.albums.into_iter().flatten().collect())
    }

    fn artists_by_id(&mut self, ids: &[String]) -> Result<Vec<SpotifyArtist>, CatalogError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Self::check_batch(ids, ARTIST_BATCH_LIMIT, "artist")?;
        let joined = ids.join(",");
        let parsed: SeveralArtistsResponse = self.get_json(|access_token| {
            HttpRequest::get(&format!("{API_BASE_URL}/artists"))
                .query("ids", joined.as_str())
                .bearer(access_token)
        })?;
        Ok(parsed.artists.into_iter().flatten().collect())
    }
}
