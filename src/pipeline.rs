//! Run driver: source, dedup, enrichment, ranking, delivery.

use chrono::NaiveDate;
use log::{error, info, warn};

use crate::album::RawRelease;
use crate::catalog::{CatalogClient, SpotifyCatalog};
use crate::delivery::{Delivery, Digest};
use crate::error::PipelineError;
use crate::reconcile::dedup::dedup_releases;
use crate::reconcile::ranking::{finalize, RankingKey};
use crate::reconcile::{EnrichmentSummary, Reconciler};
use crate::release_source::ReleaseSource;

/// Unauthenticated clients for one run. Spotify is required.
pub struct CatalogClients {
    pub spotify: Box<dyn SpotifyCatalog>,
    pub tidal: Option<Box<dyn CatalogClient>>,
    pub deezer: Option<Box<dyn CatalogClient>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub genres: Vec<String>,
    pub release_date: NaiveDate,
    pub ranking: RankingKey,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub releases_fetched: usize,
    pub albums_delivered: usize,
    pub enrichment: EnrichmentSummary,
}

fn authenticate_optional(
    client: Option<Box<dyn CatalogClient>>,
) -> Option<Box<dyn CatalogClient>> {
    let mut client = client?;
    match client.authenticate() {
        Ok(()) => Some(client),
        Err(err) => {
            error!(
                "{} authorization failed, continuing without it: {err}",
                client.platform()
            );
            None
        }
    }
}

/// Authenticates every client. Optional platforms that fail are dropped for
/// the run; a Spotify failure stops it.
pub fn bootstrap(
    clients: CatalogClients,
    strict_matching: bool,
) -> Result<Reconciler, PipelineError> {
    let CatalogClients {
        mut spotify,
        tidal,
        deezer,
    } = clients;

    let tidal = authenticate_optional(tidal);
    spotify.authenticate().map_err(PipelineError::Bootstrap)?;
    let deezer = authenticate_optional(deezer);

    let mut reconciler = Reconciler::new(strict_matching).with_spotify(spotify);
    if let Some(tidal) = tidal {
        reconciler = reconciler.with_tidal(tidal);
    }
    if let Some(deezer) = deezer {
        reconciler = reconciler.with_deezer(deezer);
    }
    Ok(reconciler)
}

fn collect_releases<S>(source: &S, options: &RunOptions) -> Result<Vec<RawRelease>, PipelineError>
where
    S: ReleaseSource + ?Sized,
{
    let mut releases = Vec::new();
    let mut last_error = None;
    let mut succeeded = 0;
    for genre in &options.genres {
        match source.fetch_releases(genre, options.release_date) {
            Ok(found) => {
                succeeded += 1;
                releases.extend(found);
            }
            Err(err) => {
                warn!("Skipping genre '{genre}': {err}");
                last_error = Some(err);
            }
        }
    }
    match last_error {
        Some(err) if succeeded == 0 => Err(PipelineError::Source(err)),
        _ => Ok(releases),
    }
}

pub fn run<S, D>(
    reconciler: &mut Reconciler,
    source: &S,
    delivery: &D,
    options: &RunOptions,
) -> Result<RunReport, PipelineError>
where
    S: ReleaseSource + ?Sized,
    D: Delivery + ?Sized,
{
    info!(
        "Collecting releases of {} for {} genre(s)",
        options.release_date,
        options.genres.len()
    );
    let releases = collect_releases(source, options)?;
    let releases_fetched = releases.len();

    let mut albums = dedup_releases(releases);
    info!(
        "{} releases fetched, {} unique albums to enrich",
        releases_fetched,
        albums.len()
    );

    let enrichment = reconciler.enrich(&mut albums);
    let albums = finalize(albums, options.ranking);

    let digest = Digest::new(options.release_date, &options.genres, &albums);
    delivery.deliver(&digest).map_err(PipelineError::Delivery)?;

    info!(
        "Run complete: {} albums, Tidal {} / Spotify {} / Deezer {} matched, {} artist popularities, {} failed calls",
        albums.len(),
        enrichment.tidal_matches,
        enrichment.spotify_matches,
        enrichment.deezer_matches,
        enrichment.artist_matches,
        enrichment.failed_calls
    );
    Ok(RunReport {
        releases_fetched,
        albums_delivered: albums.len(),
        enrichment,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use chrono::NaiveDate;

    use super::{bootstrap, run, CatalogClients, RunOptions};
    use crate::album::{RawRelease, SpotifyAlbum, SpotifyArtist, TidalAlbum};
    use crate::catalog::{CatalogClient, Platform, PlatformRecord, SpotifyCatalog};
    use crate::delivery::{Delivery, Digest};
    use crate::error::{CatalogError, PipelineError};
    use crate::reconcile::ranking::RankingKey;
    use crate::release_source::ReleaseSource;

    struct StubTidal {
        auth_fails: bool,
    }

    impl CatalogClient for StubTidal {
        fn platform(&self) -> Platform {
            Platform::Tidal
        }

        fn authenticate(&mut self) -> Result<(), CatalogError> {
            if self.auth_fails {
                return Err(CatalogError::Auth {
                    platform: Platform::Tidal,
                    message: "bad credentials".to_string(),
                });
            }
            Ok(())
        }

        fn search_album(&mut self, _: &str, album: &str) -> Result<PlatformRecord, CatalogError> {
            Ok(PlatformRecord::Tidal(TidalAlbum {
                id: format!("t-{album}"),
                title: album.to_string(),
                ..TidalAlbum::default()
            }))
        }
    }

    struct StubSpotify {
        auth_fails: bool,
        popularity: HashMap<String, u32>,
    }

    impl StubSpotify {
        fn new(popularity: &[(&str, u32)]) -> Self {
            Self {
                auth_fails: false,
                popularity: popularity
                    .iter()
                    .map(|(artist, value)| (artist.to_string(), *value))
                    .collect(),
            }
        }
    }

    impl CatalogClient for StubSpotify {
        fn platform(&self) -> Platform {
            Platform::Spotify
        }

        fn authenticate(&mut self) -> Result<(), CatalogError> {
            if self.auth_fails {
                return Err(CatalogError::Config {
                    platform: Platform::Spotify,
                    message: "no authorization_code".to_string(),
                });
            }
            Ok(())
        }

        fn search_album(&mut self, _: &str, album: &str) -> Result<PlatformRecord, CatalogError> {
            Err(CatalogError::NoMatch {
                platform: Platform::Spotify,
                query: album.to_string(),
            })
        }
    }

    impl SpotifyCatalog for StubSpotify {
        fn search_artist(&mut self, artist_name: &str) -> Result<SpotifyArtist, CatalogError> {
            Ok(SpotifyArtist {
                id: format!("id-{artist_name}"),
                name: artist_name.to_string(),
                popularity: self.popularity.get(artist_name).copied(),
                ..SpotifyArtist::default()
            })
        }

        fn albums_by_id(&mut self, _: &[String]) -> Result<Vec<SpotifyAlbum>, CatalogError> {
            Ok(Vec::new())
        }

        fn artists_by_id(&mut self, _: &[String]) -> Result<Vec<SpotifyArtist>, CatalogError> {
            Ok(Vec::new())
        }
    }

    struct StaticSource {
        releases: Vec<RawRelease>,
        failing_genre: Option<String>,
    }

    impl ReleaseSource for StaticSource {
        fn fetch_releases(
            &self,
            genre: &str,
            _: NaiveDate,
        ) -> Result<Vec<RawRelease>, String> {
            if self.failing_genre.as_deref() == Some(genre) {
                return Err(format!("{genre} unavailable"));
            }
            Ok(self
                .releases
                .iter()
                .filter(|release| release.genre == genre)
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct CapturingDelivery {
        delivered: RefCell<Option<Digest>>,
    }

    impl Delivery for CapturingDelivery {
        fn deliver(&self, digest: &Digest) -> Result<(), String> {
            *self.delivered.borrow_mut() = Some(digest.clone());
            Ok(())
        }
    }

    fn release(artist: &str, album: &str, genre: &str) -> RawRelease {
        RawRelease {
            artist_name: artist.to_string(),
            album_name: album.to_string(),
            genre: genre.to_string(),
            album_art_url: String::new(),
        }
    }

    fn options(genres: &[&str]) -> RunOptions {
        RunOptions {
            genres: genres.iter().map(|genre| genre.to_string()).collect(),
            release_date: NaiveDate::from_ymd_opt(2024, 5, 10).expect("valid date"),
            ranking: RankingKey::ArtistPopularity,
        }
    }

    #[test]
    fn test_run_dedups_enriches_ranks_and_delivers() {
        let clients = CatalogClients {
            spotify: Box::new(StubSpotify::new(&[("A", 10), ("B", 90), ("C", 50)])),
            tidal: Some(Box::new(StubTidal { auth_fails: false })),
            deezer: None,
        };
        let mut reconciler = bootstrap(clients, false).expect("bootstrap");
        let source = StaticSource {
            releases: vec![
                release("A", "X", "rock"),
                release("A", "X", "pop"),
                release("B", "Y", "rock"),
                release("C", "Z", "pop"),
                release("D", "", "rock"),
            ],
            failing_genre: None,
        };
        let delivery = CapturingDelivery::default();

        let report = run(&mut reconciler, &source, &delivery, &options(&["rock", "pop"]))
            .expect("run");

        assert_eq!(report.releases_fetched, 5);
        assert_eq!(report.albums_delivered, 3);
        assert_eq!(report.enrichment.tidal_matches, 3);
        let digest = delivery.delivered.borrow().clone().expect("delivered");
        let order: Vec<&str> = digest
            .albums
            .iter()
            .map(|entry| entry.artist_name.as_str())
            .collect();
        assert_eq!(order, vec!["B", "C", "A"]);
        assert_eq!(digest.albums[2].genre, "rock,pop");
        assert!(digest.albums.iter().all(|entry| entry.tidal_url.is_some()));
    }

    #[test]
    fn test_tidal_auth_failure_disables_tidal_only() {
        let clients = CatalogClients {
            spotify: Box::new(StubSpotify::new(&[])),
            tidal: Some(Box::new(StubTidal { auth_fails: true })),
            deezer: None,
        };
        let mut reconciler = bootstrap(clients, false).expect("run continues");
        let source = StaticSource {
            releases: vec![release("A", "X", "rock")],
            failing_genre: None,
        };
        let delivery = CapturingDelivery::default();

        let report = run(&mut reconciler, &source, &delivery, &options(&["rock"])).expect("run");

        assert_eq!(report.albums_delivered, 1);
        assert_eq!(report.enrichment.tidal_matches, 0);
    }

    #[test]
    fn test_spotify_auth_failure_is_fatal() {
        let mut spotify = StubSpotify::new(&[]);
        spotify.auth_fails = true;
        let clients = CatalogClients {
            spotify: Box::new(spotify),
            tidal: None,
            deezer: None,
        };
        match bootstrap(clients, false) {
            Err(PipelineError::Bootstrap(CatalogError::Config { platform, .. })) => {
                assert_eq!(platform, Platform::Spotify);
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("bootstrap should fail"),
        }
    }

    #[test]
    fn test_one_failing_genre_does_not_stop_the_run() {
        let clients = CatalogClients {
            spotify: Box::new(StubSpotify::new(&[])),
            tidal: None,
            deezer: None,
        };
        let mut reconciler = bootstrap(clients, false).expect("bootstrap");
        let source = StaticSource {
            releases: vec![release("A", "X", "rock")],
            failing_genre: Some("pop".to_string()),
        };
        let delivery = CapturingDelivery::default();

        let report =
            run(&mut reconciler, &source, &delivery, &options(&["pop", "rock"])).expect("run");
        assert_eq!(report.albums_delivered, 1);
    }

    #[test]
    fn test_all_genres_failing_is_a_source_error() {
        let clients = CatalogClients {
            spotify: Box::new(StubSpotify::new(&[])),
            tidal: None,
            deezer: None,
        };
        let mut reconciler = bootstrap(clients, false).expect("bootstrap");
        let source = StaticSource {
            releases: Vec::new(),
            failing_genre: Some("pop".to_string()),
        };
        let delivery = CapturingDelivery::default();

        let result = run(&mut reconciler, &source, &delivery, &options(&["pop"]));
        assert!(matches!(result, Err(PipelineError::Source(_))));
        assert!(delivery.delivered.borrow().is_none());
    }
}
