//! Enrichment of deduplicated releases against the configured catalogs.

pub mod dedup;
pub mod ranking;

use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};

use crate::album::{EnrichedAlbum, SpotifyAlbum, SpotifyArtist};
use crate::catalog::spotify::{ALBUM_BATCH_LIMIT, ARTIST_BATCH_LIMIT};
use crate::catalog::{CatalogClient, SpotifyCatalog};
use crate::error::CatalogError;
use crate::matching::title_match_tier;

/// Per-run tallies reported once enrichment is done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentSummary {
    pub albums: usize,
    pub tidal_matches: usize,
    pub spotify_matches: usize,
    pub deezer_matches: usize,
    pub artist_matches: usize,
    pub failed_calls: usize,
}

impl EnrichmentSummary {
    fn count_matches(&mut self, albums: &[EnrichedAlbum]) {
        self.albums = albums.len();
        for album in albums {
            let records = &album.platform_records;
            self.tidal_matches += usize::from(records.tidal.is_some());
            self.spotify_matches += usize::from(records.spotify.is_some());
            self.deezer_matches += usize::from(records.deezer.is_some());
            self.artist_matches += usize::from(records.spotify_artist.is_some());
        }
    }
}

fn album_label(album: &EnrichedAlbum) -> String {
    format!("{} - {}", album.artist_name, album.album_name)
}

fn log_failure(label: &str, operation: &str, error: &CatalogError) {
    if error.is_no_match() {
        info!("Enrichment[{label}]: {operation}: {error}");
    } else {
        warn!("Enrichment[{label}]: {operation} failed: {error}");
    }
}

/// Runs the per-album catalog lookups. Clients left unset are skipped.
pub struct Reconciler {
    spotify: Option<Box<dyn SpotifyCatalog>>,
    tidal: Option<Box<dyn CatalogClient>>,
    deezer: Option<Box<dyn CatalogClient>>,
    strict_matching: bool,
}

impl Reconciler {
    pub fn new(strict_matching: bool) -> Self {
        Self {
            spotify: None,
            tidal: None,
            deezer: None,
            strict_matching,
        }
    }

    pub fn with_spotify(mut self, client: Box<dyn SpotifyCatalog>) -> Self {
        self.spotify = Some(client);
        self
    }

    pub fn with_tidal(mut self, client: Box<dyn CatalogClient>) -> Self {
        self.tidal = Some(client);
        self
    }

    pub fn with_deezer(mut self, client: Box<dyn CatalogClient>) -> Self {
        self.deezer = Some(client);
        self
    }

    /// Looks every album up on each catalog in turn, then refreshes Spotify
    /// records in batches. No failure stops the run or drops an album.
    pub fn enrich(&mut self, albums: &mut [EnrichedAlbum]) -> EnrichmentSummary {
        let mut summary = EnrichmentSummary::default();
        let strict = self.strict_matching;

        for album in albums.iter_mut() {
            if let Some(tidal) = self.tidal.as_deref_mut() {
                summary.failed_calls += usize::from(!search_into(tidal, album, strict));
            }
            if let Some(spotify) = self.spotify.as_deref_mut() {
                summary.failed_calls += usize::from(!search_into(spotify, album, strict));
            }
            if let Some(deezer) = self.deezer.as_deref_mut() {
                summary.failed_calls += usize::from(!search_into(deezer, album, strict));
            }
            if let Some(spotify) = self.spotify.as_deref_mut() {
                summary.failed_calls += usize::from(!lookup_artist(spotify, album));
            }
        }

        if let Some(spotify) = self.spotify.as_deref_mut() {
            summary.failed_calls += refresh_albums(spotify, albums);
            summary.failed_calls += refresh_artists(spotify, albums);
        }

        summary.count_matches(albums);
        summary
    }
}

/// Returns false when the call failed or the hit was rejected.
fn search_into<C>(client: &mut C, album: &mut EnrichedAlbum, strict: bool) -> bool
where
    C: CatalogClient + ?Sized,
{
    let label = album_label(album);
    let platform = client.platform();
    let record = match client.search_album(&album.artist_name, &album.album_name) {
        Ok(record) => record,
        Err(error) => {
            log_failure(&label, &format!("{platform} album search"), &error);
            return false;
        }
    };

    let tier = title_match_tier(&album.album_name, record.title());
    if !tier.is_match() {
        if strict {
            info!(
                "Enrichment[{label}]: rejecting {platform} hit titled '{}'",
                record.title()
            );
            return false;
        }
        warn!(
            "Enrichment[{label}]: {platform} hit titled '{}' does not resemble the request",
            record.title()
        );
    } else {
        debug!("Enrichment[{label}]: {platform} matched ({tier:?})");
    }
    album.platform_records.attach(record);
    true
}

fn lookup_artist(spotify: &mut dyn SpotifyCatalog, album: &mut EnrichedAlbum) -> bool {
    match spotify.search_artist(&album.artist_name) {
        Ok(artist) => {
            debug!(
                "Enrichment[{}]: artist popularity {:?}",
                album_label(album),
                artist.popularity
            );
            album.platform_records.spotify_artist = Some(artist);
            true
        }
        Err(error) => {
            log_failure(&album_label(album), "Spotify artist search", &error);
            false
        }
    }
}

fn unique_ids<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.filter(|id| !id.is_empty() && seen.insert(*id))
        .map(str::to_string)
        .collect()
}

/// Replaces search-result albums with full objects. Returns the failed batch count.
fn refresh_albums(spotify: &mut dyn SpotifyCatalog, albums: &mut [EnrichedAlbum]) -> usize {
    let ids = unique_ids(
        albums
            .iter()
            .filter_map(|album| album.platform_records.spotify.as_ref())
            .map(|record| record.id.as_str()),
    );
    let mut full: HashMap<String, SpotifyAlbum> = HashMap::new();
    let mut failed = 0;
    for batch in ids.chunks(ALBUM_BATCH_LIMIT) {
        match spotify.albums_by_id(batch) {
            Ok(found) => full.extend(found.into_iter().map(|album| (album.id.clone(), album))),
            Err(error) => {
                warn!("Spotify album batch of {} failed: {error}", batch.len());
                failed += 1;
            }
        }
    }
    for album in albums.iter_mut() {
        let records = &mut album.platform_records;
        if let Some(current) = records.spotify.as_mut() {
            if let Some(replacement) = full.get(&current.id) {
                *current = replacement.clone();
            }
        }
    }
    failed
}

fn refresh_artists(spotify: &mut dyn SpotifyCatalog, albums: &mut [EnrichedAlbum]) -> usize {
    let ids = unique_ids(
        albums
            .iter()
            .filter_map(|album| album.platform_records.spotify_artist.as_ref())
            .map(|artist| artist.id.as_str()),
    );
    let mut full: HashMap<String, SpotifyArtist> = HashMap::new();
    let mut failed = 0;
    for batch in ids.chunks(ARTIST_BATCH_LIMIT) {
        match spotify.artists_by_id(batch) {
            Ok(found) => full.extend(found.into_iter().map(|artist| (artist.id.clone(), artist))),
            Err(error) => {
                warn!("Spotify artist batch of {} failed: {error}", batch.len());
                failed += 1;
            }
        }
    }
    for album in albums.iter_mut() {
        if let Some(current) = album.platform_records.spotify_artist.as_mut() {
            if let Some(replacement) = full.get(&current.id) {
                *current = replacement.clone();
            }
        }
    }
    failed
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    use super::{EnrichmentSummary, Reconciler};
    use crate::album::{
        DeezerAlbum, EnrichedAlbum, RawRelease, SpotifyAlbum, SpotifyArtist, TidalAlbum,
    };
    use crate::catalog::{CatalogClient, Platform, PlatformRecord, SpotifyCatalog};
    use crate::error::CatalogError;

    type CallLog = Rc<RefCell<Vec<String>>>;

    struct FakeCatalog {
        platform: Platform,
        calls: CallLog,
        missing: HashSet<String>,
        broken: bool,
        title: Option<String>,
    }

    impl FakeCatalog {
        fn new(platform: Platform, calls: &CallLog) -> Self {
            Self {
                platform,
                calls: calls.clone(),
                missing: HashSet::new(),
                broken: false,
                title: None,
            }
        }
    }

    impl CatalogClient for FakeCatalog {
        fn platform(&self) -> Platform {
            self.platform
        }

        fn authenticate(&mut self) -> Result<(), CatalogError> {
            Ok(())
        }

        fn search_album(
            &mut self,
            _artist_name: &str,
            album_name: &str,
        ) -> Result<PlatformRecord, CatalogError> {
            self.calls
                .borrow_mut()
                .push(format!("{}:album:{album_name}", self.platform.config_key()));
            if self.broken {
                return Err(CatalogError::Platform {
                    platform: self.platform,
                    status: 500,
                    url: "https://fake".to_string(),
                    body: String::new(),
                });
            }
            if self.missing.contains(album_name) {
                return Err(CatalogError::NoMatch {
                    platform: self.platform,
                    query: album_name.to_string(),
                });
            }
            let title = self.title.clone().unwrap_or_else(|| album_name.to_string());
            let id = format!("{}-{album_name}", self.platform.config_key());
            Ok(match self.platform {
                Platform::Spotify => PlatformRecord::Spotify(SpotifyAlbum {
                    id,
                    name: title,
                    ..SpotifyAlbum::default()
                }),
                Platform::Tidal => PlatformRecord::Tidal(TidalAlbum {
                    id,
                    title,
                    ..TidalAlbum::default()
                }),
                Platform::Deezer => PlatformRecord::Deezer(DeezerAlbum {
                    id: 1,
                    title,
                    ..DeezerAlbum::default()
                }),
            })
        }
    }

    struct FakeSpotify {
        inner: FakeCatalog,
        batch_sizes: Rc<RefCell<Vec<(String, usize)>>>,
    }

    impl CatalogClient for FakeSpotify {
        fn platform(&self) -> Platform {
            Platform::Spotify
        }

        fn authenticate(&mut self) -> Result<(), CatalogError> {
            Ok(())
        }

        fn search_album(
            &mut self,
            artist_name: &str,
            album_name: &str,
        ) -> Result<PlatformRecord, CatalogError> {
            self.inner.search_album(artist_name, album_name)
        }
    }

    impl SpotifyCatalog for FakeSpotify {
        fn search_artist(&mut self, artist_name: &str) -> Result<SpotifyArtist, CatalogError> {
            self.inner
                .calls
                .borrow_mut()
                .push(format!("spotify:artist:{artist_name}"));
            Ok(SpotifyArtist {
                id: format!("artist-{artist_name}"),
                name: artist_name.to_string(),
                ..SpotifyArtist::default()
            })
        }

        fn albums_by_id(&mut self, ids: &[String]) -> Result<Vec<SpotifyAlbum>, CatalogError> {
            self.batch_sizes
                .borrow_mut()
                .push(("albums".to_string(), ids.len()));
            Ok(ids
                .iter()
                .map(|id| SpotifyAlbum {
                    id: id.clone(),
                    name: id.trim_start_matches("spotify-").to_string(),
                    popularity: Some(42),
                    ..SpotifyAlbum::default()
                })
                .collect())
        }

        fn artists_by_id(&mut self, ids: &[String]) -> Result<Vec<SpotifyArtist>, CatalogError> {
            self.batch_sizes
                .borrow_mut()
                .push(("artists".to_string(), ids.len()));
            Ok(ids
                .iter()
                .map(|id| SpotifyArtist {
                    id: id.clone(),
                    popularity: Some(70),
                    ..SpotifyArtist::default()
                })
                .collect())
        }
    }

    fn albums(pairs: &[(&str, &str)]) -> Vec<EnrichedAlbum> {
        pairs
            .iter()
            .map(|(artist, album)| {
                EnrichedAlbum::from(RawRelease {
                    artist_name: artist.to_string(),
                    album_name: album.to_string(),
                    genre: "electro".to_string(),
                    album_art_url: String::new(),
                })
            })
            .collect()
    }

    fn full_reconciler(calls: &CallLog, batches: &Rc<RefCell<Vec<(String, usize)>>>) -> Reconciler {
        Reconciler::new(false)
            .with_tidal(Box::new(FakeCatalog::new(Platform::Tidal, calls)))
            .with_spotify(Box::new(FakeSpotify {
                inner: FakeCatalog::new(Platform::Spotify, calls),
                batch_sizes: batches.clone(),
            }))
            .with_deezer(Box::new(FakeCatalog::new(Platform::Deezer, calls)))
    }

    #[test]
    fn test_enrich_calls_platforms_in_order_per_album() {
        let calls: CallLog = Rc::default();
        let batches = Rc::default();
        let mut reconciler = full_reconciler(&calls, &batches);
        let mut list = albums(&[("A", "X"), ("B", "Y")]);

        let summary = reconciler.enrich(&mut list);

        assert_eq!(
            *calls.borrow(),
            vec![
                "tidal:album:X",
                "spotify:album:X",
                "deezer:album:X",
                "spotify:artist:A",
                "tidal:album:Y",
                "spotify:album:Y",
                "deezer:album:Y",
                "spotify:artist:B",
            ]
        );
        assert_eq!(
            summary,
            EnrichmentSummary {
                albums: 2,
                tidal_matches: 2,
                spotify_matches: 2,
                deezer_matches: 2,
                artist_matches: 2,
                failed_calls: 0,
            }
        );
    }

    #[test]
    fn test_failures_are_isolated_per_platform_and_album() {
        let calls: CallLog = Rc::default();
        let mut tidal = FakeCatalog::new(Platform::Tidal, &calls);
        tidal.broken = true;
        let mut deezer = FakeCatalog::new(Platform::Deezer, &calls);
        deezer.missing.insert("X".to_string());
        let mut reconciler = Reconciler::new(false)
            .with_tidal(Box::new(tidal))
            .with_deezer(Box::new(deezer));
        let mut list = albums(&[("A", "X"), ("B", "Y")]);

        let summary = reconciler.enrich(&mut list);

        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|album| album.platform_records.tidal.is_none()));
        assert!(list[0].platform_records.deezer.is_none());
        assert!(list[1].platform_records.deezer.is_some());
        assert_eq!(summary.failed_calls, 3);
        assert_eq!(calls.borrow().len(), 4);
    }

    #[test]
    fn test_strict_matching_rejects_unrelated_title() {
        let calls: CallLog = Rc::default();
        let mut deezer = FakeCatalog::new(Platform::Deezer, &calls);
        deezer.title = Some("Greatest Hits Vol. 2".to_string());
        let mut list = albums(&[("A", "Night Drive")]);

        Reconciler::new(true)
            .with_deezer(Box::new(deezer))
            .enrich(&mut list);
        assert!(list[0].platform_records.deezer.is_none());
    }

    #[test]
    fn test_lenient_matching_keeps_unrelated_title() {
        let calls: CallLog = Rc::default();
        let mut deezer = FakeCatalog::new(Platform::Deezer, &calls);
        deezer.title = Some("Greatest Hits Vol. 2".to_string());
        let mut list = albums(&[("A", "Night Drive")]);

        Reconciler::new(false)
            .with_deezer(Box::new(deezer))
            .enrich(&mut list);
        assert!(list[0].platform_records.deezer.is_some());
    }

    #[test]
    fn test_batch_refresh_respects_caps_and_fills_popularity() {
        let calls: CallLog = Rc::default();
        let batches: Rc<RefCell<Vec<(String, usize)>>> = Rc::default();
        let mut reconciler = Reconciler::new(false).with_spotify(Box::new(FakeSpotify {
            inner: FakeCatalog::new(Platform::Spotify, &calls),
            batch_sizes: batches.clone(),
        }));
        let names: Vec<(String, String)> = (0..55)
            .map(|index| (format!("artist{index}"), format!("album{index}")))
            .collect();
        let pairs: Vec<(&str, &str)> = names
            .iter()
            .map(|(artist, album)| (artist.as_str(), album.as_str()))
            .collect();
        let mut list = albums(&pairs);

        reconciler.enrich(&mut list);

        assert_eq!(
            *batches.borrow(),
            vec![
                ("albums".to_string(), 20),
                ("albums".to_string(), 20),
                ("albums".to_string(), 15),
                ("artists".to_string(), 50),
                ("artists".to_string(), 5),
            ]
        );
        assert!(list.iter().all(|album| album.album_popularity() == Some(42)));
        assert!(list.iter().all(|album| album.artist_popularity() == Some(70)));
    }

    #[test]
    fn test_repeated_ids_are_fetched_once() {
        let calls: CallLog = Rc::default();
        let batches: Rc<RefCell<Vec<(String, usize)>>> = Rc::default();
        let mut reconciler = full_reconciler(&calls, &batches);
        let mut list = albums(&[("A", "X"), ("A", "Y"), ("A", "X")]);

        reconciler.enrich(&mut list);

        assert_eq!(
            *batches.borrow(),
            vec![("albums".to_string(), 2), ("artists".to_string(), 1)]
        );
    }

    #[test]
    fn test_no_clients_leaves_albums_untouched() {
        let mut list = albums(&[("A", "X")]);
        let before = list.clone();
        let summary = Reconciler::new(false).enrich(&mut list);
        assert_eq!(list, before);
        assert_eq!(summary.albums, 1);
        assert_eq!(summary.spotify_matches, 0);
    }
}
