mod album;
mod auth;
mod catalog;
mod config;
mod config_persistence;
mod delivery;
mod error;
mod matching;
mod pipeline;
mod reconcile;
mod release_source;

use std::{cell::RefCell, path::PathBuf, rc::Rc};

use chrono::{Local, NaiveDate};
use clap::Parser;
use log::{debug, error, info, warn};

use auth::{auth_keyring::KeyringAuthStore, ConfigFileAuthStore, SharedAuthStore};
use catalog::deezer::DeezerClient;
use catalog::http::{CatalogHttp, HttpTransport, Sleeper, ThreadSleeper, UreqTransport};
use catalog::spotify::{SpotifyClient, SpotifyCredentials};
use catalog::tidal::{TidalClient, TidalCredentials};
use catalog::{CatalogClient, Platform};
use config::TokenStoreKind;
use delivery::JsonDelivery;
use error::{CatalogError, PipelineError};
use pipeline::{CatalogClients, RunOptions};
use release_source::{latest_friday, JsonReleaseSource};

const CONFIG_FILE_NAME: &str = "newmusicrelease.toml";

/// Collects the week's releases for a set of genres, links them to
/// Spotify, Tidal and Deezer, and writes a popularity-ranked digest.
#[derive(Debug, Parser)]
#[command(name = "newmusicrelease", version)]
struct Args {
    /// Config file; defaults to newmusicrelease.toml in the user config directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Genre to collect, repeatable. Replaces the configured list.
    #[arg(long = "genre")]
    genres: Vec<String>,

    /// Release date (YYYY-MM-DD). Defaults to the most recent Friday.
    #[arg(long)]
    release_date: Option<NaiveDate>,

    /// JSON release list to read.
    #[arg(long)]
    releases: Option<PathBuf>,

    /// Digest output file. Stdout when neither this nor the config sets one.
    #[arg(long)]
    digest: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

fn default_config_path() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .ok_or_else(|| "could not determine the user config directory".to_string())
}

fn open_spotify_authorization(url: &str) {
    info!("Opening Spotify authorization page: {url}");
    if let Err(err) = webbrowser::open(url) {
        warn!("Could not open a browser ({err}); visit {url} manually");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut clog = colog::default_builder();
    clog.filter(
        None,
        if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        },
    );
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let config_file = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    config_persistence::ensure_config_file(&config_file)?;
    let config = config_persistence::load_config_file(&config_file)?;
    debug!("Loaded config from {}", config_file.display());

    let release_date = match args.release_date {
        Some(date) => date,
        None => config
            .pipeline
            .parsed_release_date()?
            .unwrap_or_else(|| latest_friday(Local::now().date_naive())),
    };
    let genres = if args.genres.is_empty() {
        config.pipeline.genres.clone()
    } else {
        args.genres
    };

    let transport: Rc<dyn HttpTransport> =
        Rc::new(UreqTransport::new(config.rate_limit.request_timeout()));
    let sleeper: Rc<dyn Sleeper> = Rc::new(ThreadSleeper);
    let http_for = |platform: Platform| {
        CatalogHttp::new(
            platform,
            transport.clone(),
            sleeper.clone(),
            config.rate_limit.retry_policy(),
        )
        .with_pacing(config.rate_limit.requests_per_second)
    };

    let store: SharedAuthStore = match config.spotify.token_store {
        TokenStoreKind::Config => Rc::new(RefCell::new(ConfigFileAuthStore::new(
            config_file.clone(),
            &config,
        ))),
        TokenStoreKind::Keyring => Rc::new(RefCell::new(KeyringAuthStore)),
    };
    let spotify_credentials = SpotifyCredentials {
        client_id: config.spotify.client_id.clone(),
        client_secret: config.spotify.client_secret.clone(),
        authorization_code: config.spotify.authorization_code.clone(),
        redirect_uri: config.spotify.redirect_uri.clone(),
    };

    let clients = CatalogClients {
        spotify: Box::new(SpotifyClient::new(
            http_for(Platform::Spotify),
            spotify_credentials.clone(),
            store,
        )),
        tidal: config.tidal.enabled.then(|| {
            Box::new(TidalClient::new(
                http_for(Platform::Tidal),
                TidalCredentials {
                    client_id: config.tidal.client_id.clone(),
                    client_secret: config.tidal.client_secret.clone(),
                },
            )) as Box<dyn CatalogClient>
        }),
        deezer: config.deezer.enabled.then(|| {
            Box::new(DeezerClient::new(http_for(Platform::Deezer))) as Box<dyn CatalogClient>
        }),
    };

    let mut reconciler = match pipeline::bootstrap(clients, config.pipeline.strict_matching) {
        Ok(reconciler) => reconciler,
        Err(err) => {
            if let PipelineError::Bootstrap(CatalogError::AuthorizationRequired { url, .. }) = &err {
                if config.spotify.open_browser {
                    open_spotify_authorization(url);
                }
            }
            error!("{err}");
            return Err(err.into());
        }
    };

    let source = JsonReleaseSource::new(
        args.releases
            .unwrap_or_else(|| PathBuf::from(&config.pipeline.releases_file)),
    );
    let digest_path = args.digest.or_else(|| {
        (!config.pipeline.digest_file.is_empty())
            .then(|| PathBuf::from(&config.pipeline.digest_file))
    });
    let delivery = JsonDelivery::new(digest_path);

    let options = RunOptions {
        genres,
        release_date,
        ranking: config.pipeline.ranking,
    };
    let report = pipeline::run(&mut reconciler, &source, &delivery, &options)?;
    debug!("Run report: {report:?}");
    Ok(())
}
