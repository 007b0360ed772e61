use std::collections::HashMap;

use log::debug;

use crate::album::{EnrichedAlbum, RawRelease};

/// Drops entries without an album name and collapses repeated (artist, album) pairs.
///
/// The first occurrence keeps its position. Later copies contribute their genre
/// tags, any platform record the survivor lacks, and album art when the survivor
/// has none. Running it twice yields the same list.
pub fn remove_copies(albums: Vec<EnrichedAlbum>) -> Vec<EnrichedAlbum> {
    let mut survivors: Vec<EnrichedAlbum> = Vec::with_capacity(albums.len());
    let mut index_by_key: HashMap<(String, String), usize> = HashMap::new();

    for album in albums {
        if album.album_name.trim().is_empty() {
            debug!("Dropping release without album name: artist={}", album.artist_name);
            continue;
        }
        let key = (album.artist_name.clone(), album.album_name.clone());
        match index_by_key.get(&key) {
            Some(&index) => merge_copy(&mut survivors[index], album),
            None => {
                index_by_key.insert(key, survivors.len());
                survivors.push(album);
            }
        }
    }
    survivors
}

fn merge_copy(survivor: &mut EnrichedAlbum, copy: EnrichedAlbum) {
    debug!(
        "Merging duplicate: artist={} album={} genre={}",
        copy.artist_name, copy.album_name, copy.genre
    );
    survivor.merge_genres(&copy.genre);
    if survivor.album_art_url.is_empty() {
        survivor.album_art_url = copy.album_art_url;
    }
    survivor.platform_records.adopt_missing(copy.platform_records);
}

pub fn dedup_releases(releases: Vec<RawRelease>) -> Vec<EnrichedAlbum> {
    remove_copies(releases.into_iter().map(EnrichedAlbum::from).collect())
}
