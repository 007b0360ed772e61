use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::album::EnrichedAlbum;
use crate::reconcile::dedup::remove_copies;

/// Popularity figure the final list is sorted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingKey {
    #[default]
    ArtistPopularity,
    AlbumPopularity,
}

impl RankingKey {
    /// Missing popularity counts as 0.
    pub fn popularity(self, album: &EnrichedAlbum) -> u32 {
        match self {
            Self::ArtistPopularity => album.artist_popularity(),
            Self::AlbumPopularity => album.album_popularity(),
        }
        .unwrap_or(0)
    }
}

pub fn rank_by_popularity(albums: &mut [EnrichedAlbum], key: RankingKey) {
    albums.sort_by_key(|album| Reverse(key.popularity(album)));
}

/// Second dedup pass followed by the popularity sort.
pub fn finalize(albums: Vec<EnrichedAlbum>, key: RankingKey) -> Vec<EnrichedAlbum> {
    let mut albums = remove_copies(albums);
    rank_by_popularity(&mut albums, key);
    albums
}
