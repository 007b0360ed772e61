//! Where the weekly release list comes from.

use std::path::PathBuf;

use chrono::{Datelike, Days, NaiveDate};
use log::{debug, info, warn};
use serde::Deserialize;

use crate::album::RawRelease;

const RELEASE_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y%m%d"];

pub trait ReleaseSource {
    /// Releases listed for `genre` on `release_date`.
    fn fetch_releases(&self, genre: &str, release_date: NaiveDate)
        -> Result<Vec<RawRelease>, String>;
}

/// Releases come out on Fridays; today counts when it is one.
pub fn latest_friday(today: NaiveDate) -> NaiveDate {
    let days_back = (today.weekday().num_days_from_monday() + 3) % 7;
    today - Days::new(u64::from(days_back))
}

fn parse_release_date(value: &str) -> Option<NaiveDate> {
    RELEASE_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value.trim(), format).ok())
}

#[derive(Debug, Deserialize)]
struct ReleaseEntry {
    #[serde(flatten)]
    release: RawRelease,
    #[serde(default)]
    release_date: String,
}

/// Keeps entries of `genre` (case-insensitive) dated `release_date` or undated.
pub fn parse_release_list(
    text: &str,
    genre: &str,
    release_date: NaiveDate,
) -> Result<Vec<RawRelease>, String> {
    let entries: Vec<ReleaseEntry> =
        serde_json::from_str(text).map_err(|err| format!("invalid release list: {err}"))?;
    let wanted_genre = genre.trim().to_lowercase();

    let mut releases = Vec::new();
    for entry in entries {
        if entry.release.genre.trim().to_lowercase() != wanted_genre {
            continue;
        }
        if !entry.release_date.trim().is_empty() {
            match parse_release_date(&entry.release_date) {
                Some(date) if date != release_date => continue,
                Some(_) => {}
                None => warn!(
                    "Release '{}' by {} has unreadable release_date '{}'; keeping it",
                    entry.release.album_name, entry.release.artist_name, entry.release_date
                ),
            }
        }
        let mut release = entry.release;
        release.genre = genre.trim().to_string();
        releases.push(release);
    }
    Ok(releases)
}

/// Reads a JSON array of release records from disk.
pub struct JsonReleaseSource {
    path: PathBuf,
}

impl JsonReleaseSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ReleaseSource for JsonReleaseSource {
    fn fetch_releases(
        &self,
        genre: &str,
        release_date: NaiveDate,
    ) -> Result<Vec<RawRelease>, String> {
        debug!(
            "Reading releases for genre={} date={} from {}",
            genre,
            release_date,
            self.path.display()
        );
        let text = std::fs::read_to_string(&self.path)
            .map_err(|err| format!("failed to read {}: {err}", self.path.display()))?;
        let releases = parse_release_list(&text, genre, release_date)?;
        info!("Found {} releases for genre '{}'", releases.len(), genre);
        Ok(releases)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{latest_friday, parse_release_list};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn test_latest_friday_is_today_on_fridays() {
        assert_eq!(latest_friday(date(2024, 5, 10)), date(2024, 5, 10));
    }

    #[test]
    fn test_latest_friday_walks_back_through_the_week() {
        assert_eq!(latest_friday(date(2024, 5, 11)), date(2024, 5, 10));
        assert_eq!(latest_friday(date(2024, 5, 13)), date(2024, 5, 10));
        assert_eq!(latest_friday(date(2024, 5, 16)), date(2024, 5, 10));
        assert_eq!(latest_friday(date(2024, 5, 1)), date(2024, 4, 26));
    }

    const LIST: &str = r#"[
        {"artist_name":"A","album_name":"X","genre":"Electro","album_art_url":"https://img/a"},
        {"artist_name":"B","album_name":"Y","genre":"rock"},
        {"artist_name":"C","album_name":"Z","genre":"electro","release_date":"2024-05-03"},
        {"artist_name":"D","album_name":"W","genre":"electro","release_date":"20240510"}
    ]"#;

    #[test]
    fn test_parse_release_list_filters_genre_case_insensitively() {
        let releases = parse_release_list(LIST, "electro", date(2024, 5, 10)).expect("parse");
        let names: Vec<&str> = releases
            .iter()
            .map(|release| release.artist_name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "D"]);
        assert!(releases.iter().all(|release| release.genre == "electro"));
        assert_eq!(releases[0].album_art_url, "https://img/a");
    }

    #[test]
    fn test_parse_release_list_keeps_empty_album_names_for_dedup() {
        let releases = parse_release_list(
            r#"[{"artist_name":"A","genre":"electro"}]"#,
            "electro",
            date(2024, 5, 10),
        )
        .expect("parse");
        assert_eq!(releases.len(), 1);
        assert!(releases[0].album_name.is_empty());
    }

    #[test]
    fn test_parse_release_list_rejects_non_array() {
        assert!(parse_release_list("{}", "electro", date(2024, 5, 10)).is_err());
    }
}
