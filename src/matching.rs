//! Text heuristics deciding whether a catalog hit is the album that was asked for.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TitleMatchTier {
    None,
    Fuzzy,
    NearExact,
    Exact,
}

impl TitleMatchTier {
    pub fn is_match(self) -> bool {
        self != Self::None
    }
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercases, keeps letters and digits, and turns separators into single spaces.
fn normalize_text(value: &str) -> String {
    let mut normalized = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch.is_alphanumeric() {
            normalized.extend(ch.to_lowercase());
        } else if ch.is_whitespace() || ch == '-' || ch == '_' || ch == '/' {
            normalized.push(' ');
        }
    }
    collapse_whitespace(&normalized)
}

fn compact_text(value: &str) -> String {
    value
        .chars()
        .filter(|ch| ch.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn word_overlap_ratio(left: &str, right: &str) -> f32 {
    let left_tokens: HashSet<&str> = left.split_whitespace().collect();
    let right_tokens: HashSet<&str> = right.split_whitespace().collect();
    if left_tokens.is_empty() || right_tokens.is_empty() {
        return 0.0;
    }
    let overlap = left_tokens.intersection(&right_tokens).count() as f32;
    overlap / (left_tokens.len().max(right_tokens.len()) as f32)
}

/// Title without a trailing edition marker such as "(Deluxe)" or "[Remastered]".
fn normalized_title_head(title: &str) -> String {
    let head = title
        .split(['(', '['])
        .next()
        .unwrap_or(title)
        .trim();
    normalize_text(head)
}

pub fn title_match_tier(target: &str, title: &str) -> TitleMatchTier {
    let normalized_target = normalize_text(target);
    let normalized_title = normalize_text(title);
    if normalized_target.is_empty() || normalized_title.is_empty() {
        return TitleMatchTier::None;
    }

    let normalized_title_head = normalized_title_head(title);
    let compact_target = compact_text(&normalized_target);
    let compact_title = compact_text(&normalized_title);
    let compact_title_head = compact_text(&normalized_title_head);

    if normalized_title == normalized_target
        || normalized_title_head == normalized_target
        || (!compact_target.is_empty()
            && (compact_title == compact_target || compact_title_head == compact_target))
    {
        return TitleMatchTier::Exact;
    }

    if normalized_title.starts_with(&normalized_target)
        || normalized_title_head.starts_with(&normalized_target)
        || (!compact_target.is_empty()
            && (compact_title.starts_with(&compact_target)
                || compact_title_head.starts_with(&compact_target)))
    {
        return TitleMatchTier::NearExact;
    }

    if word_overlap_ratio(&normalized_target, &normalized_title) >= 0.6 {
        TitleMatchTier::Fuzzy
    } else {
        TitleMatchTier::None
    }
}
