use serde::{Deserialize, Serialize};

/// Normalized player profile returned by the external lookup API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub level: u32,
    pub score: u32,
}

/// Normalizes a player tag for lookup: trims whitespace, strips a leading `#`
/// and upper-cases the rest. Tags are ASCII alphanumeric; anything else is
/// rejected so the result is always safe as a single URL path segment.
pub fn normalize_player_tag(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let without_hash = trimmed.strip_prefix('#').unwrap_or(trimmed).trim();
    if without_hash.is_empty() || !without_hash.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return None;
    }
    Some(without_hash.to_ascii_uppercase())
}
