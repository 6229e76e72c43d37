use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::profile::{normalize_player_tag, Profile};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("no profile found for `{0}`")]
    NotFound(String),
    #[error("profile lookup transport failed: {0}")]
    Transport(String),
    #[error("profile lookup returned an unreadable payload: {0}")]
    Decode(String),
}

/// External player-profile source. Callers treat every error the same way.
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    async fn fetch(&self, identifier: &str) -> Result<Profile, LookupError>;
}

/// Fixed in-memory profiles keyed by normalized tag.
#[derive(Clone, Debug, Default)]
pub struct StaticProfileLookup {
    profiles: HashMap<String, Profile>,
}

impl StaticProfileLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, tag: &str, profile: Profile) -> Self {
        if let Some(tag) = normalize_player_tag(tag) {
            self.profiles.insert(tag, profile);
        }
        self
    }
}

#[async_trait]
impl ProfileLookup for StaticProfileLookup {
    async fn fetch(&self, identifier: &str) -> Result<Profile, LookupError> {
        let tag = normalize_player_tag(identifier)
            .ok_or_else(|| LookupError::NotFound(identifier.to_owned()))?;
        self.profiles.get(&tag).cloned().ok_or(LookupError::NotFound(tag))
    }
}
