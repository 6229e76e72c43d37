use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use ticketbooth_core::config::ProfileApiConfig;
use ticketbooth_core::domain::profile::normalize_player_tag;
use ticketbooth_core::{LookupError, Profile, ProfileLookup};
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerPayload {
    name: String,
    town_hall_level: u32,
    trophies: u32,
}

impl From<PlayerPayload> for Profile {
    fn from(payload: PlayerPayload) -> Self {
        Self { name: payload.name, level: payload.town_hall_level, score: payload.trophies }
    }
}

/// Player lookup against the Clash of Clans compatible players endpoint.
pub struct HttpProfileLookup {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl HttpProfileLookup {
    pub fn new(config: &ProfileApiConfig) -> Result<Self, reqwest::Error> {
        let client =
            Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
        })
    }

    fn player_url(&self, tag: &str) -> String {
        format!("{}/players/%23{tag}", self.base_url)
    }
}

#[async_trait]
impl ProfileLookup for HttpProfileLookup {
    async fn fetch(&self, identifier: &str) -> Result<Profile, LookupError> {
        let tag = normalize_player_tag(identifier)
            .ok_or_else(|| LookupError::NotFound(identifier.to_owned()))?;

        let mut request = self.client.get(self.player_url(&tag));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response =
            request.send().await.map_err(|error| LookupError::Transport(error.to_string()))?;
        match response.status() {
            StatusCode::NOT_FOUND => return Err(LookupError::NotFound(tag)),
            status if !status.is_success() => {
                return Err(LookupError::Transport(format!("profile api returned {status}")));
            }
            _ => {}
        }

        let body =
            response.text().await.map_err(|error| LookupError::Transport(error.to_string()))?;
        let profile = profile_from_payload(&body)?;
        debug!(player_tag = %tag, "profile lookup succeeded");
        Ok(profile)
    }
}

fn profile_from_payload(body: &str) -> Result<Profile, LookupError> {
    serde_json::from_str::<PlayerPayload>(body)
        .map(Profile::from)
        .map_err(|error| LookupError::Decode(error.to_string()))
}

#[cfg(test)]
mod tests {
    use ticketbooth_core::config::ProfileApiConfig;
    use ticketbooth_core::{LookupError, Profile, ProfileLookup};

    use super::{profile_from_payload, HttpProfileLookup};

    fn lookup() -> HttpProfileLookup {
        HttpProfileLookup::new(&ProfileApiConfig {
            base_url: "https://cocproxy.royaleapi.dev/v1/".to_owned(),
            api_key: None,
            timeout_secs: 5,
        })
        .expect("client")
    }

    #[test]
    fn player_urls_escape_the_hash() {
        assert_eq!(
            lookup().player_url("ABC123"),
            "https://cocproxy.royaleapi.dev/v1/players/%23ABC123"
        );
    }

    #[test]
    fn payload_maps_to_profile() {
        let body =
            r##"{"tag":"#ABC123","name":"Ash","townHallLevel":42,"trophies":1000,"expLevel":9}"##;
        assert_eq!(
            profile_from_payload(body).expect("profile"),
            Profile { name: "Ash".to_owned(), level: 42, score: 1000 }
        );
    }

    #[test]
    fn payload_missing_fields_is_a_decode_error() {
        let error = profile_from_payload(r#"{"name":"Ash"}"#).expect_err("missing fields");
        assert!(matches!(error, LookupError::Decode(_)));
    }

    #[tokio::test]
    async fn blank_tags_fail_without_a_request() {
        let error = lookup().fetch("  # ").await.expect_err("blank tag");
        assert_eq!(error, LookupError::NotFound("  # ".to_owned()));
    }

    #[tokio::test]
    async fn tags_that_would_escape_the_players_path_fail_without_a_request() {
        let tag = "ABC/../../CLANS?LIMIT=1";
        let error = lookup().fetch(tag).await.expect_err("unsafe tag");
        assert_eq!(error, LookupError::NotFound(tag.to_owned()));
    }
}
