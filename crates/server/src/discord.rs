use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use ticketbooth_core::config::DiscordConfig;
use ticketbooth_core::{ChannelId, GuildId, MessageId};
use ticketbooth_discord::embeds::MessageTemplate;
use ticketbooth_discord::platform::{ChannelSpec, ChatPlatform, InteractionRef, PlatformError};
use tracing::debug;

/// Interaction callback type for "respond with a message".
const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct CreatedObject {
    id: String,
}

#[derive(Debug, Serialize)]
struct InteractionCallback<'a> {
    #[serde(rename = "type")]
    kind: u8,
    data: &'a MessageTemplate,
}

/// `ChatPlatform` backed by the Discord REST API.
pub struct DiscordRestPlatform {
    client: Client,
    api_base_url: String,
    bot_token: SecretString,
}

impl DiscordRestPlatform {
    pub fn new(config: &DiscordConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            bot_token: config.bot_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("Authorization", format!("Bot {}", self.bot_token.expose_secret()))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, PlatformError> {
        let response =
            request.send().await.map_err(|error| PlatformError::Request(error.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = response.text().await.unwrap_or_default();
        Err(PlatformError::Rejected { status: status.as_u16(), detail })
    }

    async fn created_id(response: Response) -> Result<String, PlatformError> {
        response
            .json::<CreatedObject>()
            .await
            .map(|created| created.id)
            .map_err(|error| PlatformError::Decode(error.to_string()))
    }
}

#[async_trait]
impl ChatPlatform for DiscordRestPlatform {
    async fn post_message(
        &self,
        channel: &ChannelId,
        message: &MessageTemplate,
    ) -> Result<MessageId, PlatformError> {
        let request = self.client.post(self.url(&format!("/channels/{channel}/messages")));
        let response = self.send(self.authorized(request).json(message)).await?;
        Self::created_id(response).await.map(MessageId::new)
    }

    async fn create_channel(
        &self,
        guild: &GuildId,
        spec: &ChannelSpec,
    ) -> Result<ChannelId, PlatformError> {
        let request = self.client.post(self.url(&format!("/guilds/{guild}/channels")));
        let response = self.send(self.authorized(request).json(spec)).await?;
        let channel = Self::created_id(response).await.map(ChannelId::new)?;
        debug!(guild_id = %guild, channel_id = %channel, "discord channel created");
        Ok(channel)
    }

    async fn delete_channel(&self, channel: &ChannelId) -> Result<(), PlatformError> {
        let request = self.client.delete(self.url(&format!("/channels/{channel}")));
        self.send(self.authorized(request)).await?;
        Ok(())
    }

    async fn respond(
        &self,
        interaction: &InteractionRef,
        message: &MessageTemplate,
    ) -> Result<(), PlatformError> {
        let path = format!("/interactions/{}/{}/callback", interaction.id, interaction.token);
        self.send(self.client.post(self.url(&path)).json(&interaction_callback(message))).await?;
        Ok(())
    }
}

fn interaction_callback(message: &MessageTemplate) -> InteractionCallback<'_> {
    InteractionCallback { kind: CHANNEL_MESSAGE_WITH_SOURCE, data: message }
}
