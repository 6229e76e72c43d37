use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use ticketbooth_core::{ChannelId, GuildId, MessageId, RoleId, UserId};

use crate::embeds::MessageTemplate;

/// `VIEW_CHANNEL` permission bit.
pub const VIEW_CHANNEL: u64 = 1 << 10;
pub const ADMINISTRATOR: u64 = 1 << 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("platform request failed: {0}")]
    Request(String),
    #[error("platform rejected request with status {status}: {detail}")]
    Rejected { status: u16, detail: String },
    #[error("platform response could not be decoded: {0}")]
    Decode(String),
}

/// Token pair needed to answer an interaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InteractionRef {
    pub id: String,
    pub token: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum OverwriteTarget {
    Role,
    Member,
}

impl From<OverwriteTarget> for u8 {
    fn from(value: OverwriteTarget) -> Self {
        match value {
            OverwriteTarget::Role => 0,
            OverwriteTarget::Member => 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PermissionOverwrite {
    pub id: String,
    #[serde(rename = "type")]
    pub target: OverwriteTarget,
    #[serde(serialize_with = "bits_as_string")]
    pub allow: u64,
    #[serde(serialize_with = "bits_as_string")]
    pub deny: u64,
}

impl PermissionOverwrite {
    pub fn deny_role(role: &RoleId, bits: u64) -> Self {
        Self { id: role.to_string(), target: OverwriteTarget::Role, allow: 0, deny: bits }
    }

    pub fn allow_role(role: &RoleId, bits: u64) -> Self {
        Self { id: role.to_string(), target: OverwriteTarget::Role, allow: bits, deny: 0 }
    }

    pub fn allow_member(user: &UserId, bits: u64) -> Self {
        Self { id: user.to_string(), target: OverwriteTarget::Member, allow: bits, deny: 0 }
    }

    pub fn allows(&self, bits: u64) -> bool {
        self.allow & bits == bits
    }

    pub fn denies(&self, bits: u64) -> bool {
        self.deny & bits == bits
    }
}

fn bits_as_string<S>(bits: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_str(bits)
}

/// Guild text channel to create.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChannelSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub permission_overwrites: Vec<PermissionOverwrite>,
}

impl ChannelSpec {
    pub fn text(name: impl Into<String>, permission_overwrites: Vec<PermissionOverwrite>) -> Self {
        Self { name: name.into(), kind: 0, permission_overwrites }
    }
}

/// Outbound calls against the chat platform.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn post_message(
        &self,
        channel: &ChannelId,
        message: &MessageTemplate,
    ) -> Result<MessageId, PlatformError>;

    async fn create_channel(
        &self,
        guild: &GuildId,
        spec: &ChannelSpec,
    ) -> Result<ChannelId, PlatformError>;

    async fn delete_channel(&self, channel: &ChannelId) -> Result<(), PlatformError>;

    async fn respond(
        &self,
        interaction: &InteractionRef,
        message: &MessageTemplate,
    ) -> Result<(), PlatformError>;
}

#[derive(Default)]
pub struct NoopChatPlatform;

#[async_trait]
impl ChatPlatform for NoopChatPlatform {
    async fn post_message(
        &self,
        channel: &ChannelId,
        _message: &MessageTemplate,
    ) -> Result<MessageId, PlatformError> {
        Ok(MessageId::new(format!("noop-{channel}")))
    }

    async fn create_channel(
        &self,
        guild: &GuildId,
        spec: &ChannelSpec,
    ) -> Result<ChannelId, PlatformError> {
        Ok(ChannelId::new(format!("noop-{guild}-{}", spec.name)))
    }

    async fn delete_channel(&self, _channel: &ChannelId) -> Result<(), PlatformError> {
        Ok(())
    }

    async fn respond(
        &self,
        _interaction: &InteractionRef,
        _message: &MessageTemplate,
    ) -> Result<(), PlatformError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use ticketbooth_core::{GuildId, RoleId, UserId};

    use super::{ChannelSpec, PermissionOverwrite, VIEW_CHANNEL};

    #[test]
    fn channel_spec_serializes_overwrites_as_rest_payload() {
        let guild = GuildId::new("100");
        let spec = ChannelSpec::text(
            "ash",
            vec![
                PermissionOverwrite::deny_role(&guild.everyone_role(), VIEW_CHANNEL),
                PermissionOverwrite::allow_member(&UserId::new("42"), VIEW_CHANNEL),
            ],
        );

        let value = serde_json::to_value(&spec).expect("serialize");
        assert_eq!(value["type"], json!(0));
        assert_eq!(value["permission_overwrites"][0]["id"], "100");
        assert_eq!(value["permission_overwrites"][0]["type"], json!(0));
        assert_eq!(value["permission_overwrites"][0]["deny"], "1024");
        assert_eq!(value["permission_overwrites"][0]["allow"], "0");
        assert_eq!(value["permission_overwrites"][1]["type"], json!(1));
    }

    #[test]
    fn overwrite_bit_checks() {
        let overwrite = PermissionOverwrite::allow_role(&RoleId::new("7"), VIEW_CHANNEL);
        assert!(overwrite.allows(VIEW_CHANNEL));
        assert!(!overwrite.denies(VIEW_CHANNEL));
    }
}
