use std::sync::Arc;

use thiserror::Error;
use ticketbooth_core::{AnswerSheet, ChannelId, GuildId, RoleId, UserRef};
use tracing::{error, info};

use crate::embeds::{application_record_message, staff_notice_message};
use crate::platform::{ChannelSpec, ChatPlatform, PermissionOverwrite, PlatformError, VIEW_CHANNEL};

const CHANNEL_NAME_MAX_CHARS: usize = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProvisioningError {
    #[error("ticket channel could not be created: {0}")]
    CreateChannel(#[source] PlatformError),
    #[error("ticket channel {channel} was created but seeding it failed: {source}")]
    SeedChannel { channel: ChannelId, source: PlatformError },
}

/// Creates private ticket channels visible only to the requester and staff.
#[derive(Clone)]
pub struct AccessChannelProvisioner {
    platform: Arc<dyn ChatPlatform>,
}

impl AccessChannelProvisioner {
    pub fn new(platform: Arc<dyn ChatPlatform>) -> Self {
        Self { platform }
    }

    pub async fn create_ticket_channel(
        &self,
        guild: &GuildId,
        requester: &UserRef,
        staff_role: &RoleId,
        title: &str,
        record: &AnswerSheet,
    ) -> Result<ChannelId, ProvisioningError> {
        let spec = ticket_channel_spec(guild, requester, staff_role);
        let channel = self
            .platform
            .create_channel(guild, &spec)
            .await
            .map_err(ProvisioningError::CreateChannel)?;

        if let Err(source) = self.seed(&channel, requester, staff_role, title, record).await {
            error!(
                event_name = "ticket.provision.orphaned_channel",
                guild_id = %guild,
                channel_id = %channel,
                requester_id = %requester.id,
                error = %source,
                "ticket channel created but initial messages failed; channel left in place"
            );
            return Err(ProvisioningError::SeedChannel { channel, source });
        }

        info!(
            event_name = "ticket.provision.channel_created",
            guild_id = %guild,
            channel_id = %channel,
            requester_id = %requester.id,
            channel_name = %spec.name,
            "ticket channel provisioned"
        );
        Ok(channel)
    }

    async fn seed(
        &self,
        channel: &ChannelId,
        requester: &UserRef,
        staff_role: &RoleId,
        title: &str,
        record: &AnswerSheet,
    ) -> Result<(), PlatformError> {
        self.platform.post_message(channel, &staff_notice_message(staff_role, requester)).await?;
        self.platform.post_message(channel, &application_record_message(title, record)).await?;
        Ok(())
    }
}

pub fn ticket_channel_spec(
    guild: &GuildId,
    requester: &UserRef,
    staff_role: &RoleId,
) -> ChannelSpec {
    ChannelSpec::text(
        channel_name(requester),
        vec![
            PermissionOverwrite::deny_role(&guild.everyone_role(), VIEW_CHANNEL),
            PermissionOverwrite::allow_role(staff_role, VIEW_CHANNEL),
            PermissionOverwrite::allow_member(&requester.id, VIEW_CHANNEL),
        ],
    )
}

/// Lowercase, dash-separated name derived from the requester's display name.
pub fn channel_name(requester: &UserRef) -> String {
    let name = requester
        .name
        .trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(|ch| if ch.is_whitespace() { '-' } else { ch })
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '-' || *ch == '_')
        .take(CHANNEL_NAME_MAX_CHARS)
        .collect::<String>();

    if name.trim_matches(|ch| ch == '-' || ch == '_').is_empty() {
        format!("ticket-{}", requester.id)
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use ticketbooth_core::{GuildId, RoleId, UserRef};

    use super::{channel_name, ticket_channel_spec};
    use crate::platform::{OverwriteTarget, VIEW_CHANNEL};

    #[test]
    fn channel_names_are_slugged() {
        assert_eq!(channel_name(&UserRef::new("1", "Ash Ketchum")), "ash-ketchum");
        assert_eq!(channel_name(&UserRef::new("1", "Misty_99!")), "misty_99");
        assert_eq!(channel_name(&UserRef::new("42", "☆☆☆")), "ticket-42");
        assert_eq!(channel_name(&UserRef::new("7", &"a".repeat(150))).len(), 100);
    }

    #[test]
    fn overwrites_hide_channel_from_everyone_but_requester_and_staff() {
        let spec = ticket_channel_spec(
            &GuildId::new("100"),
            &UserRef::new("42", "ash"),
            &RoleId::new("900"),
        );
        let overwrites = &spec.permission_overwrites;

        assert_eq!(overwrites.len(), 3);
        assert_eq!(overwrites[0].id, "100");
        assert!(overwrites[0].denies(VIEW_CHANNEL));
        assert_eq!(overwrites[1].id, "900");
        assert_eq!(overwrites[1].target, OverwriteTarget::Role);
        assert!(overwrites[1].allows(VIEW_CHANNEL));
        assert_eq!(overwrites[2].id, "42");
        assert_eq!(overwrites[2].target, OverwriteTarget::Member);
        assert!(overwrites[2].allows(VIEW_CHANNEL));
    }
}
