use std::sync::Arc;

use thiserror::Error;
use ticketbooth_core::config::AppConfig;
use ticketbooth_core::{InterviewSpec, TicketSessionRegistry};
use ticketbooth_discord::conversation::ReplyHub;
use ticketbooth_discord::events::ticket_dispatcher;
use ticketbooth_discord::gateway::{GatewayRunner, NoopGatewayTransport, ReconnectPolicy};
use ticketbooth_discord::router::ActionRouter;
use tracing::info;

use crate::discord::DiscordRestPlatform;
use crate::lookup::HttpProfileLookup;

pub struct Application {
    pub config: AppConfig,
    pub registry: Arc<TicketSessionRegistry>,
    pub replies: Arc<ReplyHub>,
    pub gateway: GatewayRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("discord http client could not be built: {0}")]
    DiscordClient(#[source] reqwest::Error),
    #[error("profile api http client could not be built: {0}")]
    ProfileClient(#[source] reqwest::Error),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let platform = Arc::new(
        DiscordRestPlatform::new(&config.discord).map_err(BootstrapError::DiscordClient)?,
    );
    let lookup = Arc::new(
        HttpProfileLookup::new(&config.profile_api).map_err(BootstrapError::ProfileClient)?,
    );
    if config.profile_api.api_key.is_none() {
        info!(
            event_name = "system.bootstrap.profile_api_anonymous",
            correlation_id = "bootstrap",
            "profile api key not configured; lookups are sent without authorization"
        );
    }

    let registry = Arc::new(TicketSessionRegistry::new(InterviewSpec::clan_application()));
    let replies = Arc::new(ReplyHub::new());
    let router = Arc::new(ActionRouter::new(
        Arc::clone(&registry),
        platform.clone(),
        lookup,
        Arc::clone(&replies),
        config.interview.step_timeout(),
    ));

    let gateway = GatewayRunner::new(
        Arc::new(NoopGatewayTransport),
        ticket_dispatcher(router, Arc::clone(&replies)),
        platform,
        ReconnectPolicy::default(),
    );
    info!(
        event_name = "system.bootstrap.wired",
        correlation_id = "bootstrap",
        step_timeout_secs = config.interview.step_timeout_secs,
        interview_steps = registry.interview().len(),
        "ticket router wired"
    );

    Ok(Application { config, registry, replies, gateway })
}

#[cfg(test)]
mod tests {
    use ticketbooth_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use ticketbooth_core::{RoleId, UserRef};

    use crate::bootstrap::{bootstrap_with_config, Application};

    fn bootstrap() -> Application {
        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                discord_bot_token: Some("test-token".to_string()),
                discord_application_id: Some("123456789012345678".to_string()),
                step_timeout_secs: Some(30),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("config should load");
        bootstrap_with_config(config).expect("bootstrap should succeed")
    }

    #[test]
    fn bootstrap_wires_an_empty_registry_and_noop_gateway() {
        let app = bootstrap();

        assert_eq!(app.config.interview.step_timeout_secs, 30);
        assert_eq!(app.registry.counts().awaiting_answers, 0);
        assert_eq!(app.replies.pending(), 0);
        assert!(app.gateway.is_noop_transport());
    }

    #[test]
    fn registry_uses_the_four_step_application() {
        let app = bootstrap();
        assert_eq!(app.registry.interview().len(), 4);

        let _handle =
            app.registry.begin(UserRef::new("U1", "ash"), RoleId::new("R1")).expect("begin");
        assert_eq!(app.registry.active_count(), 1);
    }
}
