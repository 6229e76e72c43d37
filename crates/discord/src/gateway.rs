use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::events::{EventContext, EventDispatcher, GatewayEnvelope, GatewayEvent, HandlerResult};
use crate::platform::{ChatPlatform, NoopChatPlatform};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("gateway failed to connect: {0}")]
    Connect(String),
    #[error("gateway read failed: {0}")]
    Receive(String),
    #[error("gateway disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        let multiplier = 1_u64 << attempt.min(16);
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Source of decoded gateway events. The websocket login lifecycle lives
/// behind this trait.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;

    fn is_noop(&self) -> bool {
        false
    }
}

#[derive(Default)]
pub struct NoopGatewayTransport;

#[async_trait]
impl GatewayTransport for NoopGatewayTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<GatewayEnvelope>, TransportError> {
        Ok(None)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    fn is_noop(&self) -> bool {
        true
    }
}

pub struct GatewayRunner {
    transport: Arc<dyn GatewayTransport>,
    dispatcher: Arc<EventDispatcher>,
    platform: Arc<dyn ChatPlatform>,
    reconnect_policy: ReconnectPolicy,
}

impl Default for GatewayRunner {
    fn default() -> Self {
        Self {
            transport: Arc::new(NoopGatewayTransport),
            dispatcher: Arc::new(EventDispatcher::new()),
            platform: Arc::new(NoopChatPlatform),
            reconnect_policy: ReconnectPolicy::default(),
        }
    }
}

impl GatewayRunner {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        dispatcher: EventDispatcher,
        platform: Arc<dyn ChatPlatform>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher: Arc::new(dispatcher), platform, reconnect_policy }
    }

    pub fn is_noop_transport(&self) -> bool {
        self.transport.is_noop()
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "gateway transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "gateway retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, handlers = self.dispatcher.handler_count(), "opening gateway connection");
        self.transport.connect().await?;
        info!(attempt, "gateway connected");

        let mut in_flight = JoinSet::new();
        let pumped = self.pump(attempt, &mut in_flight).await;
        if pumped.is_ok() {
            while in_flight.join_next().await.is_some() {}
        } else {
            // Interactions already accepted still get their response after a reconnect.
            in_flight.detach_all();
        }
        pumped
    }

    /// Channel messages are offered to pending listeners inline, in arrival
    /// order. Interactions run on their own tasks so a slow lookup or channel
    /// delete never holds back interview replies queued behind it.
    async fn pump(&self, attempt: u32, in_flight: &mut JoinSet<()>) -> Result<(), TransportError> {
        loop {
            while in_flight.try_join_next().is_some() {}

            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(attempt, "gateway stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            let (user_id, channel_id) = correlation_fields(&envelope);

            info!(
                event_name = "ingress.discord.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                user_id = user_id.unwrap_or("unknown"),
                channel_id = channel_id.unwrap_or("unknown"),
                "received discord envelope"
            );

            if matches!(envelope.event, GatewayEvent::ChannelMessage(_)) {
                handle_envelope(&self.dispatcher, self.platform.as_ref(), envelope).await;
            } else {
                let dispatcher = Arc::clone(&self.dispatcher);
                let platform = Arc::clone(&self.platform);
                in_flight.spawn(async move {
                    handle_envelope(&dispatcher, platform.as_ref(), envelope).await;
                });
            }
        }
    }
}

async fn handle_envelope(
    dispatcher: &EventDispatcher,
    platform: &dyn ChatPlatform,
    envelope: GatewayEnvelope,
) {
    let (user_id, channel_id) = correlation_fields(&envelope);
    let context = EventContext { correlation_id: envelope.envelope_id.clone() };
    let result = match dispatcher.dispatch(&envelope, &context).await {
        Ok(result) => result,
        Err(error) => {
            warn!(
                envelope_id = %envelope.envelope_id,
                correlation_id = %envelope.envelope_id,
                user_id = user_id.unwrap_or("unknown"),
                channel_id = channel_id.unwrap_or("unknown"),
                error = %error,
                "event dispatch failed; continuing gateway loop"
            );
            return;
        }
    };

    let HandlerResult::Responded(message) = result else {
        return;
    };
    let Some(interaction) = envelope.event.interaction() else {
        return;
    };
    match platform.respond(interaction, &message).await {
        Ok(()) => debug!(
            event_name = "egress.discord.interaction_responded",
            correlation_id = %envelope.envelope_id,
            interaction_id = %interaction.id,
            ephemeral = message.is_ephemeral(),
            "interaction response sent"
        ),
        Err(error) => warn!(
            event_name = "egress.discord.interaction_responded",
            correlation_id = %envelope.envelope_id,
            interaction_id = %interaction.id,
            error = %error,
            "failed to respond to interaction"
        ),
    }
}

fn correlation_fields(envelope: &GatewayEnvelope) -> (Option<&str>, Option<&str>) {
    match &envelope.event {
        GatewayEvent::SlashCommand(invocation) => {
            (Some(invocation.user.id.as_str()), Some(invocation.channel_id.as_str()))
        }
        GatewayEvent::ButtonClick(event) => {
            (Some(event.user.id.as_str()), Some(event.channel_id.as_str()))
        }
        GatewayEvent::ChannelMessage(event) => {
            (Some(event.author.id.as_str()), Some(event.channel_id.as_str()))
        }
        GatewayEvent::Unsupported { .. } => (None, None),
    }
}
