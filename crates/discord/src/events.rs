use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use ticketbooth_core::{ChannelId, GuildId, MessageId, RoleId, UserRef};
use tracing::debug;

use crate::{
    commands::{CommandParseError, SlashCommandInvocation},
    conversation::ReplyHub,
    embeds::MessageTemplate,
    platform::InteractionRef,
    router::ActionRouter,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayEnvelope {
    pub envelope_id: String,
    pub event: GatewayEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayEvent {
    SlashCommand(SlashCommandInvocation),
    ButtonClick(ButtonClickEvent),
    ChannelMessage(ChannelMessageEvent),
    Unsupported { event_type: String },
}

impl GatewayEvent {
    pub fn event_type(&self) -> GatewayEventType {
        match self {
            Self::SlashCommand(_) => GatewayEventType::SlashCommand,
            Self::ButtonClick(_) => GatewayEventType::ButtonClick,
            Self::ChannelMessage(_) => GatewayEventType::ChannelMessage,
            Self::Unsupported { .. } => GatewayEventType::Unsupported,
        }
    }

    /// Interaction to answer when a handler responds.
    pub fn interaction(&self) -> Option<&InteractionRef> {
        match self {
            Self::SlashCommand(invocation) => Some(&invocation.interaction),
            Self::ButtonClick(event) => Some(&event.interaction),
            Self::ChannelMessage(_) | Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GatewayEventType {
    SlashCommand,
    ButtonClick,
    ChannelMessage,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ButtonClickEvent {
    pub interaction: InteractionRef,
    pub custom_id: String,
    pub user: UserRef,
    /// Role ids the clicking member holds in the guild.
    pub member_roles: Vec<RoleId>,
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelMessageEvent {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub author: UserRef,
    pub author_is_bot: bool,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(MessageTemplate),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Parse(#[from] CommandParseError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> GatewayEventType;
    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<GatewayEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Dispatcher wiring every ticket event to `router`, with channel messages
/// feeding pending interview listeners.
pub fn ticket_dispatcher(router: Arc<ActionRouter>, replies: Arc<ReplyHub>) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(Arc::clone(&router)));
    dispatcher.register(ButtonClickHandler::new(router));
    dispatcher.register(ChannelMessageHandler::new(replies));
    dispatcher
}

#[async_trait]
pub trait SlashCommandService: Send + Sync {
    async fn handle_slash_command(
        &self,
        invocation: &SlashCommandInvocation,
        ctx: &EventContext,
    ) -> Result<MessageTemplate, EventHandlerError>;
}

pub struct SlashCommandHandler<S> {
    service: Arc<S>,
}

impl<S> SlashCommandHandler<S>
where
    S: SlashCommandService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for SlashCommandHandler<S>
where
    S: SlashCommandService + 'static,
{
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::SlashCommand(invocation) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let message = self.service.handle_slash_command(invocation, ctx).await?;
        Ok(HandlerResult::Responded(message))
    }
}

#[async_trait]
pub trait ButtonActionService: Send + Sync {
    async fn handle_button_click(
        &self,
        event: &ButtonClickEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError>;
}

pub struct ButtonClickHandler<S> {
    service: Arc<S>,
}

impl<S> ButtonClickHandler<S>
where
    S: ButtonActionService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ButtonClickHandler<S>
where
    S: ButtonActionService + 'static,
{
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::ButtonClick
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::ButtonClick(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let message = self.service.handle_button_click(event, ctx).await?;
        Ok(match message {
            Some(message) => HandlerResult::Responded(message),
            None => HandlerResult::Processed,
        })
    }
}

/// Routes human-authored channel messages to whichever interview is waiting
/// on that author in that channel.
pub struct ChannelMessageHandler {
    replies: Arc<ReplyHub>,
}

impl ChannelMessageHandler {
    pub fn new(replies: Arc<ReplyHub>) -> Self {
        Self { replies }
    }
}

#[async_trait]
impl EventHandler for ChannelMessageHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::ChannelMessage
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::ChannelMessage(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.author_is_bot {
            return Ok(HandlerResult::Ignored);
        }

        if self.replies.offer(&event.channel_id, &event.author.id, &event.content) {
            debug!(
                event_name = "ticket.interview.reply_matched",
                correlation_id = %ctx.correlation_id,
                channel_id = %event.channel_id,
                requester_id = %event.author.id,
                "channel message resolved a pending interview step"
            );
            Ok(HandlerResult::Processed)
        } else {
            Ok(HandlerResult::Ignored)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ticketbooth_core::{ChannelId, MessageId, UserId, UserRef};

    use super::{
        ChannelMessageEvent, ChannelMessageHandler, EventContext, EventDispatcher,
        GatewayEnvelope, GatewayEvent, HandlerResult,
    };
    use crate::conversation::ReplyHub;

    fn message(author_is_bot: bool, content: &str) -> GatewayEnvelope {
        GatewayEnvelope {
            envelope_id: "env-1".to_owned(),
            event: GatewayEvent::ChannelMessage(ChannelMessageEvent {
                message_id: MessageId::new("M1"),
                channel_id: ChannelId::new("C-lobby"),
                author: UserRef::new("U-ash", "ash"),
                author_is_bot,
                content: content.to_owned(),
            }),
        }
    }

    #[tokio::test]
    async fn dispatcher_returns_ignored_when_no_handler_registered() {
        let dispatcher = EventDispatcher::new();
        let result = dispatcher
            .dispatch(&message(false, "hi"), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
        assert_eq!(dispatcher.handler_count(), 0);
    }

    #[tokio::test]
    async fn channel_messages_feed_pending_listeners() {
        let hub = Arc::new(ReplyHub::new());
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(ChannelMessageHandler::new(Arc::clone(&hub)));
        let mut listener = hub.register(&ChannelId::new("C-lobby"), &UserId::new("U-ash"));

        let result = dispatcher
            .dispatch(&message(false, "XYZ"), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Processed);
        assert_eq!(listener.next_reply().await.as_deref(), Some("XYZ"));
    }

    #[tokio::test]
    async fn bot_messages_never_reach_listeners() {
        let hub = Arc::new(ReplyHub::new());
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(ChannelMessageHandler::new(Arc::clone(&hub)));
        let _listener = hub.register(&ChannelId::new("C-lobby"), &UserId::new("U-ash"));

        let result = dispatcher
            .dispatch(&message(true, "XYZ"), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
        assert_eq!(hub.pending(), 1);
    }

    #[test]
    fn only_interactions_carry_a_reply_target() {
        assert!(message(false, "hi").event.interaction().is_none());
        let unsupported = GatewayEvent::Unsupported { event_type: "TYPING_START".to_owned() };
        assert!(unsupported.interaction().is_none());
    }
}
