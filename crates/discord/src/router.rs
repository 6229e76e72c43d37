use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ticketbooth_core::{
    ChannelId, GuildId, LifecycleAction, LifecycleEvent, ProfileLookup, RegistryError, RoleId,
    SessionHandle, SessionState, TicketError, TicketSessionRegistry, UserRef,
};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::commands::{
    ensure_ticket_setup, parse_button_action, parse_ticket_setup, ApplyAction, ButtonAction,
    SlashCommandInvocation,
};
use crate::conversation::ReplyHub;
use crate::embeds::{
    application_started_message, notice, panel_message, player_profile_message,
    ticket_opened_message, MessageBuilder, MessageTemplate,
};
use crate::events::{
    ButtonActionService, ButtonClickEvent, EventContext, EventHandlerError, SlashCommandService,
};
use crate::interview::{InterviewError, PromptSequencer};
use crate::platform::ChatPlatform;
use crate::provisioner::AccessChannelProvisioner;

pub const UNSUPPORTED_BUTTON_REPLY: &str = "This button is no longer supported.";
pub const UNTRACKED_TICKET_REPLY: &str =
    "This ticket is no longer tracked by the bot. Staff can delete the channel manually.";
pub const CLOSE_DENIED_REPLY: &str = "You do not have permission to close this ticket.";
pub const VIEW_DENIED_REPLY: &str = "You do not have permission to view this applicant.";
pub const TICKET_CLOSED_REPLY: &str = "The ticket has been closed.";

const DEFAULT_RECORD_TITLE: &str = "Application Details";

/// How a spawned application interview ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApplicationOutcome {
    Opened { channel: ChannelId },
    TimedOut { step: usize },
    Failed(TicketError),
}

/// Immediate interaction reply, plus the interview task when one was started.
pub struct RoutedReply {
    pub message: MessageTemplate,
    pub interview: Option<JoinHandle<ApplicationOutcome>>,
}

impl RoutedReply {
    fn message(message: MessageTemplate) -> Self {
        Self { message, interview: None }
    }
}

struct ApplicationJob {
    handle: SessionHandle,
    guild: GuildId,
    conversation: ChannelId,
    requester: UserRef,
    staff_role: RoleId,
    title: String,
    correlation_id: String,
}

/// Entry point for every ticket interaction. Errors never escape; each one is
/// turned into a reply for the user who triggered it.
#[derive(Clone)]
pub struct ActionRouter {
    registry: Arc<TicketSessionRegistry>,
    platform: Arc<dyn ChatPlatform>,
    lookup: Arc<dyn ProfileLookup>,
    sequencer: PromptSequencer,
    provisioner: AccessChannelProvisioner,
    step_timeout: Duration,
}

impl ActionRouter {
    pub fn new(
        registry: Arc<TicketSessionRegistry>,
        platform: Arc<dyn ChatPlatform>,
        lookup: Arc<dyn ProfileLookup>,
        replies: Arc<ReplyHub>,
        step_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            sequencer: PromptSequencer::new(Arc::clone(&platform), replies),
            provisioner: AccessChannelProvisioner::new(Arc::clone(&platform)),
            platform,
            lookup,
            step_timeout,
        }
    }

    pub fn registry(&self) -> &TicketSessionRegistry {
        &self.registry
    }

    /// `/ticketsetup`: publishes the application panel. No session is created.
    pub fn setup(
        &self,
        invocation: &SlashCommandInvocation,
        ctx: &EventContext,
    ) -> MessageTemplate {
        match parse_ticket_setup(invocation) {
            Ok(panel) => {
                info!(
                    event_name = "ticket.setup.panel_published",
                    correlation_id = %ctx.correlation_id,
                    channel_id = %invocation.channel_id,
                    staff_role = %panel.staff_role,
                    "ticket panel published"
                );
                panel_message(&panel)
            }
            Err(error) => {
                let error = TicketError::from(error);
                info!(
                    event_name = "ticket.setup.rejected",
                    correlation_id = %ctx.correlation_id,
                    error_class = error.class(),
                    error = %error,
                    "ticket setup rejected"
                );
                notice(error.user_message())
            }
        }
    }

    pub async fn route_button(
        &self,
        click: &ButtonClickEvent,
        ctx: &EventContext,
    ) -> RoutedReply {
        match parse_button_action(&click.custom_id) {
            ButtonAction::Apply(action) => self.apply(click, action, ctx),
            ButtonAction::ViewAccount => RoutedReply::message(self.view_account(click, ctx).await),
            ButtonAction::CloseTicket => RoutedReply::message(self.close_ticket(click, ctx).await),
            ButtonAction::Unknown(custom_id) => {
                warn!(
                    event_name = "ticket.router.unknown_action",
                    correlation_id = %ctx.correlation_id,
                    custom_id = %custom_id,
                    "unsupported button clicked"
                );
                RoutedReply::message(notice(UNSUPPORTED_BUTTON_REPLY))
            }
        }
    }

    /// Claims the requester's interview slot synchronously, then runs the
    /// interview on its own task so replies can keep flowing through the
    /// dispatcher while it waits.
    fn apply(
        &self,
        click: &ButtonClickEvent,
        action: ApplyAction,
        ctx: &EventContext,
    ) -> RoutedReply {
        let Some(guild) = click.guild_id.clone() else {
            let error = TicketError::Validation(
                "applications can only be started inside a server".to_owned(),
            );
            return RoutedReply::message(notice(error.user_message()));
        };

        let handle = match self.registry.begin(click.user.clone(), action.staff_role.clone()) {
            Ok(handle) => handle,
            Err(RegistryError::AlreadyActive(requester)) => {
                info!(
                    event_name = "ticket.apply.already_active",
                    correlation_id = %ctx.correlation_id,
                    requester_id = %requester,
                    "duplicate application rejected"
                );
                return RoutedReply::message(notice(TicketError::AlreadyActive.user_message()));
            }
            Err(other) => {
                let error = TicketError::Internal(other.to_string());
                warn!(
                    event_name = "ticket.apply.begin_failed",
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "could not open ticket session"
                );
                return RoutedReply::message(notice(error.user_message()));
            }
        };

        info!(
            event_name = "ticket.apply.started",
            correlation_id = %ctx.correlation_id,
            session_id = %handle.session_id(),
            requester_id = %click.user.id,
            channel_id = %click.channel_id,
            "application interview started"
        );

        let title = if action.title.trim().is_empty() {
            DEFAULT_RECORD_TITLE.to_owned()
        } else {
            action.title
        };
        let job = ApplicationJob {
            handle,
            guild,
            conversation: click.channel_id.clone(),
            requester: click.user.clone(),
            staff_role: action.staff_role,
            title,
            correlation_id: ctx.correlation_id.clone(),
        };
        let router = self.clone();
        let interview = tokio::spawn(async move { router.run_application(job).await });

        RoutedReply {
            message: application_started_message(
                self.registry.interview().len(),
                self.step_timeout.as_secs(),
            ),
            interview: Some(interview),
        }
    }

    async fn run_application(self, job: ApplicationJob) -> ApplicationOutcome {
        let ApplicationJob {
            handle,
            guild,
            conversation,
            requester,
            staff_role,
            title,
            correlation_id,
        } = job;

        let prompts = self.registry.interview().prompts();
        let answers = match self
            .sequencer
            .run_interview(&conversation, &requester, prompts, self.step_timeout)
            .await
        {
            Ok(answers) => answers,
            Err(InterviewError::Timeout { step }) => {
                let event = LifecycleEvent::StepTimedOut { step };
                self.abandon(handle, event, &conversation, &requester, &correlation_id).await;
                return ApplicationOutcome::TimedOut { step };
            }
            Err(error) => {
                warn!(
                    event_name = "ticket.apply.interview_failed",
                    correlation_id = %correlation_id,
                    requester_id = %requester.id,
                    error = %error,
                    "application interview aborted"
                );
                let event = LifecycleEvent::Cancelled;
                self.abandon(handle, event, &conversation, &requester, &correlation_id).await;
                return ApplicationOutcome::Failed(TicketError::Internal(error.to_string()));
            }
        };

        let sheet = match self.registry.interview().answer_sheet(answers) {
            Ok(sheet) => sheet,
            Err(error) => {
                let event = LifecycleEvent::Cancelled;
                self.abandon(handle, event, &conversation, &requester, &correlation_id).await;
                return ApplicationOutcome::Failed(TicketError::from(error));
            }
        };

        let channel = match self
            .provisioner
            .create_ticket_channel(&guild, &requester, &staff_role, &title, &sheet)
            .await
        {
            Ok(channel) => channel,
            Err(error) => {
                let event = LifecycleEvent::ProvisioningFailed;
                self.abandon(handle, event, &conversation, &requester, &correlation_id).await;
                return ApplicationOutcome::Failed(TicketError::Provisioning(error.to_string()));
            }
        };

        match self.registry.complete(handle, sheet, channel.clone()) {
            Ok(session) => {
                info!(
                    event_name = "ticket.apply.completed",
                    correlation_id = %correlation_id,
                    session_id = %session.id,
                    requester_id = %requester.id,
                    channel_id = %channel,
                    "application completed and ticket channel opened"
                );
            }
            Err(error) => {
                let error = TicketError::Internal(error.to_string());
                error!(
                    event_name = "ticket.apply.complete_failed",
                    correlation_id = %correlation_id,
                    requester_id = %requester.id,
                    channel_id = %channel,
                    error = %error,
                    "ticket channel exists but the session could not be completed"
                );
                self.post_to_requester(&conversation, &requester, &error).await;
                return ApplicationOutcome::Failed(error);
            }
        }

        let confirmation = ticket_opened_message(&requester, &channel);
        if let Err(error) = self.platform.post_message(&conversation, &confirmation).await {
            warn!(
                event_name = "ticket.apply.confirmation_failed",
                correlation_id = %correlation_id,
                channel_id = %conversation,
                error = %error,
                "could not post ticket confirmation"
            );
        }

        ApplicationOutcome::Opened { channel }
    }

    async fn abandon(
        &self,
        handle: SessionHandle,
        event: LifecycleEvent,
        conversation: &ChannelId,
        requester: &UserRef,
        correlation_id: &str,
    ) {
        let session_id = handle.session_id().clone();
        let outcome = match self.registry.abandon(handle, event) {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(
                    event_name = "ticket.session.abandon_failed",
                    correlation_id = %correlation_id,
                    session_id = %session_id,
                    error = %error,
                    "could not mark session abandoned"
                );
                return;
            }
        };

        info!(
            event_name = "ticket.session.abandoned",
            correlation_id = %correlation_id,
            session_id = %session_id,
            requester_id = %requester.id,
            from = outcome.from.as_str(),
            event = ?outcome.event,
            "ticket session abandoned"
        );

        let requester_notice = outcome.actions.iter().find_map(|action| match action {
            LifecycleAction::NotifyRequesterTimeout => match outcome.event {
                LifecycleEvent::StepTimedOut { step } => Some(TicketError::Timeout { step }),
                _ => None,
            },
            LifecycleAction::NotifyRequesterFailure => Some(TicketError::Provisioning(
                "ticket channel could not be provisioned".to_owned(),
            )),
            _ => None,
        });
        if let Some(error) = requester_notice {
            self.post_to_requester(conversation, requester, &error).await;
        }
    }

    async fn post_to_requester(
        &self,
        conversation: &ChannelId,
        requester: &UserRef,
        error: &TicketError,
    ) {
        let message = MessageBuilder::new()
            .content(format!("{} {}", requester.mention(), error.user_message()))
            .build();
        if let Err(post_error) = self.platform.post_message(conversation, &message).await {
            warn!(
                event_name = "ticket.router.notice_failed",
                channel_id = %conversation,
                requester_id = %requester.id,
                error_class = error.class(),
                error = %post_error,
                "could not notify requester"
            );
        }
    }

    pub async fn view_account(
        &self,
        click: &ButtonClickEvent,
        ctx: &EventContext,
    ) -> MessageTemplate {
        let Some(session) = self.registry.session_for_channel(&click.channel_id) else {
            return notice(UNTRACKED_TICKET_REPLY);
        };

        let is_requester = session.requester.id == click.user.id;
        if !is_requester && !click.member_roles.contains(&session.staff_role) {
            info!(
                event_name = "ticket.view.denied",
                correlation_id = %ctx.correlation_id,
                session_id = %session.id,
                actor_id = %click.user.id,
                "view account denied"
            );
            return notice(TicketError::Authorization(VIEW_DENIED_REPLY.to_owned()).user_message());
        }

        let lookup_failed = || notice(TicketError::ExternalLookup(String::new()).user_message());
        if session.state() != SessionState::Completed {
            return lookup_failed();
        }
        let Some(tag) = session.player_tag() else {
            return lookup_failed();
        };

        match self.lookup.fetch(tag).await {
            Ok(profile) => player_profile_message(&profile),
            Err(error) => {
                warn!(
                    event_name = "ticket.view.lookup_failed",
                    correlation_id = %ctx.correlation_id,
                    session_id = %session.id,
                    error = %error,
                    "profile lookup failed"
                );
                lookup_failed()
            }
        }
    }

    /// Only holders of the staff role stored on the session may close it. The
    /// registry entry is dropped only after the channel is gone.
    pub async fn close_ticket(
        &self,
        click: &ButtonClickEvent,
        ctx: &EventContext,
    ) -> MessageTemplate {
        let Some(session) = self.registry.session_for_channel(&click.channel_id) else {
            return notice(UNTRACKED_TICKET_REPLY);
        };

        if !click.member_roles.contains(&session.staff_role) {
            info!(
                event_name = "ticket.close.denied",
                correlation_id = %ctx.correlation_id,
                session_id = %session.id,
                actor_id = %click.user.id,
                "close ticket denied"
            );
            let error = TicketError::Authorization(CLOSE_DENIED_REPLY.to_owned());
            return notice(error.user_message());
        }

        if let Err(error) = self.platform.delete_channel(&click.channel_id).await {
            let error = TicketError::Provisioning(error.to_string());
            warn!(
                event_name = "ticket.close.delete_failed",
                correlation_id = %ctx.correlation_id,
                session_id = %session.id,
                channel_id = %click.channel_id,
                error = %error,
                "ticket channel could not be deleted"
            );
            return notice(error.user_message());
        }

        self.registry.close(&click.channel_id);
        info!(
            event_name = "ticket.close.completed",
            correlation_id = %ctx.correlation_id,
            session_id = %session.id,
            channel_id = %click.channel_id,
            actor_id = %click.user.id,
            "ticket closed"
        );
        notice(TICKET_CLOSED_REPLY)
    }
}

#[async_trait]
impl SlashCommandService for ActionRouter {
    async fn handle_slash_command(
        &self,
        invocation: &SlashCommandInvocation,
        ctx: &EventContext,
    ) -> Result<MessageTemplate, EventHandlerError> {
        ensure_ticket_setup(invocation)?;
        Ok(self.setup(invocation, ctx))
    }
}

#[async_trait]
impl ButtonActionService for ActionRouter {
    async fn handle_button_click(
        &self,
        event: &ButtonClickEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        Ok(Some(self.route_button(event, ctx).await.message))
    }
}
