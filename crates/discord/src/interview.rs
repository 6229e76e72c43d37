use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use ticketbooth_core::{ChannelId, Prompt, UserRef};
use tracing::{debug, info};

use crate::conversation::ReplyHub;
use crate::embeds::interview_prompt_message;
use crate::platform::{ChatPlatform, PlatformError};

/// Steps are numbered from 1.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InterviewError {
    #[error("no reply for step {step} before the deadline")]
    Timeout { step: usize },
    #[error("could not post prompt for step {step}: {source}")]
    PromptDelivery { step: usize, source: PlatformError },
    #[error("listener for step {step} was replaced before a reply arrived")]
    ListenerClosed { step: usize },
}

#[derive(Clone)]
pub struct PromptSequencer {
    platform: Arc<dyn ChatPlatform>,
    replies: Arc<ReplyHub>,
}

impl PromptSequencer {
    pub fn new(platform: Arc<dyn ChatPlatform>, replies: Arc<ReplyHub>) -> Self {
        Self { platform, replies }
    }

    /// Asks each prompt in order and returns the answers in the same order.
    /// The first step that misses its deadline aborts the whole interview.
    pub async fn run_interview(
        &self,
        conversation: &ChannelId,
        requester: &UserRef,
        prompts: &[Prompt],
        step_timeout: Duration,
    ) -> Result<Vec<String>, InterviewError> {
        let mut answers = Vec::with_capacity(prompts.len());

        for (index, prompt) in prompts.iter().enumerate() {
            let step = index + 1;
            let mut listener = self.replies.register(conversation, &requester.id);

            self.platform
                .post_message(conversation, &interview_prompt_message(requester, &prompt.text))
                .await
                .map_err(|source| InterviewError::PromptDelivery { step, source })?;
            debug!(
                event_name = "ticket.interview.prompt_sent",
                requester_id = %requester.id,
                channel_id = %conversation,
                step,
                "interview prompt posted"
            );

            let reply = match tokio::time::timeout(step_timeout, listener.next_reply()).await {
                Ok(Some(reply)) => reply,
                Ok(None) => return Err(InterviewError::ListenerClosed { step }),
                Err(_) => {
                    info!(
                        event_name = "ticket.interview.step_timed_out",
                        requester_id = %requester.id,
                        channel_id = %conversation,
                        step,
                        timeout_secs = step_timeout.as_secs(),
                        "interview step timed out"
                    );
                    return Err(InterviewError::Timeout { step });
                }
            };
            answers.push(reply);
        }

        Ok(answers)
    }
}
