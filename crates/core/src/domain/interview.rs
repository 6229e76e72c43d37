use serde::{Deserialize, Serialize};

use crate::domain::ids::RoleId;
use crate::errors::DomainError;

pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 60;

const TITLE_MAX_CHARS: usize = 256;
const BODY_MAX_CHARS: usize = 4096;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    /// Label used when the answer is rendered into the ticket record.
    pub label: String,
    pub text: String,
}

impl Prompt {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self { label: label.into(), text: text.into() }
    }
}

/// Ordered prompts for one application interview. Never empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewSpec {
    prompts: Vec<Prompt>,
}

impl InterviewSpec {
    pub fn new(prompts: Vec<Prompt>) -> Result<Self, DomainError> {
        if prompts.is_empty() {
            return Err(DomainError::EmptyInterview);
        }
        Ok(Self { prompts })
    }

    /// Player tag first, then the three application questions.
    pub fn clan_application() -> Self {
        Self {
            prompts: vec![
                Prompt::new("Player Tag", "Please provide your player tag:"),
                Prompt::new("Question 1", "Please answer the first important question:"),
                Prompt::new("Question 2", "Please answer the second important question:"),
                Prompt::new("Question 3", "Please answer the third important question:"),
            ],
        }
    }

    pub fn prompts(&self) -> &[Prompt] {
        &self.prompts
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    pub fn answer_sheet(&self, answers: Vec<String>) -> Result<AnswerSheet, DomainError> {
        if answers.len() != self.prompts.len() {
            return Err(DomainError::IncompleteAnswers {
                expected: self.prompts.len(),
                received: answers.len(),
            });
        }

        let answers = self
            .prompts
            .iter()
            .zip(answers)
            .map(|(prompt, text)| Answer { label: prompt.label.clone(), text })
            .collect();
        Ok(AnswerSheet { answers })
    }
}

impl Default for InterviewSpec {
    fn default() -> Self {
        Self::clan_application()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub label: String,
    pub text: String,
}

/// One answer per prompt, in prompt order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSheet {
    answers: Vec<Answer>,
}

impl AnswerSheet {
    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// The identifier collected by the first prompt.
    pub fn player_tag(&self) -> Option<&str> {
        self.answers.first().map(|answer| answer.text.trim()).filter(|tag| !tag.is_empty())
    }

    /// One `Label: answer` line per prompt, at most `max_chars` long overall.
    /// When the answers do not fit, each one is cut to an equal share of
    /// what the labels leave over and marked with `…`.
    pub fn render_lines(&self, max_chars: usize) -> String {
        let full = self.join_lines(|text| text.to_owned());
        if full.chars().count() <= max_chars {
            return full;
        }

        let label_chars = self
            .answers
            .iter()
            .map(|answer| answer.label.chars().count() + 2)
            .sum::<usize>()
            + self.answers.len().saturating_sub(1);
        let share = max_chars.saturating_sub(label_chars) / self.answers.len().max(1);
        self.join_lines(|text| truncate_chars(text, share))
    }

    fn join_lines(&self, render: impl Fn(&str) -> String) -> String {
        self.answers
            .iter()
            .map(|answer| format!("{}: {}", answer.label, render(&answer.text)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut truncated = text.chars().take(max_chars - 1).collect::<String>();
    truncated.push('…');
    truncated
}

/// Validated `/ticketsetup` parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketPanel {
    pub title: String,
    pub body: String,
    pub image_url: Option<String>,
    pub staff_role: RoleId,
}

impl TicketPanel {
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        image_url: Option<String>,
        staff_role: Option<RoleId>,
    ) -> Result<Self, DomainError> {
        let title = title.into().trim().to_owned();
        let body = body.into().trim().to_owned();

        if title.is_empty() {
            return Err(DomainError::InvalidPanel("title is required".to_owned()));
        }
        if title.chars().count() > TITLE_MAX_CHARS {
            return Err(DomainError::InvalidPanel(format!(
                "title must be at most {TITLE_MAX_CHARS} characters"
            )));
        }
        if body.is_empty() {
            return Err(DomainError::InvalidPanel("embed_message is required".to_owned()));
        }
        if body.chars().count() > BODY_MAX_CHARS {
            return Err(DomainError::InvalidPanel(format!(
                "embed_message must be at most {BODY_MAX_CHARS} characters"
            )));
        }

        let image_url = image_url.map(|url| url.trim().to_owned()).filter(|url| !url.is_empty());
        if let Some(url) = &image_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(DomainError::InvalidPanel(
                    "embed_image_url must start with http:// or https://".to_owned(),
                ));
            }
        }

        let staff_role = staff_role
            .filter(|role| !role.as_str().trim().is_empty())
            .ok_or_else(|| DomainError::InvalidPanel("staff_role is required".to_owned()))?;

        Ok(Self { title, body, image_url, staff_role })
    }
}
