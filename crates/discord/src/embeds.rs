use serde::{Serialize, Serializer};
use ticketbooth_core::{AnswerSheet, ChannelId, Profile, RoleId, TicketPanel, UserRef};

use crate::commands::{apply_action_id, CLOSE_TICKET_ACTION_ID, VIEW_ACCOUNT_ACTION_ID};

/// Message flag that limits visibility to the invoking user.
pub const EPHEMERAL_FLAG: u64 = 1 << 6;
pub const PANEL_COLOR: u32 = 0x0099ff;
pub const PROFILE_COLOR: u32 = 0x00ff00;
pub const EMBED_DESCRIPTION_MAX_CHARS: usize = 4096;

const ACTION_ROW_TYPE: u8 = 1;
const BUTTON_TYPE: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Success,
    Danger,
}

impl ButtonStyle {
    pub fn code(self) -> u8 {
        match self {
            Self::Primary => 1,
            Self::Secondary => 2,
            Self::Success => 3,
            Self::Danger => 4,
        }
    }
}

impl Serialize for ButtonStyle {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.code())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Button {
    #[serde(rename = "type")]
    kind: u8,
    pub style: ButtonStyle,
    pub label: String,
    pub custom_id: String,
}

impl Button {
    pub fn new(custom_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind: BUTTON_TYPE,
            style: ButtonStyle::Primary,
            label: label.into(),
            custom_id: custom_id.into(),
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = style;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    kind: u8,
    pub components: Vec<Button>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage>,
}

/// Outbound message body, serialized in the shape the REST API expects.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ActionRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
}

impl MessageTemplate {
    pub fn is_ephemeral(&self) -> bool {
        self.flags.is_some_and(|flags| flags & EPHEMERAL_FLAG != 0)
    }

    /// Every piece of visible text, for logs and assertions.
    pub fn plain_text(&self) -> String {
        let mut parts = Vec::new();
        if let Some(content) = &self.content {
            parts.push(content.clone());
        }
        for embed in &self.embeds {
            parts.extend(embed.title.clone());
            parts.extend(embed.description.clone());
        }
        parts.join("\n")
    }

    pub fn custom_ids(&self) -> Vec<&str> {
        self.components
            .iter()
            .flat_map(|row| row.components.iter().map(|button| button.custom_id.as_str()))
            .collect()
    }
}

#[derive(Default)]
pub struct MessageBuilder {
    content: Option<String>,
    embeds: Vec<Embed>,
    components: Vec<ActionRow>,
    ephemeral: bool,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn embed<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut EmbedBuilder),
    {
        let mut builder = EmbedBuilder::default();
        build(&mut builder);
        self.embeds.push(builder.build());
        self
    }

    pub fn actions<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.components.push(ActionRow { kind: ACTION_ROW_TYPE, components: builder.build() });
        self
    }

    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate {
            content: self.content,
            embeds: self.embeds,
            components: self.components,
            flags: self.ephemeral.then_some(EPHEMERAL_FLAG),
        }
    }
}

#[derive(Default)]
pub struct EmbedBuilder {
    title: Option<String>,
    lines: Vec<String>,
    color: Option<u32>,
    image_url: Option<String>,
}

impl EmbedBuilder {
    pub fn title(&mut self, title: impl Into<String>) -> &mut Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(&mut self, text: impl Into<String>) -> &mut Self {
        self.lines.push(text.into());
        self
    }

    pub fn line(&mut self, label: &str, value: impl std::fmt::Display) -> &mut Self {
        self.lines.push(format!("{label}: {value}"));
        self
    }

    pub fn color(&mut self, color: u32) -> &mut Self {
        self.color = Some(color);
        self
    }

    pub fn image(&mut self, url: Option<&str>) -> &mut Self {
        self.image_url = url.map(str::to_owned);
        self
    }

    fn build(self) -> Embed {
        Embed {
            title: self.title,
            description: (!self.lines.is_empty()).then(|| self.lines.join("\n")),
            color: self.color,
            image: self.image_url.map(|url| EmbedImage { url }),
        }
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    buttons: Vec<Button>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: Button) -> &mut Self {
        self.buttons.push(button);
        self
    }

    fn build(self) -> Vec<Button> {
        self.buttons
    }
}

pub fn panel_message(panel: &TicketPanel) -> MessageTemplate {
    MessageBuilder::new()
        .embed(|embed| {
            embed
                .title(&panel.title)
                .description(&panel.body)
                .color(PANEL_COLOR)
                .image(panel.image_url.as_deref());
        })
        .actions(|actions| {
            actions.button(
                Button::new(apply_action_id(&panel.staff_role, &panel.title), "Apply")
                    .style(ButtonStyle::Primary),
            );
        })
        .build()
}

pub fn staff_notice_message(staff_role: &RoleId, requester: &UserRef) -> MessageTemplate {
    MessageBuilder::new()
        .content(format!(
            "<@&{staff_role}> please review this application from {}!",
            requester.mention()
        ))
        .build()
}

pub fn application_record_message(title: &str, answers: &AnswerSheet) -> MessageTemplate {
    MessageBuilder::new()
        .embed(|embed| {
            embed
                .title(title)
                .description(answers.render_lines(EMBED_DESCRIPTION_MAX_CHARS))
                .color(PANEL_COLOR);
        })
        .actions(|actions| {
            actions
                .button(
                    Button::new(VIEW_ACCOUNT_ACTION_ID, "Applicant Account")
                        .style(ButtonStyle::Secondary),
                )
                .button(
                    Button::new(CLOSE_TICKET_ACTION_ID, "Close Ticket").style(ButtonStyle::Danger),
                );
        })
        .build()
}

pub fn player_profile_message(profile: &Profile) -> MessageTemplate {
    MessageBuilder::new()
        .embed(|embed| {
            embed
                .title("Player Data")
                .line("Player Name", &profile.name)
                .line("Town Hall Level", profile.level)
                .line("Trophies", profile.score)
                .color(PROFILE_COLOR);
        })
        .build()
}

pub fn interview_prompt_message(requester: &UserRef, prompt: &str) -> MessageTemplate {
    MessageBuilder::new().content(format!("{} {prompt}", requester.mention())).build()
}

pub fn ticket_opened_message(requester: &UserRef, channel: &ChannelId) -> MessageTemplate {
    MessageBuilder::new()
        .content(format!("{} your application was received: <#{channel}>", requester.mention()))
        .build()
}

pub fn application_started_message(step_count: usize, step_timeout_secs: u64) -> MessageTemplate {
    notice(format!(
        "Your application has started. Answer the {step_count} questions in this channel; each one times out after {step_timeout_secs} seconds."
    ))
}

/// Plain text reply visible only to the user who triggered the interaction.
pub fn notice(text: impl Into<String>) -> MessageTemplate {
    MessageBuilder::new().content(text).ephemeral().build()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use ticketbooth_core::{InterviewSpec, Profile, RoleId, TicketPanel, UserRef};

    use super::{
        application_record_message, notice, panel_message, player_profile_message,
        staff_notice_message, EMBED_DESCRIPTION_MAX_CHARS,
    };

    #[test]
    fn panel_serializes_to_rest_shape() {
        let panel = TicketPanel::new(
            "Join Us",
            "Apply below",
            Some("https://example.test/banner.png".to_owned()),
            Some(RoleId::new("900")),
        )
        .expect("panel");

        let value = serde_json::to_value(panel_message(&panel)).expect("serialize");
        assert_eq!(value["embeds"][0]["title"], "Join Us");
        assert_eq!(value["embeds"][0]["color"], json!(0x0099ff));
        assert_eq!(value["embeds"][0]["image"]["url"], "https://example.test/banner.png");
        assert_eq!(value["components"][0]["type"], json!(1));
        assert_eq!(value["components"][0]["components"][0]["type"], json!(2));
        assert_eq!(value["components"][0]["components"][0]["style"], json!(1));
        assert_eq!(value["components"][0]["components"][0]["label"], "Apply");
        assert!(value.get("flags").is_none());
    }

    #[test]
    fn record_lists_answers_in_prompt_order() {
        let sheet = InterviewSpec::clan_application()
            .answer_sheet(vec!["XYZ".into(), "a".into(), "b".into(), "c".into()])
            .expect("sheet");
        let message = application_record_message("Join Us", &sheet);

        assert_eq!(
            message.embeds[0].description.as_deref(),
            Some("Player Tag: XYZ\nQuestion 1: a\nQuestion 2: b\nQuestion 3: c")
        );
        assert_eq!(message.custom_ids(), vec!["ticket.view_account.v1", "ticket.close.v1"]);
        assert_eq!(message.components[0].components[1].style.code(), 4);
    }

    #[test]
    fn record_fits_the_embed_description_limit() {
        let long = "x".repeat(2000);
        let sheet = InterviewSpec::clan_application()
            .answer_sheet(vec!["TAG".into(), long.clone(), long.clone(), long])
            .expect("sheet");
        let message = application_record_message("Join Us", &sheet);

        let description = message.embeds[0].description.as_deref().expect("description");
        assert!(description.chars().count() <= EMBED_DESCRIPTION_MAX_CHARS);
        assert_eq!(description.lines().count(), 4);
        assert!(description.starts_with("Player Tag: TAG\n"));
    }

    #[test]
    fn staff_notice_mentions_role_and_requester() {
        let message = staff_notice_message(&RoleId::new("77"), &UserRef::new("42", "ash"));
        assert_eq!(
            message.content.as_deref(),
            Some("<@&77> please review this application from <@42>!")
        );
    }

    #[test]
    fn profile_embed_carries_all_fields() {
        let message =
            player_profile_message(&Profile { name: "Ash".into(), level: 42, score: 1000 });
        let text = message.plain_text();
        assert!(text.contains("Player Name: Ash"));
        assert!(text.contains("Town Hall Level: 42"));
        assert!(text.contains("Trophies: 1000"));
    }

    #[test]
    fn notices_are_ephemeral() {
        let value = serde_json::to_value(notice("hidden")).expect("serialize");
        assert_eq!(value["flags"], json!(64));
        assert!(notice("hidden").is_ephemeral());
    }
}
