use serde_json::{json, Value};
use thiserror::Error;
use ticketbooth_core::{ChannelId, DomainError, GuildId, RoleId, TicketPanel, UserRef};

use crate::platform::{InteractionRef, ADMINISTRATOR};

pub const TICKET_SETUP_COMMAND: &str = "ticketsetup";
pub const APPLY_ACTION_PREFIX: &str = "ticket.apply.v1";
pub const VIEW_ACCOUNT_ACTION_ID: &str = "ticket.view_account.v1";
pub const CLOSE_TICKET_ACTION_ID: &str = "ticket.close.v1";
pub const CUSTOM_ID_MAX_LEN: usize = 100;

const OPTION_TYPE_STRING: u8 = 3;
const OPTION_TYPE_ROLE: u8 = 8;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOption {
    pub name: String,
    pub value: String,
}

impl CommandOption {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandInvocation {
    pub command: String,
    pub options: Vec<CommandOption>,
    pub interaction: InteractionRef,
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub user: UserRef,
}

impl SlashCommandInvocation {
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.iter().find(|option| option.name == name).map(|option| option.value.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
}

/// Decoded state carried by an Apply button.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplyAction {
    pub staff_role: RoleId,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ButtonAction {
    Apply(ApplyAction),
    ViewAccount,
    CloseTicket,
    Unknown(String),
}

pub fn ensure_ticket_setup(invocation: &SlashCommandInvocation) -> Result<(), CommandParseError> {
    if invocation.command.trim_start_matches('/') != TICKET_SETUP_COMMAND {
        return Err(CommandParseError::UnsupportedCommand(invocation.command.clone()));
    }
    Ok(())
}

pub fn parse_ticket_setup(invocation: &SlashCommandInvocation) -> Result<TicketPanel, DomainError> {
    TicketPanel::new(
        invocation.option("title").unwrap_or_default(),
        invocation.option("embed_message").unwrap_or_default(),
        invocation.option("embed_image_url").map(str::to_owned),
        invocation.option("staff_role").map(RoleId::new),
    )
}

/// Encodes the staff role and panel title into an Apply button id. The title
/// is cut on a character boundary so the id never exceeds the platform limit.
pub fn apply_action_id(staff_role: &RoleId, title: &str) -> String {
    let mut custom_id =
        format!("{APPLY_ACTION_PREFIX};role={};title=", encode_component(staff_role.as_str()));
    for ch in title.chars() {
        let encoded = encode_component(ch.encode_utf8(&mut [0; 4]));
        if custom_id.len() + encoded.len() > CUSTOM_ID_MAX_LEN {
            break;
        }
        custom_id.push_str(&encoded);
    }
    custom_id
}

pub fn parse_button_action(custom_id: &str) -> ButtonAction {
    match custom_id {
        VIEW_ACCOUNT_ACTION_ID => ButtonAction::ViewAccount,
        CLOSE_TICKET_ACTION_ID => ButtonAction::CloseTicket,
        other => match other.strip_prefix(APPLY_ACTION_PREFIX).and_then(parse_apply_fields) {
            Some(action) => ButtonAction::Apply(action),
            None => ButtonAction::Unknown(other.to_owned()),
        },
    }
}

fn parse_apply_fields(fields: &str) -> Option<ApplyAction> {
    let mut staff_role = None::<String>;
    let mut title = None::<String>;

    for segment in fields.split(';') {
        if segment.trim().is_empty() {
            continue;
        }
        let (key, raw_value) = segment.split_once('=')?;
        let value = decode_component(raw_value)?;

        match key.trim() {
            "role" => {
                if value.is_empty() || staff_role.replace(value).is_some() {
                    return None;
                }
            }
            "title" => {
                if title.replace(value).is_some() {
                    return None;
                }
            }
            _ => return None,
        }
    }

    Some(ApplyAction { staff_role: RoleId::new(staff_role?), title: title.unwrap_or_default() })
}

fn encode_component(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b' ' => {
                encoded.push(char::from(byte));
            }
            other => encoded.push_str(&format!("%{other:02X}")),
        }
    }
    encoded
}

fn decode_component(value: &str) -> Option<String> {
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0usize;

    while index < bytes.len() {
        match bytes[index] {
            b'%' => {
                if index + 2 >= bytes.len() {
                    return None;
                }

                let high = hex_nibble(bytes[index + 1])?;
                let low = hex_nibble(bytes[index + 2])?;
                decoded.push((high << 4) | low);
                index += 3;
            }
            byte => {
                decoded.push(byte);
                index += 1;
            }
        }
    }

    String::from_utf8(decoded).ok()
}

fn hex_nibble(value: u8) -> Option<u8> {
    match value {
        b'0'..=b'9' => Some(value - b'0'),
        b'a'..=b'f' => Some(value - b'a' + 10),
        b'A'..=b'F' => Some(value - b'A' + 10),
        _ => None,
    }
}

/// Registration payload for the `/ticketsetup` command.
pub fn ticket_setup_manifest() -> Value {
    json!({
        "name": TICKET_SETUP_COMMAND,
        "description": "Setup a ticket for clan application",
        "default_member_permissions": ADMINISTRATOR.to_string(),
        "dm_permission": false,
        "options": [
            {
                "name": "title",
                "type": OPTION_TYPE_STRING,
                "description": "Title for the embed",
                "required": true,
                "max_length": 256
            },
            {
                "name": "embed_message",
                "type": OPTION_TYPE_STRING,
                "description": "Message for the embed",
                "required": true,
                "max_length": 4096
            },
            {
                "name": "embed_image_url",
                "type": OPTION_TYPE_STRING,
                "description": "Embed image URL",
                "required": false
            },
            {
                "name": "staff_role",
                "type": OPTION_TYPE_ROLE,
                "description": "Select the support staff role",
                "required": true
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use ticketbooth_core::{ChannelId, DomainError, RoleId, UserRef};

    use super::{
        apply_action_id, ensure_ticket_setup, parse_button_action, parse_ticket_setup,
        ticket_setup_manifest, ApplyAction, ButtonAction, CommandOption, CommandParseError,
        SlashCommandInvocation, CUSTOM_ID_MAX_LEN,
    };
    use crate::platform::InteractionRef;

    fn invocation(options: Vec<CommandOption>) -> SlashCommandInvocation {
        SlashCommandInvocation {
            command: "ticketsetup".to_owned(),
            options,
            interaction: InteractionRef { id: "I1".to_owned(), token: "tok".to_owned() },
            guild_id: None,
            channel_id: ChannelId::new("C1"),
            user: UserRef::new("U1", "admin"),
        }
    }

    #[test]
    fn setup_options_become_a_panel() {
        let panel = parse_ticket_setup(&invocation(vec![
            CommandOption::new("title", "Join Us"),
            CommandOption::new("embed_message", "Press apply"),
            CommandOption::new("staff_role", "555"),
        ]))
        .expect("panel");

        assert_eq!(panel.title, "Join Us");
        assert_eq!(panel.staff_role, RoleId::new("555"));
        assert_eq!(panel.image_url, None);
    }

    #[test]
    fn setup_without_staff_role_is_rejected() {
        let error = parse_ticket_setup(&invocation(vec![
            CommandOption::new("title", "Join Us"),
            CommandOption::new("embed_message", "Press apply"),
        ]))
        .expect_err("missing role");
        assert!(
            matches!(error, DomainError::InvalidPanel(message) if message.contains("staff_role"))
        );
    }

    #[test]
    fn other_commands_are_unsupported() {
        let mut other = invocation(Vec::new());
        other.command = "/ban".to_owned();
        assert_eq!(
            ensure_ticket_setup(&other),
            Err(CommandParseError::UnsupportedCommand("/ban".to_owned()))
        );
        assert!(ensure_ticket_setup(&invocation(Vec::new())).is_ok());
    }

    #[test]
    fn apply_action_round_trips_role_and_title() {
        let custom_id = apply_action_id(&RoleId::new("555"), "Join; us=now 100%");
        assert_eq!(
            parse_button_action(&custom_id),
            ButtonAction::Apply(ApplyAction {
                staff_role: RoleId::new("555"),
                title: "Join; us=now 100%".to_owned(),
            })
        );
    }

    #[test]
    fn apply_action_id_is_capped_on_char_boundary() {
        let title = "é".repeat(80);
        let custom_id = apply_action_id(&RoleId::new("123456789012345678"), &title);
        assert!(custom_id.len() <= CUSTOM_ID_MAX_LEN);

        let ButtonAction::Apply(action) = parse_button_action(&custom_id) else {
            panic!("capped id should still decode");
        };
        assert!(!action.title.is_empty());
        assert!(action.title.chars().all(|ch| ch == 'é'));
    }

    #[test]
    fn tampered_apply_ids_are_unknown() {
        let duplicated = "ticket.apply.v1;role=1;role=2;title=x";
        assert_eq!(parse_button_action(duplicated), ButtonAction::Unknown(duplicated.to_owned()));
        let truncated = "ticket.apply.v1;role=1;title=%E";
        assert_eq!(parse_button_action(truncated), ButtonAction::Unknown(truncated.to_owned()));
        assert_eq!(
            parse_button_action("apply_ticket"),
            ButtonAction::Unknown("apply_ticket".to_owned())
        );
    }

    #[test]
    fn fixed_ids_route_to_view_and_close() {
        assert_eq!(parse_button_action("ticket.view_account.v1"), ButtonAction::ViewAccount);
        assert_eq!(parse_button_action("ticket.close.v1"), ButtonAction::CloseTicket);
    }

    #[test]
    fn manifest_requires_administrator() {
        let manifest = ticket_setup_manifest();
        assert_eq!(manifest["name"], "ticketsetup");
        assert_eq!(manifest["default_member_permissions"], "8");
        assert_eq!(manifest["options"][3]["type"], 8);
        assert_eq!(manifest["options"].as_array().map(Vec::len), Some(4));
    }
}
