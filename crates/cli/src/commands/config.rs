use std::env;
use std::fs;
use std::path::Path;

use secrecy::ExposeSecret;
use ticketbooth_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

use super::{CommandResult, EXIT_CONFIG_INVALID};

struct ConfigField<'a> {
    key_path: &'static str,
    value: String,
    env_keys: &'a [&'static str],
}

impl<'a> ConfigField<'a> {
    fn new(key_path: &'static str, value: impl Into<String>, env_keys: &'a [&'static str]) -> Self {
        Self { key_path, value: value.into(), env_keys }
    }
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                error.to_string(),
                EXIT_CONFIG_INVALID,
            );
        }
    };

    CommandResult::ok(render(&config))
}

pub fn render(config: &AppConfig) -> String {
    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let api_key = if config.profile_api.api_key.is_some() { "<redacted>" } else { "<unset>" };
    let fields = [
        ConfigField::new(
            "discord.bot_token",
            redact_token(config.discord.bot_token.expose_secret()),
            &["TICKETBOOTH_DISCORD_BOT_TOKEN", "BOT_TOKEN"],
        ),
        ConfigField::new(
            "discord.application_id",
            &config.discord.application_id,
            &["TICKETBOOTH_DISCORD_APPLICATION_ID", "CLIENT_ID"],
        ),
        ConfigField::new(
            "discord.api_base_url",
            &config.discord.api_base_url,
            &["TICKETBOOTH_DISCORD_API_BASE_URL"],
        ),
        ConfigField::new(
            "profile_api.base_url",
            &config.profile_api.base_url,
            &["TICKETBOOTH_PROFILE_API_BASE_URL"],
        ),
        ConfigField::new(
            "profile_api.api_key",
            api_key,
            &["TICKETBOOTH_PROFILE_API_KEY", "COC_API_KEY"],
        ),
        ConfigField::new(
            "profile_api.timeout_secs",
            config.profile_api.timeout_secs.to_string(),
            &["TICKETBOOTH_PROFILE_API_TIMEOUT_SECS"],
        ),
        ConfigField::new(
            "interview.step_timeout_secs",
            config.interview.step_timeout_secs.to_string(),
            &["TICKETBOOTH_INTERVIEW_STEP_TIMEOUT_SECS"],
        ),
        ConfigField::new(
            "server.bind_address",
            &config.server.bind_address,
            &["TICKETBOOTH_SERVER_BIND_ADDRESS"],
        ),
        ConfigField::new(
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            &["TICKETBOOTH_SERVER_HEALTH_CHECK_PORT"],
        ),
        ConfigField::new(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["TICKETBOOTH_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        ConfigField::new(
            "logging.level",
            &config.logging.level,
            &["TICKETBOOTH_LOGGING_LEVEL", "TICKETBOOTH_LOG_LEVEL"],
        ),
        ConfigField::new(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["TICKETBOOTH_LOGGING_FORMAT", "TICKETBOOTH_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(fields.iter().map(|field| {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        format!("- {} = {} (source: {source})", field.key_path, field.value)
    }));
    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

/// Bot tokens are `<base64 user id>.<timestamp>.<hmac>`; only the id segment
/// is shown.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('.') {
        return format!("{prefix}.***");
    }

    "<redacted>".to_string()
}
