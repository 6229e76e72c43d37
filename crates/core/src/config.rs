use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::interview::DEFAULT_STEP_TIMEOUT_SECS;

pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["ticketbooth.toml", "config/ticketbooth.toml"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub discord: DiscordConfig,
    pub profile_api: ProfileApiConfig,
    pub interview: InterviewConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DiscordConfig {
    pub bot_token: SecretString,
    pub application_id: String,
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct ProfileApiConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct InterviewConfig {
    pub step_timeout_secs: u64,
}

impl InterviewConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub discord_bot_token: Option<String>,
    pub discord_application_id: Option<String>,
    pub profile_api_base_url: Option<String>,
    pub profile_api_key: Option<String>,
    pub step_timeout_secs: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            discord: DiscordConfig {
                bot_token: String::new().into(),
                application_id: String::new(),
                api_base_url: "https://discord.com/api/v10".to_string(),
            },
            profile_api: ProfileApiConfig {
                base_url: "https://cocproxy.royaleapi.dev/v1".to_string(),
                api_key: None,
                timeout_secs: 10,
            },
            interview: InterviewConfig { step_timeout_secs: DEFAULT_STEP_TIMEOUT_SECS },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_CANDIDATES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(discord) = patch.discord {
            if let Some(bot_token_value) = discord.bot_token {
                self.discord.bot_token = secret_value(bot_token_value);
            }
            if let Some(application_id) = discord.application_id {
                self.discord.application_id = application_id;
            }
            if let Some(api_base_url) = discord.api_base_url {
                self.discord.api_base_url = api_base_url;
            }
        }

        if let Some(profile_api) = patch.profile_api {
            if let Some(base_url) = profile_api.base_url {
                self.profile_api.base_url = base_url;
            }
            if let Some(api_key_value) = profile_api.api_key {
                self.profile_api.api_key = Some(secret_value(api_key_value));
            }
            if let Some(timeout_secs) = profile_api.timeout_secs {
                self.profile_api.timeout_secs = timeout_secs;
            }
        }

        if let Some(interview) = patch.interview {
            if let Some(step_timeout_secs) = interview.step_timeout_secs {
                self.interview.step_timeout_secs = step_timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let bot_token =
            read_env("TICKETBOOTH_DISCORD_BOT_TOKEN").or_else(|| read_env("BOT_TOKEN"));
        if let Some(value) = bot_token {
            self.discord.bot_token = secret_value(value);
        }
        let application_id =
            read_env("TICKETBOOTH_DISCORD_APPLICATION_ID").or_else(|| read_env("CLIENT_ID"));
        if let Some(value) = application_id {
            self.discord.application_id = value;
        }
        if let Some(value) = read_env("TICKETBOOTH_DISCORD_API_BASE_URL") {
            self.discord.api_base_url = value;
        }

        if let Some(value) = read_env("TICKETBOOTH_PROFILE_API_BASE_URL") {
            self.profile_api.base_url = value;
        }
        let api_key = read_env("TICKETBOOTH_PROFILE_API_KEY").or_else(|| read_env("COC_API_KEY"));
        if let Some(value) = api_key {
            self.profile_api.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("TICKETBOOTH_PROFILE_API_TIMEOUT_SECS") {
            self.profile_api.timeout_secs =
                parse_u64("TICKETBOOTH_PROFILE_API_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TICKETBOOTH_INTERVIEW_STEP_TIMEOUT_SECS") {
            self.interview.step_timeout_secs =
                parse_u64("TICKETBOOTH_INTERVIEW_STEP_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TICKETBOOTH_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("TICKETBOOTH_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("TICKETBOOTH_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("TICKETBOOTH_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("TICKETBOOTH_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("TICKETBOOTH_LOGGING_LEVEL").or_else(|| read_env("TICKETBOOTH_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TICKETBOOTH_LOGGING_FORMAT").or_else(|| read_env("TICKETBOOTH_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_token) = overrides.discord_bot_token {
            self.discord.bot_token = secret_value(bot_token);
        }
        if let Some(application_id) = overrides.discord_application_id {
            self.discord.application_id = application_id;
        }
        if let Some(base_url) = overrides.profile_api_base_url {
            self.profile_api.base_url = base_url;
        }
        if let Some(api_key) = overrides.profile_api_key {
            self.profile_api.api_key = Some(secret_value(api_key));
        }
        if let Some(step_timeout_secs) = overrides.step_timeout_secs {
            self.interview.step_timeout_secs = step_timeout_secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_discord(&self.discord)?;
        validate_profile_api(&self.profile_api)?;
        validate_interview(&self.interview)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    CONFIG_FILE_CANDIDATES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_discord(discord: &DiscordConfig) -> Result<(), ConfigError> {
    let bot_token = discord.bot_token.expose_secret();
    if bot_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "discord.bot_token is required. Get it from https://discord.com/developers/applications > Your App > Bot > Reset Token".to_string(),
        ));
    }
    if bot_token.trim().starts_with("Bot ") {
        return Err(ConfigError::Validation(
            "discord.bot_token must be the raw token without the `Bot ` prefix".to_string(),
        ));
    }

    let application_id = discord.application_id.trim();
    if application_id.is_empty() {
        return Err(ConfigError::Validation(
            "discord.application_id is required (General Information > Application ID)"
                .to_string(),
        ));
    }
    if !application_id.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ConfigError::Validation(
            "discord.application_id must be a numeric snowflake".to_string(),
        ));
    }

    if !is_http_url(&discord.api_base_url) {
        return Err(ConfigError::Validation(
            "discord.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_profile_api(profile_api: &ProfileApiConfig) -> Result<(), ConfigError> {
    if !is_http_url(&profile_api.base_url) {
        return Err(ConfigError::Validation(
            "profile_api.base_url must start with http:// or https://".to_string(),
        ));
    }

    if profile_api.timeout_secs == 0 || profile_api.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "profile_api.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_interview(interview: &InterviewConfig) -> Result<(), ConfigError> {
    if interview.step_timeout_secs == 0 || interview.step_timeout_secs > 900 {
        return Err(ConfigError::Validation(
            "interview.step_timeout_secs must be in range 1..=900".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    discord: Option<DiscordPatch>,
    profile_api: Option<ProfileApiPatch>,
    interview: Option<InterviewPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscordPatch {
    bot_token: Option<String>,
    application_id: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProfileApiPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct InterviewPatch {
    step_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
