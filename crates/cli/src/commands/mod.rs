pub mod config;
pub mod doctor;
pub mod manifest;

use serde::Serialize;

pub const EXIT_CONFIG_INVALID: u8 = 2;
pub const EXIT_NOT_READY: u8 = 3;
pub const EXIT_SERIALIZATION: u8 = 4;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

/// JSON envelope printed when a command cannot produce its normal output.
#[derive(Debug, Serialize)]
struct CommandFailure<'a> {
    command: &'a str,
    status: &'static str,
    error_class: &'a str,
    message: String,
}

impl CommandResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self { exit_code: 0, output: output.into() }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload =
            CommandFailure { command, status: "error", error_class, message: message.into() };
        let output = serde_json::to_string(&payload).unwrap_or_else(|error| {
            format!(
                "{{\"command\":\"{command}\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        Self { exit_code, output }
    }
}

pub(crate) fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
