use ticketbooth_discord::commands::ticket_setup_manifest;

use super::{CommandResult, EXIT_SERIALIZATION};

/// Prints the `/ticketsetup` registration body, ready to `PUT` to
/// `applications/{id}/commands`.
pub fn run() -> CommandResult {
    match serde_json::to_string_pretty(&[ticket_setup_manifest()]) {
        Ok(output) => CommandResult::ok(output),
        Err(error) => CommandResult::failure(
            "manifest",
            "serialization",
            error.to_string(),
            EXIT_SERIALIZATION,
        ),
    }
}
