use std::env;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use ticketbooth_cli::commands::{config, doctor, manifest};

const VALID_TOKEN: &str = "MTIzNDU2Nzg5.GhIjKl.c2lnbmF0dXJlLXBhcnQ";

#[test]
fn config_returns_validation_failure_without_token() {
    with_env(&[], || {
        let result = config::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        assert!(payload["message"].as_str().unwrap_or_default().contains("discord.bot_token"));
    });
}

#[test]
fn config_attributes_sources_and_redacts_secrets() {
    with_env(
        &[
            ("BOT_TOKEN", VALID_TOKEN),
            ("TICKETBOOTH_DISCORD_APPLICATION_ID", "123456789012345678"),
            ("COC_API_KEY", "super-secret-key"),
            ("TICKETBOOTH_LOG_LEVEL", "debug"),
        ],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0);

            let output = result.output;
            assert!(output.contains("- discord.bot_token = MTIzNDU2Nzg5.*** (source: env (BOT_TOKEN))"));
            assert!(output.contains(
                "- discord.application_id = 123456789012345678 (source: env (TICKETBOOTH_DISCORD_APPLICATION_ID))"
            ));
            assert!(output.contains("- profile_api.api_key = <redacted> (source: env (COC_API_KEY))"));
            assert!(output.contains("- interview.step_timeout_secs = 60 (source: default)"));
            assert!(output.contains("- logging.level = debug (source: env (TICKETBOOTH_LOG_LEVEL))"));
            assert!(!output.contains("super-secret-key"));
            assert!(!output.contains("c2lnbmF0dXJlLXBhcnQ"));
        },
    );
}

#[test]
fn doctor_reports_ready_with_complete_env() {
    with_env(
        &[
            ("TICKETBOOTH_DISCORD_BOT_TOKEN", VALID_TOKEN),
            ("CLIENT_ID", "123456789012345678"),
            ("TICKETBOOTH_PROFILE_API_KEY", "key"),
        ],
        || {
            let result = doctor::run(true);
            assert_eq!(result.exit_code, 0, "expected all checks to pass");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["overall_status"], "pass");
            assert_eq!(payload["checks"].as_array().map(Vec::len), Some(3));
        },
    );
}

#[test]
fn doctor_flags_missing_profile_key() {
    with_env(
        &[("TICKETBOOTH_DISCORD_BOT_TOKEN", VALID_TOKEN), ("CLIENT_ID", "123456789012345678")],
        || {
            let result = doctor::run(false);
            assert_eq!(result.exit_code, 3);
            assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
            assert!(result.output.contains("- [ok] discord_token_readiness"));
            assert!(result.output.contains("- [fail] profile_api_readiness"));
        },
    );
}

#[test]
fn doctor_skips_dependent_checks_when_config_invalid() {
    with_env(&[], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 3);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
        assert_eq!(payload["checks"][2]["status"], "skipped");
    });
}

#[test]
fn manifest_needs_no_configuration() {
    with_env(&[], || {
        let result = manifest::run();
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        let command = &payload[0];
        assert_eq!(command["name"], "ticketsetup");
        assert_eq!(command["default_member_permissions"], "8");
        let options = command["options"].as_array().expect("options");
        let names = options.iter().filter_map(|option| option["name"].as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["title", "embed_message", "embed_image_url", "staff_role"]);
        assert_eq!(options[3]["type"], 8);
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "TICKETBOOTH_DISCORD_BOT_TOKEN",
        "BOT_TOKEN",
        "TICKETBOOTH_DISCORD_APPLICATION_ID",
        "CLIENT_ID",
        "TICKETBOOTH_DISCORD_API_BASE_URL",
        "TICKETBOOTH_PROFILE_API_BASE_URL",
        "TICKETBOOTH_PROFILE_API_KEY",
        "COC_API_KEY",
        "TICKETBOOTH_PROFILE_API_TIMEOUT_SECS",
        "TICKETBOOTH_INTERVIEW_STEP_TIMEOUT_SECS",
        "TICKETBOOTH_SERVER_BIND_ADDRESS",
        "TICKETBOOTH_SERVER_HEALTH_CHECK_PORT",
        "TICKETBOOTH_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "TICKETBOOTH_LOGGING_LEVEL",
        "TICKETBOOTH_LOGGING_FORMAT",
        "TICKETBOOTH_LOG_LEVEL",
        "TICKETBOOTH_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
