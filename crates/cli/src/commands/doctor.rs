use secrecy::ExposeSecret;
use serde::Serialize;
use ticketbooth_core::config::{AppConfig, LoadOptions};

use super::{escape_json, CommandResult, EXIT_NOT_READY};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report(AppConfig::load(LoadOptions::default()));
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { EXIT_NOT_READY };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report<E: std::fmt::Display>(loaded: Result<AppConfig, E>) -> DoctorReport {
    let mut checks = Vec::new();

    match loaded {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_discord_token(&config));
            checks.push(check_profile_api(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["discord_token_readiness", "profile_api_readiness"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Bot tokens have three dot-separated segments. Anything else is almost
/// always a client secret or application id pasted into the wrong field.
fn check_discord_token(config: &AppConfig) -> DoctorCheck {
    let token = config.discord.bot_token.expose_secret().trim();
    let segments = token.split('.').filter(|segment| !segment.is_empty()).count();

    if segments == 3 {
        DoctorCheck {
            name: "discord_token_readiness",
            status: CheckStatus::Pass,
            details: "bot token has the expected three-segment shape".to_string(),
        }
    } else {
        DoctorCheck {
            name: "discord_token_readiness",
            status: CheckStatus::Fail,
            details: format!(
                "bot token has {segments} segment(s); expected 3. Copy it from the Bot tab, not OAuth2"
            ),
        }
    }
}

fn check_profile_api(config: &AppConfig) -> DoctorCheck {
    if config.profile_api.api_key.is_some() {
        DoctorCheck {
            name: "profile_api_readiness",
            status: CheckStatus::Pass,
            details: format!("api key configured for `{}`", config.profile_api.base_url),
        }
    } else {
        DoctorCheck {
            name: "profile_api_readiness",
            status: CheckStatus::Fail,
            details: "profile_api.api_key is unset; Applicant Account lookups will be rejected"
                .to_string(),
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
