//! Structured webhook payloads for drift alerts.

use chrono::Utc;
use serde::Serialize;

/// Plan output longer than this is cut with an explicit truncation marker
/// so webhook bodies stay bounded.
pub const MAX_OUTPUT_CHARS: usize = 2000;

const TRUNCATION_MARKER: &str = "\n... (truncated)";

#[derive(Debug, Clone, Serialize)]
pub struct SlackMessage {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<SlackAttachment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlackAttachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(rename = "ts", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<SlackField>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlackField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

/// Rich drift alert: a headline, a summary attachment with project fields,
/// and the (truncated) plan output in a code fence.
pub fn slack_payload(project: &str, summary: &str, plan_output: &str) -> SlackMessage {
    SlackMessage {
        text: format!(":rotating_light: *Drift Detected in Project: {}*", project),
        username: Some("driftwatch".to_string()),
        icon_emoji: Some(":warning:".to_string()),
        attachments: vec![
            SlackAttachment {
                color: Some("danger".to_string()),
                title: Some("Configuration Drift Alert".to_string()),
                text: Some(summary.to_string()),
                footer: Some("driftwatch".to_string()),
                timestamp: Some(Utc::now().timestamp()),
                fields: vec![
                    SlackField {
                        title: "Project".to_string(),
                        value: project.to_string(),
                        short: true,
                    },
                    SlackField {
                        title: "Status".to_string(),
                        value: "Drift Detected".to_string(),
                        short: true,
                    },
                ],
            },
            SlackAttachment {
                color: Some("warning".to_string()),
                title: Some("Plan Output".to_string()),
                text: Some(format!("```{}```", truncate_output(plan_output))),
                footer: None,
                timestamp: None,
                fields: Vec::new(),
            },
        ],
    }
}

/// Teams incoming-webhook MessageCard for the same alert.
pub fn teams_payload(project: &str, summary: &str, plan_output: &str) -> serde_json::Value {
    serde_json::json!({
        "@type": "MessageCard",
        "@context": "https://schema.org/extensions",
        "themeColor": "D93F0B",
        "summary": format!("Drift detected in {}", project),
        "title": format!("Drift Detected in Project: {}", project),
        "sections": [
            {
                "facts": [
                    { "name": "Project", "value": project },
                    { "name": "Status", "value": "Drift Detected" },
                ],
                "text": summary,
            },
            {
                "title": "Plan Output",
                "text": format!("<pre>{}</pre>", truncate_output(plan_output)),
            },
        ],
    })
}

/// Cut to `MAX_OUTPUT_CHARS` characters, appending the truncation marker
/// when anything was dropped.
pub fn truncate_output(raw: &str) -> String {
    if raw.chars().count() <= MAX_OUTPUT_CHARS {
        return raw.to_string();
    }

    let mut truncated: String = raw.chars().take(MAX_OUTPUT_CHARS).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}
