//! Classification of a single event-log line.

use crate::data::SessionStatus;
use serde::Deserialize;
use serde_json::Value;

const ASK_USER_TOOL: &str = "ask_user";

#[derive(Debug, Deserialize)]
struct LogEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// Map the most recent log line to a status.
///
/// Mid-exchange events (turn end, tool completion) and anything that does
/// not parse come back as `Unknown`, which callers treat as "no update".
pub fn classify_line(line: &str) -> SessionStatus {
    let event: LogEvent = match serde_json::from_str(line.trim()) {
        Ok(event) => event,
        Err(e) => {
            tracing::trace!("Unparseable event line: {}", e);
            return SessionStatus::Unknown;
        }
    };

    match event.kind.as_str() {
        "assistant.turn_start" | "user.message" | "session.truncation" => SessionStatus::Working,
        "assistant.message" => {
            let pending_tools = event
                .data
                .get("toolRequests")
                .and_then(Value::as_array)
                .is_some_and(|requests| !requests.is_empty());
            if pending_tools {
                SessionStatus::Working
            } else {
                SessionStatus::Idle
            }
        }
        "tool.execution_start" => {
            match event.data.get("toolName").and_then(Value::as_str) {
                Some(ASK_USER_TOOL) => SessionStatus::Idle,
                _ => SessionStatus::Working,
            }
        }
        "abort" | "session.mode_changed" | "session.plan_changed" => SessionStatus::IdleSilent,
        _ => SessionStatus::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_working_events() {
        for line in [
            r#"{"type":"assistant.turn_start","data":{}}"#,
            r#"{"type":"user.message","data":{"content":"hi"}}"#,
            r#"{"type":"session.truncation"}"#,
        ] {
            assert_eq!(classify_line(line), SessionStatus::Working, "{}", line);
        }
    }

    #[test]
    fn test_assistant_message_depends_on_tool_requests() {
        assert_eq!(
            classify_line(r#"{"type":"assistant.message","data":{"toolRequests":[{"name":"bash"}]}}"#),
            SessionStatus::Working
        );
        assert_eq!(
            classify_line(r#"{"type":"assistant.message","data":{"toolRequests":[]}}"#),
            SessionStatus::Idle
        );
        assert_eq!(
            classify_line(r#"{"type":"assistant.message","data":{"content":"done"}}"#),
            SessionStatus::Idle
        );
    }

    #[test]
    fn test_ask_user_is_idle() {
        assert_eq!(
            classify_line(r#"{"type":"tool.execution_start","data":{"toolName":"ask_user"}}"#),
            SessionStatus::Idle
        );
        assert_eq!(
            classify_line(r#"{"type":"tool.execution_start","data":{"toolName":"bash"}}"#),
            SessionStatus::Working
        );
    }

    #[test]
    fn test_silent_and_ambiguous_events() {
        assert_eq!(classify_line(r#"{"type":"abort"}"#), SessionStatus::IdleSilent);
        assert_eq!(
            classify_line(r#"{"type":"session.mode_changed","data":{"mode":"plan"}}"#),
            SessionStatus::IdleSilent
        );
        assert_eq!(
            classify_line(r#"{"type":"assistant.turn_end"}"#),
            SessionStatus::Unknown
        );
        assert_eq!(
            classify_line(r#"{"type":"tool.execution_complete","data":{}}"#),
            SessionStatus::Unknown
        );
        assert_eq!(classify_line("{not json"), SessionStatus::Unknown);
        assert_eq!(classify_line(""), SessionStatus::Unknown);
    }
}
