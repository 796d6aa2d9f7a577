use serde::{Deserialize, Serialize};

use super::frame::StreamFrame;

/// Lifecycle of a backend tool invocation surfaced while a reply streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Running,
    Completed,
    Error,
}

impl Default for ProgressStatus {
    fn default() -> Self {
        ProgressStatus::Running
    }
}

/// A transient record of one backend tool invocation, keyed for
/// de-duplication by `(tool, file)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressStep {
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub status: ProgressStatus,
    #[serde(default)]
    pub content: String,
}

impl ProgressStep {
    /// The upsert key: a later step with the same key replaces the earlier
    /// entry in place. `(None, None)` is a legitimate key.
    pub fn key(&self) -> (Option<&str>, Option<&str>) {
        (self.tool.as_deref(), self.file.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ThinkingPayload {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    content: Option<String>,
}

/// A wire frame resolved to its typed meaning.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// `thinking`: true iff status is `starting` or `queued`.
    Thinking { active: bool },
    /// `progress`: upserted into the progress list; `content` joins the
    /// running buffer.
    Progress(ProgressStep),
    /// `message`: a no-op during streaming; finalization happens at EOF.
    Message,
    /// `error`: logged, never aborts the stream.
    Error { content: String },
    /// Data that failed to parse as JSON is appended verbatim.
    Raw(String),
    /// Unknown event types are dropped silently.
    Ignored,
}

impl StreamEvent {
    pub fn from_frame(frame: &StreamFrame) -> Self {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&frame.data) else {
            return StreamEvent::Raw(frame.data.clone());
        };

        match frame.event_type.as_str() {
            "thinking" => {
                let payload: ThinkingPayload =
                    serde_json::from_value(value).unwrap_or(ThinkingPayload { status: None });
                let active = matches!(
                    payload.status.as_deref(),
                    Some("starting") | Some("queued")
                );
                StreamEvent::Thinking { active }
            }
            "progress" => match serde_json::from_value::<ProgressStep>(value) {
                Ok(step) => StreamEvent::Progress(step),
                Err(_) => StreamEvent::Raw(frame.data.clone()),
            },
            "message" => StreamEvent::Message,
            "error" => {
                let payload: ErrorPayload =
                    serde_json::from_value(value).unwrap_or(ErrorPayload { content: None });
                StreamEvent::Error {
                    content: payload.content.unwrap_or_default(),
                }
            }
            _ => StreamEvent::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event_type: &str, data: &str) -> StreamFrame {
        StreamFrame {
            event_type: event_type.into(),
            data: data.into(),
        }
    }

    #[test]
    fn test_thinking_true_only_for_starting_and_queued() {
        for (status, expected) in [
            ("starting", true),
            ("queued", true),
            ("done", false),
            ("anything", false),
        ] {
            let event = StreamEvent::from_frame(&frame(
                "thinking",
                &format!("{{\"status\":\"{status}\"}}"),
            ));
            assert_eq!(event, StreamEvent::Thinking { active: expected }, "{status}");
        }

        let missing = StreamEvent::from_frame(&frame("thinking", "{}"));
        assert_eq!(missing, StreamEvent::Thinking { active: false });
    }

    #[test]
    fn test_progress_defaults_optional_fields() {
        let event = StreamEvent::from_frame(&frame("progress", r#"{"content":"x"}"#));
        let StreamEvent::Progress(step) = event else {
            panic!("expected progress");
        };
        assert_eq!(step.key(), (None, None));
        assert_eq!(step.status, ProgressStatus::Running);
        assert_eq!(step.content, "x");
    }

    #[test]
    fn test_progress_full_payload() {
        let event = StreamEvent::from_frame(&frame(
            "progress",
            r#"{"tool":"grep","file":"a.py","action":"search","status":"completed","content":"y"}"#,
        ));
        let StreamEvent::Progress(step) = event else {
            panic!("expected progress");
        };
        assert_eq!(step.key(), (Some("grep"), Some("a.py")));
        assert_eq!(step.status, ProgressStatus::Completed);
    }

    #[test]
    fn test_non_json_data_is_raw() {
        let event = StreamEvent::from_frame(&frame("message", "plain words"));
        assert_eq!(event, StreamEvent::Raw("plain words".into()));

        // Even under a typed event, unparseable data degrades to raw text.
        let event = StreamEvent::from_frame(&frame("thinking", "not json"));
        assert_eq!(event, StreamEvent::Raw("not json".into()));
    }

    #[test]
    fn test_unknown_event_type_is_ignored() {
        let event = StreamEvent::from_frame(&frame("telemetry", r#"{"x":1}"#));
        assert_eq!(event, StreamEvent::Ignored);
    }

    #[test]
    fn test_json_under_message_type_is_noop() {
        let event = StreamEvent::from_frame(&frame("message", r#"{"anything":true}"#));
        assert_eq!(event, StreamEvent::Message);
    }

    #[test]
    fn test_error_event_carries_content() {
        let event = StreamEvent::from_frame(&frame("error", r#"{"content":"boom"}"#));
        assert_eq!(
            event,
            StreamEvent::Error {
                content: "boom".into()
            }
        );
    }
}
