//! Session and telemetry events surfaced to the host.

use serde::Deserialize;
use serde::Serialize;

/// Events emitted by the session while processing a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    TaskStarted {
        turn_id: u64,
    },
    ToolCallBegin {
        call_id: String,
        name: String,
        /// First bytes of the raw input, for display.
        input_preview: String,
    },
    ToolCallEnd {
        call_id: String,
        success: bool,
        duration_ms: u64,
        truncated: bool,
    },
    AssistantMessage {
        text: String,
    },
    Compaction {
        pre_tokens: u64,
        post_tokens: u64,
    },
    TaskComplete {
        summary: String,
    },
    TaskFailed {
        error: String,
    },
}

/// One telemetry record per tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Unix epoch milliseconds.
    pub timestamp_ms: i64,
    pub tool_name: String,
    pub call_id: String,
    pub turn_id: u64,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub truncated: bool,
}

impl TelemetryEvent {
    /// Current wall-clock time in epoch milliseconds.
    pub fn now_ms() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serde_tagging() {
        let event = SessionEvent::ToolCallEnd {
            call_id: "call-1".to_string(),
            success: true,
            duration_ms: 12,
            truncated: false,
        };
        let encoded = serde_json::to_value(&event).unwrap();
        assert_eq!(encoded["type"], "tool_call_end");
        assert_eq!(encoded["call_id"], "call-1");
    }

    #[test]
    fn telemetry_round_trip() {
        let event = TelemetryEvent {
            timestamp_ms: TelemetryEvent::now_ms(),
            tool_name: "read_file".to_string(),
            call_id: "call-1".to_string(),
            turn_id: 3,
            duration_ms: 40,
            success: true,
            error_kind: None,
            input_bytes: 64,
            output_bytes: 512,
            truncated: false,
        };
        let encoded = serde_json::to_string(&event).unwrap();
        let decoded: TelemetryEvent = serde_json::from_str(&encoded).unwrap();
        assert_eq!(event, decoded);
        assert!(!encoded.contains("error_kind"));
    }
}
