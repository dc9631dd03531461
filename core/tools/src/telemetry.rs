//! Append-only telemetry sink.

use std::collections::BTreeMap;
use std::sync::Mutex;

use cradle_protocol::TelemetryEvent;

/// Thread-safe collector for tool execution events and named counters.
///
/// Append-only; readers take snapshots.
#[derive(Debug, Default)]
pub struct TelemetrySink {
    events: Mutex<Vec<TelemetryEvent>>,
    counters: Mutex<BTreeMap<String, u64>>,
}

impl TelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: TelemetryEvent) {
        let mut events = match self.events.lock() {
            Ok(events) => events,
            Err(poisoned) => poisoned.into_inner(),
        };
        events.push(event);
    }

    pub fn incr(&self, counter: &str) {
        self.incr_by(counter, 1);
    }

    pub fn incr_by(&self, counter: &str, amount: u64) {
        let mut counters = match self.counters.lock() {
            Ok(counters) => counters,
            Err(poisoned) => poisoned.into_inner(),
        };
        *counters.entry(counter.to_string()).or_insert(0) += amount;
    }

    pub fn counter(&self, counter: &str) -> u64 {
        match self.counters.lock() {
            Ok(counters) => counters.get(counter).copied().unwrap_or(0),
            Err(poisoned) => poisoned.into_inner().get(counter).copied().unwrap_or(0),
        }
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn counters(&self) -> BTreeMap<String, u64> {
        match self.counters.lock() {
            Ok(counters) => counters.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// One JSON object per line, for the audit log.
    pub fn export_jsonl(&self) -> String {
        let mut out = String::new();
        for event in self.events() {
            if let Ok(line) = serde_json::to_string(&event) {
                out.push_str(&line);
                out.push('\n');
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(call_id: &str) -> TelemetryEvent {
        TelemetryEvent {
            timestamp_ms: 0,
            tool_name: "read_file".to_string(),
            call_id: call_id.to_string(),
            turn_id: 1,
            duration_ms: 5,
            success: true,
            error_kind: None,
            input_bytes: 10,
            output_bytes: 20,
            truncated: false,
        }
    }

    #[test]
    fn records_and_counts() {
        let sink = TelemetrySink::new();
        sink.record(event("call-1"));
        sink.record(event("call-2"));
        sink.incr("policy_denied");
        sink.incr_by("policy_denied", 2);

        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.counter("policy_denied"), 3);
        assert_eq!(sink.counter("missing"), 0);
    }

    #[test]
    fn jsonl_export_one_line_per_event() {
        let sink = TelemetrySink::new();
        sink.record(event("call-1"));
        sink.record(event("call-2"));
        let jsonl = sink.export_jsonl();
        assert_eq!(jsonl.lines().count(), 2);
        assert!(jsonl.lines().all(|line| line.contains("read_file")));
    }
}
