//! Pins: small high-priority snippets that survive compaction.

use std::time::Duration;
use std::time::Instant;

use crate::meter::TokenMeter;

/// One pinned snippet.
#[derive(Debug, Clone)]
pub struct Pin {
    pub id: String,
    pub content: String,
    pub priority: i32,
    created_at: Instant,
    ttl: Option<Duration>,
}

impl Pin {
    pub fn is_expired(&self) -> bool {
        self.ttl
            .is_some_and(|ttl| self.created_at.elapsed() >= ttl)
    }
}

/// Pin registry with a total token budget.
#[derive(Debug, Default)]
pub struct PinStore {
    pins: Vec<Pin>,
    next_id: u64,
}

impl PinStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pin; empty content is rejected.
    pub fn add(
        &mut self,
        content: impl Into<String>,
        ttl: Option<Duration>,
        priority: i32,
    ) -> Result<String, String> {
        let content = content.into().trim().to_string();
        if content.is_empty() {
            return Err("pin content must not be empty".to_string());
        }
        self.next_id += 1;
        let id = format!("pin-{}", self.next_id);
        self.pins.push(Pin {
            id: id.clone(),
            content,
            priority,
            created_at: Instant::now(),
            ttl,
        });
        Ok(id)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.pins.len();
        self.pins.retain(|pin| pin.id != id);
        self.pins.len() != before
    }

    pub fn clear_expired(&mut self) {
        self.pins.retain(|pin| !pin.is_expired());
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// Live pins in priority order (highest first, insertion order within a
    /// priority), cut off at `budget_tokens`.
    pub fn within_budget(&mut self, meter: &TokenMeter, budget_tokens: u64) -> Vec<Pin> {
        self.clear_expired();
        let mut ordered: Vec<&Pin> = self.pins.iter().collect();
        ordered.sort_by_key(|pin| std::cmp::Reverse(pin.priority));

        let mut selected = Vec::new();
        let mut used = 0u64;
        for pin in ordered {
            let tokens = meter.estimate_text(&pin.content);
            if used + tokens > budget_tokens {
                continue;
            }
            used += tokens;
            selected.push(pin.clone());
        }
        selected
    }

    /// Render the selected pins as a single context block.
    pub fn render(pins: &[Pin]) -> Option<String> {
        if pins.is_empty() {
            return None;
        }
        let body = pins
            .iter()
            .map(|pin| pin.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Some(format!("Pinned context:\n{body}"))
    }
}

#[cfg(test)]
#[path = "pins.test.rs"]
mod tests;
