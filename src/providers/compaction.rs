//! Payload compaction for fallback attempts.
//!
//! Fallback providers are often smaller or cheaper models with tighter
//! context limits, and the primary may have failed precisely because the
//! payload was too large. Compaction bounds what gets re-sent:
//!
//! - at most one leading system turn, truncated to `max_system_chars`;
//! - only the last `max_recent_turns` conversational turns;
//! - every kept turn truncated to `max_turn_chars`, marker included;
//! - tool results at the head of the window are dropped once their calls
//!   have been cut off.
//!
//! Lengths are counted in `char`s.

use crate::types::{Message, MessageContent};

/// Budgets applied by [`compact`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionConfig {
    /// Max chars of the system turn. Default: 6,000.
    pub max_system_chars: usize,
    /// Conversational turns kept, counted from the end. Default: 6.
    pub max_recent_turns: usize,
    /// Max chars of any other turn. Default: 1,500.
    pub max_turn_chars: usize,
    /// Appended to truncated text; counted inside the budget.
    pub truncation_marker: String,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            max_system_chars: 6_000,
            max_recent_turns: 6,
            max_turn_chars: 1_500,
            truncation_marker: " [truncated]".to_owned(),
        }
    }
}

impl CompactionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_system_chars(mut self, n: usize) -> Self {
        self.max_system_chars = n;
        self
    }

    pub fn max_recent_turns(mut self, n: usize) -> Self {
        self.max_recent_turns = n;
        self
    }

    pub fn max_turn_chars(mut self, n: usize) -> Self {
        self.max_turn_chars = n;
        self
    }

    pub fn truncation_marker(mut self, marker: impl Into<String>) -> Self {
        self.truncation_marker = marker.into();
        self
    }
}

/// Clean up a caller's turn list before dispatch.
///
/// Consecutive leading system turns are merged into one, and turns with
/// neither text nor tool calls are dropped. Tool results are kept even when
/// empty, since their call would otherwise be left unanswered.
pub fn normalize_roles(messages: &[Message]) -> Vec<Message> {
    let mut out: Vec<Message> = Vec::with_capacity(messages.len());
    let mut leading = true;
    for msg in messages {
        if msg.content.is_empty() && !msg.has_tool_calls() && !msg.role.is_tool() {
            continue;
        }
        if leading && msg.role.is_system() {
            match out.last_mut() {
                Some(system) => {
                    let merged = format!("{}\n\n{}", system.text(), msg.text());
                    system.content = MessageContent::Text(merged);
                }
                None => out.push(msg.clone()),
            }
            continue;
        }
        leading = false;
        out.push(msg.clone());
    }
    out
}

/// Build the reduced payload sent to fallback providers.
pub fn compact(messages: &[Message], config: &CompactionConfig) -> Vec<Message> {
    let (system, rest) = match messages.split_first() {
        Some((first, rest)) if first.role.is_system() => (Some(first), rest),
        _ => (None, messages),
    };

    let start = rest.len().saturating_sub(config.max_recent_turns);
    let mut window = &rest[start..];
    while let Some((first, tail)) = window.split_first() {
        if !first.role.is_tool() {
            break;
        }
        window = tail;
    }

    let mut out = Vec::with_capacity(window.len() + 1);
    if let Some(system) = system {
        out.push(truncated(system, config.max_system_chars, config));
    }
    out.extend(
        window
            .iter()
            .map(|msg| truncated(msg, config.max_turn_chars, config)),
    );
    out
}

/// Cut `text` to at most `max_chars` chars, ending with `marker` when cut.
///
/// A budget smaller than the marker gets a bare prefix instead.
pub fn truncate(text: &str, max_chars: usize, marker: &str) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let marker_len = marker.chars().count();
    if marker_len >= max_chars {
        return text.chars().take(max_chars).collect();
    }
    let mut out: String = text.chars().take(max_chars - marker_len).collect();
    out.push_str(marker);
    out
}

fn truncated(msg: &Message, max_chars: usize, config: &CompactionConfig) -> Message {
    let mut msg = msg.clone();
    msg.content = MessageContent::Text(truncate(
        msg.text(),
        max_chars,
        &config.truncation_marker,
    ));
    msg
}
