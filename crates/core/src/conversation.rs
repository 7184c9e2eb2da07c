//! Per-topic conversation logs.
//!
//! Each topic owns an append-only sequence of turns. Insertion order is
//! conversational order, and nothing is ever edited or removed while the
//! owning session is alive.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::topic::Topic;
use crate::turn::Turn;

/// Marker appended to previews that were cut short.
pub const CONTINUATION_MARKER: &str = "...";

/// Ordered, append-only turn logs, one per topic.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationLog {
    logs: BTreeMap<Topic, Vec<Turn>>,
}

impl ConversationLog {
    /// Create a log with every known topic mapped to an empty sequence.
    pub fn new() -> Self {
        Self {
            logs: Topic::ALL.into_iter().map(|t| (t, Vec::new())).collect(),
        }
    }

    /// Append a turn to the end of a topic's log.
    pub fn append_turn(&mut self, topic: Topic, turn: Turn) {
        self.logs.entry(topic).or_default().push(turn);
    }

    /// All turns recorded for a topic, oldest first.
    pub fn read_all(&self, topic: Topic) -> &[Turn] {
        self.logs.get(&topic).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every topic's turns, in topic order.
    pub fn read_all_topics(&self) -> BTreeMap<Topic, &[Turn]> {
        Topic::ALL
            .into_iter()
            .map(|t| (t, self.read_all(t)))
            .collect()
    }

    /// Total number of turns across all topics.
    pub fn len(&self) -> usize {
        self.logs.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Previews of past user questions, per topic.
    ///
    /// Every topic is present in the result, including those with no
    /// questions yet.
    pub fn history_summary(&self, max_chars: usize) -> BTreeMap<Topic, Vec<String>> {
        self.read_all_topics()
            .into_iter()
            .map(|(topic, turns)| {
                let previews = turns
                    .iter()
                    .filter(|t| t.is_user())
                    .map(|t| preview(&t.content, max_chars))
                    .collect();
                (topic, previews)
            })
            .collect()
    }
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Shorten `text` to at most `max_chars` characters, marking the cut.
///
/// Counts Unicode scalar values, not bytes, so multi-byte text is never split
/// mid-character.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{CONTINUATION_MARKER}", &text[..byte_idx]),
        None => text.to_string(),
    }
}
