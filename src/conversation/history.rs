//! Session-owned conversation history

use super::turn::ConversationTurn;

/// Ordered, append-only record of one session's turns.
///
/// Each session owns its own history; the engine borrows it mutably for the
/// duration of one `handle()` call. The system prompt is not stored here.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
    /// Upper bound on retained turns; `None` keeps everything
    retention: Option<usize>,
}

impl ConversationHistory {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// History that evicts its oldest turns once more than `limit` are held
    pub fn with_retention(limit: usize) -> Self {
        Self {
            turns: Vec::new(),
            retention: Some(limit.max(1)),
        }
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
        self.enforce_retention();
    }

    pub fn extend(&mut self, turns: impl IntoIterator<Item = ConversationTurn>) {
        self.turns.extend(turns);
        self.enforce_retention();
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    #[cfg(test)]
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The most recent `size` turns, as sent to the backend.
    ///
    /// A cut that would land inside a tool round is moved back to the
    /// assistant turn that requested it, so the view may exceed `size` by
    /// the length of that round. Tool results with no requesting turn at all
    /// are skipped. The view never begins with a tool result.
    pub fn window(&self, size: usize) -> &[ConversationTurn] {
        let mut start = self.turns.len().saturating_sub(size);
        if self.is_result_at(start) {
            let mut request = start;
            while request > 0 && self.is_result_at(request) {
                request -= 1;
            }
            if self.is_result_at(request) {
                while self.is_result_at(start) {
                    start += 1;
                }
            } else {
                start = request;
            }
        }
        &self.turns[start..]
    }

    fn is_result_at(&self, index: usize) -> bool {
        self.turns
            .get(index)
            .is_some_and(ConversationTurn::is_tool_result)
    }

    fn enforce_retention(&mut self) {
        let Some(limit) = self.retention else {
            return;
        };
        if self.turns.len() <= limit {
            return;
        }
        let mut excess = self.turns.len() - limit;
        while self
            .turns
            .get(excess)
            .is_some_and(ConversationTurn::is_tool_result)
        {
            excess += 1;
        }
        self.turns.drain(..excess);
        tracing::debug!(evicted = excess, retained = self.turns.len(), "History trimmed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ToolInvocation;
    use proptest::prelude::*;
    use serde_json::Map;

    fn tool_round(id: &str) -> Vec<ConversationTurn> {
        vec![
            ConversationTurn::assistant_with_calls(
                None,
                vec![ToolInvocation::new(id, "time", Map::new())],
            ),
            ConversationTurn::tool_result(id, "time", "noon"),
        ]
    }

    #[test]
    fn test_window_is_recent_suffix() {
        let mut history = ConversationHistory::new();
        for i in 0..20 {
            history.push(ConversationTurn::user(format!("u{i}")));
        }
        let window = history.window(10);
        assert_eq!(window.len(), 10);
        assert_eq!(window[0].text(), "u10");
        assert_eq!(window[9].text(), "u19");
        // Truncation is a view; nothing is removed
        assert_eq!(history.len(), 20);
    }

    #[test]
    fn test_window_larger_than_history() {
        let mut history = ConversationHistory::new();
        history.push(ConversationTurn::user("only"));
        assert_eq!(history.window(15).len(), 1);
        assert!(ConversationHistory::new().window(5).is_empty());
    }

    #[test]
    fn test_window_extends_back_to_requesting_turn() {
        let mut history = ConversationHistory::new();
        history.push(ConversationTurn::user("what time is it"));
        history.extend(tool_round("c1"));
        history.push(ConversationTurn::assistant("It is noon."));

        // A window of 2 would start at the tool result
        let window = history.window(2);
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].tool_calls.len(), 1);
        assert!(window[1].is_tool_result());
        assert_eq!(window[2].text(), "It is noon.");
    }

    #[test]
    fn test_window_keeps_round_larger_than_size() {
        let calls: Vec<_> = (0..4)
            .map(|i| ToolInvocation::new(format!("c{i}"), "time", Map::new()))
            .collect();
        let mut history = ConversationHistory::new();
        history.push(ConversationTurn::user("four times please"));
        history.push(ConversationTurn::assistant_with_calls(None, calls));
        for i in 0..4 {
            history.push(ConversationTurn::tool_result(format!("c{i}"), "time", "noon"));
        }

        let window = history.window(2);
        assert_eq!(window.len(), 5);
        assert_eq!(window[0].tool_calls.len(), 4);
        assert!(window[1..].iter().all(ConversationTurn::is_tool_result));
    }

    #[test]
    fn test_window_skips_results_without_request() {
        let mut history = ConversationHistory::new();
        history.push(ConversationTurn::tool_result("c0", "time", "stale"));
        history.push(ConversationTurn::tool_result("c1", "time", "stale"));
        history.push(ConversationTurn::user("hi"));

        let window = history.window(3);
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].text(), "hi");
    }

    #[test]
    fn test_retention_evicts_oldest() {
        let mut history = ConversationHistory::with_retention(3);
        for i in 0..5 {
            history.push(ConversationTurn::user(format!("u{i}")));
        }
        let texts: Vec<_> = history.turns().iter().map(ConversationTurn::text).collect();
        assert_eq!(texts, vec!["u2", "u3", "u4"]);
    }

    #[test]
    fn test_retention_never_leaves_leading_tool_result() {
        let mut history = ConversationHistory::with_retention(2);
        history.push(ConversationTurn::user("hi"));
        history.extend(tool_round("c1"));
        assert!(!history.turns()[0].is_tool_result());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut history = ConversationHistory::new();
        history.push(ConversationTurn::user("hi"));
        history.clear();
        history.clear();
        assert!(history.is_empty());
    }

    fn arb_history() -> impl Strategy<Value = ConversationHistory> {
        // true = plain exchange, false = tool round followed by an answer
        prop::collection::vec(any::<bool>(), 0..30).prop_map(|shape| {
            let mut history = ConversationHistory::new();
            for (i, plain) in shape.into_iter().enumerate() {
                history.push(ConversationTurn::user(format!("u{i}")));
                if !plain {
                    history.extend(tool_round(&format!("c{i}")));
                }
                history.push(ConversationTurn::assistant(format!("a{i}")));
            }
            history
        })
    }

    proptest! {
        #[test]
        fn window_is_bounded_suffix_without_orphans(history in arb_history(), size in 1usize..20) {
            let window = history.window(size);
            prop_assert!(window.first().map_or(true, |t| !t.is_tool_result()));
            if window.len() > size {
                // Only grown to reach back to a round's requesting turn
                prop_assert!(!window[0].tool_calls.is_empty());
                prop_assert!(window[1..=window.len() - size].iter().all(ConversationTurn::is_tool_result));
            }
            let turns = history.turns();
            prop_assert_eq!(window, &turns[turns.len() - window.len()..]);
        }
    }
}
