// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::conversation::{ActionRequest, ActionResult, ConversationEntry};
use crate::services::metrics::AgentStats;
use std::sync::Arc;

/// Bounded planner history plus the process-lifetime usage counter.
pub struct Session {
    history: Vec<ConversationEntry>,
    max_history: usize,
    stats: Arc<AgentStats>,
}

impl Session {
    pub fn new(max_history: usize, stats: Arc<AgentStats>) -> Self {
        Self {
            history: Vec::new(),
            max_history: max_history.max(1),
            stats,
        }
    }

    pub fn history(&self) -> &[ConversationEntry] {
        &self.history
    }

    /// Appends the tick's instruction and trims old entries. The kept window
    /// always starts at a user entry, so results never lose their request.
    pub fn begin_tick(&mut self, instruction: &str) {
        self.history.push(ConversationEntry::User {
            content: instruction.to_string(),
        });
        if self.history.len() <= self.max_history {
            return;
        }
        let mut start = self.history.len() - self.max_history;
        while start < self.history.len() && !self.history[start].is_user() {
            start += 1;
        }
        self.history.drain(..start);
    }

    pub fn record_plan(&mut self, text: Option<String>, actions: Vec<ActionRequest>) {
        self.history.push(ConversationEntry::Assistant {
            content: text,
            actions,
        });
    }

    pub fn record_results(&mut self, results: Vec<ActionResult>) {
        self.history.push(ConversationEntry::ActionResults { results });
    }

    /// Adds planner usage; returns the cumulative total.
    pub fn record_usage(&self, tokens: u64) -> u64 {
        self.stats.add_tokens(tokens)
    }

    pub fn total_tokens(&self) -> u64 {
        self.stats.total_tokens()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn request(id: &str) -> ActionRequest {
        ActionRequest {
            call_id: id.into(),
            name: "list_channels".into(),
            args: Map::new(),
            arg_error: None,
        }
    }

    fn full_round(session: &mut Session, tick: &str) {
        session.begin_tick(tick);
        session.record_plan(None, vec![request(tick)]);
        session.record_results(vec![ActionResult::ok(&request(tick), serde_json::json!({}))]);
        session.record_plan(Some("done".into()), Vec::new());
    }

    #[test]
    fn trimming_starts_at_a_user_entry() {
        let mut session = Session::new(5, Arc::new(AgentStats::default()));
        full_round(&mut session, "t1");
        full_round(&mut session, "t2");
        session.begin_tick("t3");
        let history = session.history();
        assert!(history.len() <= 5);
        assert!(history[0].is_user());
        for (i, entry) in history.iter().enumerate() {
            if matches!(entry, ConversationEntry::ActionResults { .. }) {
                assert!(matches!(history[i - 1], ConversationEntry::Assistant { .. }));
            }
        }
        assert_eq!(
            history.last(),
            Some(&ConversationEntry::User {
                content: "t3".into()
            })
        );
    }

    #[test]
    fn usage_is_monotonic() {
        let session = Session::new(10, Arc::new(AgentStats::default()));
        assert_eq!(session.record_usage(10), 10);
        assert_eq!(session.record_usage(0), 10);
        assert_eq!(session.record_usage(5), 15);
        assert_eq!(session.total_tokens(), 15);
    }
}
