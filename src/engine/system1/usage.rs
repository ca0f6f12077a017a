// ── System 1: Usage History ────────────────────────────────────────────────
//
// Rolling command-frequency and recency tables plus session records, all
// capped at configurable sizes. Oldest / least-frequent entries are evicted
// first, so the tables are bounded regardless of event volume.
//
// Thread-safety: NOT internally synchronized; owned by System1Store.

use crate::atoms::system1_types::{CommandUsage, SessionRecord};
use chrono::Utc;
use log::debug;
use std::collections::{HashMap, VecDeque};

// ═════════════════════════════════════════════════════════════════════════════
// Usage Tracker
// ═════════════════════════════════════════════════════════════════════════════

pub struct UsageTracker {
    /// command → frequency entry, capped at `command_capacity`.
    frequency: HashMap<String, CommandUsage>,
    /// Most recent command invocations, oldest first.
    recent: VecDeque<String>,
    /// Rolling session table, oldest first.
    sessions: VecDeque<SessionRecord>,
    command_capacity: usize,
    session_capacity: usize,
}

impl UsageTracker {
    pub fn new(command_capacity: usize, session_capacity: usize) -> Self {
        Self {
            frequency: HashMap::new(),
            recent: VecDeque::new(),
            sessions: VecDeque::new(),
            command_capacity,
            session_capacity,
        }
    }

    /// Record one command invocation in both the frequency and recency
    /// tables, evicting the least-frequent entry when over capacity.
    pub fn record_command(&mut self, command: &str) {
        let entry = self
            .frequency
            .entry(command.to_string())
            .or_insert_with(|| CommandUsage {
                command: command.to_string(),
                count: 0,
                last_used: Utc::now(),
            });
        entry.count += 1;
        entry.last_used = Utc::now();

        if self.frequency.len() > self.command_capacity {
            if let Some(loser) = self
                .frequency
                .values()
                .min_by(|a, b| a.count.cmp(&b.count).then_with(|| a.last_used.cmp(&b.last_used)))
                .map(|u| u.command.clone())
            {
                debug!("[system1] Evicting least-frequent command '{loser}'");
                self.frequency.remove(&loser);
            }
        }

        self.recent.push_back(command.to_string());
        while self.recent.len() > self.command_capacity {
            self.recent.pop_front();
        }
    }

    /// Most-used commands first; ties break by recency then name.
    pub fn frequent_commands(&self, limit: usize) -> Vec<CommandUsage> {
        let mut all: Vec<CommandUsage> = self.frequency.values().cloned().collect();
        all.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| b.last_used.cmp(&a.last_used))
                .then_with(|| a.command.cmp(&b.command))
        });
        all.truncate(limit);
        all
    }

    /// Most recent invocations first.
    pub fn recent_commands(&self, limit: usize) -> Vec<String> {
        self.recent.iter().rev().take(limit).cloned().collect()
    }

    /// Record a session start, or bump the event count of a session
    /// already being tracked.
    pub fn record_session(&mut self, session_id: &str, user_id: &str) {
        if let Some(existing) = self.sessions.iter_mut().find(|s| s.session_id == session_id) {
            existing.event_count += 1;
            return;
        }
        self.sessions.push_back(SessionRecord {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            started_at: Utc::now(),
            event_count: 1,
        });
        while self.sessions.len() > self.session_capacity {
            self.sessions.pop_front();
        }
    }

    pub fn command_count(&self) -> usize {
        self.frequency.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn set_capacities(&mut self, command_capacity: usize, session_capacity: usize) {
        self.command_capacity = command_capacity;
        self.session_capacity = session_capacity;
    }

    pub fn clear(&mut self) {
        self.frequency.clear();
        self.recent.clear();
        self.sessions.clear();
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Tests
// ═════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_ranks_by_count() {
        let mut tracker = UsageTracker::new(10, 10);
        tracker.record_command("cargo build");
        tracker.record_command("cargo test");
        tracker.record_command("cargo test");

        let frequent = tracker.frequent_commands(5);
        assert_eq!(frequent[0].command, "cargo test");
        assert_eq!(frequent[0].count, 2);
    }

    #[test]
    fn least_frequent_evicted_at_capacity() {
        let mut tracker = UsageTracker::new(2, 10);
        tracker.record_command("a");
        tracker.record_command("a");
        tracker.record_command("b");
        tracker.record_command("b");
        tracker.record_command("c"); // forces eviction of the least frequent

        assert_eq!(tracker.command_count(), 2);
        let names: Vec<String> =
            tracker.frequent_commands(5).into_iter().map(|u| u.command).collect();
        assert!(names.contains(&"a".to_string()));
        assert!(names.contains(&"b".to_string()));
    }

    #[test]
    fn recent_is_newest_first() {
        let mut tracker = UsageTracker::new(10, 10);
        tracker.record_command("first");
        tracker.record_command("second");
        tracker.record_command("third");

        let recent = tracker.recent_commands(2);
        assert_eq!(recent, vec!["third".to_string(), "second".to_string()]);
    }

    #[test]
    fn session_table_is_capped() {
        let mut tracker = UsageTracker::new(10, 2);
        tracker.record_session("s1", "u1");
        tracker.record_session("s2", "u1");
        tracker.record_session("s3", "u1");

        assert_eq!(tracker.session_count(), 2);
    }

    #[test]
    fn repeated_session_bumps_event_count() {
        let mut tracker = UsageTracker::new(10, 10);
        tracker.record_session("s1", "u1");
        tracker.record_session("s1", "u1");

        assert_eq!(tracker.session_count(), 1);
    }
}
