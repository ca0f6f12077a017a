// ── System 2: Reflection Log & Enhancement Ledger ──────────────────────────
//
// The append-only reflection log (insights plus their action items) and the
// enhancement ledger (proposals with a one-directional approval lifecycle,
// except rejected → proposed re-submission).
//
// Both are owned by System2Store. The Coordinator reads enhancements for
// its recommendation list but never owns or mutates them directly.

use crate::atoms::error::{MemoryError, MemoryResult};
use crate::atoms::system2_types::{
    ActionItem, Enhancement, EnhancementImpact, EnhancementKind, EnhancementStatus,
    ReflectionEntry,
};
use chrono::{Duration, Utc};
use log::{debug, info};
use std::collections::HashMap;
use std::collections::VecDeque;

// ═════════════════════════════════════════════════════════════════════════════
// Reflection Log
// ═════════════════════════════════════════════════════════════════════════════

pub struct ReflectionLog {
    entries: VecDeque<ReflectionEntry>,
    retention: usize,
}

impl ReflectionLog {
    pub fn new(retention: usize) -> Self {
        Self { entries: VecDeque::new(), retention }
    }

    /// Append an entry. The log is append-only; only retention trimming
    /// removes (the oldest) entries.
    pub fn add_entry(
        &mut self,
        subject: impl Into<String>,
        insight: impl Into<String>,
        confidence: f64,
    ) -> ReflectionEntry {
        let entry = ReflectionEntry {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            subject: subject.into(),
            insight: insight.into(),
            confidence: confidence.clamp(0.0, 1.0),
            action_items: Vec::new(),
        };
        self.entries.push_back(entry.clone());
        while self.entries.len() > self.retention {
            self.entries.pop_front();
        }
        entry
    }

    /// Attach a concrete follow-up to an existing entry.
    pub fn add_action_item(
        &mut self,
        entry_id: &str,
        description: impl Into<String>,
    ) -> MemoryResult<ActionItem> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == entry_id)
            .ok_or_else(|| MemoryError::not_found("reflection entry", entry_id))?;

        let item = ActionItem {
            id: uuid::Uuid::new_v4().to_string(),
            description: description.into(),
            completed: false,
        };
        entry.action_items.push(item.clone());
        Ok(item)
    }

    /// Entries within the timeframe at or above the confidence floor,
    /// newest first.
    pub fn insights(&self, timeframe: Duration, min_confidence: f64) -> Vec<ReflectionEntry> {
        let cutoff = Utc::now() - timeframe;
        let mut out: Vec<ReflectionEntry> = self
            .entries
            .iter()
            .filter(|e| e.timestamp >= cutoff && e.confidence >= min_confidence)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set_retention(&mut self, retention: usize) {
        self.retention = retention;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Enhancement Ledger
// ═════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct EnhancementLedger {
    items: HashMap<String, Enhancement>,
}

impl EnhancementLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new proposal in the `Proposed` state.
    pub fn propose(
        &mut self,
        kind: EnhancementKind,
        title: impl Into<String>,
        description: impl Into<String>,
        impact: EnhancementImpact,
        source_trace: Option<String>,
    ) -> Enhancement {
        let now = Utc::now();
        let enhancement = Enhancement {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            title: title.into(),
            description: description.into(),
            impact,
            status: EnhancementStatus::Proposed,
            created_at: now,
            updated_at: now,
            source_trace,
        };
        info!("[system2] Enhancement proposed: '{}'", enhancement.title);
        self.items.insert(enhancement.id.clone(), enhancement.clone());
        enhancement
    }

    /// Advance a proposal through its lifecycle. Illegal transitions fail
    /// with `InvalidState`; unknown ids with `NotFound`.
    pub fn update_status(
        &mut self,
        id: &str,
        next: EnhancementStatus,
    ) -> MemoryResult<Enhancement> {
        let enhancement = self
            .items
            .get_mut(id)
            .ok_or_else(|| MemoryError::not_found("enhancement", id))?;

        if !enhancement.status.can_transition_to(next) {
            return Err(MemoryError::invalid_state(format!(
                "enhancement {id} cannot move {:?} → {:?}",
                enhancement.status, next
            )));
        }

        enhancement.status = next;
        enhancement.updated_at = Utc::now();
        debug!("[system2] Enhancement {id} → {next:?}");
        Ok(enhancement.clone())
    }

    pub fn by_kind(&self, kind: EnhancementKind) -> Vec<Enhancement> {
        let mut out: Vec<Enhancement> =
            self.items.values().filter(|e| e.kind == kind).cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        out
    }

    pub fn by_status(&self, status: EnhancementStatus) -> Vec<Enhancement> {
        let mut out: Vec<Enhancement> =
            self.items.values().filter(|e| e.status == status).cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        out
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Tests
// ═════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn impact() -> EnhancementImpact {
        EnhancementImpact { benefit_score: 0.7, effort_score: 0.3, risk_score: 0.2 }
    }

    #[test]
    fn reflection_log_caps_at_retention() {
        let mut log = ReflectionLog::new(3);
        for i in 0..5 {
            log.add_entry(format!("subject {i}"), "insight", 0.8);
        }
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn insights_filter_by_confidence() {
        let mut log = ReflectionLog::new(10);
        log.add_entry("weak", "meh", 0.2);
        log.add_entry("strong", "aha", 0.9);

        let insights = log.insights(Duration::hours(1), 0.5);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].subject, "strong");
    }

    #[test]
    fn action_item_on_unknown_entry_is_not_found() {
        let mut log = ReflectionLog::new(10);
        assert!(matches!(
            log.add_action_item("ghost", "do it"),
            Err(MemoryError::NotFound { .. })
        ));

        let entry = log.add_entry("real", "insight", 0.8);
        assert!(log.add_action_item(&entry.id, "do it").is_ok());
    }

    #[test]
    fn enhancement_lifecycle_happy_path() {
        let mut ledger = EnhancementLedger::new();
        let e = ledger.propose(EnhancementKind::Quality, "t", "d", impact(), None);

        ledger.update_status(&e.id, EnhancementStatus::Approved).unwrap();
        ledger.update_status(&e.id, EnhancementStatus::InProgress).unwrap();
        let done = ledger.update_status(&e.id, EnhancementStatus::Completed).unwrap();
        assert_eq!(done.status, EnhancementStatus::Completed);
    }

    #[test]
    fn illegal_transition_is_invalid_state() {
        let mut ledger = EnhancementLedger::new();
        let e = ledger.propose(EnhancementKind::Performance, "t", "d", impact(), None);

        let err = ledger.update_status(&e.id, EnhancementStatus::Completed);
        assert!(matches!(err, Err(MemoryError::InvalidState(_))));
    }

    #[test]
    fn rejected_can_be_resubmitted() {
        let mut ledger = EnhancementLedger::new();
        let e = ledger.propose(EnhancementKind::Usability, "t", "d", impact(), None);
        ledger.update_status(&e.id, EnhancementStatus::Rejected).unwrap();
        let again = ledger.update_status(&e.id, EnhancementStatus::Proposed).unwrap();
        assert_eq!(again.status, EnhancementStatus::Proposed);
    }

    #[test]
    fn queries_filter_by_kind_and_status() {
        let mut ledger = EnhancementLedger::new();
        ledger.propose(EnhancementKind::Quality, "q", "d", impact(), None);
        let p = ledger.propose(EnhancementKind::Performance, "p", "d", impact(), None);
        ledger.update_status(&p.id, EnhancementStatus::Approved).unwrap();

        assert_eq!(ledger.by_kind(EnhancementKind::Quality).len(), 1);
        assert_eq!(ledger.by_status(EnhancementStatus::Proposed).len(), 1);
        assert_eq!(ledger.by_status(EnhancementStatus::Approved).len(), 1);
    }
}
