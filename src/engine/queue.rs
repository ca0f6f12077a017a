// ── Engine: Event Queue ────────────────────────────────────────────────────
//
// Bounded in-process queue between `store()` callers and the background
// drain. Enqueue never blocks beyond the lock; when the queue is full the
// oldest event is dropped FIFO so a stalled drain cannot wedge ingestion.
//
// Thread-safe: all internal state is behind Arc<Mutex>. Clone is cheap
// (Arc clones).

use crate::atoms::error::{MemoryError, MemoryResult};
use crate::atoms::types::MemoryEvent;
use log::warn;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

// ═════════════════════════════════════════════════════════════════════════════
// Event Queue
// ═════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct EventQueue {
    events: Arc<Mutex<VecDeque<MemoryEvent>>>,
    capacity: usize,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self { events: Arc::new(Mutex::new(VecDeque::new())), capacity }
    }

    /// Validate and enqueue one event. The caller never blocks beyond the
    /// enqueue itself.
    pub fn push(&self, event: MemoryEvent) -> MemoryResult<()> {
        if event.user_id.is_empty() {
            return Err(MemoryError::validation("event user_id must not be empty"));
        }
        if event.session_id.is_empty() {
            return Err(MemoryError::validation("event session_id must not be empty"));
        }

        let mut events = self.events.lock();
        if events.len() >= self.capacity {
            warn!(
                "[router] Event queue full ({}/{}), dropping oldest",
                events.len(),
                self.capacity
            );
            events.pop_front();
        }
        events.push_back(event);
        Ok(())
    }

    /// Pop up to `batch_size` events, oldest first.
    pub fn drain_batch(&self, batch_size: usize) -> Vec<MemoryEvent> {
        let mut events = self.events.lock();
        let take = batch_size.min(events.len());
        events.drain(..take).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Tests
// ═════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::types::MemoryEventKind;

    fn make_event(session: &str) -> MemoryEvent {
        MemoryEvent::new(MemoryEventKind::CodeGeneration, "u1", session, serde_json::json!({}))
    }

    #[test]
    fn push_and_drain_in_order() {
        let queue = EventQueue::new(10);
        queue.push(make_event("s1")).unwrap();
        queue.push(make_event("s2")).unwrap();
        queue.push(make_event("s3")).unwrap();

        let batch = queue.drain_batch(2);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].session_id, "s1");
        assert_eq!(batch[1].session_id, "s2");
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn overflow_drops_oldest() {
        let queue = EventQueue::new(2);
        queue.push(make_event("s1")).unwrap();
        queue.push(make_event("s2")).unwrap();
        queue.push(make_event("s3")).unwrap();

        assert_eq!(queue.len(), 2);
        let batch = queue.drain_batch(10);
        assert_eq!(batch[0].session_id, "s2");
        assert_eq!(batch[1].session_id, "s3");
    }

    #[test]
    fn empty_ids_are_rejected() {
        let queue = EventQueue::new(10);
        let mut event = make_event("s1");
        event.user_id = String::new();
        assert!(matches!(queue.push(event), Err(MemoryError::Validation(_))));

        let mut event = make_event("");
        event.user_id = "u1".to_string();
        assert!(matches!(queue.push(event), Err(MemoryError::Validation(_))));
    }

    #[test]
    fn drain_on_empty_is_empty() {
        let queue = EventQueue::new(10);
        assert!(queue.drain_batch(5).is_empty());
    }
}
