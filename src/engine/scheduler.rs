// ── Engine: Background Scheduler ───────────────────────────────────────────
//
// Spawns the three maintenance loops (event-queue drain, Coordinator sync
// timer, Coordinator optimization timer) as tokio tasks carrying a watch
// shutdown channel. Store handles are passed in explicitly; nothing here
// reaches into ambient globals.
//
// Each loop yields between ticks, so caller-facing query/store/learn calls
// never block on background maintenance beyond the short lock windows the
// work itself takes.

use crate::engine::coordinator::Coordinator;
use crate::engine::router::EngineShared;
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

// ═════════════════════════════════════════════════════════════════════════════
// Engine Handle
// ═════════════════════════════════════════════════════════════════════════════

/// Owns the background tasks. Dropping the handle leaves them running;
/// call `shutdown` for an orderly stop.
pub struct EngineHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl EngineHandle {
    /// Signal all loops to stop and wait for them to finish their current
    /// tick.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        info!("[scheduler] Background loops stopped");
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Spawning
// ═════════════════════════════════════════════════════════════════════════════

pub(crate) fn spawn_background(shared: Arc<EngineShared>) -> EngineHandle {
    let (tx, rx) = watch::channel(false);
    let coordinator = Arc::new(Coordinator::from_shared(shared.clone()));
    let mut tasks = Vec::with_capacity(3);

    // Event-queue drain + response-cache sweep (short interval)
    {
        let shared = shared.clone();
        let mut rx = rx.clone();
        tasks.push(tokio::spawn(async move {
            loop {
                let interval_ms = shared.config.read().drain_interval_ms;
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(Duration::from_millis(interval_ms)) => {
                        let drained = shared.drain_once();
                        let swept = shared.cache.lock().cleanup();
                        if drained > 0 || swept > 0 {
                            debug!("[scheduler] tick: {drained} events, {swept} cache evictions");
                        }
                    }
                }
            }
        }));
    }

    // Coordinator sync timer
    {
        let shared = shared.clone();
        let coordinator = coordinator.clone();
        let mut rx = rx.clone();
        tasks.push(tokio::spawn(async move {
            loop {
                let interval = shared.config.read().sync_interval_secs;
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(Duration::from_secs(interval)) => {
                        coordinator.synchronize_systems();
                    }
                }
            }
        }));
    }

    // Coordinator optimization timer (optimize → conflict check → adapt)
    {
        let shared = shared.clone();
        let mut rx = rx;
        tasks.push(tokio::spawn(async move {
            loop {
                let interval = shared.config.read().optimize_interval_secs;
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(Duration::from_secs(interval)) => {
                        coordinator.run_optimize_cycle();
                    }
                }
            }
        }));
    }

    info!("[scheduler] Spawned drain/sync/optimize loops");
    EngineHandle { shutdown: tx, tasks }
}

// ═════════════════════════════════════════════════════════════════════════════
// Tests
// ═════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use crate::atoms::types::{EngineConfig, MemoryEvent, MemoryEventKind};
    use crate::engine::router::DualMemoryEngine;
    use std::time::Duration;

    fn fast_config() -> EngineConfig {
        EngineConfig {
            embedding_dim: 2,
            drain_interval_ms: 10,
            sync_interval_secs: 3600,
            optimize_interval_secs: 3600,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn background_drain_processes_stored_events() {
        let engine = DualMemoryEngine::new(fast_config());
        let handle = engine.start();

        engine
            .store(MemoryEvent::new(
                MemoryEventKind::CodeGeneration,
                "u1",
                "s1",
                serde_json::json!({"code": "fn f() {}", "language": "rust"}),
            ))
            .unwrap();

        // Give the drain loop a few ticks
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(engine.pending_events(), 0);
        assert_eq!(engine.get_statistics().system2.traces, 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_cleanly() {
        let engine = DualMemoryEngine::new(fast_config());
        let handle = engine.start();
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.shutdown().await;

        // Engine remains usable synchronously after shutdown
        assert_eq!(engine.drain_events(), 0);
    }

    #[tokio::test]
    async fn clear_memory_preempts_background_work() {
        let engine = DualMemoryEngine::new(fast_config());
        let handle = engine.start();

        engine
            .store(MemoryEvent::new(
                MemoryEventKind::BugFix,
                "u1",
                "s1",
                serde_json::json!({"component": "x", "fix": "y"}),
            ))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        engine.clear_memory();
        let stats = engine.get_statistics();
        assert_eq!(stats.system2.reflection_entries, 0);
        assert_eq!(engine.pending_events(), 0);

        handle.shutdown().await;
    }
}
