// ── Engine: Dual Memory Router (Façade) ────────────────────────────────────
//
// The single entry point external collaborators use: `query`, `store`,
// `learn`, `recall`, `clear_memory`, plus metrics/statistics and hot config
// reload. Selects which store(s) answer a given query, merges results, and
// maintains the short-lived response cache and operation metrics.
//
// Concurrency model: the two stores live behind RwLocks inside one shared
// Arc. Structural mutation (inserts, eviction, tree growth) happens under
// the write side (the single coarse mutual-exclusion region) while the
// Coordinator's Sync and Optimize phases additionally serialize on the
// `maintenance` mutex. Query-path reinforcement takes a short write lock;
// readers tolerate staleness of at most one maintenance interval.
// `clear_memory` preempts an in-flight maintenance cycle via the cancel
// flag, which the Coordinator checks between phases.

use crate::atoms::error::{MemoryError, MemoryResult};
use crate::atoms::types::{
    EngineConfig, EngineMetrics, EngineStatistics, MemoryEvent, MemoryEventKind, MemoryHit,
    MemoryQuery, MemoryQueryType, MemoryResponse, ResponseSource,
};
use crate::engine::cache::ResponseCache;
use crate::engine::queue::EventQueue;
use crate::engine::scheduler::{self, EngineHandle};
use crate::engine::strategy::{self, StrategyDecision};
use crate::engine::system1::System1Store;
use crate::engine::system2::System2Store;
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ═════════════════════════════════════════════════════════════════════════════
// Constants
// ═════════════════════════════════════════════════════════════════════════════

/// Tag marking events the `learn` hot path already applied to System 1.
pub const HOT_PATH_TAG: &str = "hot_path_applied";

/// How many recently drained events the Coordinator can look back over.
const RECENT_EVENTS_CAP: usize = 64;

/// Over-fetch factor when text-matching System 2 traces before ranking.
const TRACE_CANDIDATE_FACTOR: usize = 4;

// ═════════════════════════════════════════════════════════════════════════════
// Shared Engine State
// ═════════════════════════════════════════════════════════════════════════════

/// Everything the router, the background loops, and the Coordinator share.
/// Handles are passed explicitly; there are no ambient globals.
pub(crate) struct EngineShared {
    pub system1: RwLock<System1Store>,
    pub system2: RwLock<System2Store>,
    /// Serializes Coordinator Sync and Optimize phases.
    pub maintenance: Mutex<()>,
    /// Checked between maintenance phases; set by `clear_memory`.
    pub cancel: AtomicBool,
    pub queue: EventQueue,
    pub cache: Mutex<ResponseCache>,
    pub metrics: Mutex<EngineMetrics>,
    pub config: RwLock<EngineConfig>,
    /// Ring of recently drained events for behavior adaptation.
    pub recent_events: Mutex<VecDeque<MemoryEvent>>,
}

impl EngineShared {
    /// Process one bounded batch from the event queue, routing each event
    /// to the store handler tables. Returns how many events were processed.
    pub(crate) fn drain_once(&self) -> usize {
        let batch_size = self.config.read().drain_batch_size;
        let events = self.queue.drain_batch(batch_size);
        if events.is_empty() {
            return 0;
        }

        let mut s1_ops = 0u64;
        let mut s2_ops = 0u64;
        for event in &events {
            {
                let mut recent = self.recent_events.lock();
                recent.push_back(event.clone());
                while recent.len() > RECENT_EVENTS_CAP {
                    recent.pop_front();
                }
            }

            let system1_relevant = matches!(
                event.kind,
                MemoryEventKind::CodeGeneration
                    | MemoryEventKind::PatternRecognition
                    | MemoryEventKind::LearningUpdate
                    | MemoryEventKind::CommandExecution
            );
            if system1_relevant && !event.has_tag(HOT_PATH_TAG) {
                self.system1.write().process_event(event);
                s1_ops += 1;
            }

            self.system2.write().process_event(event);
            s2_ops += 1;
        }

        let mut metrics = self.metrics.lock();
        metrics.system1_operations += s1_ops;
        metrics.system2_operations += s2_ops;
        drop(metrics);

        debug!("[router] Drained {} events", events.len());
        events.len()
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Dual Memory Engine
// ═════════════════════════════════════════════════════════════════════════════

/// The engine façade. Clone is cheap (Arc clone); all clones address the
/// same underlying stores.
#[derive(Clone)]
pub struct DualMemoryEngine {
    shared: Arc<EngineShared>,
}

impl DualMemoryEngine {
    pub fn new(config: EngineConfig) -> Self {
        let shared = EngineShared {
            system1: RwLock::new(System1Store::new(&config)),
            system2: RwLock::new(System2Store::new(&config)),
            maintenance: Mutex::new(()),
            cancel: AtomicBool::new(false),
            queue: EventQueue::new(config.event_queue_capacity),
            cache: Mutex::new(ResponseCache::new(
                Duration::from_secs(config.cache_ttl_secs),
                config.cache_capacity,
            )),
            metrics: Mutex::new(EngineMetrics::default()),
            config: RwLock::new(config),
            recent_events: Mutex::new(VecDeque::new()),
        };
        Self { shared: Arc::new(shared) }
    }

    pub(crate) fn shared(&self) -> Arc<EngineShared> {
        self.shared.clone()
    }

    /// Spawn the background loops (event drain, sync timer, optimization
    /// timer). The returned handle stops them.
    pub fn start(&self) -> EngineHandle {
        scheduler::spawn_background(self.shared.clone())
    }

    // ── Read path ───────────────────────────────────────────────────────

    /// Answer a query. Strategy selection decides which store(s) to
    /// consult; a fresh cache entry short-circuits everything.
    pub fn query(&self, query: &MemoryQuery) -> MemoryResult<MemoryResponse> {
        let started = Instant::now();

        if query.text.trim().is_empty() && query.embedding.is_none() {
            self.count_error();
            return Err(MemoryError::validation("query needs text or an embedding"));
        }

        let key = ResponseCache::key_for(query);
        let (cached, cache_warm) = {
            let cache = self.shared.cache.lock();
            (cache.get(&key), !cache.is_empty())
        };
        if let Some(response) = cached {
            let mut metrics = self.shared.metrics.lock();
            metrics.total_operations += 1;
            metrics.cache_hits += 1;
            metrics.record_latency(started.elapsed().as_millis() as u64);
            return Ok(response);
        }

        let (margin, blend_w1) = {
            let config = self.shared.config.read();
            (config.single_system_margin, config.blend_weight_system1)
        };
        let decision = strategy::select_strategy(query, cache_warm, margin);
        debug!(
            "[router] strategy s1={:.2} s2={:.2} route={:?}",
            decision.system1_score, decision.system2_score, decision.route
        );

        let mut response = self.execute(query, &decision, blend_w1);
        response.latency_ms = started.elapsed().as_millis() as u64;
        response.cached = false;

        {
            let mut metrics = self.shared.metrics.lock();
            metrics.total_operations += 1;
            metrics.cache_misses += 1;
            match response.source {
                ResponseSource::System1 => metrics.system1_operations += 1,
                ResponseSource::System2 => metrics.system2_operations += 1,
                ResponseSource::Both => {
                    metrics.system1_operations += 1;
                    metrics.system2_operations += 1;
                }
            }
            metrics.record_latency(response.latency_ms);
        }

        self.shared.cache.lock().insert(key, response.clone());
        Ok(response)
    }

    fn execute(
        &self,
        query: &MemoryQuery,
        decision: &StrategyDecision,
        blend_w1: f64,
    ) -> MemoryResponse {
        match decision.route {
            ResponseSource::System1 => self.query_system1(query),
            ResponseSource::System2 => self.query_system2(query),
            ResponseSource::Both => {
                let fast = self.query_system1(query);
                let validated = self.query_system2(query);
                let confidence =
                    strategy::blend_confidence(fast.confidence, validated.confidence, blend_w1);

                let mut suggestions = fast.suggestions;
                for s in validated.suggestions {
                    if !suggestions.contains(&s) {
                        suggestions.push(s);
                    }
                }

                MemoryResponse {
                    query_id: uuid::Uuid::new_v4().to_string(),
                    source: ResponseSource::Both,
                    confidence,
                    cached: false,
                    latency_ms: 0,
                    hits: strategy::merge_hits(fast.hits, validated.hits, query.limit),
                    suggestions,
                }
            }
        }
    }

    /// System 1 contributes fast, similarity-ranked candidates.
    fn query_system1(&self, query: &MemoryQuery) -> MemoryResponse {
        let embedding = query.embedding.as_deref().unwrap_or(&[]);
        let mut system1 = self.shared.system1.write();

        let nodes = system1.search_nodes(&query.text, embedding, query.limit);
        let mut hits: Vec<MemoryHit> = nodes
            .iter()
            .map(|node| MemoryHit {
                id: node.id.clone(),
                source: ResponseSource::System1,
                label: node.name.clone(),
                content: node.content.clone(),
                score: node.confidence,
            })
            .collect();

        if query.query_type == MemoryQueryType::Pattern {
            for pattern in system1.find_code_patterns(None, None, None, query.limit) {
                hits.push(MemoryHit {
                    id: pattern.id.clone(),
                    source: ResponseSource::System1,
                    label: pattern.name.clone(),
                    content: pattern.content.clone(),
                    score: pattern.relevance,
                });
            }
            hits.truncate(query.limit);
        }

        let suggestions: Vec<String> = system1
            .find_code_patterns(None, None, None, 3)
            .into_iter()
            .map(|p| p.name)
            .collect();

        let confidence = if hits.is_empty() {
            0.0
        } else {
            hits.iter().map(|h| h.score).sum::<f64>() / hits.len() as f64
        };

        MemoryResponse {
            query_id: uuid::Uuid::new_v4().to_string(),
            source: ResponseSource::System1,
            confidence,
            cached: false,
            latency_ms: 0,
            hits,
            suggestions,
        }
    }

    /// System 2 contributes validated, quality-scored context.
    fn query_system2(&self, query: &MemoryQuery) -> MemoryResponse {
        let system2 = self.shared.system2.read();

        let candidates = system2.search_traces(
            None,
            None,
            None,
            None,
            query.limit.max(1) * TRACE_CANDIDATE_FACTOR,
        );

        let mut hits: Vec<MemoryHit> = candidates
            .iter()
            .filter_map(|trace| {
                let overlap = word_overlap(&query.text, &trace.context.problem);
                if overlap <= 0.0 {
                    return None;
                }
                let quality = trace.metadata.quality_score;
                Some(MemoryHit {
                    id: trace.id.clone(),
                    source: ResponseSource::System2,
                    label: trace.context.problem.clone(),
                    content: trace
                        .conclusion
                        .clone()
                        .or_else(|| trace.steps.last().map(|s| s.description.clone()))
                        .unwrap_or_default(),
                    score: overlap * 0.6 + quality * 0.4,
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(query.limit);

        let suggestions: Vec<String> = system2
            .get_enhancements_by_status(crate::atoms::system2_types::EnhancementStatus::Proposed)
            .into_iter()
            .take(2)
            .map(|e| e.title)
            .collect();

        let confidence = if hits.is_empty() {
            0.0
        } else {
            hits.iter().map(|h| h.score).sum::<f64>() / hits.len() as f64
        };

        MemoryResponse {
            query_id: uuid::Uuid::new_v4().to_string(),
            source: ResponseSource::System2,
            confidence,
            cached: false,
            latency_ms: 0,
            hits,
            suggestions,
        }
    }

    /// Thin adapter over `query` for callers that only want raw hits.
    pub fn recall(
        &self,
        text: &str,
        query_type: MemoryQueryType,
        limit: usize,
    ) -> MemoryResult<Vec<serde_json::Value>> {
        let query = MemoryQuery::new(query_type, text).with_limit(limit);
        let response = self.query(&query)?;
        response
            .hits
            .into_iter()
            .map(|hit| serde_json::to_value(hit).map_err(MemoryError::from))
            .collect()
    }

    // ── Write path ──────────────────────────────────────────────────────

    /// Fire-and-forget ingestion: validate and enqueue. Never blocks the
    /// caller beyond the enqueue.
    pub fn store(&self, event: MemoryEvent) -> MemoryResult<()> {
        let result = self.shared.queue.push(event);
        let mut metrics = self.shared.metrics.lock();
        metrics.total_operations += 1;
        if result.is_err() {
            metrics.errors += 1;
        }
        result
    }

    /// Convenience wrapper: synthesizes a `MemoryEvent` and, on success,
    /// feeds System 1 pattern extraction directly: the hot path that keeps
    /// immediate auto-complete quality current without waiting for the
    /// queue drain.
    pub fn learn(
        &self,
        input: &str,
        output: &str,
        context: &str,
        success: bool,
    ) -> MemoryResult<()> {
        let kind = if success { MemoryEventKind::CodeGeneration } else { MemoryEventKind::BugFix };
        let mut event = MemoryEvent::new(
            kind,
            "learn",
            "learn",
            serde_json::json!({
                "input": input,
                "output": output,
                "code": output,
                "context": context,
            }),
        );

        if success {
            self.shared.system1.write().extract_code_pattern(&event);
            self.shared.metrics.lock().system1_operations += 1;
            event.metadata.tags.push(HOT_PATH_TAG.to_string());
        }

        self.store(event)
    }

    /// Drop all caches and store contents. Preempts in-flight maintenance
    /// (the cancel flag is observed between phases) and leaves both stores
    /// in a valid empty state, never a partial reset.
    pub fn clear_memory(&self) {
        self.shared.cancel.store(true, Ordering::SeqCst);
        let _guard = self.shared.maintenance.lock();

        self.shared.system1.write().clear();
        self.shared.system2.write().clear();
        self.shared.queue.clear();
        self.shared.cache.lock().clear();
        self.shared.recent_events.lock().clear();
        *self.shared.metrics.lock() = EngineMetrics::default();

        self.shared.cancel.store(false, Ordering::SeqCst);
        info!("[router] ✓ Memory cleared");
    }

    // ── Maintenance & diagnostics ───────────────────────────────────────

    /// Process one bounded batch from the event queue. The background
    /// drain loop calls this on a timer; tests may call it directly.
    pub fn drain_events(&self) -> usize {
        self.shared.drain_once()
    }

    pub fn get_metrics(&self) -> EngineMetrics {
        self.shared.metrics.lock().clone()
    }

    pub fn get_statistics(&self) -> EngineStatistics {
        EngineStatistics {
            system1: self.shared.system1.read().stats(),
            system2: self.shared.system2.read().stats(),
            performance: self.get_metrics(),
        }
    }

    pub fn pending_events(&self) -> usize {
        self.shared.queue.len()
    }

    /// Hot-reload the configuration; stores and cache re-read their
    /// tunables immediately.
    pub fn update_config(&self, new_config: EngineConfig) {
        self.shared.system1.write().apply_config(&new_config);
        self.shared.system2.write().apply_config(&new_config);
        self.shared
            .cache
            .lock()
            .set_ttl(Duration::from_secs(new_config.cache_ttl_secs));
        *self.shared.config.write() = new_config;
        info!("[router] Configuration reloaded");
    }

    pub fn config(&self) -> EngineConfig {
        self.shared.config.read().clone()
    }

    fn count_error(&self) {
        let mut metrics = self.shared.metrics.lock();
        metrics.total_operations += 1;
        metrics.errors += 1;
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Helpers
// ═════════════════════════════════════════════════════════════════════════════

/// Word-level overlap between the query and a trace problem statement.
fn word_overlap(a: &str, b: &str) -> f64 {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    let a_words: HashSet<&str> = a_lower.split_whitespace().collect();
    let b_words: HashSet<&str> = b_lower.split_whitespace().collect();
    if a_words.is_empty() || b_words.is_empty() {
        return 0.0;
    }
    let hits = a_words.intersection(&b_words).count();
    hits as f64 / a_words.len().max(b_words.len()) as f64
}

// ═════════════════════════════════════════════════════════════════════════════
// Tests
// ═════════════════════════════════════════════════════════════════════════════
