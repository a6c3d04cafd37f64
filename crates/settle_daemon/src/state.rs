use serde::{Deserialize, Serialize};
use settle_core::{Event, GameContent, WorldId};
use settle_store::MemoryStore;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// An event stamped with a global sequence number and the wall-clock time it
/// was published. Sequence numbers are strictly increasing across all
/// settlements, so clients can detect gaps after an SSE reconnect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub seq: u64,
    pub at_ms: u64,
    pub world: WorldId,
    pub event: Event,
}

/// Fan-out bus for simulation events. Slow subscribers lag and drop rather
/// than backpressure the scheduler.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
    seq: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    pub fn publish(&self, world: &WorldId, event: Event, at_ms: u64) {
        let envelope = EventEnvelope {
            seq: self.seq.fetch_add(1, Ordering::Relaxed) + 1,
            at_ms,
            world: world.clone(),
            event,
        };
        // Send fails only when no subscriber exists, which is fine.
        let _ = self.tx.send(envelope);
    }

    pub fn publish_all(&self, world: &WorldId, events: Vec<Event>, at_ms: u64) {
        for event in events {
            self.publish(world, event, at_ms);
        }
    }
}

/// Tick scheduler tuning, fixed at startup from CLI flags.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// How often the driver wakes up and looks for due settlements.
    pub pass_interval_ms: u64,
    /// Minimum elapsed time before a settlement is simulated again.
    pub settlement_interval_ms: u64,
    /// Maximum settlements simulated concurrently within one pass.
    pub parallelism: usize,
    /// Per-settlement budget; a settlement that blows it is skipped until
    /// the next pass.
    pub settlement_timeout_ms: u64,
    /// Settlements idle longer than this drop out of the tick rotation.
    pub activity_horizon_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pass_interval_ms: 100,
            settlement_interval_ms: 1_000,
            parallelism: 16,
            settlement_timeout_ms: 250,
            activity_horizon_ms: 3_600_000,
        }
    }
}

/// Monotonic counters for ids minted by the HTTP layer.
#[derive(Default)]
pub struct IdCounters {
    pub next_settlement: AtomicU64,
    pub next_disaster: AtomicU64,
}

impl IdCounters {
    pub fn settlement_id(&self) -> String {
        format!(
            "settlement_{:06}",
            self.next_settlement.fetch_add(1, Ordering::Relaxed) + 1
        )
    }

    pub fn disaster_id(&self) -> String {
        format!(
            "disaster_{:06}",
            self.next_disaster.fetch_add(1, Ordering::Relaxed) + 1
        )
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub content: Arc<GameContent>,
    pub bus: EventBus,
    pub paused: Arc<AtomicBool>,
    /// Completed scheduler passes, surfaced in /meta and heartbeats.
    pub passes: Arc<AtomicU64>,
    pub ids: Arc<IdCounters>,
    pub seed: u64,
    pub config: SchedulerConfig,
}

impl AppState {
    pub fn new(content: GameContent, seed: u64, config: SchedulerConfig) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            content: Arc::new(content),
            bus: EventBus::new(1024),
            paused: Arc::new(AtomicBool::new(false)),
            passes: Arc::new(AtomicU64::new(0)),
            ids: Arc::new(IdCounters::default()),
            seed,
            config,
        }
    }
}
