use crate::alerts::AlertEngine;
use ops_control::{AutoOperator, OperatorMode};
use ops_core::{DashboardContent, DashboardState, DashboardView, EventEnvelope, MetricsSnapshot};
use parking_lot::Mutex;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Snapshots kept for the alert rules and `/api/v1/metrics`.
pub const METRICS_HISTORY_CAPACITY: usize = 120;

pub struct DashboardSim {
    pub state: DashboardState,
    pub content: DashboardContent,
    pub rng: ChaCha8Rng,
    pub operator_mode: OperatorMode,
    pub auto_operator: AutoOperator,
    pub metrics_history: VecDeque<MetricsSnapshot>,
    pub alert_engine: AlertEngine,
}

impl DashboardSim {
    pub fn new(
        state: DashboardState,
        content: DashboardContent,
        rng: ChaCha8Rng,
        operator_mode: OperatorMode,
    ) -> Self {
        let alert_engine = AlertEngine::new(content.constants.anomaly_load_threshold);
        Self {
            state,
            content,
            rng,
            operator_mode,
            auto_operator: AutoOperator::default(),
            metrics_history: VecDeque::with_capacity(METRICS_HISTORY_CAPACITY),
            alert_engine,
        }
    }

    pub fn push_metrics(&mut self, snapshot: MetricsSnapshot) {
        if self.metrics_history.len() >= METRICS_HISTORY_CAPACITY {
            self.metrics_history.pop_front();
        }
        self.metrics_history.push_back(snapshot);
    }

    /// Rebuilds the state from content with a fresh RNG; alerts and metrics start over.
    pub fn reset(&mut self, seed: u64) -> anyhow::Result<()> {
        let (state, rng) = ops_world::new_run(&self.content, seed)?;
        self.state = state;
        self.rng = rng;
        self.metrics_history.clear();
        self.alert_engine = AlertEngine::new(self.content.constants.anomaly_load_threshold);
        Ok(())
    }
}

/// One push to SSE subscribers: what happened and what the dashboard now shows.
#[derive(Debug, Clone, Serialize)]
pub struct StreamFrame {
    pub events: Vec<EventEnvelope>,
    pub view: DashboardView,
}

pub type SharedSim = Arc<Mutex<DashboardSim>>;
pub type FrameTx = broadcast::Sender<StreamFrame>;

#[derive(Clone)]
pub struct AppState {
    pub sim: SharedSim,
    pub frame_tx: FrameTx,
    pub paused: Arc<AtomicBool>,
    pub tick_period: Duration,
}

impl AppState {
    /// Re-projects and broadcasts after a mutation outside the tick loop.
    /// Sending fails only when nobody is subscribed.
    pub fn publish(&self, sim: &DashboardSim, events: Vec<EventEnvelope>) {
        let view = ops_core::project(&sim.state, &sim.content);
        let _ = self.frame_tx.send(StreamFrame { events, view });
    }
}
