//! `ops_core`: deterministic operations-dashboard state and tick.
//!
//! No IO, no network. All randomness via the passed-in Rng.

mod actions;
mod chat;
mod engine;
mod error;
pub mod forecast;
mod history;
mod id;
pub mod metrics;
mod projection;
mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

pub use actions::{
    commit_action, propose_action, repair_savings_delta, repair_tier, switch_view, toggle_source,
    ActionProposal,
};
pub use chat::{respond, send_chat_message, HELP_REPLY};
pub use engine::{clock_tick, tick};
pub use error::{ActionError, ConfigurationError, ForecastError};
pub use forecast::{build_forecast_panel, fit_and_predict, predict_next, LinearTrend};
pub use history::{HistoryWindow, Sample};
pub use id::generate_uuid;
pub use metrics::{compute_metrics, MetricsFileWriter, MetricsSnapshot};
pub use projection::{
    at_risk_count, format_currency, project, Advisory, AdvisoryLevel, AssetRow, DashboardView,
    Kpis, LoadChart, RecommendedAction, ReferenceSnapshot, RowClass, SourceBadge, StaffRow,
    Tone, ViewHeader,
};
pub use types::*;

pub(crate) fn emit(counters: &mut Counters, tick: u64, event: Event) -> EventEnvelope {
    let id = EventId(format!("evt_{:06}", counters.next_event_id));
    counters.next_event_id += 1;
    EventEnvelope { id, tick, event }
}
