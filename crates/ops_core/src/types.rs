//! Type definitions for `ops_core`.
//!
//! State, content, command-free event types and ID newtypes shared by the
//! tick engine, the action handlers and the projection.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::history::HistoryWindow;

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(AssetId);
string_id!(EventId);

// ---------------------------------------------------------------------------
// Core enums
// ---------------------------------------------------------------------------

/// A reachable warehouse backend. `SourceConnection::Disconnected` is the
/// transient state between two of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Bq,
    Azure,
}

impl DataSource {
    pub fn other(self) -> Self {
        match self {
            DataSource::Bq => DataSource::Azure,
            DataSource::Azure => DataSource::Bq,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceConnection {
    Bq,
    Azure,
    Disconnected,
}

impl From<DataSource> for SourceConnection {
    fn from(source: DataSource) -> Self {
        match source {
            DataSource::Bq => SourceConnection::Bq,
            DataSource::Azure => SourceConnection::Azure,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveView {
    Dashboard,
    Forecast,
    Workforce,
    Maintenance,
}

impl ActiveView {
    pub const ALL: [Self; 4] = [
        Self::Dashboard,
        Self::Forecast,
        Self::Workforce,
        Self::Maintenance,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Forecast => "forecast",
            Self::Workforce => "workforce",
            Self::Maintenance => "maintenance",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Dashboard => "Operational Dashboard",
            Self::Forecast => "AI KPI Forecast",
            Self::Workforce => "Workforce Hub",
            Self::Maintenance => "Maintenance Scheduler",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|view| view.key() == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskFlag {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyCategory {
    LoadSpike,
    CapacityCritical,
}

impl AnomalyCategory {
    pub fn label(self) -> &'static str {
        match self {
            AnomalyCategory::LoadSpike => "Load Spike",
            AnomalyCategory::CapacityCritical => "Capacity Critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairTier {
    Minor,
    Moderate,
    Severe,
}

impl RepairTier {
    pub fn label(self) -> &'static str {
        match self {
            RepairTier::Minor => "Minor",
            RepairTier::Moderate => "Moderate",
            RepairTier::Severe => "Severe",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Rest,
    Train,
    Fix,
}

// ---------------------------------------------------------------------------
// State types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardState {
    pub meta: MetaState,
    pub clock: ClockState,
    pub savings: f64,
    /// Fixed roster; indices are stable for the life of the state.
    pub staff: Vec<StaffMember>,
    pub assets: Vec<Asset>,
    pub history: HistoryWindow,
    pub anomalies: AnomalyLog,
    pub connection: ConnectionState,
    pub view: ActiveView,
    pub chat: Option<ChatExchange>,
    /// Computed once at world-build time from the reference dataset.
    pub forecast: ForecastPanel,
    pub counters: Counters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaState {
    pub tick: u64,
    pub seed: u64,
    pub schema_version: u32,
    pub content_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockState {
    /// Simulated hour the next history sample is labelled with (0..=23).
    pub next_hour: u8,
    /// Wall-clock display, `HH:MM:SS`. Empty until the first clock tick.
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counters {
    pub next_event_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffMember {
    pub name: String,
    pub role: String,
    /// Always within `[0, 100]`.
    pub fatigue: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub name: String,
    pub kind: String,
    /// Never auto-heals; floor 0.
    pub health: f64,
    pub load: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyEntry {
    pub id: Uuid,
    pub message: String,
    pub category: AnomalyCategory,
    pub label: String,
}

/// Most-recent-first, bounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyLog {
    capacity: usize,
    entries: Vec<AnomalyEntry>,
}

impl AnomalyLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn record(&mut self, entry: AnomalyEntry) {
        self.entries.insert(0, entry);
        self.entries.truncate(self.capacity);
    }

    pub fn entries(&self) -> &[AnomalyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionState {
    pub current: SourceConnection,
    /// The backend the dashboard was last attached to; toggling targets its opposite.
    pub last_connected: DataSource,
    pub reconnect: Option<Reconnect>,
}

impl ConnectionState {
    pub fn connected(source: DataSource) -> Self {
        Self {
            current: source.into(),
            last_connected: source,
            reconnect: None,
        }
    }

    pub fn is_reconnecting(&self) -> bool {
        self.reconnect.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reconnect {
    pub target: DataSource,
    pub ticks_remaining: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatExchange {
    pub question: String,
    pub reply: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPanel {
    pub labels: Vec<String>,
    pub revenue_actual: Vec<Option<f64>>,
    pub revenue_forecast: Vec<Option<f64>>,
    pub leads_actual: Vec<Option<f64>>,
    pub leads_forecast: Vec<Option<f64>>,
    pub insight: ForecastInsight,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastInsight {
    pub last_revenue: f64,
    pub projected_revenue: f64,
    pub diff: f64,
    pub direction: TrendDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Up,
    Down,
}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub tick: u64,
    pub event: Event,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    LoadSampled {
        label: String,
        load: f64,
        predicted: Option<f64>,
    },
    /// The one-step prediction for this cycle was dropped; the tick continued.
    ForecastSkipped {
        reason: String,
    },
    AnomalyLogged {
        entry_id: Uuid,
        category: AnomalyCategory,
        load: f64,
    },
    StaffRested {
        index: usize,
        name: String,
    },
    TrainingAssigned {
        index: usize,
        name: String,
        cost: f64,
    },
    AssetRepaired {
        asset_id: AssetId,
        tier: RepairTier,
        savings_delta: f64,
    },
    SourceSwitching {
        from: SourceConnection,
        to: DataSource,
    },
    SourceConnected {
        source: DataSource,
    },
    ViewSwitched {
        view: ActiveView,
    },
    AlertRaised {
        alert_id: String,
        severity: AlertSeverity,
        message: String,
        suggested_action: String,
    },
    AlertCleared {
        alert_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertSeverity {
    Warning,
    Critical,
}

// ---------------------------------------------------------------------------
// Content types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardContent {
    pub content_version: String,
    pub constants: Constants,
    pub roster: RosterDef,
    /// Read-only historical sample; the last record is the "latest snapshot".
    pub reference: Vec<ReferenceRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterDef {
    pub starting_savings: f64,
    pub start_hour: u8,
    pub initial_source: DataSource,
    pub staff: Vec<StaffMember>,
    pub assets: Vec<Asset>,
    pub initial_history: Vec<HistorySeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySeed {
    pub label: String,
    pub load: f64,
}

/// One row of the embedded reference dataset. Percentage columns stay text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Daily_Revenue")]
    pub daily_revenue: f64,
    #[serde(rename = "New_Leads")]
    pub new_leads: f64,
    #[serde(rename = "Active_Users")]
    pub active_users: f64,
    #[serde(rename = "Avg_Employee_Mood_Score")]
    pub mood_score: f64,
    #[serde(rename = "Overtime_Hours_Logged")]
    pub overtime_hours: f64,
    #[serde(rename = "Code_Commits")]
    pub code_commits: f64,
    #[serde(rename = "System_Error_Rate")]
    pub system_error_rate: String,
    #[serde(rename = "Cloud_Cost")]
    pub cloud_cost: f64,
    #[serde(rename = "Risk_Flag")]
    pub risk_flag: RiskFlag,
}

impl ReferenceRecord {
    /// Numeric part of `system_error_rate`, e.g. `"2.50%"` → `2.5`.
    pub fn error_rate_pct(&self) -> Option<f64> {
        self.system_error_rate
            .trim()
            .trim_end_matches('%')
            .parse()
            .ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixSavingsPolicy {
    /// A repair is booked as avoided downtime: savings increase.
    AvoidedDowntime,
    /// A repair is booked as spend: savings decrease.
    RepairCost,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LoadModel {
    /// Integer load drawn uniformly from `min..=max`.
    Uniform { min: u32, max: u32 },
    /// Source baseline plus a sine over the tick count, plus uniform jitter.
    Sinusoid { frequency: f64, jitter: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProfile {
    pub display_name: String,
    pub accent: String,
    pub latency_ms: u32,
    pub base_load: f64,
    pub amplitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProfiles {
    pub bq: SourceProfile,
    pub azure: SourceProfile,
}

impl SourceProfiles {
    pub fn get(&self, source: DataSource) -> &SourceProfile {
        match source {
            DataSource::Bq => &self.bq,
            DataSource::Azure => &self.azure,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constants {
    // History & forecasting
    pub history_capacity: usize,
    pub forecast_horizon_days: usize,
    pub forecast_noise_fraction: f64,
    pub leads_chart_scale: f64,

    // Load sampling & anomalies
    pub load_model: LoadModel,
    pub anomaly_load_threshold: f64,
    pub anomaly_critical_load: f64,
    pub anomaly_log_capacity: usize,

    // Asset drift
    pub asset_load_jitter: f64,
    pub asset_nominal_load: f64,
    pub health_decay_min: f64,
    pub health_decay_max: f64,

    // Staff drift
    pub fatigue_gain_min: f64,
    pub fatigue_gain_max: f64,
    pub high_fatigue_threshold: f64,
    pub low_fatigue_threshold: f64,
    pub score_drift: f64,
    pub score_floor: f64,
    pub score_cap: f64,

    // Projection thresholds
    pub fatigue_risk_threshold: f64,
    pub health_risk_threshold: f64,
    pub train_score_threshold: f64,

    // Actions
    pub rest_score_bonus: f64,
    pub train_score_bonus: f64,
    pub train_cost: f64,
    pub fix_severe_below: f64,
    pub fix_moderate_below: f64,
    pub fix_severe_amount: f64,
    pub fix_moderate_amount: f64,
    pub fix_minor_amount: f64,
    pub fix_savings_policy: FixSavingsPolicy,

    // Data sources
    pub source_reconnect_ticks: u32,
    pub sources: SourceProfiles,
}
