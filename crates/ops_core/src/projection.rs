//! State → view model. Pure: no mutation, no randomness, so two calls with
//! no intervening change produce equal views.

use serde::Serialize;

use crate::{
    ActionKind, AnomalyEntry, ChatExchange, Constants, DashboardContent, DashboardState,
    ForecastPanel, ReferenceRecord, RepairTier, RiskFlag, SourceConnection, TrendDirection,
};

const ERROR_RATE_RISK_PCT: f64 = 1.0;
const OVERTIME_RISK_HOURS: f64 = 30.0;
const MOOD_RISK_SCORE: f64 = 7.0;

// ---------------------------------------------------------------------------
// View types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub tick: u64,
    pub header: ViewHeader,
    pub kpis: Kpis,
    pub source: SourceBadge,
    pub staff_rows: Vec<StaffRow>,
    pub asset_rows: Vec<AssetRow>,
    pub advisory: Advisory,
    pub load_chart: LoadChart,
    pub reference: Option<ReferenceSnapshot>,
    pub forecast: ForecastPanel,
    pub anomalies: Vec<AnomalyEntry>,
    pub chat: Option<ChatExchange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewHeader {
    pub key: &'static str,
    pub title: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub current_load: Option<f64>,
    pub current_load_text: String,
    pub savings: f64,
    pub savings_text: String,
    pub at_risk_count: usize,
    pub clock: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceBadge {
    pub connection: SourceConnection,
    pub name: String,
    pub accent: String,
    /// Synthetic latency of the attached backend; absent while reconnecting.
    pub latency_ms: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowClass {
    Normal,
    Risk,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendedAction {
    pub kind: ActionKind,
    pub label: &'static str,
    pub tier: Option<RepairTier>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffRow {
    pub index: usize,
    pub name: String,
    pub role: String,
    pub fatigue: f64,
    pub score: f64,
    pub row_class: RowClass,
    pub action: Option<RecommendedAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetRow {
    pub index: usize,
    pub id: String,
    pub name: String,
    pub kind: String,
    pub health: f64,
    pub load: f64,
    pub row_class: RowClass,
    pub action: Option<RecommendedAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryLevel {
    Critical,
    Warning,
    Nominal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advisory {
    pub level: AdvisoryLevel,
    pub headline: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadChart {
    pub labels: Vec<String>,
    pub actual: Vec<f64>,
    pub predicted: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Danger,
    Caution,
    Ok,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceSnapshot {
    pub date: String,
    pub revenue_text: String,
    pub leads: f64,
    pub active_users: f64,
    pub error_rate: String,
    pub risk_flag: RiskFlag,
    pub risk_reasons: Vec<&'static str>,
    pub details: String,
    pub tone: Tone,
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

pub fn project(state: &DashboardState, content: &DashboardContent) -> DashboardView {
    let constants = &content.constants;
    let at_risk_count = at_risk_count(state, constants);
    let latest_record = content.reference.last();
    let current_load = state.history.latest();

    DashboardView {
        tick: state.meta.tick,
        header: ViewHeader {
            key: state.view.key(),
            title: state.view.title(),
        },
        kpis: Kpis {
            current_load,
            current_load_text: current_load.map_or_else(|| "--".to_string(), |l| format!("{l:.0}%")),
            savings: state.savings,
            savings_text: format_currency(state.savings),
            at_risk_count,
            clock: state.clock.label.clone(),
        },
        source: source_badge(state, constants),
        staff_rows: staff_rows(state, constants),
        asset_rows: asset_rows(state, constants),
        advisory: advisory(latest_record, at_risk_count, state.forecast.insight.direction),
        load_chart: LoadChart {
            labels: state.history.labels().iter().cloned().collect(),
            actual: state.history.actual_series(),
            predicted: state.history.predicted().iter().copied().collect(),
        },
        reference: latest_record.map(reference_snapshot),
        forecast: state.forecast.clone(),
        anomalies: state.anomalies.entries().to_vec(),
        chat: state.chat.clone(),
    }
}

/// Staff above the fatigue threshold plus assets below the health threshold.
pub fn at_risk_count(state: &DashboardState, constants: &Constants) -> usize {
    let tired = state
        .staff
        .iter()
        .filter(|m| m.fatigue > constants.fatigue_risk_threshold)
        .count();
    let failing = state
        .assets
        .iter()
        .filter(|a| a.health < constants.health_risk_threshold)
        .count();
    tired + failing
}

/// Whole-dollar amount with thousands separators, e.g. `$450,000`.
pub fn format_currency(amount: f64) -> String {
    let rounded = amount.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

fn source_badge(state: &DashboardState, constants: &Constants) -> SourceBadge {
    let connection = state.connection.current;
    match connection {
        SourceConnection::Disconnected => SourceBadge {
            connection,
            name: "Reconnecting…".to_string(),
            accent: "muted".to_string(),
            latency_ms: None,
        },
        SourceConnection::Bq | SourceConnection::Azure => {
            let profile = constants.sources.get(state.connection.last_connected);
            SourceBadge {
                connection,
                name: profile.display_name.clone(),
                accent: profile.accent.clone(),
                latency_ms: Some(profile.latency_ms),
            }
        }
    }
}

fn staff_rows(state: &DashboardState, constants: &Constants) -> Vec<StaffRow> {
    state
        .staff
        .iter()
        .enumerate()
        .map(|(index, member)| {
            let at_risk = member.fatigue > constants.fatigue_risk_threshold;
            let action = if at_risk {
                Some(RecommendedAction {
                    kind: ActionKind::Rest,
                    label: "REST",
                    tier: None,
                })
            } else if member.score < constants.train_score_threshold {
                Some(RecommendedAction {
                    kind: ActionKind::Train,
                    label: "TRAIN",
                    tier: None,
                })
            } else {
                None
            };
            StaffRow {
                index,
                name: member.name.clone(),
                role: member.role.clone(),
                fatigue: member.fatigue.round(),
                score: member.score.round(),
                row_class: if at_risk { RowClass::Risk } else { RowClass::Normal },
                action,
            }
        })
        .collect()
}

fn asset_rows(state: &DashboardState, constants: &Constants) -> Vec<AssetRow> {
    state
        .assets
        .iter()
        .enumerate()
        .map(|(index, asset)| {
            let at_risk = asset.health < constants.health_risk_threshold;
            AssetRow {
                index,
                id: asset.id.0.clone(),
                name: asset.name.clone(),
                kind: asset.kind.clone(),
                health: asset.health.floor(),
                load: asset.load.round(),
                row_class: if at_risk { RowClass::Risk } else { RowClass::Normal },
                action: at_risk.then(|| RecommendedAction {
                    kind: ActionKind::Fix,
                    label: "FIX",
                    tier: Some(crate::repair_tier(asset.health, constants)),
                }),
            }
        })
        .collect()
}

fn advisory(
    latest: Option<&ReferenceRecord>,
    at_risk_count: usize,
    trend: TrendDirection,
) -> Advisory {
    if let Some(record) = latest.filter(|r| r.risk_flag == RiskFlag::Critical) {
        return Advisory {
            level: AdvisoryLevel::Critical,
            headline: "CRITICAL",
            message: format!(
                "Risk Flag is {:?}. {at_risk_count} active risks detected.",
                record.risk_flag
            ),
        };
    }
    if at_risk_count > 0 {
        return Advisory {
            level: AdvisoryLevel::Warning,
            headline: "WARNING",
            message: format!(
                "{at_risk_count} active risks detected. Review workforce and maintenance queues."
            ),
        };
    }
    let outlook = match trend {
        TrendDirection::Up => "Forecast suggests growth.",
        TrendDirection::Down => "Forecast suggests a slowdown.",
    };
    Advisory {
        level: AdvisoryLevel::Nominal,
        headline: "OPTIMAL",
        message: format!("Systems running smoothly. {outlook}"),
    }
}

fn reference_snapshot(record: &ReferenceRecord) -> ReferenceSnapshot {
    let mut risk_reasons = Vec::new();
    if record
        .error_rate_pct()
        .is_some_and(|pct| pct > ERROR_RATE_RISK_PCT)
    {
        risk_reasons.push("High Error Rate");
    }
    if record.overtime_hours > OVERTIME_RISK_HOURS {
        risk_reasons.push("High Overtime");
    }
    if record.mood_score < MOOD_RISK_SCORE {
        risk_reasons.push("Low Morale");
    }

    let details = if risk_reasons.is_empty() {
        "No threats detected.".to_string()
    } else {
        format!("Causes: {}", risk_reasons.join(", "))
    };
    let tone = match record.risk_flag {
        RiskFlag::Critical => Tone::Danger,
        RiskFlag::High => Tone::Caution,
        RiskFlag::Low | RiskFlag::Medium => Tone::Ok,
    };

    ReferenceSnapshot {
        date: record.date.format("%Y-%m-%d").to_string(),
        revenue_text: format_currency(record.daily_revenue),
        leads: record.new_leads,
        active_users: record.active_users,
        error_rate: record.system_error_rate.clone(),
        risk_flag: record.risk_flag,
        risk_reasons,
        details,
        tone,
    }
}
