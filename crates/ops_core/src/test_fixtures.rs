//! Shared test fixtures for ops_core and downstream crates.
//!
//! `base_content()` mirrors the shipped `content/` directory: four staff,
//! three assets, a five-sample load window and the fifteen-day reference
//! dataset. `base_state()` builds the matching tick-0 state.

use crate::{
    ActiveView, AnomalyLog, Asset, AssetId, ClockState, ConnectionState, Constants, Counters,
    DashboardContent, DashboardState, DataSource, FixSavingsPolicy, ForecastInsight,
    ForecastPanel, HistorySeed, HistoryWindow, LoadModel, MetaState, ReferenceRecord, RiskFlag,
    RosterDef, SourceProfile, SourceProfiles, StaffMember, TrendDirection,
};
use chrono::NaiveDate;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub fn base_constants() -> Constants {
    Constants {
        history_capacity: 5,
        forecast_horizon_days: 7,
        forecast_noise_fraction: 0.05,
        leads_chart_scale: 300.0,
        load_model: LoadModel::Uniform { min: 50, max: 79 },
        anomaly_load_threshold: 75.0,
        anomaly_critical_load: 90.0,
        anomaly_log_capacity: 5,
        asset_load_jitter: 5.0,
        asset_nominal_load: 40.0,
        health_decay_min: 1.0,
        health_decay_max: 1.0,
        fatigue_gain_min: 0.0,
        fatigue_gain_max: 2.0,
        high_fatigue_threshold: 80.0,
        low_fatigue_threshold: 30.0,
        score_drift: 0.5,
        score_floor: 0.0,
        score_cap: 100.0,
        fatigue_risk_threshold: 80.0,
        health_risk_threshold: 50.0,
        train_score_threshold: 70.0,
        rest_score_bonus: 5.0,
        train_score_bonus: 10.0,
        train_cost: 500.0,
        fix_severe_below: 50.0,
        fix_moderate_below: 80.0,
        fix_severe_amount: 5000.0,
        fix_moderate_amount: 2500.0,
        fix_minor_amount: 1000.0,
        fix_savings_policy: FixSavingsPolicy::AvoidedDowntime,
        source_reconnect_ticks: 1,
        sources: SourceProfiles {
            bq: SourceProfile {
                display_name: "Google BigQuery".to_string(),
                accent: "blue".to_string(),
                latency_ms: 120,
                base_load: 55.0,
                amplitude: 15.0,
            },
            azure: SourceProfile {
                display_name: "Azure Synapse".to_string(),
                accent: "sky".to_string(),
                latency_ms: 180,
                base_load: 65.0,
                amplitude: 10.0,
            },
        },
    }
}

fn staff(name: &str, role: &str, fatigue: f64, score: f64) -> StaffMember {
    StaffMember {
        name: name.to_string(),
        role: role.to_string(),
        fatigue,
        score,
    }
}

fn asset(id: &str, name: &str, kind: &str, health: f64, load: f64) -> Asset {
    Asset {
        id: AssetId(id.to_string()),
        name: name.to_string(),
        kind: kind.to_string(),
        health,
        load,
    }
}

pub fn base_roster() -> RosterDef {
    RosterDef {
        starting_savings: 450_000.0,
        start_hour: 14,
        initial_source: DataSource::Bq,
        staff: vec![
            staff("Sarah J.", "Engineer", 20.0, 95.0),
            staff("Mike R.", "Logistics", 85.0, 60.0),
            staff("Jessica T.", "Sales", 40.0, 88.0),
            staff("David B.", "Manager", 55.0, 75.0),
        ],
        assets: vec![
            asset("ast_server_a", "Server Cluster A", "IT", 98.0, 62.0),
            asset("ast_assembly_1", "Assembly Line 1", "Factory", 45.0, 74.0),
            asset("ast_truck_4", "Delivery Truck 4", "Fleet", 80.0, 35.0),
        ],
        initial_history: [
            ("09:00", 45.0),
            ("10:00", 50.0),
            ("11:00", 48.0),
            ("12:00", 55.0),
            ("13:00", 60.0),
        ]
        .into_iter()
        .map(|(label, load)| HistorySeed {
            label: label.to_string(),
            load,
        })
        .collect(),
    }
}

/// The fifteen days of 2025-11-01..=2025-11-15 shipped in `reference_dataset.csv`.
pub fn reference_records() -> Vec<ReferenceRecord> {
    #[rustfmt::skip]
    let rows: [(u32, f64, f64, f64, f64, f64, f64, &str, f64, RiskFlag); 15] = [
        (1, 15400.0, 45.0, 1250.0, 8.5, 12.0, 85.0, "0.02%", 450.0, RiskFlag::Low),
        (2, 16200.0, 52.0, 1310.0, 8.4, 15.0, 92.0, "0.02%", 465.0, RiskFlag::Low),
        (3, 15800.0, 48.0, 1290.0, 8.2, 18.0, 88.0, "0.05%", 460.0, RiskFlag::Low),
        (4, 14500.0, 41.0, 1200.0, 7.9, 25.0, 110.0, "0.12%", 510.0, RiskFlag::Medium),
        (5, 13200.0, 35.0, 1150.0, 7.1, 42.0, 145.0, "2.50%", 850.0, RiskFlag::High),
        (6, 12800.0, 30.0, 1100.0, 6.5, 55.0, 160.0, "3.20%", 920.0, RiskFlag::Critical),
        (7, 13500.0, 38.0, 1180.0, 6.8, 48.0, 130.0, "1.80%", 780.0, RiskFlag::High),
        (8, 14900.0, 44.0, 1240.0, 7.2, 30.0, 105.0, "0.50%", 600.0, RiskFlag::Medium),
        (9, 15600.0, 50.0, 1295.0, 7.8, 20.0, 95.0, "0.15%", 490.0, RiskFlag::Low),
        (10, 16500.0, 55.0, 1350.0, 8.1, 14.0, 90.0, "0.05%", 470.0, RiskFlag::Low),
        (11, 17100.0, 58.0, 1380.0, 8.3, 12.0, 88.0, "0.04%", 475.0, RiskFlag::Low),
        (12, 16800.0, 56.0, 1370.0, 8.2, 16.0, 92.0, "0.08%", 480.0, RiskFlag::Low),
        (13, 17500.0, 62.0, 1420.0, 8.0, 22.0, 100.0, "0.10%", 520.0, RiskFlag::Medium),
        (14, 18200.0, 65.0, 1450.0, 7.6, 35.0, 125.0, "0.45%", 610.0, RiskFlag::Medium),
        (15, 19000.0, 70.0, 1500.0, 7.4, 40.0, 135.0, "0.90%", 700.0, RiskFlag::High),
    ];
    rows.into_iter()
        .map(
            |(day, revenue, leads, users, mood, overtime, commits, errors, cost, flag)| {
                ReferenceRecord {
                    date: NaiveDate::from_ymd_opt(2025, 11, day).expect("valid November date"),
                    daily_revenue: revenue,
                    new_leads: leads,
                    active_users: users,
                    mood_score: mood,
                    overtime_hours: overtime,
                    code_commits: commits,
                    system_error_rate: errors.to_string(),
                    cloud_cost: cost,
                    risk_flag: flag,
                }
            },
        )
        .collect()
}

pub fn base_content() -> DashboardContent {
    DashboardContent {
        content_version: "test".to_string(),
        constants: base_constants(),
        roster: base_roster(),
        reference: reference_records(),
    }
}

/// Tick-0 state for `content`. The forecast panel is computed with a fixed
/// seed so fixtures do not disturb the caller's RNG.
pub fn base_state(content: &DashboardContent) -> DashboardState {
    let roster = &content.roster;
    let forecast = crate::build_forecast_panel(
        &content.reference,
        &content.constants,
        &mut ChaCha8Rng::seed_from_u64(0),
    )
    .unwrap_or_else(|_| empty_forecast());

    DashboardState {
        meta: MetaState {
            tick: 0,
            seed: 42,
            schema_version: 1,
            content_version: content.content_version.clone(),
        },
        clock: ClockState {
            next_hour: roster.start_hour,
            label: String::new(),
        },
        savings: roster.starting_savings,
        staff: roster.staff.clone(),
        assets: roster.assets.clone(),
        history: HistoryWindow::seeded(
            content.constants.history_capacity,
            roster
                .initial_history
                .iter()
                .map(|seed| (seed.label.clone(), seed.load)),
        ),
        anomalies: AnomalyLog::new(content.constants.anomaly_log_capacity),
        connection: ConnectionState::connected(roster.initial_source),
        view: ActiveView::Dashboard,
        chat: None,
        forecast,
        counters: Counters { next_event_id: 0 },
    }
}

fn empty_forecast() -> ForecastPanel {
    ForecastPanel {
        labels: Vec::new(),
        revenue_actual: Vec::new(),
        revenue_forecast: Vec::new(),
        leads_actual: Vec::new(),
        leads_forecast: Vec::new(),
        insight: ForecastInsight {
            last_revenue: 0.0,
            projected_revenue: 0.0,
            diff: 0.0,
            direction: TrendDirection::Down,
        },
    }
}

pub fn make_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}
