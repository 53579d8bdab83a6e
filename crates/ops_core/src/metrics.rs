//! Snapshot metrics computed from `DashboardState`.
//!
//! `compute_metrics` samples the current state for time-series analysis and
//! alert evaluation. No state mutation, no IO. The CSV helpers below are the
//! only writers and take an explicit sink or path.

use crate::{projection::at_risk_count, DashboardContent, DashboardState};
use serde::Serialize;
use std::io::Write;

/// Current schema version; bump when fields are added/removed/reordered.
const METRICS_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub tick: u64,
    pub metrics_version: u32,

    // Load
    pub current_load: Option<f64>,
    pub predicted_load: Option<f64>,
    pub history_len: u32,
    pub anomaly_count: u32,

    // Workforce
    pub staff_total: u32,
    pub avg_fatigue: f64,
    pub max_fatigue: f64,
    pub avg_score: f64,
    pub tired_staff: u32,

    // Maintenance
    pub asset_total: u32,
    pub avg_health: f64,
    pub min_health: f64,
    pub failing_assets: u32,

    // Economy
    pub savings: f64,
    pub at_risk_count: u32,

    // Source
    pub reconnecting: bool,
}

pub fn compute_metrics(state: &DashboardState, content: &DashboardContent) -> MetricsSnapshot {
    let constants = &content.constants;

    let staff_total = state.staff.len();
    let (fatigue_sum, max_fatigue, score_sum) = state.staff.iter().fold(
        (0.0, 0.0_f64, 0.0),
        |(fatigue_sum, max_fatigue, score_sum), m| {
            (
                fatigue_sum + m.fatigue,
                max_fatigue.max(m.fatigue),
                score_sum + m.score,
            )
        },
    );
    let tired_staff = state
        .staff
        .iter()
        .filter(|m| m.fatigue > constants.fatigue_risk_threshold)
        .count();

    let asset_total = state.assets.len();
    let health_sum: f64 = state.assets.iter().map(|a| a.health).sum();
    let min_health = state
        .assets
        .iter()
        .map(|a| a.health)
        .fold(None, |min: Option<f64>, h| Some(min.map_or(h, |m| m.min(h))))
        .unwrap_or(0.0);
    let failing_assets = state
        .assets
        .iter()
        .filter(|a| a.health < constants.health_risk_threshold)
        .count();

    MetricsSnapshot {
        tick: state.meta.tick,
        metrics_version: METRICS_VERSION,
        current_load: state.history.latest(),
        predicted_load: state.history.predicted().back().copied().flatten(),
        history_len: count(state.history.len()),
        anomaly_count: count(state.anomalies.len()),
        staff_total: count(staff_total),
        avg_fatigue: mean(fatigue_sum, staff_total),
        max_fatigue,
        avg_score: mean(score_sum, staff_total),
        tired_staff: count(tired_staff),
        asset_total: count(asset_total),
        avg_health: mean(health_sum, asset_total),
        min_health,
        failing_assets: count(failing_assets),
        savings: state.savings,
        at_risk_count: count(at_risk_count(state, constants)),
        reconnecting: state.connection.is_reconnecting(),
    }
}

fn mean(sum: f64, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write the CSV header row for metrics.
pub fn write_metrics_header(writer: &mut impl std::io::Write) -> std::io::Result<()> {
    writeln!(
        writer,
        "tick,metrics_version,\
         current_load,predicted_load,history_len,anomaly_count,\
         staff_total,avg_fatigue,max_fatigue,avg_score,tired_staff,\
         asset_total,avg_health,min_health,failing_assets,\
         savings,at_risk_count,reconnecting"
    )
}

/// Append a single metrics snapshot as a CSV row. Missing loads are empty cells.
pub fn append_metrics_row(
    writer: &mut impl std::io::Write,
    snapshot: &MetricsSnapshot,
) -> std::io::Result<()> {
    writeln!(
        writer,
        "{},{},{},{},{},{},{},{:.2},{:.2},{:.2},{},{},{:.2},{:.2},{},{},{},{}",
        snapshot.tick,
        snapshot.metrics_version,
        optional(snapshot.current_load),
        optional(snapshot.predicted_load),
        snapshot.history_len,
        snapshot.anomaly_count,
        snapshot.staff_total,
        snapshot.avg_fatigue,
        snapshot.max_fatigue,
        snapshot.avg_score,
        snapshot.tired_staff,
        snapshot.asset_total,
        snapshot.avg_health,
        snapshot.min_health,
        snapshot.failing_assets,
        snapshot.savings,
        snapshot.at_risk_count,
        snapshot.reconnecting,
    )
}

/// Streaming metrics CSV writer: header on open, one row per call.
pub struct MetricsFileWriter {
    writer: std::io::BufWriter<std::fs::File>,
    rows: usize,
}

impl MetricsFileWriter {
    pub fn create(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        write_metrics_header(&mut writer)?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn write_row(&mut self, snapshot: &MetricsSnapshot) -> std::io::Result<()> {
        append_metrics_row(&mut self.writer, snapshot)?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
