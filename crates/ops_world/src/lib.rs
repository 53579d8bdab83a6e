//! Content loading and initial-state construction shared between ops_cli and ops_daemon.

use anyhow::{Context, Result};
use ops_core::{
    ActiveView, AnomalyLog, ClockState, ConfigurationError, ConnectionState, Constants, Counters,
    DashboardContent, DashboardState, HistoryWindow, LoadModel, MetaState, ReferenceRecord,
    RosterDef,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Reference dataset compiled into the binary; used when the content
/// directory does not ship its own `reference_dataset.csv`.
pub const EMBEDDED_REFERENCE_CSV: &str = include_str!("../../../content/reference_dataset.csv");

const SCHEMA_VERSION: u32 = 1;

#[derive(Deserialize)]
struct RosterFile {
    content_version: String,
    #[serde(flatten)]
    roster: RosterDef,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidConstant {
        name,
        reason: reason.into(),
    }
}

fn ensure_range(name: &'static str, min: f64, max: f64) -> Result<(), ConfigurationError> {
    if !min.is_finite() || !max.is_finite() {
        return Err(invalid(name, "bounds must be finite"));
    }
    if min < 0.0 || min > max {
        return Err(invalid(
            name,
            format!("expected 0 <= min <= max, got {min}..{max}"),
        ));
    }
    Ok(())
}

/// Rejects constants the engine cannot run with.
pub fn validate_constants(c: &Constants) -> Result<(), ConfigurationError> {
    if c.history_capacity == 0 {
        return Err(invalid("history_capacity", "must be at least 1"));
    }
    if c.anomaly_log_capacity == 0 {
        return Err(invalid("anomaly_log_capacity", "must be at least 1"));
    }
    if c.forecast_horizon_days == 0 {
        return Err(invalid("forecast_horizon_days", "must be at least 1"));
    }
    if !(0.0..1.0).contains(&c.forecast_noise_fraction) {
        return Err(invalid("forecast_noise_fraction", "must be in [0, 1)"));
    }
    match c.load_model {
        LoadModel::Uniform { min, max } => {
            if min > max || max > 100 {
                return Err(invalid(
                    "load_model",
                    format!("uniform range {min}..={max} must sit inside 0..=100"),
                ));
            }
        }
        LoadModel::Sinusoid { frequency, jitter } => {
            if !frequency.is_finite() || !jitter.is_finite() || jitter < 0.0 {
                return Err(invalid(
                    "load_model",
                    "sinusoid frequency must be finite and jitter non-negative",
                ));
            }
        }
    }
    ensure_range("health_decay", c.health_decay_min, c.health_decay_max)?;
    ensure_range("fatigue_gain", c.fatigue_gain_min, c.fatigue_gain_max)?;
    if c.score_floor > c.score_cap {
        return Err(invalid(
            "score_floor",
            format!("floor {} is above cap {}", c.score_floor, c.score_cap),
        ));
    }
    if c.fix_severe_below > c.fix_moderate_below {
        return Err(invalid(
            "fix_severe_below",
            "severe band must lie below the moderate band",
        ));
    }
    if c.low_fatigue_threshold > c.high_fatigue_threshold {
        return Err(invalid(
            "low_fatigue_threshold",
            format!(
                "low threshold {} is above high threshold {}",
                c.low_fatigue_threshold, c.high_fatigue_threshold
            ),
        ));
    }
    for (name, value) in [
        ("fatigue_risk_threshold", c.fatigue_risk_threshold),
        ("health_risk_threshold", c.health_risk_threshold),
    ] {
        if !(0.0..=100.0).contains(&value) {
            return Err(invalid(name, format!("{value} is outside 0..=100")));
        }
    }
    if c.asset_load_jitter < 0.0 {
        return Err(invalid("asset_load_jitter", "must be non-negative"));
    }
    if !(0.0..=100.0).contains(&c.asset_nominal_load) {
        return Err(invalid("asset_nominal_load", "must be within 0..=100"));
    }
    Ok(())
}

pub fn validate_roster(roster: &RosterDef) -> Result<(), ConfigurationError> {
    if roster.start_hour > 23 {
        return Err(ConfigurationError::InvalidRoster(format!(
            "start_hour {} is not an hour of the day",
            roster.start_hour
        )));
    }
    for member in &roster.staff {
        if member.name.trim().is_empty() {
            return Err(ConfigurationError::InvalidRoster(
                "staff member with empty name".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&member.fatigue) {
            return Err(ConfigurationError::InvalidRoster(format!(
                "'{}' fatigue {} outside 0..=100",
                member.name, member.fatigue
            )));
        }
    }
    let mut seen = HashSet::new();
    for asset in &roster.assets {
        if !seen.insert(&asset.id) {
            return Err(ConfigurationError::InvalidRoster(format!(
                "duplicate asset id '{}'",
                asset.id
            )));
        }
        if !(0.0..=100.0).contains(&asset.health) || !(0.0..=100.0).contains(&asset.load) {
            return Err(ConfigurationError::InvalidRoster(format!(
                "asset '{}' health/load outside 0..=100",
                asset.id
            )));
        }
    }
    Ok(())
}

/// Rows must be chronological with parseable error rates. At least two rows
/// are required to fit the revenue trend.
pub fn validate_reference(records: &[ReferenceRecord]) -> Result<(), ConfigurationError> {
    if records.is_empty() {
        return Err(ConfigurationError::EmptyDataset);
    }
    if records.len() < 2 {
        return Err(ConfigurationError::InvalidRecord {
            row: 1,
            reason: "at least two rows are needed to fit a trend".to_string(),
        });
    }
    for (i, record) in records.iter().enumerate() {
        let row = i + 1;
        if record.error_rate_pct().is_none() {
            return Err(ConfigurationError::InvalidRecord {
                row,
                reason: format!("unparseable error rate '{}'", record.system_error_rate),
            });
        }
        if !record.daily_revenue.is_finite() || !record.new_leads.is_finite() {
            return Err(ConfigurationError::InvalidRecord {
                row,
                reason: "revenue and leads must be finite".to_string(),
            });
        }
        if i > 0 && records[i - 1].date >= record.date {
            return Err(ConfigurationError::InvalidRecord {
                row,
                reason: format!("date {} is not after the previous row", record.date),
            });
        }
    }
    Ok(())
}

pub fn validate_content(content: &DashboardContent) -> Result<(), ConfigurationError> {
    validate_constants(&content.constants)?;
    validate_roster(&content.roster)?;
    validate_reference(&content.reference)
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parses reference CSV rows; row numbers in errors are 1-based data rows.
pub fn parse_reference_csv(
    reader: impl std::io::Read,
) -> Result<Vec<ReferenceRecord>, ConfigurationError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    csv_reader
        .deserialize()
        .enumerate()
        .map(|(i, row)| {
            row.map_err(|err| ConfigurationError::InvalidRecord {
                row: i + 1,
                reason: err.to_string(),
            })
        })
        .collect()
}

pub fn load_content(content_dir: &str) -> Result<DashboardContent> {
    let dir = Path::new(content_dir);
    let constants: Constants = serde_json::from_str(
        &std::fs::read_to_string(dir.join("constants.json")).context("reading constants.json")?,
    )
    .context("parsing constants.json")?;
    let roster_file: RosterFile = serde_json::from_str(
        &std::fs::read_to_string(dir.join("roster.json")).context("reading roster.json")?,
    )
    .context("parsing roster.json")?;

    let csv_path = dir.join("reference_dataset.csv");
    let reference = if csv_path.exists() {
        let file = std::fs::File::open(&csv_path).context("opening reference_dataset.csv")?;
        parse_reference_csv(file).context("parsing reference_dataset.csv")?
    } else {
        parse_reference_csv(EMBEDDED_REFERENCE_CSV.as_bytes())
            .context("parsing embedded reference dataset")?
    };

    let content = DashboardContent {
        content_version: roster_file.content_version,
        constants,
        roster: roster_file.roster,
        reference,
    };
    validate_content(&content).context("validating content")?;
    Ok(content)
}

// ---------------------------------------------------------------------------
// Initial state
// ---------------------------------------------------------------------------

/// Tick-0 state. The forecast panel consumes `rng` once at startup.
pub fn build_initial_state(
    content: &DashboardContent,
    seed: u64,
    rng: &mut impl Rng,
) -> Result<DashboardState> {
    let roster = &content.roster;
    let c = &content.constants;
    let forecast = ops_core::build_forecast_panel(&content.reference, c, rng)
        .context("computing revenue forecast")?;

    Ok(DashboardState {
        meta: MetaState {
            tick: 0,
            seed,
            schema_version: SCHEMA_VERSION,
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
            c.history_capacity,
            roster
                .initial_history
                .iter()
                .map(|s| (s.label.clone(), s.load)),
        ),
        anomalies: AnomalyLog::new(c.anomaly_log_capacity),
        connection: ConnectionState::connected(roster.initial_source),
        view: ActiveView::Dashboard,
        chat: None,
        forecast,
        counters: Counters { next_event_id: 0 },
    })
}

/// Fresh state plus the RNG that continues the run, both derived from `seed`.
pub fn new_run(content: &DashboardContent, seed: u64) -> Result<(DashboardState, ChaCha8Rng)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let state = build_initial_state(content, seed, &mut rng)?;
    Ok((state, rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ops_core::test_fixtures::{base_content, base_roster};
    use std::fmt::Write as _;

    fn write_content_dir(dir: &Path, content: &DashboardContent, csv: Option<&str>) {
        std::fs::write(
            dir.join("constants.json"),
            serde_json::to_string_pretty(&content.constants).unwrap(),
        )
        .unwrap();
        let mut roster = serde_json::to_value(&content.roster).unwrap();
        roster["content_version"] = serde_json::json!("0.0.1-test");
        std::fs::write(dir.join("roster.json"), roster.to_string()).unwrap();
        if let Some(csv) = csv {
            std::fs::write(dir.join("reference_dataset.csv"), csv).unwrap();
        }
    }

    fn csv_of(records: &[ReferenceRecord]) -> String {
        let mut out = String::from(
            "Date,Daily_Revenue,New_Leads,Active_Users,Avg_Employee_Mood_Score,\
             Overtime_Hours_Logged,Code_Commits,System_Error_Rate,Cloud_Cost,Risk_Flag\n",
        );
        for r in records {
            writeln!(
                out,
                "{},{},{},{},{},{},{},{},{},{:?}",
                r.date,
                r.daily_revenue,
                r.new_leads,
                r.active_users,
                r.mood_score,
                r.overtime_hours,
                r.code_commits,
                r.system_error_rate,
                r.cloud_cost,
                r.risk_flag
            )
            .unwrap();
        }
        out
    }

    #[test]
    fn embedded_dataset_parses_fifteen_rows() {
        let records = parse_reference_csv(EMBEDDED_REFERENCE_CSV.as_bytes()).unwrap();
        assert_eq!(records.len(), 15);
        assert_eq!(records, ops_core::test_fixtures::reference_records());
    }

    #[test]
    fn malformed_row_reports_its_number() {
        let csv = "Date,Daily_Revenue,New_Leads,Active_Users,Avg_Employee_Mood_Score,\
                   Overtime_Hours_Logged,Code_Commits,System_Error_Rate,Cloud_Cost,Risk_Flag\n\
                   2025-11-01,15400,45,1250,8.5,12,85,0.02%,450,Low\n\
                   2025-11-02,lots,52,1310,8.4,15,92,0.02%,465,Low\n";
        let err = parse_reference_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidRecord { row: 2, .. }));
    }

    #[test]
    fn unknown_risk_flag_is_rejected() {
        let csv = "Date,Daily_Revenue,New_Leads,Active_Users,Avg_Employee_Mood_Score,\
                   Overtime_Hours_Logged,Code_Commits,System_Error_Rate,Cloud_Cost,Risk_Flag\n\
                   2025-11-01,15400,45,1250,8.5,12,85,0.02%,450,Severe\n";
        assert!(parse_reference_csv(csv.as_bytes()).is_err());
    }

    #[test]
    fn reference_validation_rules() {
        assert!(matches!(
            validate_reference(&[]),
            Err(ConfigurationError::EmptyDataset)
        ));

        let records = ops_core::test_fixtures::reference_records();
        assert!(validate_reference(&records[..1]).is_err());
        assert!(validate_reference(&records).is_ok());

        let mut bad_rate = records.clone();
        bad_rate[3].system_error_rate = "n/a".to_string();
        assert!(matches!(
            validate_reference(&bad_rate),
            Err(ConfigurationError::InvalidRecord { row: 4, .. })
        ));

        let mut out_of_order = records;
        out_of_order.swap(5, 6);
        assert!(matches!(
            validate_reference(&out_of_order),
            Err(ConfigurationError::InvalidRecord { row: 7, .. })
        ));
    }

    #[test]
    fn misordered_thresholds_are_rejected() {
        let valid = base_content().constants;

        let mut c = valid.clone();
        c.low_fatigue_threshold = 90.0;
        c.high_fatigue_threshold = 30.0;
        assert!(matches!(
            validate_constants(&c),
            Err(ConfigurationError::InvalidConstant {
                name: "low_fatigue_threshold",
                ..
            })
        ));

        let mut c = valid.clone();
        c.fatigue_risk_threshold = 120.0;
        assert!(matches!(
            validate_constants(&c),
            Err(ConfigurationError::InvalidConstant {
                name: "fatigue_risk_threshold",
                ..
            })
        ));

        let mut c = valid;
        c.health_risk_threshold = -5.0;
        assert!(matches!(
            validate_constants(&c),
            Err(ConfigurationError::InvalidConstant {
                name: "health_risk_threshold",
                ..
            })
        ));
    }

    #[test]
    fn constants_validation_rejects_unusable_values() {
        let valid = base_content().constants;
        assert!(validate_constants(&valid).is_ok());

        let mut c = valid.clone();
        c.history_capacity = 0;
        assert!(matches!(
            validate_constants(&c),
            Err(ConfigurationError::InvalidConstant {
                name: "history_capacity",
                ..
            })
        ));

        let mut c = valid.clone();
        c.load_model = LoadModel::Uniform { min: 80, max: 50 };
        assert!(validate_constants(&c).is_err());

        let mut c = valid.clone();
        c.score_floor = 150.0;
        assert!(validate_constants(&c).is_err());

        let mut c = valid.clone();
        c.health_decay_min = 3.0;
        c.health_decay_max = 1.0;
        assert!(validate_constants(&c).is_err());

        let mut c = valid;
        c.forecast_noise_fraction = 1.5;
        assert!(validate_constants(&c).is_err());
    }

    #[test]
    fn roster_validation_catches_duplicates_and_ranges() {
        assert!(validate_roster(&base_roster()).is_ok());

        let mut roster = base_roster();
        roster.assets[2].id = roster.assets[0].id.clone();
        assert!(validate_roster(&roster).is_err());

        let mut roster = base_roster();
        roster.staff[0].fatigue = 120.0;
        assert!(validate_roster(&roster).is_err());

        let mut roster = base_roster();
        roster.start_hour = 24;
        assert!(validate_roster(&roster).is_err());
    }

    #[test]
    fn load_content_round_trip_from_directory() {
        let content = base_content();
        let dir = tempfile::tempdir().unwrap();
        write_content_dir(dir.path(), &content, Some(&csv_of(&content.reference)));

        let loaded = load_content(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(loaded.content_version, "0.0.1-test");
        assert_eq!(loaded.roster.staff, content.roster.staff);
        assert_eq!(loaded.reference, content.reference);
    }

    #[test]
    fn load_content_falls_back_to_embedded_dataset() {
        let content = base_content();
        let dir = tempfile::tempdir().unwrap();
        write_content_dir(dir.path(), &content, None);

        let loaded = load_content(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(loaded.reference.len(), 15);
    }

    #[test]
    fn load_content_surfaces_configuration_error() {
        let content = base_content();
        let dir = tempfile::tempdir().unwrap();
        write_content_dir(dir.path(), &content, Some(&csv_of(&[])));

        let err = load_content(dir.path().to_str().unwrap()).unwrap_err();
        let config = err.downcast_ref::<ConfigurationError>();
        assert!(matches!(config, Some(ConfigurationError::EmptyDataset)));
    }

    #[test]
    fn missing_file_names_it_in_the_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_content(dir.path().to_str().unwrap()).unwrap_err();
        assert!(format!("{err:#}").contains("constants.json"));
    }

    #[test]
    fn initial_state_matches_roster() {
        let content = base_content();
        let (state, _rng) = new_run(&content, 42).unwrap();

        assert_eq!(state.meta.seed, 42);
        assert_eq!(state.meta.tick, 0);
        assert_eq!(state.staff.len(), 4);
        assert_eq!(state.assets.len(), 3);
        assert_eq!(state.history.len(), 5);
        assert_eq!(state.history.latest(), Some(60.0));
        assert_eq!(state.clock.next_hour, 14);
        assert!(!state.connection.is_reconnecting());
        assert_eq!(state.forecast.labels.len(), 22);
    }

    #[test]
    fn same_seed_same_forecast() {
        let content = base_content();
        let (a, _) = new_run(&content, 9).unwrap();
        let (b, _) = new_run(&content, 9).unwrap();
        assert_eq!(a.forecast, b.forecast);
    }
}
