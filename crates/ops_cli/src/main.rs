use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ops_control::{run_operator, AlwaysApprove, AutoOperator, OperatorMode};
use ops_core::{DashboardContent, DashboardState, Event, MetricsFileWriter};
use ops_world::{load_content, new_run};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "ops_cli", about = "Ops dashboard headless runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the dashboard simulation for a fixed number of ticks.
    Run {
        #[arg(long)]
        ticks: u64,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value = "./content")]
        content_dir: String,
        #[arg(long, default_value_t = 10)]
        print_every: u64,
        #[arg(long, default_value = "none", value_parser = ["none", "auto"])]
        operator: String,
        /// Write one metrics row per tick to this CSV file.
        #[arg(long)]
        metrics_out: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

fn run(
    ticks: u64,
    seed: Option<u64>,
    content_dir: &str,
    print_every: u64,
    operator_mode: OperatorMode,
    metrics_out: Option<&str>,
) -> Result<()> {
    let content = load_content(content_dir)?;
    let resolved_seed = seed.unwrap_or_else(rand::random);
    let (mut state, mut rng) = new_run(&content, resolved_seed)?;

    let mut metrics_writer = match metrics_out {
        Some(path) => Some(
            MetricsFileWriter::create(path)
                .with_context(|| format!("creating metrics CSV: {path}"))?,
        ),
        None => None,
    };

    let mut operator = AutoOperator::default();
    let print_every = print_every.max(1);

    println!(
        "Starting simulation: ticks={ticks} seed={} staff={} assets={} operator={operator_mode:?} content_version={}",
        state.meta.seed,
        state.staff.len(),
        state.assets.len(),
        content.content_version,
    );
    println!("{}", "-".repeat(80));

    for _ in 0..ticks {
        let mut events = ops_core::tick(&mut state, &content, &mut rng);

        if operator_mode == OperatorMode::Auto {
            let outcome = run_operator(&mut operator, &mut AlwaysApprove, &mut state, &content)
                .context("auto operator")?;
            events.extend(outcome.events);
        }

        // Print notable events regardless of print_every.
        for envelope in &events {
            if let Some(line) = describe_event(&envelope.event) {
                println!("*** {line} at tick={:04} ***", state.meta.tick);
            }
        }

        if state.meta.tick % print_every == 0 {
            print_status(&state, &content);
        }

        if let Some(ref mut writer) = metrics_writer {
            let snapshot = ops_core::compute_metrics(&state, &content);
            writer.write_row(&snapshot).context("writing metrics row")?;
        }
    }

    println!("{}", "-".repeat(80));
    println!("Done. Final state at tick {}:", state.meta.tick);
    print_status(&state, &content);

    if let Some(ref mut writer) = metrics_writer {
        writer.flush().context("final metrics flush")?;
        println!("Metrics rows written: {}", writer.rows_written());
    }

    Ok(())
}

fn describe_event(event: &Event) -> Option<String> {
    match event {
        Event::AnomalyLogged { category, load, .. } => {
            Some(format!("ANOMALY {} load={load:.1}", category.label()))
        }
        Event::AssetRepaired {
            asset_id,
            tier,
            savings_delta,
        } => Some(format!(
            "REPAIRED {} ({}) savings {}",
            asset_id.0,
            tier.label(),
            ops_core::format_currency(*savings_delta)
        )),
        Event::SourceConnected { source } => Some(format!("CONNECTED {source:?}")),
        _ => None,
    }
}

fn status_line(state: &DashboardState, content: &DashboardContent) -> String {
    let view = ops_core::project(state, content);
    format!(
        "[tick={tick:04}  clock={clock}]  load={load:>4}  savings={savings}  \
         at_risk={at_risk}  anomalies={anomalies}  advisory={advisory}",
        tick = state.meta.tick,
        clock = view.kpis.clock,
        load = view.kpis.current_load_text,
        savings = view.kpis.savings_text,
        at_risk = view.kpis.at_risk_count,
        anomalies = view.anomalies.len(),
        advisory = view.advisory.headline,
    )
}

fn print_status(state: &DashboardState, content: &DashboardContent) {
    println!("{}", status_line(state, content));
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            ticks,
            seed,
            content_dir,
            print_every,
            operator,
            metrics_out,
        } => {
            let mode = OperatorMode::from_name(&operator)
                .with_context(|| format!("unknown operator mode: {operator}"))?;
            run(
                ticks,
                seed,
                &content_dir,
                print_every,
                mode,
                metrics_out.as_deref(),
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ops_core::test_fixtures::{base_content, base_state};
    use ops_core::{AnomalyCategory, AssetId, RepairTier};

    #[test]
    fn status_line_shows_kpis() {
        let content = base_content();
        let state = base_state(&content);
        let line = status_line(&state, &content);
        assert!(line.starts_with("[tick=0000"));
        assert!(line.contains("load= 60%"));
        assert!(line.contains("savings=$450,000"));
        assert!(line.contains("at_risk=2"));
        assert!(line.contains("advisory=WARNING"));
    }

    #[test]
    fn only_notable_events_are_described() {
        let repaired = Event::AssetRepaired {
            asset_id: AssetId("ast_truck_4".to_string()),
            tier: RepairTier::Severe,
            savings_delta: 5000.0,
        };
        assert_eq!(
            describe_event(&repaired).as_deref(),
            Some("REPAIRED ast_truck_4 (Severe) savings $5,000")
        );

        let anomaly = Event::AnomalyLogged {
            entry_id: uuid::Uuid::nil(),
            category: AnomalyCategory::CapacityCritical,
            load: 95.0,
        };
        assert_eq!(
            describe_event(&anomaly).as_deref(),
            Some("ANOMALY Capacity Critical load=95.0")
        );

        let rested = Event::StaffRested {
            index: 1,
            name: "Mike R.".to_string(),
        };
        assert!(describe_event(&rested).is_none());
    }
}
