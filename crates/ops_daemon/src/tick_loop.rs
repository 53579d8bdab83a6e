use crate::state::{AppState, DashboardSim};
use chrono::Timelike;
use ops_control::{run_operator, AlwaysApprove, OperatorMode};
use ops_core::EventEnvelope;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// One simulation step under the lock: tick, optional auto operator,
/// metrics sample, alert evaluation.
pub fn step(sim: &mut DashboardSim) -> Vec<EventEnvelope> {
    let DashboardSim {
        ref mut state,
        ref content,
        ref mut rng,
        ..
    } = *sim;
    let mut events = ops_core::tick(state, content, rng);

    if sim.operator_mode == OperatorMode::Auto {
        let DashboardSim {
            ref mut state,
            ref content,
            ref mut auto_operator,
            ..
        } = *sim;
        match run_operator(auto_operator, &mut AlwaysApprove, state, content) {
            Ok(outcome) => {
                for proposal in &outcome.committed {
                    tracing::debug!(kind = ?proposal.kind, target = %proposal.target, "auto operator committed");
                }
                events.extend(outcome.events);
            }
            Err(err) => tracing::warn!("auto operator action failed: {err}"),
        }
    }

    let snapshot = ops_core::compute_metrics(&sim.state, &sim.content);
    sim.push_metrics(snapshot);
    let tick = sim.state.meta.tick;
    let DashboardSim {
        ref mut state,
        ref metrics_history,
        ref mut alert_engine,
        ..
    } = *sim;
    let alert_events = alert_engine.evaluate(metrics_history, tick, &mut state.counters);
    for alert in &alert_events {
        tracing::info!(tick, event = ?alert.event, "alert state changed");
    }
    events.extend(alert_events);
    events
}

pub async fn run_tick_loop(app: AppState, max_ticks: Option<u64>) {
    let mut interval = tokio::time::interval(app.tick_period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first interval tick completes immediately; the dashboard starts
    // from its seeded window, so wait one full period before sampling.
    interval.tick().await;

    loop {
        interval.tick().await;
        if app.paused.load(Ordering::Relaxed) {
            continue;
        }

        let done = {
            let mut guard = app.sim.lock();
            let events = step(&mut guard);
            app.publish(&guard, events);
            max_ticks.is_some_and(|max| guard.state.meta.tick >= max)
        };

        if done {
            tracing::info!("reached max ticks, stopping simulation loop");
            break;
        }
    }
}

/// Wall-clock display, independent of pause and of the simulation period.
pub async fn run_clock_loop(app: AppState, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let seconds = chrono::Local::now().num_seconds_from_midnight();
        ops_core::clock_tick(&mut app.sim.lock().state, seconds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ops_core::test_fixtures::{base_content, base_state, make_rng};
    use ops_core::Event;

    fn sim(mode: OperatorMode) -> DashboardSim {
        let content = base_content();
        let state = base_state(&content);
        DashboardSim::new(state, content, make_rng(), mode)
    }

    #[test]
    fn step_ticks_and_records_metrics() {
        let mut sim = sim(OperatorMode::None);
        let events = step(&mut sim);

        assert_eq!(sim.state.meta.tick, 1);
        assert_eq!(sim.metrics_history.len(), 1);
        assert!(events
            .iter()
            .any(|e| matches!(e.event, Event::LoadSampled { .. })));
        // Fixture roster starts with a tired member and a failing asset.
        let active = sim.alert_engine.active_alert_ids();
        assert!(active.contains(&"STAFF_BURNOUT".to_string()));
        assert!(active.contains(&"ASSET_FAILING".to_string()));
    }

    #[test]
    fn auto_mode_resolves_risks_in_the_same_step() {
        let mut sim = sim(OperatorMode::Auto);
        let events = step(&mut sim);

        assert!(events
            .iter()
            .any(|e| matches!(e.event, Event::StaffRested { index: 1, .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e.event, Event::AssetRepaired { .. })));
        assert!(sim.alert_engine.active_alert_ids().iter().all(|id| id != "STAFF_BURNOUT"));
    }

    #[test]
    fn metrics_history_is_bounded() {
        let mut sim = sim(OperatorMode::None);
        for _ in 0..(crate::state::METRICS_HISTORY_CAPACITY + 10) {
            step(&mut sim);
        }
        assert_eq!(
            sim.metrics_history.len(),
            crate::state::METRICS_HISTORY_CAPACITY
        );
    }
}
