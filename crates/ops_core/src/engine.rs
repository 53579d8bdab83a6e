use rand::Rng;

use crate::forecast::predict_next;
use crate::{
    AnomalyCategory, AnomalyEntry, Constants, DashboardContent, DashboardState, Event,
    EventEnvelope, LoadModel, SourceConnection,
};

/// Advance the simulation by one tick.
///
/// Order of operations:
/// 1. While a source switch is pending, count down the reconnect delay and
///    do nothing else.
/// 2. Draw the instantaneous load and label it with the simulated hour.
/// 3. Predict the next point from the current window, then push the sample.
/// 4. Drift asset load and decay asset health.
/// 5. Accumulate staff fatigue and drift scores.
/// 6. Log an anomaly when the load crosses the threshold.
/// 7. Increment tick counter.
///
/// Returns all events produced this tick. Projection is left to the host.
pub fn tick(
    state: &mut DashboardState,
    content: &DashboardContent,
    rng: &mut impl Rng,
) -> Vec<EventEnvelope> {
    let mut events = Vec::new();
    let constants = &content.constants;

    if state.connection.is_reconnecting() {
        advance_reconnect(state, &mut events);
        state.meta.tick += 1;
        return events;
    }

    let load = draw_load(state, content, rng);
    let label = next_label(state);
    record_sample(state, label.clone(), load, &mut events);
    advance_assets(state, constants, rng);
    advance_staff(state, constants, rng);
    if load > constants.anomaly_load_threshold {
        log_anomaly(state, constants, &label, load, rng, &mut events);
    }

    state.meta.tick += 1;
    events
}

/// Update the wall-clock display. Independent of the simulation tick.
pub fn clock_tick(state: &mut DashboardState, seconds_of_day: u32) {
    let seconds_of_day = seconds_of_day % 86_400;
    let hours = seconds_of_day / 3600;
    let minutes = (seconds_of_day % 3600) / 60;
    let seconds = seconds_of_day % 60;
    state.clock.label = format!("{hours:02}:{minutes:02}:{seconds:02}");
}

/// Uniform draw from `[low, high]`; collapses to `low` for empty or inverted ranges.
pub(crate) fn uniform(rng: &mut impl Rng, low: f64, high: f64) -> f64 {
    if high > low {
        rng.gen_range(low..=high)
    } else {
        low
    }
}

pub(crate) fn clamp_score(score: f64, constants: &Constants) -> f64 {
    score.max(constants.score_floor).min(constants.score_cap)
}

fn draw_load(state: &DashboardState, content: &DashboardContent, rng: &mut impl Rng) -> f64 {
    match content.constants.load_model {
        LoadModel::Uniform { min, max } => {
            if max > min {
                f64::from(rng.gen_range(min..=max))
            } else {
                f64::from(min)
            }
        }
        LoadModel::Sinusoid { frequency, jitter } => {
            let profile = content
                .constants
                .sources
                .get(state.connection.last_connected);
            let phase = state.meta.tick as f64 * frequency;
            let raw = profile.base_load
                + profile.amplitude * phase.sin()
                + uniform(rng, -jitter, jitter);
            raw.clamp(0.0, 100.0).round()
        }
    }
}

fn next_label(state: &mut DashboardState) -> String {
    let hour = state.clock.next_hour;
    state.clock.next_hour = if hour >= 23 { 0 } else { hour + 1 };
    format!("{hour:02}:00")
}

fn record_sample(
    state: &mut DashboardState,
    label: String,
    load: f64,
    events: &mut Vec<EventEnvelope>,
) {
    let current_tick = state.meta.tick;
    let predicted = match predict_next(&state.history.actual_series()) {
        Ok(value) => Some(value),
        Err(err) => {
            events.push(crate::emit(
                &mut state.counters,
                current_tick,
                Event::ForecastSkipped {
                    reason: err.to_string(),
                },
            ));
            None
        }
    };

    state.history.push(label.clone(), load, predicted);
    events.push(crate::emit(
        &mut state.counters,
        current_tick,
        Event::LoadSampled {
            label,
            load,
            predicted,
        },
    ));
}

fn advance_assets(state: &mut DashboardState, constants: &Constants, rng: &mut impl Rng) {
    for asset in &mut state.assets {
        let jitter = uniform(rng, -constants.asset_load_jitter, constants.asset_load_jitter);
        asset.load = (asset.load + jitter).clamp(0.0, 100.0);
        let decay = uniform(rng, constants.health_decay_min, constants.health_decay_max);
        asset.health = (asset.health - decay).clamp(0.0, 100.0);
    }
}

fn advance_staff(state: &mut DashboardState, constants: &Constants, rng: &mut impl Rng) {
    for member in &mut state.staff {
        let gain = uniform(rng, constants.fatigue_gain_min, constants.fatigue_gain_max);
        member.fatigue = (member.fatigue + gain).clamp(0.0, 100.0);

        if member.fatigue > constants.high_fatigue_threshold {
            member.score -= constants.score_drift;
        } else if member.fatigue < constants.low_fatigue_threshold {
            member.score = (member.score + constants.score_drift).min(constants.score_cap);
        }
        member.score = clamp_score(member.score, constants);
    }
}

fn log_anomaly(
    state: &mut DashboardState,
    constants: &Constants,
    label: &str,
    load: f64,
    rng: &mut impl Rng,
    events: &mut Vec<EventEnvelope>,
) {
    let category = if load >= constants.anomaly_critical_load {
        AnomalyCategory::CapacityCritical
    } else {
        AnomalyCategory::LoadSpike
    };
    let entry = AnomalyEntry {
        id: crate::generate_uuid(rng),
        message: format!("{}: load reached {load:.0}% at {label}", category.label()),
        category,
        label: label.to_string(),
    };
    let entry_id = entry.id;
    state.anomalies.record(entry);

    let current_tick = state.meta.tick;
    events.push(crate::emit(
        &mut state.counters,
        current_tick,
        Event::AnomalyLogged {
            entry_id,
            category,
            load,
        },
    ));
}

fn advance_reconnect(state: &mut DashboardState, events: &mut Vec<EventEnvelope>) {
    let Some(reconnect) = state.connection.reconnect.as_mut() else {
        return;
    };
    reconnect.ticks_remaining = reconnect.ticks_remaining.saturating_sub(1);
    if reconnect.ticks_remaining > 0 {
        return;
    }

    let source = reconnect.target;
    state.connection.reconnect = None;
    state.connection.current = SourceConnection::from(source);
    state.connection.last_connected = source;

    let current_tick = state.meta.tick;
    events.push(crate::emit(
        &mut state.counters,
        current_tick,
        Event::SourceConnected { source },
    ));
}
