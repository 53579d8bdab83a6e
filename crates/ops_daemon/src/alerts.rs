use ops_core::{AlertSeverity, Counters, Event, EventEnvelope, EventId, MetricsSnapshot};
use std::collections::{BTreeSet, VecDeque};

type RuleFn = fn(&VecDeque<MetricsSnapshot>, &AlertEngine) -> bool;

struct AlertRule {
    id: &'static str,
    severity: AlertSeverity,
    check: RuleFn,
    message: &'static str,
    suggested_action: &'static str,
}

const RULES: &[AlertRule] = &[
    AlertRule {
        id: "LOAD_SPIKE",
        severity: AlertSeverity::Warning,
        check: |h, engine| {
            latest(h)
                .and_then(|s| s.current_load)
                .is_some_and(|load| load > engine.load_threshold)
        },
        message: "System load above the anomaly threshold",
        suggested_action: "Check the anomaly log and watch the next samples",
    },
    AlertRule {
        id: "SUSTAINED_HIGH_LOAD",
        severity: AlertSeverity::Critical,
        check: |h, engine| {
            let recent = tail(h, 3);
            recent.len() >= 3
                && recent
                    .iter()
                    .all(|s| s.current_load.is_some_and(|l| l > engine.load_threshold))
        },
        message: "Load above threshold for 3+ consecutive samples",
        suggested_action: "Switch data source or shed load",
    },
    AlertRule {
        id: "STAFF_BURNOUT",
        severity: AlertSeverity::Warning,
        check: |h, _| latest(h).is_some_and(|s| s.tired_staff > 0),
        message: "Staff member above the fatigue threshold",
        suggested_action: "Approve rest from the Workforce Hub",
    },
    AlertRule {
        id: "ASSET_FAILING",
        severity: AlertSeverity::Warning,
        check: |h, _| latest(h).is_some_and(|s| s.failing_assets > 0),
        message: "Asset health below the maintenance threshold",
        suggested_action: "Schedule a fix from the Maintenance Scheduler",
    },
    AlertRule {
        id: "ASSET_OFFLINE",
        severity: AlertSeverity::Critical,
        check: |h, _| latest(h).is_some_and(|s| s.asset_total > 0 && s.min_health <= 0.0),
        message: "An asset has reached zero health",
        suggested_action: "Dispatch a severe repair immediately",
    },
    AlertRule {
        id: "SAVINGS_DECLINING",
        severity: AlertSeverity::Warning,
        check: |h, _| {
            let recent = tail(h, 5);
            if recent.len() < 5 {
                return false;
            }
            // `tail` is newest-first.
            recent
                .windows(2)
                .all(|pair| pair[0].savings < pair[1].savings)
        },
        message: "Savings fell across the last 5 samples",
        suggested_action: "Pause training spend or review repair booking",
    },
    AlertRule {
        id: "SOURCE_OFFLINE",
        severity: AlertSeverity::Warning,
        check: |h, _| latest(h).is_some_and(|s| s.reconnecting),
        message: "Data source is reconnecting; sampling is suspended",
        suggested_action: "Wait for the reconnect to finish",
    },
];

// --- Helpers for querying recent snapshots ---

fn latest(h: &VecDeque<MetricsSnapshot>) -> Option<&MetricsSnapshot> {
    h.back()
}

fn tail(h: &VecDeque<MetricsSnapshot>, n: usize) -> Vec<&MetricsSnapshot> {
    h.iter().rev().take(n).collect()
}

// --- AlertEngine ---

pub struct AlertEngine {
    active: BTreeSet<&'static str>,
    load_threshold: f64,
}

impl AlertEngine {
    pub fn new(load_threshold: f64) -> Self {
        Self {
            active: BTreeSet::new(),
            load_threshold,
        }
    }

    /// Current active alert IDs, sorted (for the /api/v1/alerts endpoint).
    pub fn active_alert_ids(&self) -> Vec<String> {
        self.active.iter().map(|id| (*id).to_string()).collect()
    }

    /// Evaluate all rules against recent metrics history. Returns events for state changes.
    pub fn evaluate(
        &mut self,
        history: &VecDeque<MetricsSnapshot>,
        tick: u64,
        counters: &mut Counters,
    ) -> Vec<EventEnvelope> {
        let mut events = Vec::new();

        for rule in RULES {
            let fired = (rule.check)(history, self);
            let was_active = self.active.contains(rule.id);

            if fired && !was_active {
                self.active.insert(rule.id);
                events.push(make_envelope(
                    counters,
                    tick,
                    Event::AlertRaised {
                        alert_id: rule.id.to_string(),
                        severity: rule.severity,
                        message: rule.message.to_string(),
                        suggested_action: rule.suggested_action.to_string(),
                    },
                ));
            } else if !fired && was_active {
                self.active.remove(rule.id);
                events.push(make_envelope(
                    counters,
                    tick,
                    Event::AlertCleared {
                        alert_id: rule.id.to_string(),
                    },
                ));
            }
        }

        events
    }
}

fn make_envelope(counters: &mut Counters, tick: u64, event: Event) -> EventEnvelope {
    let id = EventId(format!("evt_{:06}", counters.next_event_id));
    counters.next_event_id += 1;
    EventEnvelope { id, tick, event }
}
