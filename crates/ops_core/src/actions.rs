//! Operator actions, split into a proposal (what would happen, at what cost)
//! and a commit (apply it). Whoever collects approval sits in between.

use serde::{Deserialize, Serialize};

use crate::engine::clamp_score;
use crate::{
    ActionError, ActionKind, ActiveView, Constants, DashboardContent, DashboardState, Event,
    EventEnvelope, FixSavingsPolicy, Reconnect, RepairTier, SourceConnection,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionProposal {
    pub kind: ActionKind,
    pub index: usize,
    /// Display name of the target, re-checked on commit.
    pub target: String,
    pub description: String,
    /// Signed change to savings if committed.
    pub savings_delta: f64,
    pub tier: Option<RepairTier>,
}

impl ActionProposal {
    /// Magnitude of money involved, for approval policies.
    pub fn cost(&self) -> f64 {
        self.savings_delta.abs()
    }
}

pub fn repair_tier(health: f64, constants: &Constants) -> RepairTier {
    if health < constants.fix_severe_below {
        RepairTier::Severe
    } else if health < constants.fix_moderate_below {
        RepairTier::Moderate
    } else {
        RepairTier::Minor
    }
}

/// Signed savings change for a repair of the given tier.
pub fn repair_savings_delta(tier: RepairTier, constants: &Constants) -> f64 {
    let amount = match tier {
        RepairTier::Severe => constants.fix_severe_amount,
        RepairTier::Moderate => constants.fix_moderate_amount,
        RepairTier::Minor => constants.fix_minor_amount,
    };
    match constants.fix_savings_policy {
        FixSavingsPolicy::AvoidedDowntime => amount,
        FixSavingsPolicy::RepairCost => -amount,
    }
}

pub fn propose_action(
    state: &DashboardState,
    content: &DashboardContent,
    kind: ActionKind,
    index: usize,
) -> Result<ActionProposal, ActionError> {
    let constants = &content.constants;
    match kind {
        ActionKind::Rest => {
            let member = staff_at(state, kind, index)?;
            Ok(ActionProposal {
                kind,
                index,
                target: member.name.clone(),
                description: format!(
                    "Approve rest for {} (fatigue {:.0}%)? Fatigue resets to 0.",
                    member.name, member.fatigue
                ),
                savings_delta: 0.0,
                tier: None,
            })
        }
        ActionKind::Train => {
            let member = staff_at(state, kind, index)?;
            Ok(ActionProposal {
                kind,
                index,
                target: member.name.clone(),
                description: format!(
                    "Assign training to {}? This costs {}.",
                    member.name,
                    crate::format_currency(constants.train_cost)
                ),
                savings_delta: -constants.train_cost,
                tier: None,
            })
        }
        ActionKind::Fix => {
            let asset = asset_at(state, index)?;
            let tier = repair_tier(asset.health, constants);
            let savings_delta = repair_savings_delta(tier, constants);
            let booking = if savings_delta >= 0.0 {
                "avoided downtime"
            } else {
                "repair cost"
            };
            Ok(ActionProposal {
                kind,
                index,
                target: asset.name.clone(),
                description: format!(
                    "{} repair for {} (health {:.0}%). Estimated {} {booking}.",
                    tier.label(),
                    asset.name,
                    asset.health.floor(),
                    crate::format_currency(savings_delta.abs())
                ),
                savings_delta,
                tier: Some(tier),
            })
        }
    }
}

/// Apply an approved proposal. The proposal is priced again against the
/// current state; a different target, tier or savings delta is stale.
pub fn commit_action(
    state: &mut DashboardState,
    content: &DashboardContent,
    proposal: &ActionProposal,
) -> Result<Vec<EventEnvelope>, ActionError> {
    let constants = &content.constants;
    let current_tick = state.meta.tick;
    let index = proposal.index;

    let current = propose_action(state, content, proposal.kind, index)?;
    ensure_target(index, &proposal.target, &current.target)?;
    ensure_terms(proposal, &current)?;

    let event = match current.kind {
        ActionKind::Rest => {
            let member = &mut state.staff[index];
            member.fatigue = 0.0;
            member.score = clamp_score(member.score + constants.rest_score_bonus, constants);
            Event::StaffRested {
                index,
                name: member.name.clone(),
            }
        }
        ActionKind::Train => {
            let member = &mut state.staff[index];
            member.score = clamp_score(member.score + constants.train_score_bonus, constants);
            Event::TrainingAssigned {
                index,
                name: member.name.clone(),
                cost: current.cost(),
            }
        }
        ActionKind::Fix => {
            let asset = &mut state.assets[index];
            asset.health = 100.0;
            asset.load = constants.asset_nominal_load;
            Event::AssetRepaired {
                asset_id: asset.id.clone(),
                tier: current
                    .tier
                    .unwrap_or_else(|| repair_tier(asset.health, constants)),
                savings_delta: current.savings_delta,
            }
        }
    };

    state.savings += current.savings_delta;
    Ok(vec![crate::emit(&mut state.counters, current_tick, event)])
}

/// Flip between the two warehouse backends. History is cleared and sampling
/// pauses for `source_reconnect_ticks` ticks.
pub fn toggle_source(
    state: &mut DashboardState,
    content: &DashboardContent,
) -> Vec<EventEnvelope> {
    let current_tick = state.meta.tick;
    let from = state.connection.current;
    let target = match &state.connection.reconnect {
        Some(pending) => pending.target.other(),
        None => state.connection.last_connected.other(),
    };

    state.history.clear();
    let mut events = vec![crate::emit(
        &mut state.counters,
        current_tick,
        Event::SourceSwitching { from, to: target },
    )];

    let delay = content.constants.source_reconnect_ticks;
    if delay == 0 {
        state.connection.reconnect = None;
        state.connection.current = SourceConnection::from(target);
        state.connection.last_connected = target;
        events.push(crate::emit(
            &mut state.counters,
            current_tick,
            Event::SourceConnected { source: target },
        ));
    } else {
        state.connection.current = SourceConnection::Disconnected;
        state.connection.reconnect = Some(Reconnect {
            target,
            ticks_remaining: delay,
        });
    }
    events
}

pub fn switch_view(
    state: &mut DashboardState,
    view_key: &str,
) -> Result<Vec<EventEnvelope>, ActionError> {
    let view = ActiveView::from_key(view_key.trim())
        .ok_or_else(|| ActionError::UnknownView(view_key.to_string()))?;
    state.view = view;
    let current_tick = state.meta.tick;
    Ok(vec![crate::emit(
        &mut state.counters,
        current_tick,
        Event::ViewSwitched { view },
    )])
}

fn staff_at(
    state: &DashboardState,
    kind: ActionKind,
    index: usize,
) -> Result<&crate::StaffMember, ActionError> {
    state.staff.get(index).ok_or(ActionError::InvalidIndex {
        kind,
        index,
        len: state.staff.len(),
    })
}

fn asset_at(state: &DashboardState, index: usize) -> Result<&crate::Asset, ActionError> {
    state.assets.get(index).ok_or(ActionError::InvalidIndex {
        kind: ActionKind::Fix,
        index,
        len: state.assets.len(),
    })
}

fn ensure_target(index: usize, expected: &str, found: &str) -> Result<(), ActionError> {
    if expected == found {
        Ok(())
    } else {
        Err(ActionError::StaleProposal {
            index,
            expected: expected.to_string(),
            found: found.to_string(),
        })
    }
}

fn ensure_terms(proposed: &ActionProposal, current: &ActionProposal) -> Result<(), ActionError> {
    if proposed.tier == current.tier
        && (proposed.savings_delta - current.savings_delta).abs() < f64::EPSILON
    {
        Ok(())
    } else {
        Err(ActionError::StaleProposal {
            index: current.index,
            expected: terms(proposed),
            found: terms(current),
        })
    }
}

fn terms(proposal: &ActionProposal) -> String {
    let amount = crate::format_currency(proposal.savings_delta);
    match proposal.tier {
        Some(tier) => format!("{} repair, {amount}", tier.label()),
        None => format!("{} {amount}", proposal.target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{base_content, base_state};

    #[test]
    fn rest_zeroes_fatigue_and_bumps_score() {
        let content = base_content();
        let mut state = base_state(&content);
        let before = state.staff[1].score;
        assert!(state.staff[1].fatigue > 80.0);

        let proposal = propose_action(&state, &content, ActionKind::Rest, 1).unwrap();
        assert!(proposal.cost().abs() < 1e-9);
        let events = commit_action(&mut state, &content, &proposal).unwrap();

        assert!(state.staff[1].fatigue.abs() < 1e-9);
        assert!((state.staff[1].score - (before + content.constants.rest_score_bonus)).abs() < 1e-9);
        assert!(matches!(events[0].event, Event::StaffRested { index: 1, .. }));
    }

    #[test]
    fn train_debits_savings() {
        let content = base_content();
        let mut state = base_state(&content);
        let savings = state.savings;

        let proposal = propose_action(&state, &content, ActionKind::Train, 0).unwrap();
        assert!(proposal.description.contains("$500"));
        commit_action(&mut state, &content, &proposal).unwrap();

        assert!((state.savings - (savings - content.constants.train_cost)).abs() < 1e-9);
    }

    #[test]
    fn score_is_capped_by_clamp_policy() {
        let content = base_content();
        let mut state = base_state(&content);
        state.staff[0].score = 99.0;

        let proposal = propose_action(&state, &content, ActionKind::Train, 0).unwrap();
        commit_action(&mut state, &content, &proposal).unwrap();

        assert!((state.staff[0].score - content.constants.score_cap).abs() < 1e-9);
    }

    #[test]
    fn health_45_is_severe_and_fix_restores_full_health() {
        let content = base_content();
        let mut state = base_state(&content);
        state.assets[1].health = 45.0;

        let proposal = propose_action(&state, &content, ActionKind::Fix, 1).unwrap();
        assert_eq!(proposal.tier, Some(RepairTier::Severe));

        commit_action(&mut state, &content, &proposal).unwrap();
        assert!((state.assets[1].health - 100.0).abs() < f64::EPSILON);
        assert!((state.assets[1].load - content.constants.asset_nominal_load).abs() < 1e-9);
    }

    #[test]
    fn repair_tiers_follow_health_bands() {
        let constants = base_content().constants;
        assert_eq!(repair_tier(0.0, &constants), RepairTier::Severe);
        assert_eq!(repair_tier(49.9, &constants), RepairTier::Severe);
        assert_eq!(repair_tier(50.0, &constants), RepairTier::Moderate);
        assert_eq!(repair_tier(79.9, &constants), RepairTier::Moderate);
        assert_eq!(repair_tier(80.0, &constants), RepairTier::Minor);
    }

    #[test]
    fn fix_savings_sign_follows_policy() {
        let mut content = base_content();
        let mut state = base_state(&content);
        state.assets[0].health = 45.0;
        let savings = state.savings;

        content.constants.fix_savings_policy = FixSavingsPolicy::AvoidedDowntime;
        let proposal = propose_action(&state, &content, ActionKind::Fix, 0).unwrap();
        commit_action(&mut state, &content, &proposal).unwrap();
        assert!((state.savings - (savings + content.constants.fix_severe_amount)).abs() < 1e-9);

        state.assets[0].health = 45.0;
        content.constants.fix_savings_policy = FixSavingsPolicy::RepairCost;
        let proposal = propose_action(&state, &content, ActionKind::Fix, 0).unwrap();
        assert!(proposal.description.contains("repair cost"));
        commit_action(&mut state, &content, &proposal).unwrap();
        assert!((state.savings - savings).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let content = base_content();
        let state = base_state(&content);
        let err = propose_action(&state, &content, ActionKind::Fix, 99).unwrap_err();
        assert_eq!(
            err,
            ActionError::InvalidIndex {
                kind: ActionKind::Fix,
                index: 99,
                len: state.assets.len()
            }
        );
        assert!(propose_action(&state, &content, ActionKind::Rest, state.staff.len()).is_err());
    }

    #[test]
    fn commit_rejects_proposal_for_another_target() {
        let content = base_content();
        let mut state = base_state(&content);
        let mut proposal = propose_action(&state, &content, ActionKind::Rest, 0).unwrap();
        proposal.target = "Someone Else".to_string();
        let fatigue = state.staff[0].fatigue;

        let err = commit_action(&mut state, &content, &proposal).unwrap_err();
        assert!(matches!(err, ActionError::StaleProposal { index: 0, .. }));
        assert!((state.staff[0].fatigue - fatigue).abs() < 1e-9);
    }

    #[test]
    fn commit_rejects_inflated_savings_delta() {
        let content = base_content();
        let mut state = base_state(&content);
        let mut proposal = propose_action(&state, &content, ActionKind::Rest, 1).unwrap();
        proposal.savings_delta = 1_000_000.0;
        let savings = state.savings;
        let fatigue = state.staff[1].fatigue;

        let err = commit_action(&mut state, &content, &proposal).unwrap_err();
        assert!(matches!(err, ActionError::StaleProposal { index: 1, .. }));
        assert!((state.savings - savings).abs() < 1e-9);
        assert!((state.staff[1].fatigue - fatigue).abs() < 1e-9);
    }

    #[test]
    fn commit_rejects_training_booked_as_income() {
        let content = base_content();
        let mut state = base_state(&content);
        let mut proposal = propose_action(&state, &content, ActionKind::Train, 0).unwrap();
        proposal.savings_delta = content.constants.train_cost;
        let savings = state.savings;

        let err = commit_action(&mut state, &content, &proposal).unwrap_err();
        assert!(matches!(err, ActionError::StaleProposal { .. }));
        assert!((state.savings - savings).abs() < 1e-9);
    }

    #[test]
    fn fix_priced_before_decay_must_be_proposed_again() {
        let content = base_content();
        let mut state = base_state(&content);
        state.assets[1].health = 85.0;
        let minor = propose_action(&state, &content, ActionKind::Fix, 1).unwrap();
        assert_eq!(minor.tier, Some(RepairTier::Minor));

        state.assets[1].health = 10.0;
        let savings = state.savings;
        let err = commit_action(&mut state, &content, &minor).unwrap_err();
        assert_eq!(
            err,
            ActionError::StaleProposal {
                index: 1,
                expected: "Minor repair, $1,000".to_string(),
                found: "Severe repair, $5,000".to_string(),
            }
        );
        assert!((state.assets[1].health - 10.0).abs() < 1e-9);
        assert!((state.savings - savings).abs() < 1e-9);

        let severe = propose_action(&state, &content, ActionKind::Fix, 1).unwrap();
        commit_action(&mut state, &content, &severe).unwrap();
        assert!((state.savings - (savings + content.constants.fix_severe_amount)).abs() < 1e-9);
    }

    #[test]
    fn toggle_source_clears_history_and_disconnects() {
        let content = base_content();
        let mut state = base_state(&content);
        assert!(!state.history.is_empty());

        let events = toggle_source(&mut state, &content);

        assert!(state.history.is_empty());
        assert_eq!(state.connection.current, SourceConnection::Disconnected);
        assert!(matches!(
            events[0].event,
            Event::SourceSwitching {
                to: crate::DataSource::Azure,
                ..
            }
        ));
    }

    #[test]
    fn toggle_twice_while_reconnecting_targets_original_source() {
        let content = base_content();
        let mut state = base_state(&content);
        toggle_source(&mut state, &content);
        toggle_source(&mut state, &content);
        let pending = state.connection.reconnect.as_ref().unwrap();
        assert_eq!(pending.target, crate::DataSource::Bq);
    }

    #[test]
    fn instant_reconnect_when_delay_is_zero() {
        let mut content = base_content();
        content.constants.source_reconnect_ticks = 0;
        let mut state = base_state(&content);

        let events = toggle_source(&mut state, &content);

        assert_eq!(state.connection.current, SourceConnection::Azure);
        assert!(!state.connection.is_reconnecting());
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn switch_view_accepts_known_keys_only() {
        let content = base_content();
        let mut state = base_state(&content);

        switch_view(&mut state, "maintenance").unwrap();
        assert_eq!(state.view, ActiveView::Maintenance);

        let err = switch_view(&mut state, "settings").unwrap_err();
        assert_eq!(err, ActionError::UnknownView("settings".to_string()));
        assert_eq!(state.view, ActiveView::Maintenance);
    }
}
