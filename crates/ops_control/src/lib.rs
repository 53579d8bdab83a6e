use ops_core::{
    commit_action, project, propose_action, ActionError, ActionProposal, DashboardContent,
    DashboardState, EventEnvelope,
};
use serde::{Deserialize, Serialize};

/// Decides whether a proposed action goes ahead. Stands in for the
/// confirmation dialog a human operator would see.
pub trait Approver {
    fn approve(&mut self, proposal: &ActionProposal, state: &DashboardState) -> bool;
}

/// Produces action proposals for the current state.
pub trait ActionSource {
    fn propose_actions(
        &mut self,
        state: &DashboardState,
        content: &DashboardContent,
    ) -> Vec<ActionProposal>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorMode {
    /// Nothing is done without an explicit request.
    None,
    /// `AutoOperator` + `AlwaysApprove` run after every tick.
    Auto,
}

impl OperatorMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(Self::None),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }
}

pub struct AlwaysApprove;

impl Approver for AlwaysApprove {
    fn approve(&mut self, _proposal: &ActionProposal, _state: &DashboardState) -> bool {
        true
    }
}

/// Approves anything that keeps savings at or above `floor`.
pub struct BudgetApprover {
    pub floor: f64,
}

impl Approver for BudgetApprover {
    fn approve(&mut self, proposal: &ActionProposal, state: &DashboardState) -> bool {
        state.savings + proposal.savings_delta >= self.floor
    }
}

/// Follows the dashboard's own recommendations:
/// 1. Rest staff above the fatigue threshold.
/// 2. Fix assets below the health threshold.
/// 3. Train staff below the score threshold.
///
/// At most `max_per_cycle` proposals per call, in that priority order.
pub struct AutoOperator {
    pub max_per_cycle: usize,
}

impl Default for AutoOperator {
    fn default() -> Self {
        Self { max_per_cycle: 2 }
    }
}

impl ActionSource for AutoOperator {
    fn propose_actions(
        &mut self,
        state: &DashboardState,
        content: &DashboardContent,
    ) -> Vec<ActionProposal> {
        let view = project(state, content);

        let rests = view
            .staff_rows
            .iter()
            .filter(|row| matches!(&row.action, Some(a) if a.kind == ops_core::ActionKind::Rest))
            .map(|row| (ops_core::ActionKind::Rest, row.index));
        let fixes = view
            .asset_rows
            .iter()
            .filter(|row| row.action.is_some())
            .map(|row| (ops_core::ActionKind::Fix, row.index));
        let trainings = view
            .staff_rows
            .iter()
            .filter(|row| matches!(&row.action, Some(a) if a.kind == ops_core::ActionKind::Train))
            .map(|row| (ops_core::ActionKind::Train, row.index));

        rests
            .chain(fixes)
            .chain(trainings)
            .take(self.max_per_cycle)
            .filter_map(|(kind, index)| propose_action(state, content, kind, index).ok())
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct OperatorOutcome {
    pub committed: Vec<ActionProposal>,
    pub declined: Vec<ActionProposal>,
    pub events: Vec<EventEnvelope>,
}

/// Proposes, asks for approval and commits, one proposal at a time so each
/// approval sees the savings left by the previous commit.
pub fn run_operator(
    source: &mut impl ActionSource,
    approver: &mut impl Approver,
    state: &mut DashboardState,
    content: &DashboardContent,
) -> Result<OperatorOutcome, ActionError> {
    let mut outcome = OperatorOutcome::default();
    for proposal in source.propose_actions(state, content) {
        if approver.approve(&proposal, state) {
            outcome
                .events
                .extend(commit_action(state, content, &proposal)?);
            outcome.committed.push(proposal);
        } else {
            outcome.declined.push(proposal);
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ops_core::test_fixtures::{base_content, base_state};
    use ops_core::ActionKind;

    struct RejectAll;

    impl Approver for RejectAll {
        fn approve(&mut self, _proposal: &ActionProposal, _state: &DashboardState) -> bool {
            false
        }
    }

    #[test]
    fn auto_operator_prioritises_rest_then_fix() {
        let content = base_content();
        let state = base_state(&content);
        let proposals = AutoOperator::default().propose_actions(&state, &content);

        let plan: Vec<(ActionKind, usize)> = proposals.iter().map(|p| (p.kind, p.index)).collect();
        assert_eq!(plan, vec![(ActionKind::Rest, 1), (ActionKind::Fix, 1)]);
    }

    #[test]
    fn auto_operator_trains_when_nothing_urgent() {
        let content = base_content();
        let mut state = base_state(&content);
        state.staff[1].fatigue = 10.0;
        state.assets[1].health = 90.0;

        let proposals = AutoOperator::default().propose_actions(&state, &content);

        // Mike R. is rested but his score is still below the training threshold.
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].kind, ActionKind::Train);
        assert_eq!(proposals[0].index, 1);
    }

    #[test]
    fn healthy_dashboard_produces_no_proposals() {
        let content = base_content();
        let mut state = base_state(&content);
        state.staff[1].fatigue = 10.0;
        state.staff[1].score = 90.0;
        state.assets[1].health = 90.0;
        assert!(AutoOperator::default()
            .propose_actions(&state, &content)
            .is_empty());
    }

    #[test]
    fn max_per_cycle_limits_proposals() {
        let content = base_content();
        let state = base_state(&content);
        let mut operator = AutoOperator { max_per_cycle: 1 };
        assert_eq!(operator.propose_actions(&state, &content).len(), 1);
    }

    #[test]
    fn run_operator_commits_approved_actions() {
        let content = base_content();
        let mut state = base_state(&content);

        let outcome = run_operator(
            &mut AutoOperator::default(),
            &mut AlwaysApprove,
            &mut state,
            &content,
        )
        .unwrap();

        assert_eq!(outcome.committed.len(), 2);
        assert_eq!(outcome.events.len(), 2);
        assert!(state.staff[1].fatigue.abs() < f64::EPSILON);
        assert!((state.assets[1].health - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn declined_actions_leave_state_untouched() {
        let content = base_content();
        let mut state = base_state(&content);
        let before = state.staff.clone();

        let outcome =
            run_operator(&mut AutoOperator::default(), &mut RejectAll, &mut state, &content)
                .unwrap();

        assert!(outcome.committed.is_empty());
        assert_eq!(outcome.declined.len(), 2);
        assert_eq!(state.staff, before);
    }

    #[test]
    fn budget_approver_blocks_spend_below_floor() {
        let content = base_content();
        let mut state = base_state(&content);
        state.savings = 300.0;
        let train = propose_action(&state, &content, ActionKind::Train, 0).unwrap();
        let rest = propose_action(&state, &content, ActionKind::Rest, 1).unwrap();

        let mut approver = BudgetApprover { floor: 0.0 };
        assert!(!approver.approve(&train, &state));
        assert!(approver.approve(&rest, &state));
    }

    #[test]
    fn operator_mode_names() {
        assert_eq!(OperatorMode::from_name("auto"), Some(OperatorMode::Auto));
        assert_eq!(OperatorMode::from_name("none"), Some(OperatorMode::None));
        assert_eq!(OperatorMode::from_name("manual"), None);
    }
}
