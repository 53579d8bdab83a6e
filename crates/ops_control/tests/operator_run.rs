//! Integration test: shipped content + auto operator over a long run.

use ops_control::{run_operator, AlwaysApprove, AutoOperator, BudgetApprover};
use ops_core::{at_risk_count, tick, DashboardContent, DashboardState};
use ops_world::{build_initial_state, load_content};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn content() -> DashboardContent {
    let manifest = std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
    load_content(&format!("{manifest}/../../content")).expect("shipped content loads")
}

fn run(content: &DashboardContent, seed: u64, ticks: u64) -> DashboardState {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut state = build_initial_state(content, seed, &mut rng).unwrap();
    // Wide enough to clear every flagged row in one cycle.
    let mut operator = AutoOperator { max_per_cycle: 8 };
    for _ in 0..ticks {
        tick(&mut state, content, &mut rng);
        run_operator(&mut operator, &mut AlwaysApprove, &mut state, content).unwrap();
    }
    state
}

#[test]
fn auto_operator_keeps_dashboard_out_of_the_red() {
    let content = content();
    let state = run(&content, 42, 300);

    assert_eq!(at_risk_count(&state, &content.constants), 0);
    assert!(state.assets.iter().all(|a| a.health > 0.0));
    assert!(state.staff.iter().all(|m| m.fatigue <= 100.0));
}

#[test]
fn operated_runs_are_reproducible() {
    let content = content();
    let a = serde_json::to_string(&run(&content, 7, 150)).unwrap();
    let b = serde_json::to_string(&run(&content, 7, 150)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn budget_floor_is_respected_over_a_run() {
    let content = content();
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let mut state = build_initial_state(&content, 3, &mut rng).unwrap();
    state.savings = 1_000.0;
    let mut approver = BudgetApprover { floor: 800.0 };
    let mut operator = AutoOperator { max_per_cycle: 4 };

    for _ in 0..200 {
        tick(&mut state, &content, &mut rng);
        run_operator(&mut operator, &mut approver, &mut state, &content).unwrap();
        assert!(state.savings >= 800.0);
    }
}
