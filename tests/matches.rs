#![cfg(unix)]

use std::time::Duration;

use grid_duel::prelude::*;

mod common;
use common::{init_test_logger, Scratch};

fn quick_config() -> MatchConfig {
    MatchConfig::new()
        .with_dimensions(6, 8)
        .with_wall_count(4)
        .with_seed(Some(1))
        .with_silent(true)
}

fn constraints(timeout_ms: u64) -> Constraints {
    Constraints::builder()
        .with_action_timeout(Duration::from_millis(timeout_ms))
        .build()
        .unwrap()
}

#[test]
fn surrender_hands_the_win_to_the_other_side() {
    init_test_logger();
    let scratch = Scratch::new("match_surrender");
    let report = run_match(
        scratch.agent("red", "echo 3"),
        scratch.agent("blue", "echo 9"),
        &quick_config(),
        constraints(1000),
    )
    .unwrap();
    assert_eq!(report.outcome, Outcome::Winner(Side::Red));
    assert_eq!(report.rounds, 1);
    assert_eq!(report.seed, Some(1));
}

#[test]
fn waiting_agents_tie_at_the_round_cap() {
    let scratch = Scratch::new("match_cap");
    let report = run_match(
        scratch.agent("red", "echo 8"),
        scratch.agent("blue", "echo 8"),
        &quick_config().with_round_cap(3),
        constraints(1000),
    )
    .unwrap();
    assert_eq!(report.outcome, Outcome::Tie(TieReason::RoundLimit));
    assert_eq!(report.rounds, 3);
}

#[test]
fn crashing_agent_forfeits() {
    let scratch = Scratch::new("match_crash");
    let report = run_match(
        scratch.agent("red", "exit 2"),
        scratch.agent("blue", "echo 8"),
        &quick_config(),
        constraints(1000),
    )
    .unwrap();
    assert_eq!(report.outcome, Outcome::Winner(Side::Blue));
    assert_eq!(report.rounds, 1);
}

#[test]
fn slow_agent_only_loses_tempo() {
    let scratch = Scratch::new("match_slow");
    for parallel in [false, true] {
        let report = run_match(
            scratch.agent("red", "echo 8"),
            scratch.agent("blue", "sleep 2\necho 9"),
            &quick_config().with_round_cap(2).with_parallel_turns(parallel),
            constraints(100),
        )
        .unwrap();
        assert_eq!(report.outcome, Outcome::Tie(TieReason::RoundLimit));
        assert_eq!(report.rounds, 2);
    }
}

#[test]
fn sandbox_violation_aborts_the_match() {
    let scratch = Scratch::new("match_violation");
    let root = scratch.path().join("box");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join("run.sh"), "exit 7\n").unwrap();
    let config = quick_config().with_execution_mode(ExecutionMode::Sandboxed(SandboxSettings::new(&root)));

    let err = run_match(
        AgentHandle::new(scratch.script("red", "echo 8")),
        AgentHandle::new(scratch.script("blue", "echo 8")),
        &config,
        constraints(500),
    )
    .unwrap_err();
    assert!(err.downcast_ref::<RuleViolation>().is_some());
}

#[test]
fn sandboxed_match_runs_to_completion() {
    let scratch = Scratch::new("match_sandbox");
    let root = scratch.path().join("box");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join("run.sh"), "sh prog/exec < in/in > out/user_output\n").unwrap();
    let config = quick_config().with_execution_mode(ExecutionMode::Sandboxed(SandboxSettings::new(&root)));

    let report = run_match(
        AgentHandle::new(scratch.script("red", "cat > /dev/null\necho 9")),
        AgentHandle::new(scratch.script("blue", "cat > /dev/null\necho 8")),
        &config,
        constraints(1000),
    )
    .unwrap();
    assert_eq!(report.outcome, Outcome::Winner(Side::Blue));
}

#[test]
fn bad_dimensions_fail_before_any_agent_runs() {
    let scratch = Scratch::new("match_config");
    let marker = scratch.path().join("ran");
    let body = format!("touch {}\necho 8", marker.display());
    let result = run_match(
        scratch.agent("red", &body),
        scratch.agent("blue", &body),
        &quick_config().with_dimensions(3, 3),
        constraints(500),
    );
    assert!(result.is_err());
    assert!(!marker.exists());
}
