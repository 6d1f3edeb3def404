//! Rounds, from asking for moves to declaring a result.
//!
//! Each round walks through the same phases: both agents are asked for a move (red first, then
//! blue, or both at once with parallel turns), the moves are resolved against the world, the
//! round counter is incremented and the hit set is evaluated. A match ends on the first hit or
//! surrender, or as a tie once the round counter reaches the configured cap.

use std::{sync::Arc, thread};

use anyhow::anyhow;
use tracing::{debug, info, instrument};

use crate::agent::{Agent, AgentHandle};
use crate::arbitration::{Arbiter, ExecutableAgent, TurnReport};
use crate::configuration::MatchConfig;
use crate::constraints::Constraints;
use crate::generator::WorldGenerator;
use crate::moves::Move;
use crate::render::print_board;
use crate::resolver::resolve;
use crate::world::{HitSet, Side, World};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TieReason {
    BothHit,
    RoundLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Winner(Side),
    Tie(TieReason),
}

impl Outcome {
    /// Line printed to the operator at the end of a match.
    pub fn message(&self) -> &'static str {
        match self {
            Outcome::Winner(Side::Red) => "Red player won!",
            Outcome::Winner(Side::Blue) => "Blue player won!",
            Outcome::Tie(TieReason::BothHit) => "Tie! (both hit)",
            Outcome::Tie(TieReason::RoundLimit) => "Tie! (round limit)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchReport {
    pub outcome: Outcome,
    /// Number of completed rounds.
    pub rounds: u32,
    /// Seed the world was generated with, when it was generated.
    pub seed: Option<u64>,
}

enum Phase {
    AwaitingMoves,
    Resolving([Move; 2]),
    Evaluating(HitSet),
    Done(Outcome),
}

/// Result of a round whose hit set is `hits`, `round` rounds having been completed.
/// `None` means the match goes on.
pub fn evaluate(hits: &HitSet, round: u32, round_cap: u32) -> Option<Outcome> {
    match (hits.contains(Side::Red), hits.contains(Side::Blue)) {
        (true, true) => Some(Outcome::Tie(TieReason::BothHit)),
        (true, false) => Some(Outcome::Winner(Side::Blue)),
        (false, true) => Some(Outcome::Winner(Side::Red)),
        (false, false) if round >= round_cap => Some(Outcome::Tie(TieReason::RoundLimit)),
        (false, false) => None,
    }
}

/// One match between two agents. `agents[0]` plays red, `agents[1]` plays blue.
pub struct Match<A> {
    world: World,
    round: u32,
    agents: [A; 2],
    config: MatchConfig,
    seed: Option<u64>,
}

impl<A: Agent + Send> Match<A> {
    /// A match on an existing world.
    pub fn new(world: World, agents: [A; 2], config: MatchConfig) -> Self {
        Match {
            world,
            round: 0,
            agents,
            config,
            seed: None,
        }
    }

    /// A match on a freshly generated world.
    ///
    /// # Errors
    /// Returned when `config` is invalid.
    pub fn from_config(agents: [A; 2], config: MatchConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let (world, seed) = WorldGenerator::new(config.height, config.width)
            .with_wall_count(config.wall_count)
            .with_seed(config.seed)
            .generate()?;
        Ok(Match {
            seed: Some(seed),
            ..Match::new(world, agents, config)
        })
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// Plays rounds until the match is decided.
    ///
    /// # Errors
    /// Returned when an agent fails in a way that must stop the match (see
    /// [`Agent::select_move`]).
    #[instrument(skip_all, fields(red = self.agents[0].name(), blue = self.agents[1].name()))]
    pub fn play(mut self) -> anyhow::Result<MatchReport> {
        info!(seed = ?self.seed, "match started");
        self.render();

        let mut phase = Phase::AwaitingMoves;
        loop {
            phase = match phase {
                Phase::AwaitingMoves => Phase::Resolving(self.collect_moves()?),
                Phase::Resolving(moves) => {
                    let hits = resolve(&mut self.world, moves);
                    self.round += 1;
                    self.render();
                    Phase::Evaluating(hits)
                }
                Phase::Evaluating(hits) => match evaluate(&hits, self.round, self.config.round_cap) {
                    Some(outcome) => Phase::Done(outcome),
                    None => {
                        if let Some(wait) = self.config.wait {
                            thread::sleep(wait);
                        }
                        Phase::AwaitingMoves
                    }
                },
                Phase::Done(outcome) => {
                    info!(rounds = self.round, "{}", outcome.message());
                    return Ok(MatchReport {
                        outcome,
                        rounds: self.round,
                        seed: self.seed,
                    });
                }
            }
        }
    }

    fn collect_moves(&mut self) -> anyhow::Result<[Move; 2]> {
        let world = &self.world;
        let round = self.round;
        let [red, blue] = &mut self.agents;

        let [red_report, blue_report]: [TurnReport; 2] =
            if self.config.parallel_turns && !self.config.execution_mode.is_sandboxed() {
                thread::scope(|s| {
                    let blue_turn = s.spawn(move || blue.select_move(world, round, Side::Blue));
                    let red_report = red.select_move(world, round, Side::Red);
                    let blue_report = blue_turn
                        .join()
                        .map_err(|_| anyhow!("blue agent thread panicked"))?;
                    anyhow::Ok([red_report?, blue_report?])
                })?
            } else {
                let red_report = red.select_move(world, round, Side::Red)?;
                let blue_report = blue.select_move(world, round, Side::Blue)?;
                [red_report, blue_report]
            };

        debug!(round, red = %red_report.mv, blue = %blue_report.mv, "moves collected");
        Ok([red_report.mv, blue_report.mv])
    }

    fn render(&self) {
        if !self.config.silent {
            print_board(
                &self.world,
                self.round,
                self.config.render_mode,
                self.config.clear_terminal,
            );
        }
    }
}

/// Plays one match between two executables.
///
/// # Errors
/// Returned for an invalid configuration, or when arbitration hits a fault that stops the match
/// (such as a [`RuleViolation`](crate::arbitration::RuleViolation)).
pub fn run_match(
    red: AgentHandle,
    blue: AgentHandle,
    config: &MatchConfig,
    constraints: Constraints,
) -> anyhow::Result<MatchReport> {
    config.validate()?;
    let arbiter = Arc::new(
        Arbiter::new(config.execution_mode.clone(), constraints)
            .with_allow_uncontained(config.allow_uncontained)
            .with_debug_agent_stderr(config.debug_agent_stderr),
    );
    let agents = [
        ExecutableAgent::new(red, Arc::clone(&arbiter)),
        ExecutableAgent::new(blue, arbiter),
    ];
    Match::from_config(agents, config.clone())?.play()
}
