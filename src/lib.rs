//! # Grid Duel
//!
//! A referee for a two-player arena game played by untrusted executables.
//!
//! Two agents, red and blue, spawn in opposite corners of a walled grid. Every round each agent
//! receives the board on stdin and answers with a single integer naming its move: step in one of
//! four directions, shoot a projectile in one of four directions, wait, or surrender. Both moves
//! are applied at once, projectiles advance, and any agent standing on a projectile is hit. The
//! first hit decides the match; a double hit, or reaching the round cap, is a tie.
//!
//! It provides:
//! - a deterministic simulation: [`world`], the seeded [`generator`] and the [`resolver`]
//! - the agent wire format in [`board_codec`]
//! - turn arbitration in [`arbitration`]: timeouts, fault fallbacks, optional cgroup containment
//!   (see [`constraints`]) and a file-based sandbox mode
//! - the round loop in [`match_driver`]
//!
//! # Agent Protocol
//!
//! Input on stdin (full encoding, four characters per tile, see [`board_codec`]):
//!
//! ```text
//! <height> <width>
//! <height rows>
//! <round>
//! <R or B>
//! ```
//!
//! Output on stdout: one integer between 0 and 9, then exit with status 0.
//!
//! | code | move        | code | move        |
//! |------|-------------|------|-------------|
//! | 0    | move up     | 5    | shoot down  |
//! | 1    | move down   | 6    | shoot left  |
//! | 2    | move left   | 7    | shoot right |
//! | 3    | move right  | 8    | wait        |
//! | 4    | shoot up    | 9    | surrender   |
//!
//! A slow agent waits, a crashing agent or a garbled reply surrenders.
//!
//! # Usage Example
//!
//! ```no_run
//! use std::time::Duration;
//! use grid_duel::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let constraints = ConstraintsBuilder::new()
//!         .with_action_timeout(Duration::from_millis(200))
//!         .build()?;
//!     let config = MatchConfig::new().with_seed(Some(7)).with_silent(true);
//!
//!     let report = run_match(
//!         AgentHandle::new("./agents/red"),
//!         AgentHandle::new("./agents/blue"),
//!         &config,
//!         constraints,
//!     )?;
//!     println!("{} after {} rounds", report.outcome.message(), report.rounds);
//!     Ok(())
//! }
//! ```

pub use anyhow;

pub mod agent;
pub mod arbitration;
pub mod board_codec;
mod cgroup_manager;
pub mod configuration;
pub mod constraints;
pub mod generator;
pub mod logger;
pub mod match_driver;
pub mod moves;
pub mod render;
pub mod resolver;
pub mod world;

/// Commonly used types for quick access.
///
/// ```rust
/// use grid_duel::prelude::*;
/// ```
pub mod prelude {
    pub use crate::agent::{Agent, AgentHandle};
    pub use crate::arbitration::{
        Arbiter, ExecutableAgent, ExecutionMode, RuleViolation, SandboxSettings, TurnFault,
        TurnReport,
    };
    pub use crate::board_codec::RenderMode;
    pub use crate::configuration::MatchConfig;
    pub use crate::constraints::{Constraints, ConstraintsBuilder};
    pub use crate::match_driver::{run_match, Match, MatchReport, Outcome, TieReason};
    pub use crate::moves::Move;
    pub use crate::world::{Direction, Position, Side, World};
}
