//! Match settings
//!
//! Configuration can be created programmatically using [`MatchConfig::new()`] or by reading
//! environment variables using [`MatchConfig::from_env()`]. Per-turn limits (timeout, RAM, CPUs)
//! are not part of it, see [`constraints`](crate::constraints).
//!
//! # Environment Variables
//!
//! All values are optional. Flags are enabled by the case-insensitive value `"true"`; numbers that
//! fail to parse leave the default in place.
//!
//! - `DUEL_HEIGHT`, `DUEL_WIDTH`: grid size (default: `20` x `30`)
//! - `DUEL_WALL_COUNT`: approximate number of interior walls (default: `30`)
//! - `DUEL_SEED`: generator seed (default: unseeded)
//! - `DUEL_ROUND_COUNT`: rounds before a tie is declared (default: `100`)
//! - `DUEL_WAIT_MS`: pause between rounds (default: none)
//! - `DUEL_SILENT`: do not render the board (default: `false`)
//! - `DUEL_NICE_PRINT`: compact render (default: `false`)
//! - `DUEL_CLEAR_TERMINAL`: clear the terminal before each render (default: `false`)
//! - `DUEL_SANDBOX`: run agents through the sandbox rooted at this directory (default: direct)
//! - `DUEL_ALLOW_UNCONTAINED`: run agents without a cgroup if one cannot be created (default: `true`)
//! - `DUEL_PARALLEL`: request both direct-mode moves concurrently (default: `false`)
//! - `DUEL_LOG`: log to a file (default: `false`)
//! - `DUEL_DEBUG_AGENT_STDERR`: let agent stderr through (default: `false`)

use std::{env, str::FromStr, time::Duration};

use anyhow::bail;

use crate::arbitration::{ExecutionMode, SandboxSettings};
use crate::board_codec::RenderMode;
use crate::world::MIN_DIMENSION;

/// Settings of a single match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchConfig {
    pub(crate) height: usize,
    pub(crate) width: usize,
    pub(crate) wall_count: usize,
    pub(crate) seed: Option<u64>,
    pub(crate) round_cap: u32,
    pub(crate) render_mode: RenderMode,
    pub(crate) silent: bool,
    pub(crate) clear_terminal: bool,
    pub(crate) wait: Option<Duration>,
    pub(crate) execution_mode: ExecutionMode,
    pub(crate) allow_uncontained: bool,
    pub(crate) parallel_turns: bool,
    pub(crate) log: bool,
    pub(crate) debug_agent_stderr: bool,
}

impl MatchConfig {
    /// Default settings: a 20 x 30 arena with about 30 walls, 100 rounds, full render, agents run
    /// directly.
    pub fn new() -> Self {
        Self {
            height: 20,
            width: 30,
            wall_count: 30,
            seed: None,
            round_cap: 100,
            render_mode: RenderMode::Full,
            silent: false,
            clear_terminal: false,
            wait: None,
            execution_mode: ExecutionMode::Direct,
            allow_uncontained: true,
            parallel_turns: false,
            log: false,
            debug_agent_stderr: false,
        }
    }

    /// Create configuration from `DUEL_*` environment variables, see the module documentation.
    pub fn from_env() -> Self {
        fn get_env_flag(var: &str, default: bool) -> bool {
            match env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }

        fn get_env_number<T: FromStr>(var: &str) -> Option<T> {
            env::var(var).ok()?.trim().parse().ok()
        }

        let defaults = Self::new();
        Self {
            height: get_env_number("DUEL_HEIGHT").unwrap_or(defaults.height),
            width: get_env_number("DUEL_WIDTH").unwrap_or(defaults.width),
            wall_count: get_env_number("DUEL_WALL_COUNT").unwrap_or(defaults.wall_count),
            seed: get_env_number("DUEL_SEED"),
            round_cap: get_env_number("DUEL_ROUND_COUNT").unwrap_or(defaults.round_cap),
            render_mode: if get_env_flag("DUEL_NICE_PRINT", false) {
                RenderMode::Compact
            } else {
                RenderMode::Full
            },
            silent: get_env_flag("DUEL_SILENT", false),
            clear_terminal: get_env_flag("DUEL_CLEAR_TERMINAL", false),
            wait: get_env_number("DUEL_WAIT_MS").map(Duration::from_millis),
            execution_mode: match env::var("DUEL_SANDBOX") {
                Ok(root) if !root.is_empty() => ExecutionMode::Sandboxed(SandboxSettings::new(root)),
                _ => ExecutionMode::Direct,
            },
            allow_uncontained: get_env_flag("DUEL_ALLOW_UNCONTAINED", true),
            parallel_turns: get_env_flag("DUEL_PARALLEL", false),
            log: get_env_flag("DUEL_LOG", false),
            debug_agent_stderr: get_env_flag("DUEL_DEBUG_AGENT_STDERR", false),
        }
    }

    /// Grid size, both at least 4.
    pub fn with_dimensions(mut self, height: usize, width: usize) -> Self {
        self.height = height;
        self.width = width;
        self
    }

    /// Approximate number of walls; half as many random positions are drawn, each mirrored.
    pub fn with_wall_count(mut self, value: usize) -> Self {
        self.wall_count = value;
        self
    }

    pub fn with_seed(mut self, value: Option<u64>) -> Self {
        self.seed = value;
        self
    }

    /// Number of rounds after which the match is a tie.
    pub fn with_round_cap(mut self, value: u32) -> Self {
        self.round_cap = value;
        self
    }

    pub fn with_render_mode(mut self, value: RenderMode) -> Self {
        self.render_mode = value;
        self
    }

    /// Enable or disable silent mode (no board rendering).
    pub fn with_silent(mut self, value: bool) -> Self {
        self.silent = value;
        self
    }

    pub fn with_clear_terminal(mut self, value: bool) -> Self {
        self.clear_terminal = value;
        self
    }

    /// Pause between rounds.
    pub fn with_wait(mut self, value: Option<Duration>) -> Self {
        self.wait = value;
        self
    }

    pub fn with_execution_mode(mut self, value: ExecutionMode) -> Self {
        self.execution_mode = value;
        self
    }

    /// Enable or disable running agents without a cgroup when one cannot be created.
    pub fn with_allow_uncontained(mut self, value: bool) -> Self {
        self.allow_uncontained = value;
        self
    }

    /// Request both moves concurrently. Ignored in sandboxed mode.
    pub fn with_parallel_turns(mut self, value: bool) -> Self {
        self.parallel_turns = value;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Enable or disable agent stderr output (debug purposes only).
    pub fn with_debug_agent_stderr(mut self, value: bool) -> Self {
        self.debug_agent_stderr = value;
        self
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn round_cap(&self) -> u32 {
        self.round_cap
    }

    pub fn execution_mode(&self) -> &ExecutionMode {
        &self.execution_mode
    }

    pub fn silent(&self) -> bool {
        self.silent
    }

    pub fn log(&self) -> bool {
        self.log
    }

    /// # Errors
    /// Returned for dimensions below 4 or a round cap of 0.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.height < MIN_DIMENSION || self.width < MIN_DIMENSION {
            bail!(
                "grid must be at least {MIN_DIMENSION}x{MIN_DIMENSION}, got {}x{}",
                self.height,
                self.width
            );
        }
        if self.round_cap == 0 {
            bail!("round count must be at least 1");
        }
        Ok(())
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self::new()
    }
}
