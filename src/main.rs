//! Single-match front end.
//!
//! Settings come from `DUEL_*` / constraint environment variables first (see
//! [`MatchConfig::from_env`] and [`ConstraintsBuilder::from_env`]); flags given on the command
//! line override them.

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use tracing::info;

use grid_duel::logger::{init_logger, init_stderr_logger};
use grid_duel::prelude::*;
use grid_duel::render::{highlight, side_label};

#[derive(Parser, Debug)]
#[command(name = "grid-duel", about = "Referee a grid duel between two agent executables")]
struct Args {
    /// Executable playing red
    #[arg(short, long)]
    red: PathBuf,

    /// Executable playing blue
    #[arg(short, long)]
    blue: PathBuf,

    /// Don't print the board after each round
    #[arg(short, long)]
    silent: bool,

    /// Time an agent has to answer, in milliseconds [default: 500]
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Grid height [default: 20]
    #[arg(short = 'n', long)]
    height: Option<usize>,

    /// Grid width [default: 30]
    #[arg(short = 'm', long)]
    width: Option<usize>,

    /// Approximate number of walls [default: 30]
    #[arg(short, long)]
    wall_count: Option<usize>,

    /// Number of rounds after which the match is a tie [default: 100]
    #[arg(long)]
    round_count: Option<u32>,

    /// Seed of the world generator
    #[arg(long)]
    seed: Option<u64>,

    /// Pause between rounds, in milliseconds
    #[arg(long)]
    wait: Option<u64>,

    /// One character per tile when printing the board
    #[arg(long)]
    nice_print: bool,

    /// Clear the terminal before printing the board
    #[arg(long)]
    clear_terminal: bool,

    /// Run agents through the sandbox launcher `DIR/run.sh`
    #[arg(long, value_name = "DIR")]
    sandbox: Option<PathBuf>,

    /// Memory limit per agent, in MB
    #[arg(long)]
    ram_per_agent: Option<usize>,

    /// CPUs agents may run on, e.g. "0-3,6"
    #[arg(long)]
    cpu_list: Option<String>,

    /// Abort instead of running agents without a cgroup when limits cannot be enforced
    #[arg(long)]
    require_containment: bool,

    /// Ask both agents at the same time (direct mode only)
    #[arg(long)]
    parallel: bool,

    /// Log to a timestamped file in the current directory
    #[arg(long)]
    log: bool,

    /// Let agent stderr through
    #[arg(long)]
    debug_agent_stderr: bool,

    /// Log debug events to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn match_config(&self) -> MatchConfig {
        let mut config = MatchConfig::from_env();
        let defaults = config.clone();
        config = config
            .with_dimensions(
                self.height.unwrap_or(defaults.height()),
                self.width.unwrap_or(defaults.width()),
            )
            .with_round_cap(self.round_count.unwrap_or(defaults.round_cap()));
        if let Some(walls) = self.wall_count {
            config = config.with_wall_count(walls);
        }
        if self.seed.is_some() {
            config = config.with_seed(self.seed);
        }
        if let Some(wait) = self.wait {
            config = config.with_wait(Some(Duration::from_millis(wait)));
        }
        if self.silent {
            config = config.with_silent(true);
        }
        if self.nice_print {
            config = config.with_render_mode(RenderMode::Compact);
        }
        if self.clear_terminal {
            config = config.with_clear_terminal(true);
        }
        if let Some(root) = &self.sandbox {
            config = config.with_execution_mode(ExecutionMode::Sandboxed(SandboxSettings::new(root)));
        }
        if self.require_containment {
            config = config.with_allow_uncontained(false);
        }
        if self.parallel {
            config = config.with_parallel_turns(true);
        }
        if self.log {
            config = config.with_log(true);
        }
        if self.debug_agent_stderr {
            config = config.with_debug_agent_stderr(true);
        }
        config
    }

    fn constraints(&self) -> ConstraintsBuilder {
        let mut builder = ConstraintsBuilder::from_env();
        if let Some(ms) = self.timeout {
            builder = builder.with_action_timeout(Duration::from_millis(ms));
        }
        if let Some(mb) = self.ram_per_agent {
            builder = builder.with_ram_per_agent(mb);
        }
        if let Some(cpus) = &self.cpu_list {
            builder = builder.with_cpu_list(cpus);
        }
        builder
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = args.match_config();

    if config.log() {
        let path = init_logger()?;
        eprintln!("logging to {}", path.display());
    } else {
        init_stderr_logger(args.verbose)?;
    }

    config.validate()?;
    let constraints = args.constraints().build()?;
    let red = AgentHandle::new(&args.red);
    let blue = AgentHandle::new(&args.blue);
    let silent = config.silent();
    if !silent {
        println!("{} {red} vs {} {blue}", side_label(Side::Red), side_label(Side::Blue));
    }

    let report = match run_match(red, blue, &config, constraints) {
        Ok(report) => report,
        Err(e) => {
            if let Some(violation) = e.downcast_ref::<RuleViolation>() {
                eprintln!("Match aborted: {violation}");
            }
            return Err(e);
        }
    };

    info!(rounds = report.rounds, seed = ?report.seed, "match over");
    if silent {
        println!("{}", report.outcome.message());
    } else {
        println!("{}", highlight(report.outcome.message()));
    }
    Ok(())
}
