//! Turning an untrusted executable into one move per turn.
//!
//! A turn encodes the board for one side, runs the agent, enforces the action timeout and
//! decodes the reply. Whatever the agent does, the turn ends with a [`Move`]:
//!
//! | what happened                      | fault                        | move played |
//! |------------------------------------|------------------------------|-------------|
//! | valid reply before the deadline    | none                         | the reply   |
//! | deadline passed                    | [`TurnFault::Timeout`]       | wait        |
//! | non-zero exit status               | [`TurnFault::Crashed`]       | surrender   |
//! | reply is not an integer in 0..=9   | [`TurnFault::InvalidReply`]  | surrender   |
//! | executable could not be started    | [`TurnFault::SpawnFailed`]   | surrender   |
//!
//! The single exception is sandboxed mode: when the sandbox launcher itself exits with a non-zero
//! status, the isolation guarantee can no longer be trusted and the turn fails with a
//! [`RuleViolation`] error that stops the match.
//!
//! # Direct mode
//!
//! The agent is spawned with the board on its stdin and its reply read from stdout. When the
//! [`Constraints`] carry a RAM or CPU limit, the agent runs inside its own cgroup (see
//! [`crate::cgroup_manager`]). The process, and anything it spawned, is always killed and reaped
//! before the turn returns.
//!
//! # Sandboxed mode
//!
//! Layout under the sandbox root:
//!
//! ```text
//! run.sh            launcher, invoked as `bash run.sh <timeout_ms>` from the root
//! prog/exec         copy of the agent executable
//! in/in             encoded board
//! out/user_output   reply, pre-filled with the wait code
//! ```
//!
//! The launcher gets no stdin and its output is discarded; it is expected to run `prog/exec`
//! under an isolation tool with `in/in` and `out/user_output` as its streams. The three files are
//! removed when the turn ends.

use std::{
    fmt::Display,
    fs,
    io::{ErrorKind, Read, Write},
    path::{Path, PathBuf},
    process::ExitStatus,
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use anyhow::Context;
use tracing::{debug, error, instrument, warn};

use crate::agent::{Agent, AgentHandle};
use crate::board_codec::{encode_for_agent, parse_reply, InvalidReply};
use crate::cgroup_manager::{LimitedProcess, ProcessIo};
use crate::constraints::Constraints;
use crate::moves::Move;
use crate::world::{Side, World};

/// Replies longer than this are truncated before decoding.
const MAX_REPLY_BYTES: usize = 64 * 1024;
/// Time given to a process to die once killed.
const KILL_GRACE: Duration = Duration::from_secs(1);
/// Extra time for stdout to drain after the agent exited.
const REPLY_GRACE: Duration = Duration::from_millis(50);
/// Extra time the sandbox launcher gets on top of the action timeout for its own setup.
const LAUNCHER_GRACE: Duration = Duration::from_secs(2);

const PROGRAM_PATH: &str = "prog/exec";
const INPUT_PATH: &str = "in/in";
const OUTPUT_PATH: &str = "out/user_output";
const LAUNCHER_NAME: &str = "run.sh";

/// Ways an agent can misbehave without stopping the match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnFault {
    Timeout,
    InvalidReply(InvalidReply),
    Crashed { code: Option<i32> },
    SpawnFailed(String),
}

impl TurnFault {
    /// The move played in place of the agent's.
    pub fn fallback(&self) -> Move {
        match self {
            TurnFault::Timeout => Move::Wait,
            TurnFault::InvalidReply(_) | TurnFault::Crashed { .. } | TurnFault::SpawnFailed(_) => {
                Move::Surrender
            }
        }
    }
}

impl Display for TurnFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnFault::Timeout => write!(f, "agent hit timeout"),
            TurnFault::InvalidReply(e) => write!(f, "{e}"),
            TurnFault::Crashed { code: Some(code) } => write!(f, "agent exited with code {code}"),
            TurnFault::Crashed { code: None } => write!(f, "agent was killed by a signal"),
            TurnFault::SpawnFailed(e) => write!(f, "agent could not be started: {e}"),
        }
    }
}

/// Outcome of one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    pub mv: Move,
    pub fault: Option<TurnFault>,
    pub elapsed: Duration,
}

impl TurnReport {
    pub fn answered(mv: Move, elapsed: Duration) -> Self {
        TurnReport {
            mv,
            fault: None,
            elapsed,
        }
    }

    pub fn faulted(fault: TurnFault, elapsed: Duration) -> Self {
        TurnReport {
            mv: fault.fallback(),
            fault: Some(fault),
            elapsed,
        }
    }
}

/// The sandbox launcher exited with a non-zero status.
#[derive(Debug)]
pub struct RuleViolation {
    pub agent: String,
    pub status: ExitStatus,
}

impl Display for RuleViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rule violation by {}: sandbox launcher exited with {}",
            self.agent, self.status
        )
    }
}

impl std::error::Error for RuleViolation {}

/// Where the sandbox lives and which script launches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxSettings {
    root: PathBuf,
    launcher: PathBuf,
}

impl SandboxSettings {
    /// A sandbox rooted at `root`, launched by `root/run.sh`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let launcher = root.join(LAUNCHER_NAME);
        SandboxSettings { root, launcher }
    }

    pub fn with_launcher(self, launcher: impl Into<PathBuf>) -> Self {
        Self {
            launcher: launcher.into(),
            ..self
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn launcher(&self) -> &Path {
        &self.launcher
    }

    pub fn program_path(&self) -> PathBuf {
        self.root.join(PROGRAM_PATH)
    }

    pub fn input_path(&self) -> PathBuf {
        self.root.join(INPUT_PATH)
    }

    pub fn output_path(&self) -> PathBuf {
        self.root.join(OUTPUT_PATH)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Direct,
    Sandboxed(SandboxSettings),
}

impl ExecutionMode {
    pub fn is_sandboxed(&self) -> bool {
        matches!(self, ExecutionMode::Sandboxed(_))
    }
}

/// Files placed in the sandbox for one turn. Removed on drop.
struct SandboxTurn<'a> {
    settings: &'a SandboxSettings,
}

impl<'a> SandboxTurn<'a> {
    fn create(settings: &'a SandboxSettings) -> anyhow::Result<Self> {
        for path in [
            settings.program_path(),
            settings.input_path(),
            settings.output_path(),
        ] {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("could not create {}", dir.display()))?;
            }
        }
        Ok(SandboxTurn { settings })
    }

    /// Copies the agent executable to `prog/exec`. Failing here is the agent's fault.
    fn install(&self, exe: &Path) -> anyhow::Result<()> {
        fs::copy(exe, self.settings.program_path())
            .with_context(|| format!("could not copy {} into the sandbox", exe.display()))?;
        Ok(())
    }

    fn stage(&self, board: &str) -> anyhow::Result<()> {
        fs::write(self.settings.input_path(), board).context("could not write sandbox input")?;
        fs::write(self.settings.output_path(), format!("{}\n", Move::Wait.code()))
            .context("could not pre-fill sandbox output")?;
        Ok(())
    }
}

impl Drop for SandboxTurn<'_> {
    fn drop(&mut self) {
        for path in [
            self.settings.program_path(),
            self.settings.input_path(),
            self.settings.output_path(),
        ] {
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != ErrorKind::NotFound {
                    warn!("could not remove {}: {e}", path.display());
                }
            }
        }
    }
}

/// Runs agent turns under a given [`ExecutionMode`] and [`Constraints`].
#[derive(Debug, Clone)]
pub struct Arbiter {
    mode: ExecutionMode,
    constraints: Constraints,
    allow_uncontained: bool,
    debug_agent_stderr: bool,
}

impl Arbiter {
    pub fn new(mode: ExecutionMode, constraints: Constraints) -> Self {
        Arbiter {
            mode,
            constraints,
            allow_uncontained: false,
            debug_agent_stderr: false,
        }
    }

    /// Run agents without a cgroup when one is required but cannot be created.
    pub fn with_allow_uncontained(self, value: bool) -> Self {
        Self {
            allow_uncontained: value,
            ..self
        }
    }

    /// Let agent (or launcher) stderr through to ours.
    pub fn with_debug_agent_stderr(self, value: bool) -> Self {
        Self {
            debug_agent_stderr: value,
            ..self
        }
    }

    /// Plays one turn of `agent` as `side`.
    ///
    /// # Errors
    /// Returned only for faults that must stop the match: a [`RuleViolation`], a sandbox that
    /// cannot be prepared, or containment that is required but unavailable.
    #[instrument(skip_all, fields(agent = %agent.name, %side, round = round))]
    pub fn request_move(
        &self,
        agent: &AgentHandle,
        world: &World,
        round: u32,
        side: Side,
    ) -> anyhow::Result<TurnReport> {
        let board = encode_for_agent(world, round, side);
        let report = match &self.mode {
            ExecutionMode::Direct => self.run_direct(agent, &board)?,
            ExecutionMode::Sandboxed(settings) => self.run_sandboxed(agent, settings, &board)?,
        };
        match &report.fault {
            Some(fault) => warn!("{agent}: {fault}, playing {}", report.mv),
            None => debug!(mv = %report.mv, elapsed = ?report.elapsed, "agent answered"),
        }
        Ok(report)
    }

    fn run_direct(&self, agent: &AgentHandle, board: &str) -> anyhow::Result<TurnReport> {
        let started = Instant::now();
        let deadline = started + self.constraints.action_timeout();

        let launched = if self.constraints.requires_container() {
            match self.launch_contained(agent) {
                Ok(process) => Ok(process),
                Err(e) if self.allow_uncontained => {
                    warn!("running {agent} uncontained: {e:#}");
                    self.launch_uncontained(agent)
                }
                Err(e) => return Err(e.context("agent containment is required but failed")),
            }
        } else {
            self.launch_uncontained(agent)
        };
        let mut process = match launched {
            Ok(process) => process,
            Err(e) => {
                return Ok(TurnReport::faulted(
                    TurnFault::SpawnFailed(format!("{e:#}")),
                    started.elapsed(),
                ))
            }
        };

        let writer = process.child.stdin.take().map(|mut stdin| {
            let board = board.to_owned();
            thread::spawn(move || {
                // dropping stdin afterwards closes the pipe
                if let Err(e) = stdin.write_all(board.as_bytes()) {
                    debug!("board not fully delivered: {e}");
                }
            })
        });
        let reader = process
            .child
            .stdout
            .take()
            .map(|stdout| thread::spawn(move || read_capped(stdout)));

        let status = process
            .wait_until(deadline)
            .context("could not wait for agent")?;
        // kills whatever the agent spawned too, so both pipes close
        if let Err(e) = process.try_kill(KILL_GRACE) {
            warn!("could not clean up {agent}: {e:#}");
        }
        let wait_for_reply = deadline
            .saturating_duration_since(Instant::now())
            .max(REPLY_GRACE);
        let reply = reader.and_then(|reader| join_within(reader, wait_for_reply));
        if let Some(writer) = writer {
            if join_within(writer, KILL_GRACE).is_none() {
                warn!("stdin writer of {agent} is still blocked, leaving it behind");
            }
        }

        let Some(status) = status else {
            return Ok(TurnReport::faulted(TurnFault::Timeout, started.elapsed()));
        };
        if !status.success() {
            return Ok(TurnReport::faulted(
                TurnFault::Crashed {
                    code: status.code(),
                },
                started.elapsed(),
            ));
        }

        let Some(reply) = reply else {
            warn!("stdout of {agent} is still open after exit");
            return Ok(TurnReport::faulted(TurnFault::Timeout, started.elapsed()));
        };
        Ok(decode(&String::from_utf8_lossy(&reply), started))
    }

    fn launch_contained(&self, agent: &AgentHandle) -> anyhow::Result<LimitedProcess> {
        let path = exe_path(agent)?;
        let cpus = self.constraints.cpu_list();
        let (command, args) = if cpus.is_empty() {
            (path, agent.args.clone())
        } else {
            let mut args = vec!["-c".to_string(), cpus.clone(), path];
            args.extend(agent.args.iter().cloned());
            ("taskset".to_string(), args)
        };
        let max_memory = i64::try_from(self.constraints.agent_ram.unwrap_or(0))
            .context("RAM limit does not fit a cgroup")?;
        LimitedProcess::launch(&command, &args, max_memory, &cpus, self.debug_agent_stderr)
            .context("child + cgroup creation failed")
    }

    fn launch_uncontained(&self, agent: &AgentHandle) -> anyhow::Result<LimitedProcess> {
        let path = exe_path(agent)?;
        LimitedProcess::launch_without_container(
            &path,
            &agent.args,
            ProcessIo::Piped,
            self.debug_agent_stderr,
            None,
        )
    }

    fn run_sandboxed(
        &self,
        agent: &AgentHandle,
        settings: &SandboxSettings,
        board: &str,
    ) -> anyhow::Result<TurnReport> {
        let started = Instant::now();
        let timeout = self.constraints.action_timeout();
        let turn = SandboxTurn::create(settings).context("could not prepare sandbox")?;
        if let Err(e) = turn.install(&agent.path_to_exe) {
            return Ok(TurnReport::faulted(
                TurnFault::SpawnFailed(format!("{e:#}")),
                started.elapsed(),
            ));
        }
        turn.stage(board).context("could not prepare sandbox")?;

        // the launcher runs from the root, so a relative path must not be resolved twice
        let root = fs::canonicalize(settings.root())
            .with_context(|| format!("could not resolve {}", settings.root().display()))?;
        let launcher_path = std::path::absolute(settings.launcher())
            .with_context(|| format!("could not resolve {}", settings.launcher().display()))?;
        let launcher_args = [
            launcher_path.display().to_string(),
            timeout.as_millis().to_string(),
        ];
        let mut launcher = LimitedProcess::launch_without_container(
            "bash",
            &launcher_args,
            ProcessIo::Null,
            self.debug_agent_stderr,
            Some(&root),
        )
        .context("could not start sandbox launcher")?;

        let status = launcher
            .wait_until(started + timeout + LAUNCHER_GRACE)
            .context("could not wait for sandbox launcher")?;
        if let Err(e) = launcher.try_kill(KILL_GRACE) {
            warn!("could not clean up sandbox launcher: {e:#}");
        }
        let Some(status) = status else {
            return Ok(TurnReport::faulted(TurnFault::Timeout, started.elapsed()));
        };
        if !status.success() {
            let violation = RuleViolation {
                agent: agent.name.clone(),
                status,
            };
            error!("{violation}");
            return Err(violation.into());
        }

        let report = match fs::read(settings.output_path()) {
            Ok(reply) => decode(&String::from_utf8_lossy(&reply), started),
            Err(e) => {
                warn!("could not read sandbox output: {e}");
                TurnReport::faulted(
                    TurnFault::InvalidReply(InvalidReply {
                        reply: String::new(),
                    }),
                    started.elapsed(),
                )
            }
        };
        drop(turn);
        Ok(report)
    }
}

fn exe_path(agent: &AgentHandle) -> anyhow::Result<String> {
    agent
        .path_to_exe
        .to_str()
        .map(str::to_owned)
        .with_context(|| format!("path {:?} is not valid UTF-8", agent.path_to_exe))
}

fn decode(reply: &str, started: Instant) -> TurnReport {
    match parse_reply(reply) {
        Ok(mv) => TurnReport::answered(mv, started.elapsed()),
        Err(e) => TurnReport::faulted(TurnFault::InvalidReply(e), started.elapsed()),
    }
}

/// Joins `handle` if it finishes within `limit`, otherwise leaves it running.
fn join_within<T>(handle: JoinHandle<T>, limit: Duration) -> Option<T> {
    let deadline = Instant::now() + limit;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return None;
        }
        thread::sleep(Duration::from_millis(1));
    }
    handle.join().ok()
}

/// Drains `stream` to the end, keeping at most [`MAX_REPLY_BYTES`].
fn read_capped(mut stream: impl Read) -> Vec<u8> {
    let mut kept = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let room = MAX_REPLY_BYTES.saturating_sub(kept.len());
                kept.extend_from_slice(&chunk[..n.min(room)]);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    kept
}

/// An [`AgentHandle`] played through an [`Arbiter`].
#[derive(Debug, Clone)]
pub struct ExecutableAgent {
    handle: AgentHandle,
    arbiter: Arc<Arbiter>,
}

impl ExecutableAgent {
    pub fn new(handle: AgentHandle, arbiter: Arc<Arbiter>) -> Self {
        ExecutableAgent { handle, arbiter }
    }
}

impl Agent for ExecutableAgent {
    fn name(&self) -> &str {
        &self.handle.name
    }

    fn select_move(&mut self, world: &World, round: u32, side: Side) -> anyhow::Result<TurnReport> {
        self.arbiter.request_move(&self.handle, world, round, side)
    }
}
