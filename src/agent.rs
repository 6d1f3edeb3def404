use std::{fmt::Display, path::PathBuf};

use crate::arbitration::TurnReport;
use crate::world::{Side, World};

/// An external agent executable and the arguments it is launched with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AgentHandle {
    pub name: String,
    pub path_to_exe: PathBuf,
    pub args: Vec<String>,
}

impl AgentHandle {
    /// Names the agent after its file name.
    pub fn new(path_to_exe: impl Into<PathBuf>) -> AgentHandle {
        let path_to_exe = path_to_exe.into();
        let name = path_to_exe
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path_to_exe.display().to_string());
        AgentHandle {
            name,
            path_to_exe,
            args: Vec::new(),
        }
    }

    pub fn with_name(self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self
        }
    }

    pub fn with_args(self, args: Vec<String>) -> Self {
        Self { args, ..self }
    }
}

impl Display for AgentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Anything that can pick a move for a side.
///
/// The match driver only talks to this trait, so a match can be played by external executables
/// (see [`ExecutableAgent`](crate::arbitration::ExecutableAgent)) or by in-process players.
pub trait Agent {
    fn name(&self) -> &str;

    /// Chooses a move for `side` in the current `world`.
    ///
    /// # Errors
    /// Only for faults that must stop the whole match. Misbehaving agents are reported through
    /// [`TurnReport::fault`] instead.
    fn select_move(&mut self, world: &World, round: u32, side: Side) -> anyhow::Result<TurnReport>;
}
