#[cfg(target_os = "linux")]
mod cgroup_manager_linux;

#[cfg(target_os = "linux")]
pub use cgroup_manager_linux::*;

#[cfg(not(target_os = "linux"))]
mod cgroup_manager_stub;

#[cfg(not(target_os = "linux"))]
pub use cgroup_manager_stub::*;

use std::collections::HashMap;
use std::path::Path;
use std::process::{Child, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use anyhow::Context;
use sysinfo::{Pid, ProcessesToUpdate, Signal, System};

/// How the child's stdin and stdout are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessIo {
    Piped,
    Null,
}

const POLL_INTERVAL: Duration = Duration::from_millis(5);

pub(self) fn create_process(
    command: &str,
    args: &[String],
    io: ProcessIo,
    allow_stderr: bool,
    current_dir: Option<&Path>,
) -> anyhow::Result<Child> {
    let mut cmd = std::process::Command::new(command);
    cmd.args(args);
    match io {
        ProcessIo::Piped => cmd.stdin(Stdio::piped()).stdout(Stdio::piped()),
        ProcessIo::Null => cmd.stdin(Stdio::null()).stdout(Stdio::null()),
    };
    if !allow_stderr {
        cmd.stderr(Stdio::null());
    }
    if let Some(dir) = current_dir {
        cmd.current_dir(dir);
    }
    cmd.spawn()
        .with_context(|| format!("could not spawn '{command}'"))
}

/// Kills `child` and every process it spawned.
///
/// The process table is read before the child dies, while its descendants still point at it.
fn kill_process_tree(child: &mut Child) -> anyhow::Result<()> {
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, true);

    let mut children: HashMap<Pid, Vec<Pid>> = HashMap::new();
    for (pid, process) in sys.processes() {
        if let Some(parent) = process.parent() {
            children.entry(parent).or_default().push(*pid);
        }
    }
    let mut descendants = Vec::new();
    let mut stack = vec![Pid::from_u32(child.id())];
    while let Some(pid) = stack.pop() {
        if let Some(kids) = children.get(&pid) {
            descendants.extend(kids.iter().copied());
            stack.extend(kids.iter().copied());
        }
    }

    child.kill().context("could not kill process")?;
    for pid in descendants {
        if let Some(process) = sys.process(pid) {
            process.kill_with(Signal::Kill);
        }
    }
    Ok(())
}

impl LimitedProcess {
    /// Polls the child until it exits or `deadline` passes.
    ///
    /// Returns `None` on deadline; the child is left running.
    pub fn wait_until(&mut self, deadline: Instant) -> anyhow::Result<Option<ExitStatus>> {
        loop {
            if let Some(status) = self.child.try_wait().context("could not poll child")? {
                return Ok(Some(status));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}
