use std::{path::Path, process::Child, time::Duration};

use anyhow::{self, bail, Context};
use tracing::error;

use super::{create_process, kill_process_tree, ProcessIo};

#[derive(Debug)]
pub struct LimitedProcess {
    pub child: Child,
    cleaned_up: bool,
}

impl LimitedProcess {
    pub fn launch(
        _command: &str,
        _args: &[String],
        _max_memory: i64,
        _cpus: &str,
        _allow_stderr: bool,
    ) -> anyhow::Result<LimitedProcess> {
        bail!("cgroups only available on linux")
    }

    /// Kills the child if it is still running and reaps it.
    pub fn try_kill(&mut self, _max_duration: Duration) -> anyhow::Result<()> {
        if self.cleaned_up {
            return Ok(());
        }
        if self.child.try_wait().context("could not poll process")?.is_none() {
            kill_process_tree(&mut self.child)?;
        }
        self.child.wait().context("could not reap process")?;
        self.cleaned_up = true;
        Ok(())
    }

    pub fn launch_without_container(
        command: &str,
        args: &[String],
        io: ProcessIo,
        allow_stderr: bool,
        current_dir: Option<&Path>,
    ) -> anyhow::Result<LimitedProcess> {
        let child = create_process(command, args, io, allow_stderr, current_dir)
            .context("could not create process")?;

        Ok(LimitedProcess {
            child,
            cleaned_up: false,
        })
    }
}

impl Drop for LimitedProcess {
    fn drop(&mut self) {
        static CLEANUP_DURATION: Duration = Duration::from_secs(1);
        if !self.cleaned_up {
            if let Err(e) = self.try_kill(CLEANUP_DURATION) {
                error!("could not kill process {} on drop: {e:#}", self.child.id());
            }
        }
    }
}
