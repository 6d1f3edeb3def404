//! Per-turn limits applied to agent processes.
//!
//! Every turn has a wall-clock deadline (the action timeout). Optionally, agents can also be
//! confined in memory and CPU: when either limit is set, direct-mode agents are launched inside a
//! fresh cgroup v2 group and pinned with `taskset`.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use grid_duel::constraints::ConstraintsBuilder;
//!
//! let constraints = ConstraintsBuilder::new()
//!     .with_action_timeout(Duration::from_millis(200))
//!     .with_ram_per_agent(256)
//!     .with_cpu_list("0-1")
//!     .build()
//!     .unwrap();
//! ```

use std::{collections::BTreeSet, env, time::Duration};

use anyhow::{bail, Context};

/// Default time an agent gets to answer one board.
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_millis(500);

/// A builder for per-agent limits.
///
/// By default there is no RAM or CPU limit and the action timeout is
/// [`DEFAULT_ACTION_TIMEOUT`].
#[derive(Debug, Default, Clone)]
pub struct ConstraintsBuilder {
    agent_ram: Option<usize>,
    cpus: Option<String>,
    action_time: Option<Duration>,
}

impl ConstraintsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder configured from environment variables.
    ///
    /// Read environment variables are:
    /// - `ACTION_TIMEOUT_MS` (u64): timeout per turn in milliseconds
    /// - `RAM_PER_AGENT` (usize): maximum RAM per agent in MB
    /// - `CPU_LIST` (string): comma-separated list or ranges of CPUs, e.g. "0-3,6"
    ///
    /// Unset or unparsable variables leave the default in place.
    #[must_use]
    pub fn from_env() -> Self {
        fn parse_usize(var: &str) -> Option<usize> {
            env::var(var).ok()?.parse().ok()
        }

        fn parse_duration_millis(var: &str) -> Option<Duration> {
            env::var(var)
                .ok()?
                .parse::<u64>()
                .ok()
                .map(Duration::from_millis)
        }

        ConstraintsBuilder {
            agent_ram: parse_usize("RAM_PER_AGENT"),
            cpus: env::var("CPU_LIST").ok(),
            action_time: parse_duration_millis("ACTION_TIMEOUT_MS"),
        }
    }

    /// Sets the maximum RAM available per agent (in MB).
    #[must_use]
    pub fn with_ram_per_agent(self, max: usize) -> Self {
        Self {
            agent_ram: Some(max),
            ..self
        }
    }

    /// Restricts agents to the given CPUs.
    ///
    /// Format follows the pattern: `"0-3,6,8"` (inclusive ranges and individual IDs).
    #[must_use]
    pub fn with_cpu_list(self, cpus: &str) -> Self {
        Self {
            cpus: Some(cpus.to_string()),
            ..self
        }
    }

    /// Sets the wall-clock time an agent has to answer one board.
    #[must_use]
    pub fn with_action_timeout(self, duration: Duration) -> Self {
        Self {
            action_time: Some(duration),
            ..self
        }
    }

    /// Consumes the builder and returns the constructed `Constraints`.
    ///
    /// # Errors
    ///
    /// Returned when constraints are impossible: a zero timeout, more RAM per agent than the
    /// machine has available, or a CPU list that is malformed or names missing CPUs.
    pub fn build(self) -> anyhow::Result<Constraints> {
        let action_time = self.action_time.unwrap_or(DEFAULT_ACTION_TIMEOUT);
        if action_time.is_zero() {
            bail!("action timeout must be positive");
        }

        let agent_ram = match self.agent_ram {
            Some(0) => bail!("RAM per agent must be positive"),
            Some(mb) => {
                let bytes = mb
                    .checked_mul(1_000_000)
                    .with_context(|| format!("RAM per agent ({mb}MB) is too large"))?;
                let mut sys = sysinfo::System::new();
                sys.refresh_memory();
                let available = usize::try_from(sys.available_memory()).unwrap_or(usize::MAX);
                if available > 0 && bytes > available {
                    bail!(
                        "Agent RAM size ({mb}MB) is greater than available RAM ({}MB)",
                        available / 1_000_000
                    );
                }
                Some(bytes)
            }
            None => None,
        };

        let cpus = match self.cpus {
            Some(list) => {
                let set = cpu_list_to_set(&list).context("error parsing cpu list")?;
                let online = num_cpus::get();
                if let Some(missing) = set.iter().find(|cpu| usize::from(**cpu) >= online) {
                    bail!("cpu {missing} does not exist, this machine has {online} logical cpus");
                }
                Some(set)
            }
            None => None,
        };

        Ok(Constraints {
            agent_ram,
            cpus,
            action_time,
        })
    }
}

fn cpu_list_to_set(s: &str) -> anyhow::Result<BTreeSet<u8>> {
    if s.is_empty() {
        bail!("Empty string");
    }
    let mut set = BTreeSet::new();
    for item in s.split(',') {
        let bounds = item.split('-').map(str::trim).collect::<Vec<_>>();
        let parse = |value: &str| -> anyhow::Result<u8> {
            value
                .parse()
                .with_context(|| format!("could not parse {value}"))
        };
        match bounds.as_slice() {
            [single] => {
                set.insert(parse(*single)?);
            }
            [start, end] => {
                let (start, end) = (parse(*start)?, parse(*end)?);
                set.extend(start.min(end)..=start.max(end));
            }
            _ => bail!(
                "each comma-separated item must be a number or a range (e.g. '0-3'), got '{item}'"
            ),
        }
    }
    Ok(set)
}

/// Obtained using [`ConstraintsBuilder`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constraints {
    /// Bytes.
    pub(crate) agent_ram: Option<usize>,
    pub(crate) cpus: Option<BTreeSet<u8>>,
    pub(crate) action_time: Duration,
}

impl Constraints {
    pub fn builder() -> ConstraintsBuilder {
        ConstraintsBuilder::new()
    }

    pub fn action_timeout(&self) -> Duration {
        self.action_time
    }

    /// True when agents must run inside a cgroup.
    pub fn requires_container(&self) -> bool {
        self.agent_ram.is_some() || self.cpus.is_some()
    }

    /// CPU list in `taskset`/cpuset syntax, empty when unrestricted.
    pub(crate) fn cpu_list(&self) -> String {
        self.cpus
            .iter()
            .flatten()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for Constraints {
    fn default() -> Self {
        Constraints {
            agent_ram: None,
            cpus: None,
            action_time: DEFAULT_ACTION_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_unconfined() {
        let constraints = ConstraintsBuilder::new().build().unwrap();
        assert_eq!(constraints.action_timeout(), DEFAULT_ACTION_TIMEOUT);
        assert!(!constraints.requires_container());
        assert_eq!(constraints.cpu_list(), "");
    }

    #[test]
    fn cpu_list_parsing() {
        assert_eq!(
            cpu_list_to_set("0-2,5").unwrap().into_iter().collect::<Vec<_>>(),
            vec![0, 1, 2, 5]
        );
        assert_eq!(cpu_list_to_set("3-1").unwrap().len(), 3);
        assert!(cpu_list_to_set("").is_err());
        assert!(cpu_list_to_set("1-2-3").is_err());
        assert!(cpu_list_to_set("a").is_err());
    }

    #[test]
    fn cpu_zero_always_exists() {
        let constraints = ConstraintsBuilder::new().with_cpu_list("0").build().unwrap();
        assert!(constraints.requires_container());
        assert_eq!(constraints.cpu_list(), "0");
    }

    #[test]
    fn impossible_constraints_are_rejected() {
        assert!(ConstraintsBuilder::new()
            .with_action_timeout(Duration::ZERO)
            .build()
            .is_err());
        assert!(ConstraintsBuilder::new().with_ram_per_agent(0).build().is_err());
        assert!(ConstraintsBuilder::new().with_cpu_list("250").build().is_err());
        assert!(ConstraintsBuilder::new()
            .with_ram_per_agent(usize::MAX / 2_000_000)
            .build()
            .is_err());
    }

    #[test]
    fn overflowing_ram_is_an_error() {
        let err = ConstraintsBuilder::new()
            .with_ram_per_agent(usize::MAX)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("too large"), "{err}");
    }
}
