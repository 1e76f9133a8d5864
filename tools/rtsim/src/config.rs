// SPDX-License-Identifier: MPL-2.0

//! The simulation configuration.
//!
//! A configuration is assembled in three layers: built-in defaults, then the
//! task set file, then the command line. A later layer wins wherever it sets
//! a value.

use std::{fmt, fs, num::NonZero, process};

use rtsched::{SchedPolicy, Thread, Tick};
use serde::Deserialize;

use crate::{
    cli::{Cli, Format, OnMiss},
    error::Errno,
    error_msg,
};

/// The simulation horizon used when neither the task set nor the command
/// line sets one.
pub const DEFAULT_UNTIL: Tick = 1000;

/// The final configuration of one simulation.
#[derive(Debug)]
pub struct SimConfig {
    pub policy: SchedPolicy,
    pub until: Tick,
    pub on_miss: OnMiss,
    pub format: Format,
    pub threads: Vec<ThreadEntry>,
}

/// A thread of the task set and the number of jobs it releases.
#[derive(Debug, Clone)]
pub struct ThreadEntry {
    pub thread: Thread,
    pub jobs: u32,
}

impl SimConfig {
    /// Loads the task set named on the command line.
    ///
    /// Exits the process if the configuration cannot be assembled.
    pub fn parse(args: &Cli) -> Self {
        let Ok(contents) = fs::read_to_string(&args.taskset) else {
            error_msg!("Cannot read file {}", args.taskset.to_string_lossy());
            process::exit(Errno::ParseConfig as _);
        };

        Self::load(args, &contents).unwrap_or_else(|err| {
            error_msg!("{}: {}", args.taskset.to_string_lossy(), err);
            process::exit(err.errno() as _);
        })
    }

    fn load(args: &Cli, contents: &str) -> Result<Self, ConfigError> {
        let task_set: TomlTaskSet =
            toml::from_str(contents).map_err(|err| ConfigError::Toml(err.message().to_string()))?;

        let mut policy = match (args.policy, &task_set.policy) {
            (Some(policy), _) => policy,
            (None, Some(name)) => name.parse().map_err(ConfigError::Policy)?,
            (None, None) => SchedPolicy::default(),
        };
        if let Some(quantum) = args.quantum.or(task_set.quantum) {
            policy = policy.with_quantum(quantum);
        }

        let threads = task_set
            .threads
            .iter()
            .map(TomlThread::to_entry)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            policy,
            until: args.until.or(task_set.until).unwrap_or(DEFAULT_UNTIL),
            on_miss: args.on_miss,
            format: args.format,
            threads,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlTaskSet {
    policy: Option<String>,
    until: Option<Tick>,
    quantum: Option<NonZero<Tick>>,
    #[serde(default, rename = "thread")]
    threads: Vec<TomlThread>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlThread {
    id: u32,
    #[serde(default)]
    arrival: Tick,
    processing: Tick,
    #[serde(default)]
    priority: i32,
    period: Option<Tick>,
    deadline: Option<Tick>,
    jobs: Option<u32>,
    budget: Option<Tick>,
}

impl TomlThread {
    fn to_entry(&self) -> Result<ThreadEntry, ConfigError> {
        let invalid = |error| ConfigError::Thread { id: self.id, error };

        let mut builder = Thread::builder(self.id, self.processing)
            .arrival_time(self.arrival)
            .priority(self.priority);
        if let Some(period) = self.period {
            builder = builder.periodic(period);
        }
        if let Some(deadline) = self.deadline {
            builder = builder.deadline(deadline);
        }
        if let Some(budget) = self.budget {
            builder = builder.soft(budget);
        }
        let thread = builder.build().map_err(invalid)?;

        let jobs = self.jobs.unwrap_or(1);
        if jobs == 0 {
            return Err(ConfigError::Jobs {
                id: self.id,
                reason: "must release at least one job",
            });
        }
        if jobs > 1 && !thread.is_periodic() {
            return Err(ConfigError::Jobs {
                id: self.id,
                reason: "only periodic threads release more than one job",
            });
        }

        Ok(ThreadEntry { thread, jobs })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Toml(String),
    Policy(rtsched::Error),
    Thread { id: u32, error: rtsched::Error },
    Jobs { id: u32, reason: &'static str },
}

impl ConfigError {
    pub fn errno(&self) -> Errno {
        match self {
            ConfigError::Toml(_) | ConfigError::Policy(_) => Errno::ParseConfig,
            ConfigError::Thread { .. } | ConfigError::Jobs { .. } => Errno::InvalidTaskSet,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Toml(msg) => write!(f, "cannot parse TOML: {}", msg),
            ConfigError::Policy(err) => write!(f, "{}", err),
            ConfigError::Thread { id, error } => write!(f, "thread {}: {}", id, error),
            ConfigError::Jobs { id, reason } => write!(f, "thread {}: {}", id, reason),
        }
    }
}
