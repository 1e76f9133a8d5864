// SPDX-License-Identifier: MPL-2.0

//! The scheduling policies.
//!
//! Every policy implements [`SchedClass`]: given the run queue, the release
//! queue and the current time, it returns one [`Decision`]. The policies are
//! interchangeable; [`SchedPolicy`] names them and dispatches to the chosen
//! one, so that a driver can switch policies with a configuration value.
//!
//! A policy may update the real-time bookkeeping of the threads it inspects
//! (deadlines, budgets, throttling) and may rotate the run queue. It never
//! adds or removes threads, and never touches their remaining work.

use core::{fmt, num::NonZero, str::FromStr};

use log::warn;

use crate::{
    Decision, Errno, Error, ReleaseQueue, RunQueue, Thread, ThreadArena, ThreadHandle, Tick,
};

mod default;
mod dm;
mod edf_cbs;
mod hrrn;
mod priority_rr;

pub use self::{
    default::DefaultPolicy, dm::DeadlineMonotonic, edf_cbs::EdfCbs, hrrn::Hrrn,
    priority_rr::PriorityRoundRobin,
};

/// The round-robin time slice within a priority band, in ticks.
pub const DEFAULT_RR_QUANTUM: NonZero<Tick> = match NonZero::new(2) {
    Some(quantum) => quantum,
    None => unreachable!(),
};

/// The state a policy decides on.
///
/// The exclusive borrows express the contract with the driver: for the
/// duration of one decision, the policy is the only reader and writer of the
/// queues and of every thread's real-time fields.
#[derive(Debug)]
pub struct SchedArgs<'a> {
    pub threads: &'a mut ThreadArena,
    pub run_queue: &'a mut RunQueue,
    pub release_queue: &'a ReleaseQueue,
    pub current_time: Tick,
}

impl SchedArgs<'_> {
    /// Iterates over the run queue together with the thread records.
    pub fn runnable(&self) -> impl Iterator<Item = (ThreadHandle, &Thread)> {
        self.run_queue.threads(self.threads)
    }
}

/// A scheduling policy.
pub trait SchedClass: fmt::Debug {
    /// Decides which thread runs next and for how long.
    ///
    /// If the run queue is empty, the decision is to idle until the nearest
    /// release, or for one tick if nothing is due.
    fn decide(&self, args: &mut SchedArgs<'_>) -> Decision;
}

/// The scheduling policy chosen by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedPolicy {
    /// The smallest thread ID runs to completion.
    #[default]
    Default,
    /// Highest-Response-Ratio-Next.
    Hrrn,
    /// Static priorities with round-robin inside the most urgent band.
    ///
    /// If `quantum` is not set, [`DEFAULT_RR_QUANTUM`] is used.
    PriorityRoundRobin { quantum: Option<NonZero<Tick>> },
    /// Deadline Monotonic.
    DeadlineMonotonic,
    /// Earliest Deadline First with a Constant Bandwidth Server for soft
    /// real-time threads.
    EdfCbs,
}

impl SchedPolicy {
    pub const fn name(&self) -> &'static str {
        match self {
            SchedPolicy::Default => "default",
            SchedPolicy::Hrrn => "hrrn",
            SchedPolicy::PriorityRoundRobin { .. } => "priority-rr",
            SchedPolicy::DeadlineMonotonic => "dm",
            SchedPolicy::EdfCbs => "edf-cbs",
        }
    }

    /// Whether the policy works on deadlines and may report deadline misses.
    pub const fn is_real_time(&self) -> bool {
        matches!(self, SchedPolicy::DeadlineMonotonic | SchedPolicy::EdfCbs)
    }

    /// Overrides the round-robin quantum. Other policies are unaffected.
    pub fn with_quantum(self, quantum: NonZero<Tick>) -> Self {
        match self {
            SchedPolicy::PriorityRoundRobin { .. } => SchedPolicy::PriorityRoundRobin {
                quantum: Some(quantum),
            },
            policy => policy,
        }
    }
}

impl SchedClass for SchedPolicy {
    fn decide(&self, args: &mut SchedArgs<'_>) -> Decision {
        match *self {
            SchedPolicy::Default => DefaultPolicy.decide(args),
            SchedPolicy::Hrrn => Hrrn.decide(args),
            SchedPolicy::PriorityRoundRobin { quantum } => {
                PriorityRoundRobin::new(quantum.unwrap_or(DEFAULT_RR_QUANTUM)).decide(args)
            }
            SchedPolicy::DeadlineMonotonic => DeadlineMonotonic.decide(args),
            SchedPolicy::EdfCbs => EdfCbs.decide(args),
        }
    }
}

impl fmt::Display for SchedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SchedPolicy {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let policy = match name.trim().to_ascii_lowercase().as_str() {
            "default" | "fcfs" => SchedPolicy::Default,
            "hrrn" => SchedPolicy::Hrrn,
            "priority-rr" | "prr" | "rr" => SchedPolicy::PriorityRoundRobin { quantum: None },
            "dm" | "deadline-monotonic" => SchedPolicy::DeadlineMonotonic,
            "edf-cbs" | "edf" => SchedPolicy::EdfCbs,
            _ => {
                return Err(Error::with_message(
                    Errno::UnknownPolicy,
                    "expected one of default, hrrn, priority-rr, dm, edf-cbs",
                ));
            }
        };
        Ok(policy)
    }
}

/// Idles until the nearest release, or for one tick if nothing is due.
fn idle_until_next_release(release_queue: &ReleaseQueue, now: Tick) -> Decision {
    let wake_after = release_queue
        .earliest()
        .map_or(1, |entry| entry.release_time.saturating_sub(now));
    Decision::idle(wake_after)
}

/// Reports the lowest-ID runnable thread whose current deadline has passed.
fn check_deadline_miss(args: &SchedArgs<'_>) -> Option<Decision> {
    let now = args.current_time;
    let (handle, thread) = args
        .runnable()
        .filter(|(_, thread)| thread.current_deadline() <= now)
        .min_by_key(|(_, thread)| thread.id())?;

    warn!(
        "{} missed its deadline {} at tick {}",
        thread.id(),
        thread.current_deadline(),
        now
    );
    Some(Decision::deadline_miss(handle))
}
