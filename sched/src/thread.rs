// SPDX-License-Identifier: MPL-2.0

//! Per-thread scheduling state.
//!
//! A [`Thread`] carries three groups of fields:
//!
//! - the work accounting (`processing_time`, `remaining_time`), owned by the
//!   driver, which decrements it as the thread actually runs;
//! - the static parameters (`id`, `priority`, `period`, `deadline`), fixed at
//!   construction;
//! - the real-time bookkeeping (`current_deadline` and the [`CbsState`]),
//!   which the scheduling policies update in place while deciding.
//!
//! Threads are only constructed through [`ThreadBuilder`], which establishes
//! the invariants the policies rely on. Policies never re-check them.

use core::fmt;

use crate::{Errno, Result, return_errno_with_message};

/// The scheduling clock, in ticks.
pub type Tick = u64;

/// The absolute deadline of threads without periodic parameters.
///
/// Such threads can never miss a deadline and sort after every periodic
/// thread under the deadline-driven policies.
pub const NO_DEADLINE: Tick = Tick::MAX;

/// The identity of a thread.
///
/// Lower IDs win every tie in every policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThreadId(u32);

impl ThreadId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl From<u32> for ThreadId {
    fn from(id: u32) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// The Constant Bandwidth Server state of a thread.
///
/// Hard real-time threads bypass budget enforcement entirely: their budget
/// fields are zero and they are never throttled. A soft real-time thread may
/// consume at most `budget` ticks per `period`; once its `remaining_budget`
/// reaches zero it is throttled until its current deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CbsState {
    is_hard_rt: bool,
    budget: Tick,
    remaining_budget: Tick,
    /// The tick at which throttling began, if the thread is throttled.
    throttled_since: Option<Tick>,
}

impl CbsState {
    const fn hard() -> Self {
        Self {
            is_hard_rt: true,
            budget: 0,
            remaining_budget: 0,
            throttled_since: None,
        }
    }

    pub const fn is_hard_rt(&self) -> bool {
        self.is_hard_rt
    }

    pub const fn is_soft_rt(&self) -> bool {
        !self.is_hard_rt
    }

    pub const fn budget(&self) -> Tick {
        self.budget
    }

    pub const fn remaining_budget(&self) -> Tick {
        self.remaining_budget
    }

    pub const fn is_throttled(&self) -> bool {
        self.throttled_since.is_some()
    }

    /// Returns the tick at which the thread was throttled.
    pub const fn throttled_arrived_time(&self) -> Option<Tick> {
        self.throttled_since
    }

    fn replenish(&mut self) {
        self.remaining_budget = self.budget;
    }
}

/// One schedulable unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    id: ThreadId,
    arrival_time: Tick,
    processing_time: Tick,
    remaining_time: Tick,
    priority: i32,
    period: Tick,
    deadline: Tick,
    current_deadline: Tick,
    cbs: CbsState,
}

impl Thread {
    /// Starts building a thread that demands `processing_time` ticks per job.
    pub fn builder(id: u32, processing_time: Tick) -> ThreadBuilder {
        ThreadBuilder::new(ThreadId::new(id), processing_time)
    }

    pub const fn id(&self) -> ThreadId {
        self.id
    }

    pub const fn arrival_time(&self) -> Tick {
        self.arrival_time
    }

    pub const fn processing_time(&self) -> Tick {
        self.processing_time
    }

    pub const fn remaining_time(&self) -> Tick {
        self.remaining_time
    }

    /// The static priority. A lower value is more urgent.
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// The period, or zero for an aperiodic thread.
    pub const fn period(&self) -> Tick {
        self.period
    }

    /// The relative deadline, or [`NO_DEADLINE`] for an aperiodic thread.
    pub const fn deadline(&self) -> Tick {
        self.deadline
    }

    /// The absolute deadline of the current job.
    pub const fn current_deadline(&self) -> Tick {
        self.current_deadline
    }

    pub const fn cbs(&self) -> &CbsState {
        &self.cbs
    }

    pub const fn is_periodic(&self) -> bool {
        self.period != 0
    }

    pub const fn is_finished(&self) -> bool {
        self.remaining_time == 0
    }

    /// The absolute deadline of a job released at `release_time`.
    ///
    /// This is `release_time + deadline` for a periodic thread, which is
    /// `release_time + period` unless a shorter deadline was configured.
    pub const fn job_deadline(&self, release_time: Tick) -> Tick {
        if self.is_periodic() {
            release_time.saturating_add(self.deadline)
        } else {
            NO_DEADLINE
        }
    }

    /// Starts a new job released at `release_time`.
    ///
    /// The job arrives at its release, demands the full processing time and
    /// is due at [`Self::job_deadline`]. A soft real-time thread starts the
    /// job with a full budget and is no longer throttled.
    pub fn release_job(&mut self, release_time: Tick) {
        self.arrival_time = release_time;
        self.remaining_time = self.processing_time;
        self.current_deadline = self.job_deadline(release_time);
        if self.cbs.is_soft_rt() {
            self.cbs.replenish();
            self.cbs.throttled_since = None;
        }
    }

    /// Accounts `ticks` of execution to the thread.
    ///
    /// Returns the ticks actually consumed, which is less than `ticks` only
    /// if the job completes first. Soft real-time threads pay the same
    /// amount out of their budget.
    pub fn consume(&mut self, ticks: Tick) -> Tick {
        let consumed = ticks.min(self.remaining_time);
        self.remaining_time -= consumed;
        if self.cbs.is_soft_rt() {
            self.cbs.remaining_budget = self.cbs.remaining_budget.saturating_sub(consumed);
        }
        consumed
    }

    /// Moves the deadline one period past `now` and refills the budget.
    pub(crate) fn postpone_deadline(&mut self, now: Tick) {
        self.current_deadline = now.saturating_add(self.period);
        self.cbs.replenish();
    }

    pub(crate) fn throttle(&mut self, now: Tick) {
        debug_assert!(self.cbs.is_soft_rt());
        self.cbs.throttled_since = Some(now);
    }

    /// Ends the throttling at the period boundary: the budget is refilled
    /// and the deadline advances by one period.
    pub(crate) fn expire_throttle(&mut self) {
        self.cbs.replenish();
        self.current_deadline = self.current_deadline.saturating_add(self.period);
        self.cbs.throttled_since = None;
    }
}

/// A builder that validates thread parameters.
#[derive(Debug, Clone)]
pub struct ThreadBuilder {
    id: ThreadId,
    arrival_time: Tick,
    processing_time: Tick,
    remaining_time: Option<Tick>,
    priority: i32,
    period: Option<Tick>,
    deadline: Option<Tick>,
    current_deadline: Option<Tick>,
    budget: Option<Tick>,
    remaining_budget: Option<Tick>,
}

impl ThreadBuilder {
    fn new(id: ThreadId, processing_time: Tick) -> Self {
        Self {
            id,
            arrival_time: 0,
            processing_time,
            remaining_time: None,
            priority: 0,
            period: None,
            deadline: None,
            current_deadline: None,
            budget: None,
            remaining_budget: None,
        }
    }

    pub fn arrival_time(mut self, arrival_time: Tick) -> Self {
        self.arrival_time = arrival_time;
        self
    }

    /// Sets the work left in the current job. Defaults to the processing time.
    pub fn remaining_time(mut self, remaining_time: Tick) -> Self {
        self.remaining_time = Some(remaining_time);
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Makes the thread periodic. The relative deadline defaults to the period.
    pub fn periodic(mut self, period: Tick) -> Self {
        self.period = Some(period);
        self
    }

    /// Sets the relative deadline of a periodic thread.
    pub fn deadline(mut self, deadline: Tick) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the absolute deadline of the current job.
    ///
    /// Defaults to `arrival_time + deadline`.
    pub fn current_deadline(mut self, current_deadline: Tick) -> Self {
        self.current_deadline = Some(current_deadline);
        self
    }

    /// Makes the thread a soft real-time thread served by a CBS with
    /// `budget` ticks per period.
    pub fn soft(mut self, budget: Tick) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Sets the budget left in the current period. Defaults to the budget.
    pub fn remaining_budget(mut self, remaining_budget: Tick) -> Self {
        self.remaining_budget = Some(remaining_budget);
        self
    }

    pub fn build(self) -> Result<Thread> {
        if self.processing_time == 0 {
            return_errno_with_message!(Errno::InvalidArgs, "processing time must be positive");
        }
        let remaining_time = self.remaining_time.unwrap_or(self.processing_time);
        if remaining_time > self.processing_time {
            return_errno_with_message!(
                Errno::InvalidArgs,
                "remaining time exceeds processing time"
            );
        }

        let (period, deadline, current_deadline) = match self.period {
            Some(0) => {
                return_errno_with_message!(Errno::InvalidArgs, "period must be positive");
            }
            Some(period) => {
                let deadline = self.deadline.unwrap_or(period);
                if deadline == 0 {
                    return_errno_with_message!(
                        Errno::InvalidArgs,
                        "relative deadline must be positive"
                    );
                }
                let current_deadline = self
                    .current_deadline
                    .unwrap_or(self.arrival_time.saturating_add(deadline));
                (period, deadline, current_deadline)
            }
            None => {
                if self.deadline.is_some() || self.current_deadline.is_some() {
                    return_errno_with_message!(
                        Errno::InvalidArgs,
                        "deadlines require a periodic thread"
                    );
                }
                (0, NO_DEADLINE, NO_DEADLINE)
            }
        };

        let cbs = match self.budget {
            None => {
                if self.remaining_budget.is_some() {
                    return_errno_with_message!(
                        Errno::InvalidArgs,
                        "a remaining budget requires a soft real-time thread"
                    );
                }
                CbsState::hard()
            }
            Some(_) if period == 0 => {
                return_errno_with_message!(
                    Errno::InvalidArgs,
                    "soft real-time threads must be periodic"
                );
            }
            Some(0) => {
                return_errno_with_message!(Errno::InvalidArgs, "budget must be positive");
            }
            Some(budget) if budget > period => {
                return_errno_with_message!(Errno::InvalidArgs, "budget exceeds the period");
            }
            Some(budget) => {
                let remaining_budget = self.remaining_budget.unwrap_or(budget);
                if remaining_budget > budget {
                    return_errno_with_message!(
                        Errno::InvalidArgs,
                        "remaining budget exceeds the budget"
                    );
                }
                CbsState {
                    is_hard_rt: false,
                    budget,
                    remaining_budget,
                    throttled_since: None,
                }
            }
        };

        Ok(Thread {
            id: self.id,
            arrival_time: self.arrival_time,
            processing_time: self.processing_time,
            remaining_time,
            priority: self.priority,
            period,
            deadline,
            current_deadline,
            cbs,
        })
    }
}
