// SPDX-License-Identifier: MPL-2.0

//! Pluggable scheduling policies for a single CPU.
//!
//! The crate is the decision core of a scheduler. A driver owns the clock,
//! a [`ThreadArena`] with every thread record, a [`RunQueue`] of threads
//! eligible to run and a [`ReleaseQueue`] of threads due to arrive later. At
//! every scheduling event it hands them to a policy as [`SchedArgs`] and gets
//! back one [`Decision`]: which thread runs, for how many ticks, or that the
//! CPU idles, or that a thread has missed its deadline.
//!
//! Five policies are provided:
//!
//! - [`DefaultPolicy`]: the smallest thread ID runs to completion;
//! - [`Hrrn`]: Highest-Response-Ratio-Next;
//! - [`PriorityRoundRobin`]: static priorities with round-robin in a band;
//! - [`DeadlineMonotonic`]: static priorities by relative deadline;
//! - [`EdfCbs`]: Earliest Deadline First with a Constant Bandwidth Server
//!   for soft real-time threads.
//!
//! [`SchedPolicy`] selects one of them at run time.
//!
//! ```
//! use rtsched::{ReleaseQueue, RunQueue, SchedArgs, SchedClass, SchedPolicy, Thread, ThreadArena};
//!
//! let mut threads = ThreadArena::new();
//! let mut run_queue = RunQueue::new();
//! let handle = threads.insert(Thread::builder(1, 5).build()?)?;
//! run_queue.push_back(handle);
//!
//! let policy: SchedPolicy = "hrrn".parse()?;
//! let decision = policy.decide(&mut SchedArgs {
//!     threads: &mut threads,
//!     run_queue: &mut run_queue,
//!     release_queue: &ReleaseQueue::new(),
//!     current_time: 0,
//! });
//! assert_eq!(decision.thread(), Some(handle));
//! assert_eq!(decision.allocated_time, 5);
//! # Ok::<(), rtsched::Error>(())
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

mod arena;
mod decision;
mod error;
mod policy;
mod queue;
mod thread;

pub use self::{
    arena::{ThreadArena, ThreadHandle},
    decision::{Decision, Selected},
    error::{Errno, Error, Result},
    policy::{
        DEFAULT_RR_QUANTUM, DeadlineMonotonic, DefaultPolicy, EdfCbs, Hrrn, PriorityRoundRobin,
        SchedArgs, SchedClass, SchedPolicy,
    },
    queue::{ReleaseEntry, ReleaseQueue, RunQueue},
    thread::{CbsState, NO_DEADLINE, Thread, ThreadBuilder, ThreadId, Tick},
};
