// SPDX-License-Identifier: MPL-2.0

//! Earliest Deadline First with a Constant Bandwidth Server.
//!
//! Hard real-time threads are scheduled by plain EDF on their current
//! absolute deadline. Soft real-time threads are each served by a CBS: a
//! thread may run at most `budget` ticks per `period`. A soft thread whose
//! budget runs out is throttled until its current deadline, when the budget
//! is refilled and the deadline moves one period ahead. A soft thread that
//! would run with more bandwidth than `budget / period` before its deadline
//! has its deadline postponed instead.

use log::{debug, trace};

use super::{SchedArgs, SchedClass, check_deadline_miss, idle_until_next_release};
use crate::{Decision, Thread, ThreadHandle, ThreadId, Tick};

#[derive(Debug, Clone, Copy, Default)]
pub struct EdfCbs;

/// The EDF priority of a (possibly hypothetical) job. Smaller keys are more
/// urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct EdfKey {
    deadline: Tick,
    id: ThreadId,
}

impl EdfKey {
    fn of(thread: &Thread) -> Self {
        Self {
            deadline: thread.current_deadline(),
            id: thread.id(),
        }
    }
}

impl SchedClass for EdfCbs {
    fn decide(&self, args: &mut SchedArgs<'_>) -> Decision {
        expire_throttling(args);

        if let Some(miss) = check_deadline_miss(args) {
            return miss;
        }

        let now = args.current_time;
        if args.run_queue.is_empty() {
            return idle_until_next_release(args.release_queue, now);
        }

        throttle_exhausted(args);

        let Some(chosen) = pick_with_bandwidth_preserved(args) else {
            trace!("edf-cbs: every runnable thread is throttled at tick {}", now);
            return Decision::idle(1);
        };

        let thread = &args.threads[chosen];
        let mut allocated_time = thread.remaining_time();
        if thread.cbs().is_soft_rt() {
            allocated_time = allocated_time.min(thread.cbs().remaining_budget());
        }
        let allocated_time = preemption_bound(args, chosen, allocated_time);

        trace!(
            "edf-cbs: {} runs for {} at tick {}",
            args.threads[chosen].id(),
            allocated_time,
            now
        );
        Decision::run(chosen, allocated_time)
    }
}

/// Lifts the throttling of soft threads whose current deadline has come.
fn expire_throttling(args: &mut SchedArgs<'_>) {
    let now = args.current_time;
    for handle in args.run_queue.iter() {
        let thread = &mut args.threads[handle];
        if thread.cbs().is_throttled() && thread.current_deadline() <= now {
            thread.expire_throttle();
            debug!(
                "edf-cbs: {} replenished, deadline moved to {}",
                thread.id(),
                thread.current_deadline()
            );
        }
    }
}

/// Throttles soft threads that have used up their budget.
fn throttle_exhausted(args: &mut SchedArgs<'_>) {
    let now = args.current_time;
    for handle in args.run_queue.iter() {
        let thread = &mut args.threads[handle];
        let cbs = thread.cbs();
        if cbs.is_soft_rt() && !cbs.is_throttled() && cbs.remaining_budget() == 0 {
            thread.throttle(now);
            debug!("edf-cbs: {} throttled at tick {}", thread.id(), now);
        }
    }
}

/// Picks the most urgent non-throttled thread.
///
/// If the pick is a soft thread that would exceed its reserved bandwidth, its
/// deadline is postponed and the pick is made again. A thread is postponed
/// at most once per decision, since a freshly postponed thread never violates
/// its bandwidth.
fn pick_with_bandwidth_preserved(args: &mut SchedArgs<'_>) -> Option<ThreadHandle> {
    let now = args.current_time;
    loop {
        let (chosen, _) = args
            .runnable()
            .filter(|(_, thread)| !thread.cbs().is_throttled())
            .min_by_key(|(_, thread)| EdfKey::of(thread))?;

        let thread = &mut args.threads[chosen];
        if !exceeds_bandwidth(thread, now) {
            return Some(chosen);
        }
        thread.postpone_deadline(now);
        debug!(
            "edf-cbs: {} postponed to deadline {} at tick {}",
            thread.id(),
            thread.current_deadline(),
            now
        );
    }
}

/// Whether running a soft thread now would use more than `budget / period`
/// of the CPU until its current deadline.
fn exceeds_bandwidth(thread: &Thread, now: Tick) -> bool {
    let cbs = thread.cbs();
    if cbs.is_hard_rt() || cbs.remaining_budget() == 0 {
        return false;
    }
    let deadline = thread.current_deadline();
    if deadline <= now {
        return true;
    }
    let demand = u128::from(cbs.remaining_budget()) * u128::from(thread.period());
    let supply = u128::from(cbs.budget()) * u128::from(deadline - now);
    demand > supply
}

/// Shortens an allocation so that the chosen thread is preempted as soon as
/// a more urgent job becomes eligible.
///
/// Two kinds of jobs are anticipated: releases that are due within the
/// allocation, and throttled threads whose budget is refilled within it. The
/// window shrinks with every cap, so later candidates must arrive earlier.
fn preemption_bound(args: &SchedArgs<'_>, chosen: ThreadHandle, allocated_time: Tick) -> Tick {
    let now = args.current_time;
    let chosen_key = EdfKey::of(&args.threads[chosen]);
    let mut window = allocated_time;

    for entry in args.release_queue.iter() {
        let release_time = entry.release_time;
        if release_time < now || release_time >= now.saturating_add(window) {
            continue;
        }
        let arriving = &args.threads[entry.thread];
        let key = EdfKey {
            deadline: arriving.job_deadline(release_time),
            id: arriving.id(),
        };
        if key < chosen_key {
            window = window.min((release_time - now).max(1));
        }
    }

    for (handle, thread) in args.runnable() {
        if handle == chosen || !thread.cbs().is_throttled() {
            continue;
        }
        let replenish_time = thread.current_deadline();
        if replenish_time < now || replenish_time >= now.saturating_add(window) {
            continue;
        }
        let key = EdfKey {
            deadline: replenish_time.saturating_add(thread.period()),
            id: thread.id(),
        };
        if key < chosen_key {
            window = window.min((replenish_time - now).max(1));
        }
    }

    window
}
