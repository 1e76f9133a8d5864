// SPDX-License-Identifier: MPL-2.0

use log::trace;

use super::{SchedArgs, SchedClass, check_deadline_miss, idle_until_next_release};
use crate::{Decision, Thread, ThreadId, Tick};

/// Deadline Monotonic.
///
/// The static priority of a thread is its relative deadline: the shorter the
/// deadline, the more urgent the thread. The chosen thread runs until it
/// completes, unless a more urgent thread is released before that, in which
/// case it runs only until the release.
///
/// Before anything else, the run queue is checked for a thread whose current
/// deadline has already passed; such a thread is reported as a deadline miss.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadlineMonotonic;

/// The DM priority of a thread. Smaller keys are more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct DmKey {
    deadline: Tick,
    id: ThreadId,
}

impl DmKey {
    fn of(thread: &Thread) -> Self {
        Self {
            deadline: thread.deadline(),
            id: thread.id(),
        }
    }
}

impl SchedClass for DeadlineMonotonic {
    fn decide(&self, args: &mut SchedArgs<'_>) -> Decision {
        if let Some(miss) = check_deadline_miss(args) {
            return miss;
        }

        let now = args.current_time;
        let Some((chosen, thread)) = args.runnable().min_by_key(|(_, thread)| DmKey::of(thread))
        else {
            return idle_until_next_release(args.release_queue, now);
        };
        let remaining_time = thread.remaining_time();

        let allocated_time = match args.release_queue.earliest() {
            // A release is overdue. Give the driver one tick to process it.
            Some(entry) if entry.release_time <= now => 1,
            Some(entry)
                if entry.release_time < now.saturating_add(remaining_time)
                    && DmKey::of(&args.threads[entry.thread]) < DmKey::of(thread) =>
            {
                entry.release_time - now
            }
            _ => remaining_time,
        };

        trace!(
            "dm: {} runs for {} at tick {}",
            thread.id(),
            allocated_time,
            now
        );
        Decision::run(chosen, allocated_time)
    }
}
