// SPDX-License-Identifier: MPL-2.0

use core::cmp::{Ordering, Reverse};

use log::trace;

use super::{SchedArgs, SchedClass, idle_until_next_release};
use crate::{Decision, Thread, Tick};

/// Highest-Response-Ratio-Next.
///
/// The response ratio of a thread is
///
/// ```text
/// (waiting_time + processing_time) / processing_time
/// ```
///
/// where the waiting time is the time elapsed since its arrival. The thread
/// with the highest ratio runs to completion; ties go to the smaller ID.
/// Short threads are favored, yet a long thread's ratio keeps growing while
/// it waits, so it cannot starve.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hrrn;

impl SchedClass for Hrrn {
    fn decide(&self, args: &mut SchedArgs<'_>) -> Decision {
        let now = args.current_time;
        let Some((handle, thread)) = args
            .runnable()
            .max_by_key(|(_, thread)| (ResponseRatio::of(thread, now), Reverse(thread.id())))
        else {
            return idle_until_next_release(args.release_queue, now);
        };

        trace!(
            "hrrn: {} (waited {}) runs for {} at tick {}",
            thread.id(),
            now.saturating_sub(thread.arrival_time()),
            thread.remaining_time(),
            now
        );
        Decision::run(handle, thread.remaining_time())
    }
}

/// A response ratio kept as a fraction.
///
/// Ratios are compared by cross-multiplication, so no division happens. The
/// products are computed in 128 bits and cannot overflow.
#[derive(Debug, Clone, Copy)]
struct ResponseRatio {
    numerator: u128,
    denominator: u128,
}

impl ResponseRatio {
    fn of(thread: &Thread, now: Tick) -> Self {
        let waiting_time = now.saturating_sub(thread.arrival_time());
        let processing_time = thread.processing_time();
        Self {
            numerator: u128::from(waiting_time) + u128::from(processing_time),
            denominator: u128::from(processing_time),
        }
    }
}

impl Ord for ResponseRatio {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.numerator * other.denominator).cmp(&(other.numerator * self.denominator))
    }
}

impl PartialOrd for ResponseRatio {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ResponseRatio {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ResponseRatio {}
