// SPDX-License-Identifier: MPL-2.0

use core::num::NonZero;

use log::trace;

use super::{SchedArgs, SchedClass, idle_until_next_release};
use crate::{Decision, Tick};

/// Static priorities with round-robin inside the most urgent band.
///
/// The first thread, in run queue order, among those with the smallest
/// priority value is chosen. If it shares the band with other threads, it is
/// rotated to the tail of the run queue and runs for at most one quantum, so
/// the band is served in turn. A thread alone in its band runs to completion
/// without a needless context switch.
#[derive(Debug, Clone, Copy)]
pub struct PriorityRoundRobin {
    quantum: NonZero<Tick>,
}

impl PriorityRoundRobin {
    pub const fn new(quantum: NonZero<Tick>) -> Self {
        Self { quantum }
    }

    pub const fn quantum(&self) -> Tick {
        self.quantum.get()
    }
}

impl Default for PriorityRoundRobin {
    fn default() -> Self {
        Self::new(super::DEFAULT_RR_QUANTUM)
    }
}

impl SchedClass for PriorityRoundRobin {
    fn decide(&self, args: &mut SchedArgs<'_>) -> Decision {
        let Some(best_priority) = args.runnable().map(|(_, thread)| thread.priority()).min() else {
            return idle_until_next_release(args.release_queue, args.current_time);
        };

        let (chosen, id, remaining_time, is_contended) = {
            let mut band = args
                .runnable()
                .filter(|(_, thread)| thread.priority() == best_priority);
            let Some((chosen, thread)) = band.next() else {
                return idle_until_next_release(args.release_queue, args.current_time);
            };
            let is_contended = band.next().is_some();
            (chosen, thread.id(), thread.remaining_time(), is_contended)
        };

        if !is_contended {
            trace!("priority-rr: {} runs alone for {}", id, remaining_time);
            return Decision::run(chosen, remaining_time);
        }

        args.run_queue.move_to_back(chosen);
        let allocated_time = remaining_time.min(self.quantum());
        trace!(
            "priority-rr: {} runs for {} in band {}",
            id, allocated_time, best_priority
        );
        Decision::run(chosen, allocated_time)
    }
}
