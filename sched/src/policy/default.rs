// SPDX-License-Identifier: MPL-2.0

use log::trace;

use super::{SchedArgs, SchedClass, idle_until_next_release};
use crate::Decision;

/// The baseline policy: the runnable thread with the smallest ID runs to
/// completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPolicy;

impl SchedClass for DefaultPolicy {
    fn decide(&self, args: &mut SchedArgs<'_>) -> Decision {
        let Some((handle, thread)) = args.runnable().min_by_key(|(_, thread)| thread.id()) else {
            return idle_until_next_release(args.release_queue, args.current_time);
        };

        trace!(
            "default: {} runs for {} at tick {}",
            thread.id(),
            thread.remaining_time(),
            args.current_time
        );
        Decision::run(handle, thread.remaining_time())
    }
}
