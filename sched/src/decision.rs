// SPDX-License-Identifier: MPL-2.0

use crate::{ThreadHandle, Tick};

/// What a policy picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selected {
    /// Run this thread.
    Thread(ThreadHandle),
    /// Leave the CPU idle.
    Idle,
}

/// The verdict of one scheduling event.
///
/// A decision either runs a thread or idles for `allocated_time` ticks,
/// which is always at least one. The single exception is the deadline-miss
/// fault: it names the thread that missed its deadline and allocates zero
/// ticks. The driver must treat it as a fault of that thread and never as a
/// zero-length dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub selected: Selected,
    pub allocated_time: Tick,
}

impl Decision {
    /// Runs `thread` for `allocated_time` ticks, at least one.
    pub fn run(thread: ThreadHandle, allocated_time: Tick) -> Self {
        Self {
            selected: Selected::Thread(thread),
            allocated_time: allocated_time.max(1),
        }
    }

    /// Idles for `allocated_time` ticks, at least one.
    pub fn idle(allocated_time: Tick) -> Self {
        Self {
            selected: Selected::Idle,
            allocated_time: allocated_time.max(1),
        }
    }

    /// Reports that `thread` has missed its deadline.
    pub fn deadline_miss(thread: ThreadHandle) -> Self {
        Self {
            selected: Selected::Thread(thread),
            allocated_time: 0,
        }
    }

    pub fn thread(&self) -> Option<ThreadHandle> {
        match self.selected {
            Selected::Thread(thread) => Some(thread),
            Selected::Idle => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.selected == Selected::Idle
    }

    pub fn is_deadline_miss(&self) -> bool {
        self.allocated_time == 0
    }
}
