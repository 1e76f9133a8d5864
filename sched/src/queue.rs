// SPDX-License-Identifier: MPL-2.0

//! The two thread queues a policy looks at.
//!
//! Both queues hold [`ThreadHandle`]s rather than threads, so that a thread
//! can sit in one queue while other code refers to it through the arena.
//! Membership of both queues is owned by the driver. The only mutation a
//! policy performs is the round-robin rotation of the run queue.

use alloc::{collections::VecDeque, vec::Vec};

use crate::{Thread, ThreadArena, ThreadHandle, Tick};

/// The threads currently eligible for CPU time, in insertion order.
#[derive(Debug, Default, Clone)]
pub struct RunQueue {
    queue: VecDeque<ThreadHandle>,
}

impl RunQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn contains(&self, handle: ThreadHandle) -> bool {
        self.queue.contains(&handle)
    }

    pub fn push_back(&mut self, handle: ThreadHandle) {
        debug_assert!(!self.contains(handle));
        self.queue.push_back(handle);
    }

    /// Removes a thread from the queue. Returns whether it was queued.
    pub fn remove(&mut self, handle: ThreadHandle) -> bool {
        match self.position(handle) {
            Some(pos) => {
                self.queue.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = ThreadHandle> {
        self.queue.iter().copied()
    }

    /// Iterates over the queued threads together with their records.
    pub fn threads<'a>(
        &'a self,
        arena: &'a ThreadArena,
    ) -> impl Iterator<Item = (ThreadHandle, &'a Thread)> {
        self.iter().map(move |handle| (handle, &arena[handle]))
    }

    fn position(&self, handle: ThreadHandle) -> Option<usize> {
        self.queue.iter().position(|&queued| queued == handle)
    }

    /// Rotates a queued thread to the tail.
    ///
    /// This is a linear scan. Run queues hold one entry per thread of a task
    /// set, and every policy already walks the whole queue to decide.
    pub(crate) fn move_to_back(&mut self, handle: ThreadHandle) {
        if let Some(pos) = self.position(handle)
            && let Some(handle) = self.queue.remove(pos)
        {
            self.queue.push_back(handle);
        }
    }
}

/// A thread that exists but has not arrived in the run queue yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseEntry {
    pub release_time: Tick,
    pub thread: ThreadHandle,
}

/// The threads due to arrive in the future.
#[derive(Debug, Default, Clone)]
pub struct ReleaseQueue {
    entries: Vec<ReleaseEntry>,
}

impl ReleaseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, release_time: Tick, thread: ThreadHandle) {
        self.entries.push(ReleaseEntry {
            release_time,
            thread,
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReleaseEntry> {
        self.entries.iter()
    }

    /// Returns the entry with the smallest release time.
    ///
    /// Among entries released at the same tick, the earliest queued wins.
    pub fn earliest(&self) -> Option<&ReleaseEntry> {
        self.entries.iter().reduce(|earliest, entry| {
            if entry.release_time < earliest.release_time {
                entry
            } else {
                earliest
            }
        })
    }

    /// Removes and returns every entry released at or before `now`, in
    /// queue order.
    pub fn drain_released(&mut self, now: Tick) -> Vec<ReleaseEntry> {
        let (released, pending): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .partition(|entry| entry.release_time <= now);
        self.entries = pending;
        released
    }

    /// Removes every entry of the given thread.
    pub fn remove_thread(&mut self, thread: ThreadHandle) {
        self.entries.retain(|entry| entry.thread != thread);
    }
}
