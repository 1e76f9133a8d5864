// SPDX-License-Identifier: MPL-2.0

use alloc::vec::Vec;
use core::{
    fmt,
    ops::{Index, IndexMut},
};

use bitvec::prelude::BitVec;

use crate::{Errno, Result, Thread, ThreadId, return_errno, return_errno_with_message};

/// A handle to a thread stored in a [`ThreadArena`].
///
/// A handle stays valid for as long as its thread stays in the arena. Once
/// the thread is removed, the slot may be reused by another thread, but the
/// old handle is rejected because its generation no longer matches.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadHandle {
    slot: u32,
    generation: u32,
}

impl ThreadHandle {
    fn index(&self) -> usize {
        self.slot as usize
    }
}

impl fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThreadHandle({}v{})", self.slot, self.generation)
    }
}

/// The storage of all thread records known to the driver.
///
/// Occupied slots are tracked by a bitmap; the first free slot is cached so
/// that insertions reuse the lowest available slot.
#[derive(Default)]
pub struct ThreadArena {
    slots: Vec<Slot>,
    occupied: BitVec<u8>,
    first_available: usize,
    len: usize,
}

#[derive(Default)]
struct Slot {
    generation: u32,
    thread: Option<Thread>,
}

impl ThreadArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores a thread and returns its handle.
    ///
    /// Thread IDs must be unique within the arena since they are the tie-break
    /// of every policy.
    pub fn insert(&mut self, thread: Thread) -> Result<ThreadHandle> {
        if self.find(thread.id()).is_some() {
            return_errno_with_message!(Errno::DuplicateId, "thread id is already in use");
        }

        let index = self.first_available;
        if index == self.slots.len() {
            self.slots.push(Slot::default());
            self.occupied.push(false);
        }
        let slot = &mut self.slots[index];
        slot.thread = Some(thread);
        self.occupied.set(index, true);
        self.len += 1;
        self.first_available = (index + 1..self.occupied.len())
            .find(|&i| !self.occupied[i])
            .unwrap_or(self.occupied.len());

        Ok(ThreadHandle {
            slot: index as u32,
            generation: slot.generation,
        })
    }

    /// Removes a thread, invalidating its handle.
    pub fn remove(&mut self, handle: ThreadHandle) -> Result<Thread> {
        let index = handle.index();
        let Some(slot) = (self.slots.get_mut(index))
            .filter(|slot| slot.generation == handle.generation)
        else {
            return_errno!(Errno::StaleHandle);
        };
        let Some(thread) = slot.thread.take() else {
            return_errno!(Errno::StaleHandle);
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.occupied.set(index, false);
        self.len -= 1;
        if index < self.first_available {
            self.first_available = index;
        }
        Ok(thread)
    }

    pub fn contains(&self, handle: ThreadHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn get(&self, handle: ThreadHandle) -> Option<&Thread> {
        let slot = self.slots.get(handle.index())?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.thread.as_ref()
    }

    pub fn get_mut(&mut self, handle: ThreadHandle) -> Option<&mut Thread> {
        let slot = self.slots.get_mut(handle.index())?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.thread.as_mut()
    }

    /// Looks up the handle of the thread with the given ID.
    pub fn find(&self, id: ThreadId) -> Option<ThreadHandle> {
        self.iter()
            .find(|(_, thread)| thread.id() == id)
            .map(|(handle, _)| handle)
    }

    /// Iterates over the stored threads in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ThreadHandle, &Thread)> {
        self.occupied.iter_ones().filter_map(|index| {
            let slot = &self.slots[index];
            let thread = slot.thread.as_ref()?;
            Some((
                ThreadHandle {
                    slot: index as u32,
                    generation: slot.generation,
                },
                thread,
            ))
        })
    }
}

/// Accesses a live thread.
///
/// # Panics
///
/// Panics if the handle is stale. Handles held by the run queue and the
/// release queue are live by contract, so the policies index directly.
impl Index<ThreadHandle> for ThreadArena {
    type Output = Thread;

    fn index(&self, handle: ThreadHandle) -> &Thread {
        match self.get(handle) {
            Some(thread) => thread,
            None => panic!("stale thread handle: {:?}", handle),
        }
    }
}

impl IndexMut<ThreadHandle> for ThreadArena {
    fn index_mut(&mut self, handle: ThreadHandle) -> &mut Thread {
        match self.get_mut(handle) {
            Some(thread) => thread,
            None => panic!("stale thread handle: {:?}", handle),
        }
    }
}

impl fmt::Debug for ThreadArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadArena")
            .field("len", &self.len)
            .field("first_available", &self.first_available)
            .field(
                "threads",
                &self.iter().map(|(_, thread)| thread.id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
