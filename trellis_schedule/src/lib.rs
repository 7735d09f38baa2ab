// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trellis Schedule: cancelable deferred jobs on a caller-driven clock.
//!
//! UI focus management leans on short timers: debouncing bursts of tree
//! mutations, settling before restoring lost focus, coalescing scroll
//! events. This crate models those timers as explicit data instead of
//! ambient platform timers: the owner schedules jobs against timestamps it
//! supplies, and later drains everything that has come due. Nothing here
//! blocks, and nothing observes a real clock, so tests drive time
//! deterministically.
//!
//! - Jobs are ordered by due time, then by scheduling order, so two jobs
//!   due at the same instant always run in the order they were scheduled.
//! - [`JobHandle`]s are generational: canceling a handle that already fired
//!   (or was already canceled) is a no-op, never a misfire against a reused
//!   slot.
//!
//! ## Example
//!
//! ```rust
//! use trellis_schedule::Scheduler;
//!
//! let mut sched: Scheduler<&str> = Scheduler::new();
//! let restore = sched.schedule(1000, 100, "restore");
//! sched.schedule(1000, 0, "recompute");
//!
//! // Nothing is due yet at the scheduling instant.
//! assert_eq!(sched.pop_due(1000), Some("recompute"));
//! assert_eq!(sched.pop_due(1000), None);
//!
//! // A fresh focus arrives; the pending restore is canceled.
//! sched.cancel(restore);
//! assert_eq!(sched.pop_due(2000), None);
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

use alloc::vec::Vec;

/// Identifier for a scheduled job (generational).
///
/// Stale handles (fired, canceled, or cleared jobs) are ignored by
/// [`Scheduler::cancel`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct JobHandle(u64);

/// Ordered queue of deferred jobs driven by caller-supplied timestamps.
///
/// The type parameter `J` is the job payload; owners typically use a small
/// enum and match on it when draining.
#[derive(Clone, Debug)]
pub struct Scheduler<J> {
    /// Pending jobs, unordered; the queue is small enough that a linear
    /// minimum scan beats maintaining a heap.
    jobs: Vec<Entry<J>>,
    next_seq: u64,
}

#[derive(Clone, Debug)]
struct Entry<J> {
    due: u64,
    seq: u64,
    job: J,
}

impl<J> Scheduler<J> {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            next_seq: 0,
        }
    }

    /// Schedule `job` to come due `delay` time units after `now`.
    pub fn schedule(&mut self, now: u64, delay: u64, job: J) -> JobHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.jobs.push(Entry {
            due: now.saturating_add(delay),
            seq,
            job,
        });
        JobHandle(seq)
    }

    /// Cancel a pending job. Stale handles are ignored.
    ///
    /// Returns `true` if a pending job was removed.
    pub fn cancel(&mut self, handle: JobHandle) -> bool {
        let before = self.jobs.len();
        self.jobs.retain(|e| e.seq != handle.0);
        self.jobs.len() != before
    }

    /// Pop the earliest job due at or before `now`, if any.
    ///
    /// Jobs due at the same instant are returned in scheduling order. Call
    /// in a loop to drain everything due.
    pub fn pop_due(&mut self, now: u64) -> Option<J> {
        let mut best: Option<usize> = None;
        for (i, e) in self.jobs.iter().enumerate() {
            if e.due > now {
                continue;
            }
            match best {
                None => best = Some(i),
                Some(j) => {
                    let b = &self.jobs[j];
                    if (e.due, e.seq) < (b.due, b.seq) {
                        best = Some(i);
                    }
                }
            }
        }
        best.map(|i| self.jobs.swap_remove(i).job)
    }

    /// Earliest due time among pending jobs, if any.
    ///
    /// Hosts bridging to a real event loop use this to arm a single
    /// platform timer for the next [`Scheduler::pop_due`] drain.
    pub fn next_due(&self) -> Option<u64> {
        self.jobs.iter().map(|e| e.due).min()
    }

    /// Number of pending jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether no jobs are pending.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Drop all pending jobs. Used on owner disposal.
    pub fn clear(&mut self) {
        self.jobs.clear();
    }
}

impl<J> Default for Scheduler<J> {
    fn default() -> Self {
        Self::new()
    }
}
