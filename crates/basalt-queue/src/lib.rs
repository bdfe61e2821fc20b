//! Deduplicating, rate-limited work queue.
//!
//! [`WorkQueue`] holds entity identifiers awaiting reconciliation and hands
//! them to a pool of workers with these guarantees:
//!
//! - **Dedup**: a key added while already pending collapses into the existing
//!   entry; a key added while in flight is parked and re-queued once its
//!   current pass finishes.
//! - **Per-key serialization**: at most one worker holds a given key between
//!   [`WorkQueue::get`] and [`WorkQueue::done`].
//! - **Backoff**: [`WorkQueue::add_rate_limited`] re-enqueues after an
//!   exponential, capped per-key delay; [`WorkQueue::forget`] resets the
//!   failure count on success.
//! - **Drain on shutdown**: [`WorkQueue::shut_down`] lets queued keys drain,
//!   then unblocks every waiting `get` with `None`.
//!
//! The queue is independent of what the keys mean; the reconciler uses it
//! with image IDs, tests use it with anything hashable.

pub mod backoff;
pub mod queue;

pub use backoff::Backoff;
pub use queue::WorkQueue;
