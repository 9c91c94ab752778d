//! # leaseq
//!
//! Lease-based job dispatch over a shared store. Producers [`schedule`] items;
//! any number of workers, in any number of processes, [`peek`] to claim one
//! eligible item at a time, [`heartbeat`] to keep the claim alive,
//! [`reschedule`] to requeue, and [`delete`] to complete. A worker that dies
//! simply stops renewing: its lease expires and the item becomes claimable
//! again.
//!
//! Coordination comes entirely from the store's atomic conditional
//! find-and-modify on a single record: no locks, leader election, or
//! consensus. The flip side: expiry compares heartbeat timestamps written by
//! different hosts, so clock skew between workers and the store can expire a
//! lease while its worker is still alive. There is no fencing token beyond
//! the heartbeat itself.
//!
//! [`schedule`]: engine::Scheduler::schedule
//! [`peek`]: engine::Scheduler::peek
//! [`heartbeat`]: engine::Scheduler::heartbeat
//! [`reschedule`]: engine::Scheduler::reschedule
//! [`delete`]: engine::Scheduler::delete

pub mod config;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod model;
pub mod store;

pub use engine::Scheduler;
pub use error::{Error, Result};
pub use model::{Item, ItemId, Status};
