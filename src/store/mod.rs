//! Store contract: typed filters, partial updates, and the `ItemStore` port.
//!
//! The engine coordinates workers through exactly one primitive: an atomic
//! conditional find-and-modify on a single record. Implementations must make
//! [`ItemStore::find_one_and_update`] indivisible: predicate match and
//! mutation happen as one step, so two concurrent callers racing on the same
//! record can never both see it match.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{Item, ItemId, Status};

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// A predicate over stored item fields.
///
/// Only the shapes the engine needs exist: equality on status/id/heartbeat,
/// range on run_date/heartbeat, and And/Or composition. Heartbeat range and
/// equality never match a null heartbeat.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Status(Status),
    Id(ItemId),
    /// run_date ≤ t (claim eligibility).
    RunDateAtOrBefore(DateTime<Utc>),
    /// run_date < t (delayed backlog).
    RunDateBefore(DateTime<Utc>),
    /// heartbeat = t, exact. The optimistic-concurrency match.
    HeartbeatEq(DateTime<Utc>),
    /// heartbeat < t (lease expired strictly before t).
    HeartbeatBefore(DateTime<Utc>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    /// Pure evaluation against one item. This is the reference semantics the
    /// SQL translation must agree with; [`MemoryStore`] uses it directly.
    pub fn matches(&self, item: &Item) -> bool {
        match self {
            Filter::Status(status) => item.status == *status,
            Filter::Id(id) => item.id == Some(*id),
            Filter::RunDateAtOrBefore(t) => item.run_date <= *t,
            Filter::RunDateBefore(t) => item.run_date < *t,
            Filter::HeartbeatEq(t) => item.heartbeat == Some(*t),
            Filter::HeartbeatBefore(t) => matches!(item.heartbeat, Some(hb) if hb < *t),
            Filter::And(fs) => fs.iter().all(|f| f.matches(item)),
            Filter::Or(fs) => fs.iter().any(|f| f.matches(item)),
        }
    }
}

// ---------------------------------------------------------------------------
// Patch
// ---------------------------------------------------------------------------

/// A partial mutation of one stored record.
///
/// The heartbeat field is three-state (untouched, set to a time, or cleared)
/// because requeue must clear it while renewal sets it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    pub(crate) status: Option<Status>,
    pub(crate) run_date: Option<DateTime<Utc>>,
    pub(crate) heartbeat: Option<Option<DateTime<Utc>>>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn run_date(mut self, run_date: DateTime<Utc>) -> Self {
        self.run_date = Some(run_date);
        self
    }

    /// Set the heartbeat; `None` clears it.
    pub fn heartbeat(mut self, heartbeat: Option<DateTime<Utc>>) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    /// Apply to an item in place.
    pub(crate) fn apply(&self, item: &mut Item) {
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(run_date) = self.run_date {
            item.run_date = run_date;
        }
        if let Some(heartbeat) = self.heartbeat {
            item.heartbeat = heartbeat;
        }
    }
}

// ---------------------------------------------------------------------------
// ItemStore port
// ---------------------------------------------------------------------------

/// Store port (interface). The seam for swapping implementations: Postgres in
/// production, in-memory for tests.
///
/// The concurrency contract lives entirely in `find_one_and_update`: the
/// filter is evaluated and the patch applied as one indivisible step on at
/// most one record. Everything the engine guarantees is built on that.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert a new record. The store assigns the id; the stored post-image
    /// is returned.
    async fn insert(&self, item: &Item) -> Result<Item>;

    /// Atomically select one record matching `filter`, apply `patch`, and
    /// return the post-image. `None` when nothing matches. Which record is
    /// chosen among multiple matches is the store's own selection order.
    async fn find_one_and_update(&self, filter: &Filter, patch: &Patch) -> Result<Option<Item>>;

    /// Unconditional delete by id. Returns whether a record was removed.
    async fn delete(&self, id: ItemId) -> Result<bool>;

    /// Count records matching `filter`.
    async fn count(&self, filter: &Filter) -> Result<u64>;
}
