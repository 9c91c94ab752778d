//! Lease engine: schedule, claim, renew, requeue, complete.
//!
//! Workers coordinate exclusively through the store's atomic conditional
//! find-and-modify; the engine itself holds no locks and no shared state.
//! Any number of engine values across any number of processes may point at
//! the same store.

use chrono::{Duration, Utc};
use tracing::{debug, warn};

use crate::eligibility;
use crate::error::{Error, Result};
use crate::model::{Item, Status};
use crate::store::{Filter, ItemStore, Patch};

/// Lease-based dispatch over an injected item store.
///
/// Every operation performs one synchronous store round trip ([`Scheduler::poll`]
/// composes the two its definition calls for) and blocks only for its
/// duration; retry, backoff, and cancellation belong to the caller or the
/// store client, not here.
pub struct Scheduler<S> {
    store: S,
    expiration: Duration,
}

impl<S: ItemStore> Scheduler<S> {
    /// `expiration` is how long an unrenewed claim stays exclusive; after
    /// that the item is treated as abandoned and becomes claimable again.
    pub fn new(store: S, expiration: Duration) -> Self {
        Self { store, expiration }
    }

    /// Insert a new pending item. The store assigns the id; the stored
    /// post-image is returned so the caller learns it.
    ///
    /// The caller-supplied item must not carry an id yet.
    pub async fn schedule(&self, item: &Item) -> Result<Item> {
        if item.id.is_some() {
            return Err(Error::InvalidItem("id must be absent on schedule"));
        }

        let record = Item {
            id: None,
            run_date: item.run_date,
            heartbeat: None,
            status: Status::Pending,
            payload: item.payload.clone(),
        };
        let stored = self.store.insert(&record).await?;
        debug!(id = ?stored.id, run_date = %stored.run_date, "item scheduled");
        Ok(stored)
    }

    /// Claim one eligible item: pending with a due run date, or processing
    /// with an expired lease. The claim transitions it to processing and
    /// stamps a fresh heartbeat, all in one atomic store operation: two
    /// racing callers can never both claim the same record.
    ///
    /// `None` when nothing is eligible. Which of several eligible items is
    /// claimed is the store's own selection order, not a contract.
    pub async fn peek(&self) -> Result<Option<Item>> {
        let now = Utc::now();
        let filter = eligibility::claimable(now, self.expiration);
        let patch = Patch::new().status(Status::Processing).heartbeat(Some(now));

        let claimed = self.store.find_one_and_update(&filter, &patch).await?;
        if let Some(ref item) = claimed {
            debug!(id = ?item.id, "item claimed");
        }
        Ok(claimed)
    }

    /// Claim and remove in one go, for fire-and-forget consumption where no
    /// separate completion acknowledgement is wanted. Returns what [`peek`]
    /// returned before the removal.
    ///
    /// [`peek`]: Scheduler::peek
    pub async fn poll(&self) -> Result<Option<Item>> {
        let claimed = self.peek().await?;
        if let Some(ref item) = claimed {
            self.delete(item).await?;
        }
        Ok(claimed)
    }

    /// Like [`peek`], but an empty queue is an error ([`Error::ItemNotFound`]).
    ///
    /// [`peek`]: Scheduler::peek
    pub async fn retrieve(&self) -> Result<Item> {
        self.peek().await?.ok_or(Error::ItemNotFound)
    }

    /// Renew the caller's lease. Matches on id + processing status + the
    /// exact heartbeat the caller last saw; the heartbeat value is the
    /// ownership token. On match the heartbeat advances to now and the
    /// updated item is returned. `None` means ownership was lost (the lease
    /// expired and was reclaimed, or a concurrent claim raced in) and
    /// nothing was mutated.
    pub async fn heartbeat(&self, item: &Item) -> Result<Option<Item>> {
        let id = item
            .id
            .ok_or(Error::InvalidItem("id required for heartbeat"))?;
        let token = item
            .heartbeat
            .ok_or(Error::InvalidItem("heartbeat required for heartbeat"))?;

        let filter = Filter::And(vec![
            Filter::Id(id),
            Filter::Status(Status::Processing),
            Filter::HeartbeatEq(token),
        ]);
        let renewed = self
            .store
            .find_one_and_update(&filter, &Patch::new().heartbeat(Some(Utc::now())))
            .await?;
        if renewed.is_none() {
            warn!(id = %id, "heartbeat refused, lease ownership lost");
        }
        Ok(renewed)
    }

    /// Renew the lease and merge custom attributes into the payload in one
    /// atomic step. Not supported by this engine; always
    /// [`Error::Unsupported`], with no partial effect.
    pub async fn heartbeat_and_update_payload(
        &self,
        _item: &Item,
        _attrs: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Option<Item>> {
        Err(Error::Unsupported("heartbeat with payload update"))
    }

    /// Return a claimed item to the pending queue with a new run date,
    /// clearing its heartbeat. Same ownership discipline as [`heartbeat`]:
    /// matches on id + the caller's heartbeat token (a present heartbeat
    /// already implies processing, so status is not re-checked). `None` means
    /// the requeue did not happen and the caller must not assume it did.
    ///
    /// [`heartbeat`]: Scheduler::heartbeat
    pub async fn reschedule(&self, item: &Item) -> Result<Option<Item>> {
        let id = item
            .id
            .ok_or(Error::InvalidItem("id required for reschedule"))?;
        let token = item
            .heartbeat
            .ok_or(Error::InvalidItem("heartbeat required for reschedule"))?;

        let filter = Filter::And(vec![Filter::Id(id), Filter::HeartbeatEq(token)]);
        let patch = Patch::new()
            .status(Status::Pending)
            .heartbeat(None)
            .run_date(item.run_date);

        let requeued = self.store.find_one_and_update(&filter, &patch).await?;
        match requeued {
            Some(ref item) => debug!(id = %id, run_date = %item.run_date, "item rescheduled"),
            None => warn!(id = %id, "reschedule refused, lease ownership lost"),
        }
        Ok(requeued)
    }

    /// Remove the item by id, completing it.
    ///
    /// Removal is unconditional: no heartbeat check is made, so a caller
    /// holding a stale reference can delete a record that has since been
    /// reclaimed by another worker. A stricter discipline would match on the
    /// heartbeat token the way [`heartbeat`]/[`reschedule`] do.
    ///
    /// [`heartbeat`]: Scheduler::heartbeat
    /// [`reschedule`]: Scheduler::reschedule
    pub async fn delete(&self, item: &Item) -> Result<()> {
        let id = item.id.ok_or(Error::InvalidItem("id required for delete"))?;
        let removed = self.store.delete(id).await?;
        debug!(id = %id, removed, "item deleted");
        Ok(())
    }

    /// Count items currently in the given status. Read-only, eventually
    /// consistent with concurrent claims.
    pub async fn count_by_status(&self, status: Status) -> Result<u64> {
        self.store.count(&Filter::Status(status)).await
    }

    /// Current backlog: pending items whose run date is strictly in the past.
    pub async fn count_delayed(&self) -> Result<u64> {
        self.store.count(&eligibility::delayed(Utc::now())).await
    }
}
