//! Core data model.
//!
//! An item is a unit of work waiting to be claimed. It has identity (assigned
//! by the store), a run date (earliest eligible processing time), a heartbeat
//! (lease renewal timestamp, doubling as an ownership token), lifecycle
//! status, and an opaque payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// A unit of work tracked by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier. None until the store assigns one on insert;
    /// never reassigned afterwards.
    pub id: Option<ItemId>,

    /// Earliest time at which a pending item may be claimed.
    pub run_date: DateTime<Utc>,

    /// Last lease renewal time. Non-null exactly while the item is claimed
    /// (or was claimed and not yet reclaimed/completed). The stored value is
    /// matched verbatim on renewal, so it doubles as the optimistic
    /// concurrency token proving the caller still owns the lease.
    pub heartbeat: Option<DateTime<Utc>>,

    /// Current lifecycle status.
    pub status: Status,

    /// Arbitrary attributes for the worker. The engine doesn't interpret these.
    pub payload: serde_json::Value,
}

impl Item {
    /// A fresh unscheduled item: no id, no heartbeat, pending.
    pub fn new(run_date: DateTime<Utc>) -> Self {
        Self {
            id: None,
            run_date,
            heartbeat: None,
            status: Status::Pending,
            payload: serde_json::Value::Null,
        }
    }

    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Newtype for item IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub Uuid);

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ItemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of an item.
///
/// There is no explicit "done" status: completion is removal from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Waiting to be claimed once its run date has passed.
    Pending,
    /// Under exclusive claim by a worker (or abandoned and awaiting reclaim).
    Processing,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Processing => "processing",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Status::Pending),
            "processing" => Ok(Status::Processing),
            other => Err(Error::InvalidStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn status_round_trips_through_str() {
        for status in [Status::Pending, Status::Processing] {
            assert_eq!(status.to_string().parse::<Status>().unwrap(), status);
        }
        assert!("done".parse::<Status>().is_err());
    }

    #[test]
    fn new_item_is_unscheduled() {
        let item = Item::new(Utc::now());
        assert!(item.id.is_none());
        assert!(item.heartbeat.is_none());
        assert_eq!(item.status, Status::Pending);
    }
}
