//! In-memory store implementation.
//!
//! Backs tests and examples. All records live in one map behind an async
//! mutex; `find_one_and_update` scans and mutates while holding the lock,
//! which is what makes the find-and-modify step indivisible.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Filter, ItemStore, Patch};
use crate::error::Result;
use crate::model::{Item, ItemId};

/// In-memory item store.
#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<BTreeMap<ItemId, Item>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn insert(&self, item: &Item) -> Result<Item> {
        let id = ItemId(Uuid::new_v4());
        let mut stored = item.clone();
        stored.id = Some(id);

        let mut items = self.items.lock().await;
        items.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_one_and_update(&self, filter: &Filter, patch: &Patch) -> Result<Option<Item>> {
        let mut items = self.items.lock().await;

        // Selection order among multiple matches is the map's key order;
        // the contract leaves it arbitrary.
        let Some(id) = items
            .values()
            .find(|item| filter.matches(item))
            .and_then(|item| item.id)
        else {
            return Ok(None);
        };

        let item = items.get_mut(&id).expect("matched id is present");
        patch.apply(item);
        Ok(Some(item.clone()))
    }

    async fn delete(&self, id: ItemId) -> Result<bool> {
        let mut items = self.items.lock().await;
        Ok(items.remove(&id).is_some())
    }

    async fn count(&self, filter: &Filter) -> Result<u64> {
        let items = self.items.lock().await;
        Ok(items.values().filter(|item| filter.matches(item)).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status;
    use chrono::Utc;

    #[tokio::test]
    async fn insert_assigns_distinct_ids() {
        let store = MemoryStore::new();
        let a = store.insert(&Item::new(Utc::now())).await.unwrap();
        let b = store.insert(&Item::new(Utc::now())).await.unwrap();
        assert!(a.id.is_some());
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn update_returns_post_image() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let stored = store.insert(&Item::new(now)).await.unwrap();

        let updated = store
            .find_one_and_update(
                &Filter::Id(stored.id.unwrap()),
                &Patch::new().status(Status::Processing).heartbeat(Some(now)),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, Status::Processing);
        assert_eq!(updated.heartbeat, Some(now));

        // No match -> no mutation, None.
        let miss = store
            .find_one_and_update(&Filter::Status(Status::Pending), &Patch::new().heartbeat(None))
            .await
            .unwrap();
        assert!(miss.is_none());
        assert_eq!(store.count(&Filter::Status(Status::Processing)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let store = MemoryStore::new();
        let stored = store.insert(&Item::new(Utc::now())).await.unwrap();
        let id = stored.id.unwrap();
        assert!(store.delete(id).await.unwrap());
        assert!(!store.delete(id).await.unwrap());
    }
}
