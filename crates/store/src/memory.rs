//! In-memory [`TagStore`] with a call log and fault injection.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::TagSet;
use crate::traits::TagStore;

/// A store call as observed by [`MemoryTagStore`], in the order it arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Read { entity_id: String },
    Merge { entity_id: String, tags: TagSet },
    Delete { entity_id: String, tags: TagSet },
}

impl StoreCall {
    pub fn entity_id(&self) -> &str {
        match self {
            StoreCall::Read { entity_id }
            | StoreCall::Merge { entity_id, .. }
            | StoreCall::Delete { entity_id, .. } => entity_id,
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(self, StoreCall::Read { .. })
    }
}

#[derive(Debug, Clone)]
struct Fault {
    entity_id: String,
    /// `None` fails every call on the entity.
    key: Option<String>,
    error: StoreError,
}

impl Fault {
    fn matches(&self, entity_id: &str, tags: &TagSet) -> bool {
        self.entity_id == entity_id
            && self.key.as_deref().map_or(true, |k| tags.contains_key(k))
    }
}

#[derive(Default)]
struct MemoryInner {
    entities: BTreeMap<String, TagSet>,
    calls: Vec<StoreCall>,
    merge_faults: Vec<Fault>,
    delete_faults: Vec<Fault>,
    unavailable: Option<StoreError>,
}

/// A [`TagStore`] that keeps everything in a shared map.
///
/// Cloning is cheap and every clone sees the same state, so a test can hand
/// one clone to the engine and inspect another afterwards.
#[derive(Clone, Default)]
pub struct MemoryTagStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryTagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store seeded with `(entity_id, tags)` pairs.
    pub fn with_entities<I, S>(entities: I) -> Self
    where
        I: IntoIterator<Item = (S, TagSet)>,
        S: Into<String>,
    {
        let store = Self::new();
        {
            let mut inner = store.lock();
            for (id, tags) in entities {
                inner.entities.insert(id.into(), tags);
            }
        }
        store
    }

    pub fn insert_entity(&self, entity_id: impl Into<String>, tags: TagSet) {
        self.lock().entities.insert(entity_id.into(), tags);
    }

    /// Current tags of an entity, bypassing the call log.
    pub fn tags(&self, entity_id: &str) -> Option<TagSet> {
        self.lock().entities.get(entity_id).cloned()
    }

    /// Every call received so far, reads included.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    /// Merge and delete calls only.
    pub fn mutation_calls(&self) -> Vec<StoreCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.is_mutation())
            .cloned()
            .collect()
    }

    /// Mutation calls that targeted one entity.
    pub fn mutation_calls_for(&self, entity_id: &str) -> Vec<StoreCall> {
        self.mutation_calls()
            .into_iter()
            .filter(|c| c.entity_id() == entity_id)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Fail merges on `entity_id`. With `key`, only merges that write that key fail.
    pub fn fail_merge(&self, entity_id: &str, key: Option<&str>, error: StoreError) {
        self.lock().merge_faults.push(Fault {
            entity_id: entity_id.to_string(),
            key: key.map(str::to_string),
            error,
        });
    }

    /// Fail deletes on `entity_id`. With `key`, only deletes that remove that key fail.
    pub fn fail_delete(&self, entity_id: &str, key: Option<&str>, error: StoreError) {
        self.lock().delete_faults.push(Fault {
            entity_id: entity_id.to_string(),
            key: key.map(str::to_string),
            error,
        });
    }

    /// Make `check_available` and every other call fail with `error`.
    pub fn set_unavailable(&self, error: StoreError) {
        self.lock().unavailable = Some(error);
    }

    pub fn clear_faults(&self) {
        let mut inner = self.lock();
        inner.merge_faults.clear();
        inner.delete_faults.clear();
        inner.unavailable = None;
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        // A poisoned lock only means a test panicked mid-call; the map is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TagStore for MemoryTagStore {
    async fn check_available(&self) -> Result<(), StoreError> {
        match &self.lock().unavailable {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn read_tags(&self, entity_id: &str) -> Result<TagSet, StoreError> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::Read {
            entity_id: entity_id.to_string(),
        });
        if let Some(err) = &inner.unavailable {
            return Err(err.clone());
        }
        inner
            .entities
            .get(entity_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(entity_id))
    }

    async fn merge_tags(&self, entity_id: &str, tags: &TagSet) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::Merge {
            entity_id: entity_id.to_string(),
            tags: tags.clone(),
        });
        if let Some(err) = &inner.unavailable {
            return Err(err.clone());
        }
        if let Some(fault) = inner.merge_faults.iter().find(|f| f.matches(entity_id, tags)) {
            return Err(fault.error.clone());
        }
        let current = inner
            .entities
            .get_mut(entity_id)
            .ok_or_else(|| StoreError::not_found(entity_id))?;
        current.merge_from(tags);
        Ok(())
    }

    async fn delete_tags(&self, entity_id: &str, tags: &TagSet) -> Result<usize, StoreError> {
        let mut inner = self.lock();
        inner.calls.push(StoreCall::Delete {
            entity_id: entity_id.to_string(),
            tags: tags.clone(),
        });
        if let Some(err) = &inner.unavailable {
            return Err(err.clone());
        }
        if let Some(fault) = inner
            .delete_faults
            .iter()
            .find(|f| f.matches(entity_id, tags))
        {
            return Err(fault.error.clone());
        }
        let current = inner
            .entities
            .get_mut(entity_id)
            .ok_or_else(|| StoreError::not_found(entity_id))?;
        Ok(current.delete_matching(tags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn call_log_records_order() {
        let store = MemoryTagStore::with_entities([("r1", TagSet::single("env", "prod"))]);
        store
            .merge_tags("r1", &TagSet::single("environment", "prod"))
            .await
            .unwrap();
        let removed = store
            .delete_tags("r1", &TagSet::single("env", "prod"))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        let calls = store.mutation_calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], StoreCall::Merge { .. }));
        assert!(matches!(calls[1], StoreCall::Delete { .. }));
        assert_eq!(store.tags("r1"), Some(TagSet::single("environment", "prod")));
    }

    #[tokio::test]
    async fn keyed_fault_only_hits_matching_calls() {
        let store = MemoryTagStore::with_entities([("r1", TagSet::new())]);
        let err = StoreError::Backend("boom".into());
        store.fail_merge("r1", Some("team"), err.clone());

        let hit = store.merge_tags("r1", &TagSet::single("team", "a")).await;
        assert_eq!(hit, Err(err));
        let miss = store.merge_tags("r1", &TagSet::single("other", "b")).await;
        assert!(miss.is_ok());
        assert_eq!(store.tags("r1"), Some(TagSet::single("other", "b")));
    }

    #[tokio::test]
    async fn unavailable_fails_probe_until_cleared() {
        let store = MemoryTagStore::new();
        store.set_unavailable(StoreError::Unavailable("offline".into()));
        assert!(store.check_available().await.is_err());
        store.clear_faults();
        assert!(store.check_available().await.is_ok());
    }
}
