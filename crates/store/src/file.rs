//! [`TagStore`] backed by an inventory JSON document on local disk.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::inventory::Inventory;
use crate::record::{TagKey, TagSet, TagValue};
use crate::traits::TagStore;

/// A tag store that keeps an [`Inventory`] in memory and writes it back to
/// its file after every mutation that changed something.
///
/// Writes go to a temporary file in the same directory which is then
/// renamed over the original, so a crash never leaves a half-written
/// document behind. File I/O runs on tokio's blocking pool. Mutations that
/// arrive while a write is in flight are coalesced into the next write. A
/// mutation whose write fails is rolled back in memory before the error is
/// returned.
pub struct JsonFileTagStore {
    path: PathBuf,
    state: Mutex<FileState>,
    /// Generation of the last document that reached disk.
    written: tokio::sync::Mutex<u64>,
}

struct FileState {
    inventory: Inventory,
    /// Bumped by every in-memory change.
    generation: u64,
}

/// Previous values of the keys one mutation touched.
type Undo = Vec<(TagKey, Option<TagValue>)>;

impl JsonFileTagStore {
    /// Open an existing inventory file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            StoreError::Unavailable(format!("could not read '{}': {}", path.display(), e))
        })?;
        let inventory = Inventory::from_json_str(&content)?;
        Ok(Self::with_inventory(path, inventory))
    }

    /// Create (or overwrite) `path` with `inventory` and open it.
    pub fn create(path: impl Into<PathBuf>, inventory: Inventory) -> Result<Self, StoreError> {
        let store = Self::with_inventory(path.into(), inventory);
        let bytes = render(&store.lock().inventory)?;
        write_atomically(store.dir(), &store.path, &bytes)?;
        Ok(store)
    }

    fn with_inventory(path: PathBuf, inventory: Inventory) -> Self {
        Self {
            path,
            state: Mutex::new(FileState {
                inventory,
                generation: 0,
            }),
            written: tokio::sync::Mutex::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A copy of the current document.
    pub fn inventory(&self) -> Inventory {
        self.lock().inventory.clone()
    }

    fn lock(&self) -> MutexGuard<'_, FileState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }

    /// Apply `change` to the entity's tags in memory, then make it durable.
    ///
    /// Only the keys named in `request` are remembered for rollback.
    async fn mutate<R, F>(&self, entity_id: &str, request: &TagSet, change: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut TagSet) -> R,
    {
        let (result, undo, generation) = {
            let mut state = self.lock();
            let entity = state
                .inventory
                .find_mut(entity_id)
                .ok_or_else(|| StoreError::not_found(entity_id))?;
            let undo: Undo = request
                .keys()
                .map(|k| (k.to_string(), entity.tags.get(k).map(str::to_string)))
                .collect();
            let result = change(&mut entity.tags);
            let changed = undo
                .iter()
                .any(|(k, prev)| entity.tags.get(k) != prev.as_deref());
            if !changed {
                return Ok(result);
            }
            state.generation += 1;
            (result, undo, state.generation)
        };

        let mut written = self.written.lock().await;
        if *written >= generation {
            // A later write already carried this change.
            return Ok(result);
        }
        let (snapshot, bytes) = {
            let state = self.lock();
            (state.generation, render(&state.inventory))
        };
        let outcome = match bytes {
            Ok(bytes) => self.write_document(bytes).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(()) => {
                *written = snapshot;
                Ok(result)
            }
            Err(e) => {
                // Still holding `written`, so no other write can pick this change up.
                self.rollback(entity_id, undo);
                tracing::warn!(entity_id, error = %e, "file store write failed, change rolled back");
                Err(e)
            }
        }
    }

    fn rollback(&self, entity_id: &str, undo: Undo) {
        let mut state = self.lock();
        if let Some(entity) = state.inventory.find_mut(entity_id) {
            for (key, prev) in undo {
                match prev {
                    Some(value) => {
                        entity.tags.insert(key, value);
                    }
                    None => {
                        entity.tags.remove(&key);
                    }
                }
            }
        }
        state.generation += 1;
    }

    async fn write_document(&self, bytes: Vec<u8>) -> Result<(), StoreError> {
        let dir = self.dir().to_path_buf();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&dir, &path, &bytes))
            .await
            .map_err(|e| StoreError::Backend(format!("write task failed: {e}")))?
    }
}

fn render(inventory: &Inventory) -> Result<Vec<u8>, StoreError> {
    let mut bytes = serde_json::to_vec_pretty(inventory)
        .map_err(|e| StoreError::Backend(format!("serialization error: {e}")))?;
    bytes.push(b'\n');
    Ok(bytes)
}

fn write_atomically(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let backend =
        |e: std::io::Error| StoreError::Backend(format!("could not write '{}': {}", path.display(), e));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(backend)?;
    tmp.write_all(bytes).map_err(backend)?;
    tmp.persist(path).map_err(|e| backend(e.error))?;
    Ok(())
}

#[async_trait]
impl TagStore for JsonFileTagStore {
    async fn check_available(&self) -> Result<(), StoreError> {
        let unavailable = |what: &str, e: std::io::Error| {
            StoreError::Unavailable(format!("{} '{}': {}", what, self.path.display(), e))
        };
        std::fs::metadata(&self.path).map_err(|e| unavailable("cannot access", e))?;
        let dir_meta =
            std::fs::metadata(self.dir()).map_err(|e| unavailable("cannot access directory of", e))?;
        if dir_meta.permissions().readonly() {
            return Err(StoreError::Unauthorized(format!(
                "directory of '{}' is read-only",
                self.path.display()
            )));
        }
        Ok(())
    }

    async fn read_tags(&self, entity_id: &str) -> Result<TagSet, StoreError> {
        self.lock()
            .inventory
            .find(entity_id)
            .map(|e| e.tags.clone())
            .ok_or_else(|| StoreError::not_found(entity_id))
    }

    async fn merge_tags(&self, entity_id: &str, tags: &TagSet) -> Result<(), StoreError> {
        tracing::trace!(entity_id, keys = tags.len(), "file store merge");
        self.mutate(entity_id, tags, |current| current.merge_from(tags))
            .await
    }

    async fn delete_tags(&self, entity_id: &str, tags: &TagSet) -> Result<usize, StoreError> {
        tracing::trace!(entity_id, keys = tags.len(), "file store delete");
        self.mutate(entity_id, tags, |current| current.delete_matching(tags))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{Account, InventoryEntity};
    use crate::record::EntityKind;

    fn inventory() -> Inventory {
        Inventory {
            accounts: vec![Account {
                id: "sub-1".into(),
                name: "Production".into(),
                entities: vec![InventoryEntity {
                    id: "/sub-1/rg1".into(),
                    name: "rg1".into(),
                    kind: EntityKind::ResourceGroup,
                    tags: [("env", "prod"), ("owner", "alice")].into_iter().collect(),
                }],
            }],
        }
    }

    #[tokio::test]
    async fn mutations_are_written_back_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.json");
        let store = JsonFileTagStore::create(&path, inventory()).unwrap();

        store
            .merge_tags("/sub-1/rg1", &TagSet::single("environment", "prod"))
            .await
            .unwrap();
        let removed = store
            .delete_tags("/sub-1/rg1", &TagSet::single("env", "prod"))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let reopened = JsonFileTagStore::open(&path).unwrap();
        let tags = reopened.read_tags("/sub-1/rg1").await.unwrap();
        assert_eq!(tags.get("environment"), Some("prod"));
        assert_eq!(tags.get("owner"), Some("alice"));
        assert_eq!(tags.get("env"), None);
    }

    #[tokio::test]
    async fn open_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let result = JsonFileTagStore::open(dir.path().join("nope.json"));
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn check_available_fails_after_file_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.json");
        let store = JsonFileTagStore::create(&path, inventory()).unwrap();
        assert!(store.check_available().await.is_ok());
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(
            store.check_available().await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn failed_write_rolls_back_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("inv");
        std::fs::create_dir(&sub).unwrap();
        let store = JsonFileTagStore::create(sub.join("inventory.json"), inventory()).unwrap();
        std::fs::remove_dir_all(&sub).unwrap();

        let result = store
            .merge_tags("/sub-1/rg1", &TagSet::single("env", "dev"))
            .await;

        assert!(matches!(result, Err(StoreError::Backend(_))));
        let tags = store.read_tags("/sub-1/rg1").await.unwrap();
        assert_eq!(tags.get("env"), Some("prod"));
    }

    #[tokio::test]
    async fn unchanged_delete_reports_zero_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.json");
        let store = JsonFileTagStore::create(&path, inventory()).unwrap();

        let removed = store
            .delete_tags("/sub-1/rg1", &TagSet::single("env", "staging"))
            .await
            .unwrap();

        assert_eq!(removed, 0);
        assert_eq!(
            store.read_tags("/sub-1/rg1").await.unwrap().get("env"),
            Some("prod")
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_mutations_all_reach_disk() {
        const N: usize = 20;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.json");
        let entities = (0..N)
            .map(|i| InventoryEntity {
                id: format!("/sub-1/r{i}"),
                name: format!("r{i}"),
                kind: EntityKind::Resource,
                tags: TagSet::single("env", format!("v{i}")),
            })
            .collect();
        let inv = Inventory {
            accounts: vec![Account {
                id: "sub-1".into(),
                name: String::new(),
                entities,
            }],
        };
        let store = std::sync::Arc::new(JsonFileTagStore::create(&path, inv).unwrap());

        let mut handles = Vec::new();
        for i in 0..N {
            let s = store.clone();
            handles.push(tokio::spawn(async move {
                let id = format!("/sub-1/r{i}");
                let value = format!("v{i}");
                s.merge_tags(&id, &TagSet::single("environment", value.as_str()))
                    .await?;
                s.delete_tags(&id, &TagSet::single("env", value.as_str()))
                    .await
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap(), Ok(1));
        }

        let reopened = JsonFileTagStore::open(&path).unwrap();
        for i in 0..N {
            let tags = reopened.read_tags(&format!("/sub-1/r{i}")).await.unwrap();
            assert_eq!(tags, TagSet::single("environment", format!("v{i}")));
        }
    }
}
