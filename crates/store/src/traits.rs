use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::TagSet;

/// The storage trait for tag backends.
///
/// A `TagStore` holds the current tag mapping of every entity it knows
/// about, addressed by the entity's stable identifier (a resource URI in a
/// cloud deployment).
///
/// ## Mutation Semantics
///
/// - `merge_tags` is additive: each given key is inserted or overwritten,
///   every other key on the entity is left untouched.
/// - `delete_tags` removes a given key only when its current value equals
///   the given value. Keys that are absent, or that hold a different value,
///   are left alone and do not cause an error; the returned count tells the
///   caller how many pairs were actually removed.
///
/// Each call is atomic for its entity: either the whole tag change applies
/// or none of it does. Callers never retry part of a call.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so a single store can be
/// shared across concurrently processed entities.
#[async_trait]
pub trait TagStore: Send + Sync + 'static {
    /// Probe connectivity and credentials.
    ///
    /// Called once before a run touches any entity. An error here means no
    /// progress is possible.
    async fn check_available(&self) -> Result<(), StoreError>;

    /// Read an entity's current tags.
    ///
    /// Returns `Err(StoreError::EntityNotFound)` if the entity does not exist.
    async fn read_tags(&self, entity_id: &str) -> Result<TagSet, StoreError>;

    /// Insert or overwrite `tags` on the entity, keeping all other tags.
    ///
    /// Returns `Err(StoreError::EntityNotFound)` if the entity does not exist.
    async fn merge_tags(&self, entity_id: &str, tags: &TagSet) -> Result<(), StoreError>;

    /// Remove every `key = value` pair of `tags` currently present on the
    /// entity and return how many pairs were removed.
    ///
    /// Returns `Err(StoreError::EntityNotFound)` if the entity does not exist.
    async fn delete_tags(&self, entity_id: &str, tags: &TagSet) -> Result<usize, StoreError>;
}
