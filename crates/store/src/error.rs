/// All errors that can be returned by a TagStore implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No entity with the given id exists in the store.
    #[error("entity not found: {entity_id}")]
    EntityNotFound { entity_id: String },

    /// The provider refused the tag change (invalid key, policy, quota, ...).
    #[error("tag change rejected for {entity_id}: {message}")]
    Rejected { entity_id: String, message: String },

    /// Credentials are missing, expired, or lack permission.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The store cannot be reached at all.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A backend-specific error (I/O, serialization, etc.).
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub(crate) fn not_found(entity_id: &str) -> Self {
        StoreError::EntityNotFound {
            entity_id: entity_id.to_string(),
        }
    }
}
