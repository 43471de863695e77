use retag_store::StoreError;

/// Run-level failures. Per-key problems never show up here; they are
/// recorded as outcomes in the run summary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("new tag key must not be empty")]
    EmptyNewKey,

    #[error("selected tag keys must not be empty")]
    EmptySelectedKey,

    /// Renaming a key onto itself would merge and then delete the same pair.
    #[error("new tag key '{key}' is also one of the selected keys")]
    NewKeySelected { key: String },

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// The store failed its availability probe; no entity was touched.
    #[error("tag store unavailable, no entity was processed: {0}")]
    Unavailable(#[source] StoreError),
}
