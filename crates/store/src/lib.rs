//! Tag storage abstraction for retag.
//!
//! The rename engine never talks to a cloud tagging API directly. It goes
//! through [`TagStore`], which exposes exactly the four calls the engine
//! needs: an availability probe, a read, an additive merge and a
//! pair-matching delete.
//!
//! Two backends ship with the crate:
//!
//! - [`MemoryTagStore`] -- in-process map with a call log and fault
//!   injection, used by tests and as the reference implementation
//! - [`JsonFileTagStore`] -- persists an [`Inventory`] document on disk,
//!   rewriting it atomically after each successful mutation
//!
//! Any other backend can be checked against the same contract with
//! [`conformance::run_conformance_suite`].

pub mod conformance;
mod error;
mod file;
mod inventory;
mod memory;
mod record;
mod traits;

pub use error::StoreError;
pub use file::JsonFileTagStore;
pub use inventory::{Account, Inventory, InventoryEntity};
pub use memory::{MemoryTagStore, StoreCall};
pub use record::{EntityKind, TagKey, TagSet, TagValue, TargetEntity};
pub use traits::TagStore;
