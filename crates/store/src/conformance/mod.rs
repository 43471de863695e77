//! Conformance test suite for `TagStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any `TagStore`
//! implementation can run to verify it honours the contract the rename
//! engine relies on. The suite covers:
//!
//! - **Read**: seeded tags come back unchanged, empty values included
//! - **Merge**: additive writes that never drop unrelated tags
//! - **Delete**: pair-matching removal that never touches other values
//! - **Error handling**: correct error variants for unknown entities
//! - **Concurrency**: independent writes from parallel tasks all land
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory that builds
//! a fresh store seeded with the given `(entity_id, tags)` pairs:
//!
//! ```ignore
//! use retag_store::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn memory_conformance() {
//!     let report = run_conformance_suite(|seed| async move {
//!         MemoryTagStore::with_entities(seed)
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod concurrent;
mod delete;
mod error;
mod merge;
mod read;

use std::fmt;
use std::future::Future;

use crate::record::TagSet;
use crate::TagStore;

/// Seed data handed to the factory: `(entity_id, tags)` pairs.
pub type Seed = Vec<(String, TagSet)>;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "merge", "delete").
    pub category: String,
    /// Test name (e.g. "merge_keeps_unrelated_tags").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a tag store backend.
///
/// The `factory` is called once per test to create a fresh store holding
/// exactly the seeded entities, so tests never see each other's writes.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(read::run_read_tests(&factory).await);
    results.extend(merge::run_merge_tests(&factory).await);
    results.extend(delete::run_delete_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

const ENTITY: &str = "/accounts/acct-1/groups/rg-1/resources/vm-1";
const OTHER: &str = "/accounts/acct-1/groups/rg-1/resources/vm-2";

fn tags(pairs: &[(&str, &str)]) -> TagSet {
    pairs.iter().map(|(k, v)| (*k, *v)).collect()
}

fn seed_one(pairs: &[(&str, &str)]) -> Seed {
    vec![(ENTITY.to_string(), tags(pairs))]
}

async fn read<S: TagStore>(s: &S, entity_id: &str) -> Result<TagSet, String> {
    s.read_tags(entity_id)
        .await
        .map_err(|e| format!("read_tags: {e}"))
}

fn expect_tags(actual: &TagSet, expected: &[(&str, &str)]) -> Result<(), String> {
    let expected = tags(expected);
    if *actual != expected {
        return Err(format!("expected tags {expected:?}, got {actual:?}"));
    }
    Ok(())
}
