use std::future::Future;

use super::{expect_tags, read, seed_one, tags, Seed, TestResult, ENTITY};
use crate::TagStore;

pub(super) async fn run_delete_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "delete",
            "delete_removes_matching_pair",
            delete_removes_matching_pair(factory).await,
        ),
        TestResult::from_result(
            "delete",
            "delete_keeps_unrelated_tags",
            delete_keeps_unrelated_tags(factory).await,
        ),
        TestResult::from_result(
            "delete",
            "delete_ignores_value_mismatch",
            delete_ignores_value_mismatch(factory).await,
        ),
        TestResult::from_result(
            "delete",
            "delete_absent_key_is_noop",
            delete_absent_key_is_noop(factory).await,
        ),
        TestResult::from_result(
            "delete",
            "delete_empty_value_pair",
            delete_empty_value_pair(factory).await,
        ),
        TestResult::from_result(
            "delete",
            "merge_then_delete_moves_value",
            merge_then_delete_moves_value(factory).await,
        ),
    ]
}

async fn delete_removes_matching_pair<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(seed_one(&[("env", "prod")])).await;
    let removed = s
        .delete_tags(ENTITY, &tags(&[("env", "prod")]))
        .await
        .map_err(|e| format!("delete: {e}"))?;
    expect_removed(removed, 1)?;
    expect_tags(&read(&s, ENTITY).await?, &[])
}

async fn delete_keeps_unrelated_tags<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(seed_one(&[("env", "prod"), ("owner", "alice")])).await;
    s.delete_tags(ENTITY, &tags(&[("env", "prod")]))
        .await
        .map_err(|e| format!("delete: {e}"))?;
    expect_tags(&read(&s, ENTITY).await?, &[("owner", "alice")])
}

/// A pair whose value no longer matches must be left in place.
async fn delete_ignores_value_mismatch<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(seed_one(&[("env", "staging")])).await;
    let removed = s
        .delete_tags(ENTITY, &tags(&[("env", "prod")]))
        .await
        .map_err(|e| format!("delete: {e}"))?;
    expect_removed(removed, 0)?;
    expect_tags(&read(&s, ENTITY).await?, &[("env", "staging")])
}

async fn delete_absent_key_is_noop<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(seed_one(&[("owner", "bob")])).await;
    let removed = s
        .delete_tags(ENTITY, &tags(&[("env", "prod")]))
        .await
        .map_err(|e| format!("delete of absent key should succeed: {e}"))?;
    expect_removed(removed, 0)?;
    expect_tags(&read(&s, ENTITY).await?, &[("owner", "bob")])
}

async fn delete_empty_value_pair<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(seed_one(&[("env", ""), ("owner", "bob")])).await;
    let removed = s
        .delete_tags(ENTITY, &tags(&[("env", "")]))
        .await
        .map_err(|e| format!("delete: {e}"))?;
    expect_removed(removed, 1)?;
    expect_tags(&read(&s, ENTITY).await?, &[("owner", "bob")])
}

/// The exact call pair the rename engine issues.
async fn merge_then_delete_moves_value<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(seed_one(&[("env", "prod"), ("owner", "alice")])).await;
    s.merge_tags(ENTITY, &tags(&[("environment", "prod")]))
        .await
        .map_err(|e| format!("merge: {e}"))?;
    s.delete_tags(ENTITY, &tags(&[("env", "prod")]))
        .await
        .map_err(|e| format!("delete: {e}"))?;
    expect_tags(
        &read(&s, ENTITY).await?,
        &[("environment", "prod"), ("owner", "alice")],
    )
}

fn expect_removed(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} pair(s) removed, store reported {actual}"))
    }
}
