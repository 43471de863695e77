use std::future::Future;

use super::{expect_tags, read, seed_one, tags, Seed, TestResult, ENTITY, OTHER};
use crate::TagStore;

pub(super) async fn run_merge_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "merge",
            "merge_adds_new_key",
            merge_adds_new_key(factory).await,
        ),
        TestResult::from_result(
            "merge",
            "merge_keeps_unrelated_tags",
            merge_keeps_unrelated_tags(factory).await,
        ),
        TestResult::from_result(
            "merge",
            "merge_overwrites_existing_key",
            merge_overwrites_existing_key(factory).await,
        ),
        TestResult::from_result(
            "merge",
            "merge_same_value_is_noop",
            merge_same_value_is_noop(factory).await,
        ),
        TestResult::from_result(
            "merge",
            "merge_empty_value_is_present",
            merge_empty_value_is_present(factory).await,
        ),
        TestResult::from_result(
            "merge",
            "merge_does_not_touch_other_entities",
            merge_does_not_touch_other_entities(factory).await,
        ),
    ]
}

async fn merge_adds_new_key<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(seed_one(&[("env", "prod")])).await;
    s.merge_tags(ENTITY, &tags(&[("environment", "prod")]))
        .await
        .map_err(|e| format!("merge: {e}"))?;
    expect_tags(
        &read(&s, ENTITY).await?,
        &[("env", "prod"), ("environment", "prod")],
    )
}

async fn merge_keeps_unrelated_tags<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(seed_one(&[("a", "1"), ("b", "2"), ("c", "3")])).await;
    s.merge_tags(ENTITY, &tags(&[("d", "4")]))
        .await
        .map_err(|e| format!("merge: {e}"))?;
    expect_tags(
        &read(&s, ENTITY).await?,
        &[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")],
    )
}

async fn merge_overwrites_existing_key<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(seed_one(&[("environment", "dev"), ("owner", "bob")])).await;
    s.merge_tags(ENTITY, &tags(&[("environment", "prod")]))
        .await
        .map_err(|e| format!("merge: {e}"))?;
    expect_tags(
        &read(&s, ENTITY).await?,
        &[("environment", "prod"), ("owner", "bob")],
    )
}

/// Re-merging a pair that is already present changes nothing.
async fn merge_same_value_is_noop<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(seed_one(&[("env", "prod"), ("environment", "prod")])).await;
    s.merge_tags(ENTITY, &tags(&[("environment", "prod")]))
        .await
        .map_err(|e| format!("merge: {e}"))?;
    expect_tags(
        &read(&s, ENTITY).await?,
        &[("env", "prod"), ("environment", "prod")],
    )
}

async fn merge_empty_value_is_present<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(seed_one(&[])).await;
    s.merge_tags(ENTITY, &tags(&[("environment", "")]))
        .await
        .map_err(|e| format!("merge: {e}"))?;
    expect_tags(&read(&s, ENTITY).await?, &[("environment", "")])
}

async fn merge_does_not_touch_other_entities<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let mut seed = seed_one(&[("env", "prod")]);
    seed.push((OTHER.to_string(), tags(&[("env", "dev")])));
    let s = factory(seed).await;
    s.merge_tags(ENTITY, &tags(&[("environment", "prod")]))
        .await
        .map_err(|e| format!("merge: {e}"))?;
    expect_tags(&read(&s, OTHER).await?, &[("env", "dev")])
}
