use std::future::Future;

use super::{expect_tags, read, seed_one, Seed, TestResult, ENTITY, OTHER};
use crate::TagStore;

pub(super) async fn run_read_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "read",
            "read_returns_seeded_tags",
            read_returns_seeded_tags(factory).await,
        ),
        TestResult::from_result(
            "read",
            "read_preserves_empty_value",
            read_preserves_empty_value(factory).await,
        ),
        TestResult::from_result(
            "read",
            "read_untagged_entity_is_empty",
            read_untagged_entity_is_empty(factory).await,
        ),
        TestResult::from_result(
            "read",
            "check_available_on_healthy_store",
            check_available_on_healthy_store(factory).await,
        ),
    ]
}

async fn read_returns_seeded_tags<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(seed_one(&[("env", "prod"), ("owner", "alice")])).await;
    expect_tags(&read(&s, ENTITY).await?, &[("env", "prod"), ("owner", "alice")])
}

/// An empty value is a value: the key must survive the round trip.
async fn read_preserves_empty_value<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(seed_one(&[("env", "")])).await;
    let t = read(&s, ENTITY).await?;
    match t.get("env") {
        Some("") => Ok(()),
        other => Err(format!("expected env present with empty value, got {other:?}")),
    }
}

async fn read_untagged_entity_is_empty<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let mut seed = seed_one(&[("env", "prod")]);
    seed.push((OTHER.to_string(), Default::default()));
    let s = factory(seed).await;
    expect_tags(&read(&s, OTHER).await?, &[])
}

async fn check_available_on_healthy_store<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(seed_one(&[])).await;
    s.check_available()
        .await
        .map_err(|e| format!("check_available: {e}"))
}
