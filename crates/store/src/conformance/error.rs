use std::future::Future;

use super::{seed_one, tags, Seed, TestResult};
use crate::{StoreError, TagStore};

const MISSING: &str = "/accounts/acct-1/groups/rg-9/resources/ghost";

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "error",
            "read_unknown_entity_not_found",
            read_unknown_entity_not_found(factory).await,
        ),
        TestResult::from_result(
            "error",
            "merge_unknown_entity_not_found",
            merge_unknown_entity_not_found(factory).await,
        ),
        TestResult::from_result(
            "error",
            "delete_unknown_entity_not_found",
            delete_unknown_entity_not_found(factory).await,
        ),
    ]
}

fn expect_not_found<T: std::fmt::Debug>(result: Result<T, StoreError>) -> Result<(), String> {
    match result {
        Err(StoreError::EntityNotFound { entity_id }) if entity_id == MISSING => Ok(()),
        Err(StoreError::EntityNotFound { entity_id }) => Err(format!(
            "EntityNotFound carried wrong entity_id: {entity_id}"
        )),
        other => Err(format!("expected EntityNotFound, got {other:?}")),
    }
}

async fn read_unknown_entity_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(seed_one(&[("env", "prod")])).await;
    expect_not_found(s.read_tags(MISSING).await)
}

async fn merge_unknown_entity_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(seed_one(&[("env", "prod")])).await;
    expect_not_found(s.merge_tags(MISSING, &tags(&[("environment", "prod")])).await)
}

async fn delete_unknown_entity_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory(seed_one(&[("env", "prod")])).await;
    expect_not_found(s.delete_tags(MISSING, &tags(&[("env", "prod")])).await)
}
