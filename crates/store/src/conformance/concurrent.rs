use std::future::Future;
use std::sync::Arc;

use super::{read, tags, Seed, TestResult, ENTITY};
use crate::TagStore;

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "concurrent_renames_on_distinct_entities",
            concurrent_renames_on_distinct_entities(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_merges_same_entity_all_land",
            concurrent_merges_same_entity_all_land(factory).await,
        ),
    ]
}

/// N tasks each move `env` to `environment` on their own entity. Every
/// entity must end up renamed and nothing else may change.
async fn concurrent_renames_on_distinct_entities<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let seed: Seed = (0..N)
        .map(|i| {
            let value = format!("v{i}");
            (
                format!("entity-{i}"),
                tags(&[("env", value.as_str()), ("owner", "ops")]),
            )
        })
        .collect();
    let storage = Arc::new(factory(seed).await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let id = format!("entity-{i}");
            let value = format!("v{i}");
            s.merge_tags(&id, &tags(&[("environment", value.as_str())]))
                .await?;
            s.delete_tags(&id, &tags(&[("env", value.as_str())])).await
        }));
    }
    for handle in handles {
        let removed = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("store error: {e}"))?;
        if removed != 1 {
            return Err(format!("delete removed {removed} pair(s), expected 1"));
        }
    }

    for i in 0..N {
        let value = format!("v{i}");
        let t = read(storage.as_ref(), &format!("entity-{i}")).await?;
        let expected = tags(&[("environment", value.as_str()), ("owner", "ops")]);
        if t != expected {
            return Err(format!("entity-{i}: expected {expected:?}, got {t:?}"));
        }
    }
    Ok(())
}

/// N tasks merge distinct keys into one entity. Merge is additive, so no
/// write may be lost.
async fn concurrent_merges_same_entity_all_land<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TagStore,
    F: Fn(Seed) -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory(vec![(ENTITY.to_string(), tags(&[("base", "1")]))]).await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let key = format!("k{i}");
            s.merge_tags(ENTITY, &tags(&[(key.as_str(), "x")])).await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("store error: {e}"))?;
    }

    let t = read(storage.as_ref(), ENTITY).await?;
    if t.len() != N + 1 {
        return Err(format!("expected {} tags, got {}: {t:?}", N + 1, t.len()));
    }
    if t.get("base") != Some("1") {
        return Err("base tag lost during concurrent merges".to_string());
    }
    Ok(())
}
