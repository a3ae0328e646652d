use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use tokio::test;

use cache::{CacheError, ComputationScope, ComputationalCache};

async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

#[test]
async fn concurrent_misses_share_one_computation() -> anyhow::Result<()> {
    let cache = ComputationalCache::new();
    let scope = ComputationScope::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let producer = |calls: Arc<AtomicUsize>| {
        move |_: ComputationScope| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                anyhow::Ok(42u32)
            }
        }
    };

    let (a, b) = tokio::join!(
        cache.use_cache("answer", &scope, producer(calls.clone())),
        cache.use_cache("answer", &scope, producer(calls.clone())),
    );

    let (a, b) = (a?, b?);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*a, 42);
    assert!(Arc::ptr_eq(&a, &b));

    Ok(())
}

#[test]
async fn cancelled_scope_forces_fresh_computation() -> anyhow::Result<()> {
    let cache = ComputationalCache::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let first = ComputationScope::new();
    let c = calls.clone();
    cache
        .use_cache("k", &first, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            async { anyhow::Ok(1u32) }
        })
        .await?;

    first.cancel();

    let second = ComputationScope::new();
    let c = calls.clone();
    let value = cache
        .use_cache("k", &second, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            async { anyhow::Ok(2u32) }
        })
        .await?;

    assert_eq!(*value, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    Ok(())
}

#[test]
async fn failed_computation_is_not_cached() -> anyhow::Result<()> {
    let cache = ComputationalCache::new();
    let scope = ComputationScope::new();

    let err = cache
        .use_cache("flaky", &scope, |_| async {
            Err::<u32, _>(anyhow::anyhow!("node unreachable"))
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CacheError::ComputationFailed { .. }));
    assert!(err.to_string().contains("node unreachable"));
    assert!(!cache.contains("flaky"));

    let value = cache
        .use_cache("flaky", &scope, |_| async { anyhow::Ok(7u32) })
        .await?;
    assert_eq!(*value, 7);
    assert!(cache.contains("flaky"));

    Ok(())
}

#[test]
async fn failure_nobody_awaits_is_not_cached() -> anyhow::Result<()> {
    let cache = ComputationalCache::new();
    let scope = ComputationScope::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let abandoned = tokio::time::timeout(
        Duration::from_millis(5),
        cache.use_cache("flaky", &scope, |_| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Err::<u32, _>(anyhow::anyhow!("node unreachable"))
        }),
    )
    .await;
    assert!(abandoned.is_err());

    assert!(eventually(|| !cache.contains("flaky")).await);

    let c = calls.clone();
    let value = cache
        .use_cache("flaky", &scope, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            async { anyhow::Ok(7u32) }
        })
        .await?;

    assert_eq!(*value, 7);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    Ok(())
}

#[test]
async fn dropped_scopes_stop_being_dependents() -> anyhow::Result<()> {
    let cache = ComputationalCache::new();
    let owner = ComputationScope::new();

    cache
        .use_cache("exchanges", &owner, |_| async { anyhow::Ok(1u32) })
        .await?;

    for _ in 0..100 {
        let per_call = ComputationScope::new();
        cache
            .use_cache("exchanges", &per_call, |_| async { anyhow::Ok(1u32) })
            .await?;
    }

    assert_eq!(cache.dependents("exchanges"), 1);
    assert_eq!(cache.len(), 1);

    Ok(())
}

#[test]
async fn dropping_the_only_scope_releases_the_entry() -> anyhow::Result<()> {
    let cache = ComputationalCache::new();
    let scope = ComputationScope::new();

    let entry_scope = cache
        .use_cache("k", &scope, |entry_scope| async move { anyhow::Ok(entry_scope) })
        .await?;

    drop(scope);

    assert!(eventually(|| cache.is_empty()).await);
    assert!(entry_scope.is_cancelled());

    Ok(())
}

#[test]
async fn producer_may_call_back_into_cache() -> anyhow::Result<()> {
    let cache = ComputationalCache::new();
    let scope = ComputationScope::new();

    let inner = cache.clone();
    let seen_itself = cache
        .use_cache("outer", &scope, move |_| {
            let seen = inner.contains("outer");
            async move { anyhow::Ok(seen) }
        })
        .await?;

    assert!(*seen_itself);

    Ok(())
}

#[test]
async fn entry_lives_until_last_dependent_ends() -> anyhow::Result<()> {
    let cache = ComputationalCache::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let first = ComputationScope::new();
    let second = ComputationScope::new();

    let c = calls.clone();
    let entry_scope = cache
        .use_cache("shared", &first, move |entry_scope| {
            c.fetch_add(1, Ordering::SeqCst);
            async move { anyhow::Ok(entry_scope) }
        })
        .await?;

    let c = calls.clone();
    let again = cache
        .use_cache("shared", &second, move |entry_scope| {
            c.fetch_add(1, Ordering::SeqCst);
            async move { anyhow::Ok(entry_scope) }
        })
        .await?;

    assert!(Arc::ptr_eq(&entry_scope, &again));

    first.cancel();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(cache.contains("shared"));
    assert!(!entry_scope.is_cancelled());

    second.cancel();
    assert!(!cache.contains("shared"));
    assert!(eventually(|| entry_scope.is_cancelled()).await);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    Ok(())
}

#[test]
async fn shared_stream_is_reused_across_callers() -> anyhow::Result<()> {
    let cache = ComputationalCache::new();
    let scope = ComputationScope::new();

    let open = || async {
        anyhow::Ok(|| stream::iter(vec![1u32]).chain(stream::pending()).boxed())
    };

    let a = cache.use_shared_stream("numbers", &scope, |_| open()).await?;
    let b = cache.use_shared_stream("numbers", &scope, |_| open()).await?;

    assert!(a.ptr_eq(&b));

    Ok(())
}

#[test]
async fn shared_stream_restarts_on_renewed_demand() -> anyhow::Result<()> {
    let cache = ComputationalCache::new();
    let scope = ComputationScope::new();
    let opens = Arc::new(AtomicUsize::new(0));

    let counter = opens.clone();
    let shared = cache
        .use_shared_stream("ticks", &scope, move |_| async move {
            anyhow::Ok(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                stream::iter(vec![5u32]).chain(stream::pending()).boxed()
            })
        })
        .await?;

    assert_eq!(opens.load(Ordering::SeqCst), 0);

    let mut sub = shared.subscribe();
    assert_eq!(sub.next().await, Some(5));
    assert!(shared.is_active());
    assert_eq!(opens.load(Ordering::SeqCst), 1);

    drop(sub);
    assert!(!shared.is_active());
    assert_eq!(shared.subscriber_count(), 0);

    let mut sub = shared.subscribe();
    assert_eq!(sub.next().await, Some(5));
    assert_eq!(opens.load(Ordering::SeqCst), 2);

    Ok(())
}

#[test]
async fn cancelling_scope_ends_shared_subscribers() -> anyhow::Result<()> {
    let cache = ComputationalCache::new();
    let scope = ComputationScope::new();

    let shared = cache
        .use_shared_stream("prices", &scope, |_| async {
            anyhow::Ok(|| stream::iter(vec![10u32, 11]).chain(stream::pending()).boxed())
        })
        .await?;

    let mut sub = shared.subscribe();
    assert!(sub.next().await.is_some());

    scope.cancel();

    // Drain whatever was already published, then expect the end of stream.
    let rest = tokio::time::timeout(Duration::from_secs(1), sub.collect::<Vec<_>>()).await?;
    assert!(rest.len() <= 1);
    assert!(shared.is_closed());
    assert!(!cache.contains("prices"));

    Ok(())
}
