use std::any::Any;
use std::collections::HashMap;
use std::collections::hash_map::Entry as Slot;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::BoxStream;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, instrument, warn};
use uuid::Uuid;

use crate::error::CacheError;
use crate::scope::{ComputationScope, ScopeId};
use crate::shared::SharedStream;

type AnyValue = Arc<dyn Any + Send + Sync>;
type Outcome = Result<AnyValue, CacheError>;
type Computation = Shared<BoxFuture<'static, Outcome>>;
type Entries = Mutex<HashMap<String, Entry>>;

struct Entry {
    /// Distinguishes this entry from a later one stored under the same key.
    generation: Uuid,
    /// Caller scopes keeping the entry alive. Only their tokens are held, so
    /// a caller dropping its scope also ends its dependency.
    dependents: HashMap<ScopeId, CancellationToken>,
    /// Scope handed to the producer; cancelled when the last dependent ends.
    scope: ComputationScope,
    computation: Computation,
}

impl Entry {
    /// Drops cancelled dependents and reports whether the entry can still
    /// serve callers.
    fn retain_live(&mut self) -> bool {
        self.dependents.retain(|_, token| !token.is_cancelled());
        let failed = matches!(self.computation.peek(), Some(Err(_)));
        !failed && !self.dependents.is_empty() && !self.scope.is_cancelled()
    }
}

/// Handle on an entry obtained by one caller.
struct Joined {
    computation: Computation,
    generation: Uuid,
    entry_token: CancellationToken,
    is_new_dependent: bool,
}

/// Producer side of a freshly inserted entry.
struct Pending {
    generation: Uuid,
    scope: ComputationScope,
    done: oneshot::Sender<Outcome>,
}

/// Keyed, scope-bound memoization with single-flight semantics.
///
/// Guarantees:
/// - For one key, at most one computation runs while its entry is alive.
///   Every concurrent caller awaits that computation and sees its result.
/// - The entry lives while at least one dependent scope is alive. When the
///   last one is cancelled or dropped the entry is removed and its producer
///   scope is cancelled with it.
/// - Failed computations are never cached, whether or not anyone is still
///   waiting on them.
/// - The producer closure is invoked without the cache lock held, so it may
///   call back into the cache.
#[derive(Clone, Default)]
pub struct ComputationalCache {
    entries: Arc<Entries>,
}

impl ComputationalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value cached under `key`, computing it with `producer`
    /// on a miss.
    ///
    /// `producer` receives the entry's own scope, which outlives any single
    /// caller and ends when the last dependent scope does.
    #[instrument(skip(self, scope, producer), fields(scope_id = %scope.id()), target = "cache")]
    pub async fn use_cache<T, F, Fut>(
        &self,
        key: &str,
        scope: &ComputationScope,
        producer: F,
    ) -> Result<Arc<T>, CacheError>
    where
        T: Send + Sync + 'static,
        F: FnOnce(ComputationScope) -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        if scope.is_cancelled() {
            return Err(CacheError::ScopeCancelled { key: key.to_string() });
        }

        let (joined, pending) = {
            let mut entries = self.entries.lock();
            Self::join_or_insert(&mut entries, key, scope)
        };

        if let Some(pending) = pending {
            let fut = producer(pending.scope.clone());
            self.run_producer(key, pending, fut);
        }

        if joined.is_new_dependent {
            self.watch_dependent(
                key.to_string(),
                joined.generation,
                scope.id(),
                scope.token(),
                joined.entry_token,
            );
        }

        let value = match joined.computation.await {
            Ok(value) => value,
            Err(error) => {
                remove_generation(&self.entries, key, joined.generation, &error);
                return Err(error);
            }
        };
        value
            .downcast::<T>()
            .map_err(|_| CacheError::TypeMismatch { key: key.to_string() })
    }

    /// Shared-stream form of [`use_cache`](Self::use_cache).
    ///
    /// `producer` resolves to a factory that opens the upstream stream. The
    /// factory is invoked whenever the stream goes from zero to one
    /// subscriber, so the upstream restarts on renewed demand.
    pub async fn use_shared_stream<T, F, Fut, S>(
        &self,
        key: &str,
        scope: &ComputationScope,
        producer: F,
    ) -> Result<SharedStream<T>, CacheError>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
        F: FnOnce(ComputationScope) -> Fut,
        Fut: Future<Output = anyhow::Result<S>> + Send + 'static,
        S: Fn() -> BoxStream<'static, T> + Send + Sync + 'static,
    {
        let stream_key = key.to_string();
        let shared = self
            .use_cache(key, scope, move |entry_scope| {
                let upstream = producer(entry_scope.clone());
                async move {
                    let factory = upstream.await?;
                    Ok::<_, anyhow::Error>(SharedStream::new(stream_key, entry_scope, factory))
                }
            })
            .await?;

        Ok(SharedStream::clone(&shared))
    }

    /// Whether a live entry is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .get_mut(key)
            .map(Entry::retain_live)
            .unwrap_or(false)
    }

    /// Number of live dependent scopes of the entry under `key`.
    pub fn dependents(&self, key: &str) -> usize {
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(entry) => {
                if entry.retain_live() {
                    entry.dependents.len()
                } else {
                    0
                }
            }
            None => 0,
        }
    }

    /// Number of stored entries, including ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers `scope` on the live entry under `key`, replacing a stale or
    /// failed one with a fresh entry whose producer the caller must start.
    fn join_or_insert(
        entries: &mut HashMap<String, Entry>,
        key: &str,
        scope: &ComputationScope,
    ) -> (Joined, Option<Pending>) {
        let mut pending = None;

        let entry = match entries.entry(key.to_string()) {
            Slot::Occupied(mut slot) => {
                if !slot.get_mut().retain_live() {
                    let (fresh, producer) = Self::new_entry(key);
                    let stale = slot.insert(fresh);
                    stale.scope.cancel();
                    pending = Some(producer);
                    debug!(key, "discarded stale cache entry; computation started");
                }
                slot.into_mut()
            }
            Slot::Vacant(slot) => {
                let (fresh, producer) = Self::new_entry(key);
                pending = Some(producer);
                debug!(key, "cache miss; computation started");
                slot.insert(fresh)
            }
        };

        let is_new_dependent = entry
            .dependents
            .insert(scope.id(), scope.token())
            .is_none();

        let joined = Joined {
            computation: entry.computation.clone(),
            generation: entry.generation,
            entry_token: entry.scope.token(),
            is_new_dependent,
        };
        (joined, pending)
    }

    /// An entry whose computation completes when its producer task reports.
    fn new_entry(key: &str) -> (Entry, Pending) {
        let (done, outcome) = oneshot::channel::<Outcome>();
        let generation = Uuid::new_v4();
        let scope = ComputationScope::new();

        let join_key = key.to_string();
        let computation = async move {
            match outcome.await {
                Ok(out) => out,
                // The producer closure panicked before its task was spawned.
                Err(_) => Err(CacheError::ComputationPanicked { key: join_key }),
            }
        }
        .boxed()
        .shared();

        let entry = Entry {
            generation,
            dependents: HashMap::new(),
            scope: scope.clone(),
            computation,
        };
        let pending = Pending {
            generation,
            scope,
            done,
        };
        (entry, pending)
    }

    /// Spawns the producer so that it runs to completion regardless of which
    /// caller is still waiting on it. A failed outcome removes its own entry
    /// before it is reported.
    fn run_producer<T, Fut>(&self, key: &str, pending: Pending, fut: Fut)
    where
        T: Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let entries: Weak<Entries> = Arc::downgrade(&self.entries);
        let key = key.to_string();
        let Pending {
            generation,
            scope,
            done,
        } = pending;

        tokio::spawn(
            async move {
                let outcome = tokio::select! {
                    biased;
                    _ = scope.cancelled() => Err(CacheError::ScopeCancelled { key: key.clone() }),
                    out = AssertUnwindSafe(fut).catch_unwind() => match out {
                        Ok(Ok(value)) => Ok(Arc::new(value) as AnyValue),
                        Ok(Err(e)) => Err(CacheError::ComputationFailed {
                            key: key.clone(),
                            reason: Arc::new(e),
                        }),
                        Err(_) => Err(CacheError::ComputationPanicked { key: key.clone() }),
                    },
                };

                if let Err(error) = &outcome {
                    if let Some(entries) = entries.upgrade() {
                        remove_generation(&entries, &key, generation, error);
                    }
                }

                // Nobody left waiting is fine.
                let _ = done.send(outcome);
            }
            .in_current_span(),
        );
    }

    /// Releases the entry once the dependent scope ends, if it was the last
    /// dependent.
    fn watch_dependent(
        &self,
        key: String,
        generation: Uuid,
        scope_id: ScopeId,
        scope_token: CancellationToken,
        entry_token: CancellationToken,
    ) {
        let entries: Weak<Entries> = Arc::downgrade(&self.entries);

        tokio::spawn(async move {
            tokio::select! {
                _ = scope_token.cancelled() => {}
                // Entry already gone (failed or superseded).
                _ = entry_token.cancelled() => return,
            }

            let Some(entries) = entries.upgrade() else {
                return;
            };
            let mut guard = entries.lock();

            let release = match guard.get_mut(&key) {
                Some(entry) if entry.generation == generation => {
                    entry.dependents.remove(&scope_id);
                    !entry.retain_live()
                }
                _ => false,
            };

            if release {
                if let Some(entry) = guard.remove(&key) {
                    entry.scope.cancel();
                }
                debug!(target: "cache", key = %key, "last dependent scope ended; entry released");
            }
        });
    }
}

fn remove_generation(entries: &Entries, key: &str, generation: Uuid, error: &CacheError) {
    let mut entries = entries.lock();
    let matches = entries
        .get(key)
        .map(|e| e.generation == generation)
        .unwrap_or(false);

    if matches {
        if let Some(entry) = entries.remove(key) {
            entry.scope.cancel();
        }
        warn!(target: "cache", key, %error, "computation failed; entry not cached");
    }
}
