use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream, Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug};

use crate::scope::ComputationScope;

type Upstream<T> = Box<dyn Fn() -> BoxStream<'static, T> + Send + Sync>;

/// A hot stream shared by every subscriber of one cache key.
///
/// - The upstream is opened when the first subscriber arrives and dropped
///   when the last one leaves; the next subscriber opens it again.
/// - Late subscribers immediately receive the latest value.
/// - Consecutive equal values are published once.
/// - When the owning scope ends, all subscriber streams terminate and no
///   further values are produced.
pub struct SharedStream<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for SharedStream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T> {
    key: String,
    scope: ComputationScope,
    upstream: Upstream<T>,
    state: Mutex<State<T>>,
}

struct State<T> {
    /// `None` once the owning scope has ended.
    latest: Option<watch::Sender<Option<T>>>,
    subscribers: usize,
    pump: Option<JoinHandle<()>>,
}

impl<T> SharedStream<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Must be called from within a tokio runtime.
    pub fn new<S>(key: impl Into<String>, scope: ComputationScope, upstream: S) -> Self
    where
        S: Fn() -> BoxStream<'static, T> + Send + Sync + 'static,
    {
        let (latest, _) = watch::channel(None);

        let inner = Arc::new(Inner {
            key: key.into(),
            scope: scope.clone(),
            upstream: Box::new(upstream),
            state: Mutex::new(State {
                latest: Some(latest),
                subscribers: 0,
                pump: None,
            }),
        });

        let weak = Arc::downgrade(&inner);
        tokio::spawn(async move {
            scope.cancelled().await;
            if let Some(inner) = weak.upgrade() {
                inner.close();
            }
        });

        Self { inner }
    }

    /// Attaches a new consumer. The returned stream yields the latest value
    /// first (if any), then every change.
    pub fn subscribe(&self) -> Subscription<T> {
        let mut state = self.inner.state.lock();

        let Some(latest) = state.latest.as_ref() else {
            return Subscription {
                stream: stream::empty().boxed(),
                _guard: None,
            };
        };

        let rx = latest.subscribe();
        state.subscribers += 1;

        if state.pump.is_none() {
            state.pump = Some(Inner::start_pump(&self.inner));
            debug!(target: "cache", key = %self.inner.key, "shared upstream started");
        }

        Subscription {
            stream: watch_stream(rx),
            _guard: Some(SubscriberGuard {
                inner: Arc::clone(&self.inner),
            }),
        }
    }

    /// Latest published value, without subscribing.
    pub fn latest(&self) -> Option<T> {
        let state = self.inner.state.lock();
        state
            .latest
            .as_ref()
            .and_then(|tx| tx.borrow().clone())
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().subscribers
    }

    /// Whether the upstream is currently being consumed.
    pub fn is_active(&self) -> bool {
        self.inner.state.lock().pump.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().latest.is_none()
    }

    /// Whether both handles point at the same underlying stream.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Inner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn start_pump(this: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(this);
        let mut upstream = (this.upstream)();
        let scope = this.scope.clone();
        let key = this.key.clone();

        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    biased;
                    _ = scope.cancelled() => None,
                    item = upstream.next() => item,
                };

                let Some(value) = next else {
                    break;
                };
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.publish(value);
            }

            debug!(target: "cache", key = %key, "shared upstream finished");
        }
        .in_current_span())
    }

    fn publish(&self, value: T) {
        let state = self.state.lock();
        if let Some(latest) = state.latest.as_ref() {
            latest.send_if_modified(|current| {
                if current.as_ref() == Some(&value) {
                    false
                } else {
                    *current = Some(value);
                    true
                }
            });
        }
    }

    fn close(&self) {
        let mut state = self.state.lock();
        // Dropping the sender ends every subscriber stream.
        state.latest = None;
        if let Some(pump) = state.pump.take() {
            pump.abort();
        }
        debug!(target: "cache", key = %self.key, "shared stream closed with its scope");
    }
}

impl<T> Inner<T> {
    fn release_subscriber(&self) {
        let mut state = self.state.lock();
        state.subscribers = state.subscribers.saturating_sub(1);

        if state.subscribers == 0 {
            if let Some(pump) = state.pump.take() {
                pump.abort();
                debug!(target: "cache", key = %self.key, "last subscriber left; shared upstream stopped");
            }
        }
    }
}

impl<T> fmt::Debug for SharedStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("SharedStream")
            .field("key", &self.inner.key)
            .field("subscribers", &state.subscribers)
            .field("active", &state.pump.is_some())
            .field("closed", &state.latest.is_none())
            .finish()
    }
}

struct SubscriberGuard<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Drop for SubscriberGuard<T> {
    fn drop(&mut self) {
        self.inner.release_subscriber();
    }
}

/// One consumer of a [`SharedStream`]. Dropping it detaches the consumer.
pub struct Subscription<T> {
    stream: BoxStream<'static, T>,
    _guard: Option<SubscriberGuard<T>>,
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.stream.poll_next_unpin(cx)
    }
}

/// Yields the current value (if set), then each subsequent change, until the
/// sender is dropped.
fn watch_stream<T>(rx: watch::Receiver<Option<T>>) -> BoxStream<'static, T>
where
    T: Clone + Send + Sync + 'static,
{
    stream::unfold((rx, true), |(mut rx, mut fresh)| async move {
        loop {
            if !fresh && rx.changed().await.is_err() {
                return None;
            }
            fresh = false;

            let current = rx.borrow_and_update().clone();
            if let Some(value) = current {
                return Some((value, (rx, false)));
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn channel_upstream(
        rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<u32>>>>,
    ) -> impl Fn() -> BoxStream<'static, u32> + Send + Sync + 'static {
        move || match rx.lock().take() {
            Some(mut rx) => stream::poll_fn(move |cx| rx.poll_recv(cx)).boxed(),
            None => stream::pending().boxed(),
        }
    }

    async fn wait_for_latest(shared: &SharedStream<u32>, expected: u32) {
        for _ in 0..200 {
            if shared.latest() == Some(expected) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("value {expected} never published");
    }

    #[tokio::test]
    async fn late_subscriber_gets_latest_value() {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = SharedStream::new(
            "numbers",
            ComputationScope::new(),
            channel_upstream(Arc::new(Mutex::new(Some(rx)))),
        );

        let _first = shared.subscribe();
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        wait_for_latest(&shared, 2).await;

        let mut late = shared.subscribe();
        assert_eq!(late.next().await, Some(2));
        assert_eq!(shared.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn equal_values_are_published_once() {
        let shared = SharedStream::new("dupes", ComputationScope::new(), || {
            stream::iter(vec![7u32, 7, 7, 8]).chain(stream::pending()).boxed()
        });

        let mut sub = shared.subscribe();
        let mut seen = Vec::new();
        while seen.last() != Some(&8) {
            seen.push(sub.next().await.unwrap());
        }

        assert!(seen.windows(2).all(|w| w[0] != w[1]));
        assert_eq!(seen.last(), Some(&8));
    }

    #[tokio::test]
    async fn closing_scope_ends_subscribers() {
        let scope = ComputationScope::new();
        let shared = SharedStream::new("closing", scope.clone(), || {
            stream::iter(vec![1u32]).chain(stream::pending()).boxed()
        });

        let mut sub = shared.subscribe();
        assert_eq!(sub.next().await, Some(1));

        scope.cancel();
        assert_eq!(sub.next().await, None);
        assert!(shared.is_closed());

        let mut after = shared.subscribe();
        assert_eq!(after.next().await, None);
    }
}
