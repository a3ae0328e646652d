use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

pub type ScopeId = Uuid;

/// Caller-owned cancellation boundary.
///
/// Cloning yields another handle to the same scope. Cancelling any handle
/// cancels the scope and every child created from it. Dropping the last
/// handle cancels it too.
#[derive(Clone)]
pub struct ComputationScope {
    id: ScopeId,
    token: CancellationToken,
    _guard: Arc<DropGuard>,
}

impl ComputationScope {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// A new scope that is cancelled together with `self` but can also be
    /// cancelled on its own.
    pub fn child(&self) -> Self {
        Self::with_token(self.token.child_token())
    }

    fn with_token(token: CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            _guard: Arc::new(token.clone().drop_guard()),
            token,
        }
    }

    /// Observes cancellation without keeping the scope alive.
    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the scope is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Spawns `fut` bound to this scope: it is dropped as soon as the scope
    /// is cancelled, in which case the handle yields `None`.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<Option<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => None,
                out = fut => Some(out),
            }
        })
    }
}

impl Default for ComputationScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ComputationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputationScope")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
