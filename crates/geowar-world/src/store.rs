//! Shared handle to the world state.
//!
//! Observers take concurrent read guards; mutations are serialized behind
//! the write guard so no reader ever sees a half-applied operation.

use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use geowar_types::WorldSnapshot;

use crate::state::WorldState;

/// Cloneable handle to the single [`WorldState`].
#[derive(Debug, Clone, Default)]
pub struct WorldStore {
    inner: Arc<RwLock<WorldState>>,
}

impl WorldStore {
    /// Wrap a world in a shared handle.
    pub fn new(state: WorldState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Acquire a read guard. Many readers may hold one at once.
    pub async fn read(&self) -> RwLockReadGuard<'_, WorldState> {
        self.inner.read().await
    }

    /// Acquire the exclusive write guard.
    pub async fn write(&self) -> RwLockWriteGuard<'_, WorldState> {
        self.inner.write().await
    }

    /// Run `f` under the write guard as one atomic operation.
    pub async fn mutate<R>(&self, f: impl FnOnce(&mut WorldState) -> R) -> R {
        let mut guard = self.inner.write().await;
        f(&mut guard)
    }

    /// A consistent copy of every entity.
    pub async fn snapshot(&self, tick: u64) -> WorldSnapshot {
        self.inner.read().await.to_snapshot(tick)
    }
}
