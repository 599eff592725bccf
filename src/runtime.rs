//! Runtime abstraction layer for async operations
//!
//! Fetches and persistent-store writes run as background futures. The pyramid
//! manager never picks a runtime itself; it is handed an [`AsyncSpawner`] at
//! construction time and every background job goes through it.

use std::pin::Pin;

use crate::prelude::Future;

/// Boxed future accepted by [`AsyncSpawner::spawn_boxed`]
pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A trait for spawning async tasks (object-safe version)
pub trait AsyncSpawner: Send + Sync + 'static {
    /// Spawn a future and return a handle to it
    fn spawn_boxed(&self, future: BoxFuture) -> Box<dyn AsyncHandle>;
}

impl dyn AsyncSpawner {
    /// Convenience wrapper boxing `future` before handing it to the spawner.
    pub fn spawn<F>(&self, future: F) -> Box<dyn AsyncHandle>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn_boxed(Box::pin(future))
    }
}

/// Handle to a spawned async task
pub trait AsyncHandle: Send + Sync {
    /// Check if the task is finished
    fn is_finished(&self) -> bool;

    /// Cancel the task. Tasks that already ran are unaffected.
    fn cancel(&self);
}

#[cfg(feature = "tokio-runtime")]
mod tokio_impl {
    use super::*;
    use ::tokio::{runtime::Handle, task::JoinHandle};

    /// Tokio-based async spawner bound to one runtime
    #[derive(Clone)]
    pub struct TokioSpawner {
        handle: Handle,
    }

    impl TokioSpawner {
        pub fn new(handle: Handle) -> Self {
            Self { handle }
        }

        /// Spawner for the runtime the caller is running inside.
        pub fn current() -> crate::Result<Self> {
            Handle::try_current()
                .map(Self::new)
                .map_err(|e| crate::TileError::Runtime(e.to_string()))
        }
    }

    impl AsyncSpawner for TokioSpawner {
        fn spawn_boxed(&self, future: BoxFuture) -> Box<dyn AsyncHandle> {
            Box::new(TokioHandle(self.handle.spawn(future)))
        }
    }

    struct TokioHandle(JoinHandle<()>);

    impl AsyncHandle for TokioHandle {
        fn is_finished(&self) -> bool {
            self.0.is_finished()
        }

        fn cancel(&self) {
            self.0.abort();
        }
    }
}

#[cfg(feature = "tokio-runtime")]
pub use tokio_impl::TokioSpawner;

/// Runs every future to completion on the calling thread.
///
/// Completions are therefore queued before `spawn_boxed` returns, which makes
/// layout passes fully deterministic. Futures that need a reactor (real HTTP,
/// timers) must not be driven this way.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockingSpawner;

impl AsyncSpawner for BlockingSpawner {
    fn spawn_boxed(&self, future: BoxFuture) -> Box<dyn AsyncHandle> {
        futures::executor::block_on(future);
        Box::new(FinishedHandle)
    }
}

struct FinishedHandle;

impl AsyncHandle for FinishedHandle {
    fn is_finished(&self) -> bool {
        true
    }

    fn cancel(&self) {}
}
