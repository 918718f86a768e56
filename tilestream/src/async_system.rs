//! Worker/coordinator task dispatch.
//!
//! Two execution domains exist. Background work (I/O, provider creation,
//! database statements) runs on a tokio runtime. Shared overlay and tile state
//! is only touched on the single coordinating thread, which periodically
//! drains a queue of continuations with [`AsyncSystem::dispatch_main_thread_tasks`].
//!
//! ```text
//! worker:       future ──► output ─┐
//!                                  │ queued
//! coordinator:  dispatch_main_thread_tasks() ──► continuation(output)
//! ```

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::http::AssetError;

/// Boxed future type used at trait boundaries.
pub use futures::future::BoxFuture;

type MainThreadTask = Box<dyn FnOnce() + Send + 'static>;

struct MainThreadQueue {
    sender: mpsc::UnboundedSender<MainThreadTask>,
    receiver: AsyncMutex<mpsc::UnboundedReceiver<MainThreadTask>>,
}

impl MainThreadQueue {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: AsyncMutex::new(receiver),
        }
    }

    fn push(&self, task: MainThreadTask) {
        // The queue owns its receiver, so the channel is never closed.
        let _ = self.sender.send(task);
    }
}

/// Handle to the worker runtime and the coordinating thread's task queue.
///
/// Cloning is cheap; all clones share the same queue.
#[derive(Clone)]
pub struct AsyncSystem {
    runtime: Handle,
    main_thread: Arc<MainThreadQueue>,
}

impl AsyncSystem {
    /// Create an async system that runs worker tasks on `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            main_thread: Arc::new(MainThreadQueue::new()),
        }
    }

    /// Create an async system on the runtime of the calling context.
    ///
    /// Returns `None` when called outside a tokio runtime.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Run a blocking closure on a worker thread.
    pub fn run_in_worker_thread<F, T>(&self, f: F) -> JoinHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.runtime.spawn_blocking(f)
    }

    /// Drive a future to completion on the worker runtime.
    pub fn spawn_in_worker<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.runtime.spawn(future)
    }

    /// Queue a closure for the coordinating thread.
    ///
    /// The closure runs during the next call to
    /// [`dispatch_main_thread_tasks`](Self::dispatch_main_thread_tasks).
    pub fn run_in_main_thread<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.main_thread.push(Box::new(f));
    }

    /// Await `future` on a worker, then run `continuation` with its output on
    /// the coordinating thread.
    ///
    /// The continuation owns whatever it captured until it runs, so shared
    /// handles it holds stay alive even if their original owner is dropped.
    pub fn then_in_main_thread<Fut, F>(&self, future: Fut, continuation: F)
    where
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
        F: FnOnce(Fut::Output) + Send + 'static,
    {
        let queue = Arc::clone(&self.main_thread);
        self.runtime.spawn(async move {
            let output = future.await;
            queue.push(Box::new(move || continuation(output)));
        });
    }

    /// A future that is already complete.
    pub fn create_resolved_future<T>(&self, value: T) -> BoxFuture<'static, T>
    where
        T: Send + 'static,
    {
        futures::future::ready(value).boxed()
    }

    /// Run every queued coordinator task, including tasks queued while
    /// dispatching. Returns the number of tasks run.
    ///
    /// Re-entrant calls from inside a task return 0.
    pub fn dispatch_main_thread_tasks(&self) -> usize {
        let Ok(mut receiver) = self.main_thread.receiver.try_lock() else {
            return 0;
        };

        let mut dispatched = 0;
        while let Ok(task) = receiver.try_recv() {
            task();
            dispatched += 1;
        }
        dispatched
    }

    /// Wait until a coordinator task is queued, then run it.
    pub async fn dispatch_next_main_thread_task(&self) -> bool {
        let task = {
            let mut receiver = self.main_thread.receiver.lock().await;
            receiver.recv().await
        };

        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }
}

/// Turn a panic while polling `future` into [`AssetError::Worker`].
///
/// Without this a panicking worker future never reaches its
/// [`then_in_main_thread`](AsyncSystem::then_in_main_thread) continuation.
pub fn catch_panics<Fut, T, E>(future: Fut) -> BoxFuture<'static, Result<T, E>>
where
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: From<AssetError> + Send + 'static,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .map(|outcome| match outcome {
            Ok(result) => result,
            Err(panic) => Err(AssetError::Worker(panic_message(panic.as_ref())).into()),
        })
        .boxed()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

impl fmt::Debug for AsyncSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncSystem").finish_non_exhaustive()
    }
}
