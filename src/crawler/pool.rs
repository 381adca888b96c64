//! Bounded task pool
//!
//! Every submitted task is spawned immediately but waits for a semaphore
//! permit before doing any work, so at most `size` tasks run at once. The
//! permit is held until the task's future completes, sleeps included.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

/// Pool of at most `size` concurrently running tasks
pub struct TaskPool<T> {
    permits: Arc<Semaphore>,
    tasks: JoinSet<T>,
}

impl<T: Send + 'static> TaskPool<T> {
    /// Creates a pool; a size of zero is treated as one
    pub fn new(size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size.max(1))),
            tasks: JoinSet::new(),
        }
    }

    /// Queues a task; it starts once a slot is free
    pub fn submit<F>(&mut self, task: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.tasks.spawn(async move {
            // The semaphore is never closed, so acquiring cannot fail
            let _permit = permits.acquire_owned().await.ok();
            task.await
        });
    }

    /// Number of tasks not yet collected
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for every task, handing each result to `on_complete` as it lands
    pub async fn await_all<C>(mut self, mut on_complete: C)
    where
        C: FnMut(Result<T, JoinError>),
    {
        while let Some(result) = self.tasks.join_next().await {
            on_complete(result);
        }
    }
}
