use std::{future::Future, sync::Arc};

use tokio::{sync::Semaphore, task::JoinHandle};

/// Bounded pool for asynchronous send attempts. At most `size` attempts run
/// at once; the rest wait for a permit.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size.max(1))),
        }
    }

    pub fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            task.await
        })
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(16)
    }
}
