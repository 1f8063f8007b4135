//! Bounded-concurrency task queue.
//!
//! Tasks are accepted without blocking and run in submission order by a fixed
//! set of workers. A task that panics takes down neither its worker nor the
//! queue; the panic is logged and the worker moves on.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Handle to a pool of workers draining a shared FIFO of tasks.
///
/// Cloning the handle is cheap; all clones feed the same pool. The workers
/// exit once every handle has been dropped and the backlog is drained.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<Task>,
}

impl TaskQueue {
    /// Spawns `concurrency` workers onto the current runtime.
    ///
    /// # Panics
    ///
    /// Panics if `concurrency` is zero.
    pub fn new(concurrency: usize) -> Self {
        assert!(concurrency > 0, "task queue needs at least one worker");

        let (tx, rx) = mpsc::unbounded_channel::<Task>();
        let rx = Arc::new(Mutex::new(rx));

        for worker_id in 0..concurrency {
            let rx = Arc::clone(&rx);
            tokio::spawn(async move {
                log::debug!("Queue worker {} started", worker_id);
                loop {
                    let task = {
                        let mut rx = rx.lock().await;
                        rx.recv().await
                    };
                    let Some(task) = task else { break };

                    // Run inside its own spawn so a panic is contained to the
                    // task and surfaces here as a JoinError.
                    if let Err(e) = tokio::spawn(task).await {
                        if e.is_panic() {
                            log::error!("Queued task panicked on worker {}: {}", worker_id, e);
                        }
                    }
                }
                log::debug!("Queue worker {} stopped", worker_id);
            });
        }

        Self { tx }
    }

    /// Adds a task to the back of the queue. Never blocks and never rejects;
    /// the backlog is unbounded.
    pub fn enqueue<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tx.send(Box::pin(task)).is_err() {
            // Only possible if every worker already exited.
            log::error!("Task queue workers are gone, dropping task");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::watch;

    #[tokio::test]
    async fn test_runs_enqueued_tasks() {
        let queue = TaskQueue::new(2);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            queue.enqueue(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_cap() {
        let queue = TaskQueue::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = watch::channel(false);

        for _ in 0..5 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let mut release = release_rx.clone();
            queue.enqueue(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                while !*release.borrow_and_update() {
                    if release.changed().await.is_err() {
                        break;
                    }
                }
                running.fetch_sub(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(running.load(Ordering::SeqCst), 2);

        release_tx.send(true).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(running.load(Ordering::SeqCst), 0);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_poison_the_pool() {
        let queue = TaskQueue::new(1);
        let counter = Arc::new(AtomicUsize::new(0));

        queue.enqueue(async {
            panic!("deliberate");
        });
        let after = Arc::clone(&counter);
        queue.enqueue(async move {
            after.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fifo_order_with_single_worker() {
        let queue = TaskQueue::new(1);
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = Arc::clone(&order);
            queue.enqueue(async move {
                order.lock().await.push(i);
            });
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*order.lock().await, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    #[should_panic]
    fn test_zero_concurrency_panics() {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let _guard = rt.enter();
        let _ = TaskQueue::new(0);
    }
}
