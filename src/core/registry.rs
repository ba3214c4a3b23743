//! Handles to running background tasks, keyed by task id. The map is
//! mutex-guarded so insert and remove for the same id cannot race and
//! orphan a spawned task.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct RunningTask {
    pub cancel: CancellationToken,
    pub handle: JoinHandle<()>,
}

#[derive(Clone, Default)]
pub struct TaskRegistry {
    inner: Arc<Mutex<HashMap<String, RunningTask>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, id: &str, task: RunningTask) {
        self.inner.lock().await.insert(id.to_string(), task);
    }

    /// Cancel a task and wait for it to wind down. Returns false when no
    /// task with that id is running; stopping twice is a no-op.
    pub async fn stop(&self, id: &str) -> bool {
        let removed = self.inner.lock().await.remove(id);
        match removed {
            Some(task) => {
                task.cancel.cancel();
                let _ = task.handle.await;
                true
            }
            None => false,
        }
    }

    /// Drop the handle for a task that ended on its own. Must not cancel:
    /// the task may still be running its final notification.
    pub async fn finish(&self, id: &str) {
        self.inner.lock().await.remove(id);
    }

    pub async fn is_running(&self, id: &str) -> bool {
        self.inner.lock().await.contains_key(id)
    }

    pub async fn running_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Cancel everything, then wait for every task to finish. Used for
    /// daemon shutdown.
    pub async fn stop_all(&self) {
        let drained: Vec<(String, RunningTask)> =
            self.inner.lock().await.drain().collect();
        for (_, task) in &drained {
            task.cancel.cancel();
        }
        for (_, task) in drained {
            let _ = task.handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn spawn_waiter(token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            token.cancelled().await;
        })
    }

    #[tokio::test]
    async fn insert_then_stop_cancels_the_task() {
        let registry = TaskRegistry::new();
        let token = CancellationToken::new();
        let handle = spawn_waiter(token.clone());
        registry
            .insert(
                "task-1",
                RunningTask {
                    cancel: token,
                    handle,
                },
            )
            .await;

        assert!(registry.is_running("task-1").await);
        assert!(registry.stop("task-1").await);
        assert!(!registry.is_running("task-1").await);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let registry = TaskRegistry::new();
        let token = CancellationToken::new();
        let handle = spawn_waiter(token.clone());
        registry
            .insert(
                "task-1",
                RunningTask {
                    cancel: token,
                    handle,
                },
            )
            .await;

        assert!(registry.stop("task-1").await);
        assert!(!registry.stop("task-1").await);
        assert!(!registry.stop("never-existed").await);
    }

    #[tokio::test]
    async fn finish_removes_without_cancelling() {
        let registry = TaskRegistry::new();
        let token = CancellationToken::new();
        let handle = spawn_waiter(token.clone());
        registry
            .insert(
                "task-1",
                RunningTask {
                    cancel: token.clone(),
                    handle,
                },
            )
            .await;

        registry.finish("task-1").await;
        assert!(!registry.is_running("task-1").await);
        // The task itself was not told to stop.
        assert!(!token.is_cancelled());
        token.cancel();
    }

    #[tokio::test]
    async fn stop_all_drains_every_task() {
        let registry = TaskRegistry::new();
        for i in 0..4 {
            let token = CancellationToken::new();
            let handle = spawn_waiter(token.clone());
            registry
                .insert(
                    &format!("task-{i}"),
                    RunningTask {
                        cancel: token,
                        handle,
                    },
                )
                .await;
        }
        assert_eq!(registry.len().await, 4);
        registry.stop_all().await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn stop_waits_for_wind_down() {
        let registry = TaskRegistry::new();
        let token = CancellationToken::new();
        let inner = token.clone();
        let flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag_inner = flag.clone();
        let handle = tokio::spawn(async move {
            inner.cancelled().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
            flag_inner.store(true, std::sync::atomic::Ordering::SeqCst);
        });
        registry
            .insert(
                "slow",
                RunningTask {
                    cancel: token,
                    handle,
                },
            )
            .await;

        assert!(registry.stop("slow").await);
        // stop() returning means the task ran its wind-down to completion.
        assert!(flag.load(std::sync::atomic::Ordering::SeqCst));
    }
}
