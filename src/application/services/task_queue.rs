//! Task Queue - 有界并发调度器
//!
//! FIFO 队列 + 并发上限 + "全部完成"信号:
//! - 任务按提交顺序准入，同时运行的任务数不超过 concurrency
//! - 任一任务结束（成功/失败/panic）后立即尝试准入下一个
//! - 任务失败只记录日志，不影响调度器和其它任务
//! - on_idle 在队列为空且没有运行中任务时返回；每个空闲期只通知一次，
//!   之后再提交任务需要新的调用方重新等待

use futures_util::future::BoxFuture;
use std::collections::VecDeque;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

type Job = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), String>> + Send>;

/// 默认并发上限
pub const DEFAULT_CONCURRENCY: usize = 6;

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Job>,
    running: usize,
}

struct Inner {
    concurrency: usize,
    state: Mutex<QueueState>,
    idle: Notify,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 有界并发任务队列
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<Inner>,
}

impl TaskQueue {
    pub fn new(concurrency: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                concurrency: concurrency.max(1),
                state: Mutex::new(QueueState::default()),
                idle: Notify::new(),
            }),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.inner.concurrency
    }

    /// 运行中的任务数
    pub fn running(&self) -> usize {
        self.inner.lock().running
    }

    /// 等待准入的任务数
    pub fn pending(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// 提交任务
    ///
    /// 必须在 tokio 运行时内调用
    pub fn push<F, Fut, E>(&self, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let job: Job = Box::new(move || -> BoxFuture<'static, Result<(), String>> {
            Box::pin(async move { task().await.map_err(|e| e.to_string()) })
        });
        self.inner.lock().pending.push_back(job);
        Self::next(&self.inner);
    }

    /// 等待队列清空且没有运行中的任务
    pub async fn on_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // 先注册再检查，避免丢失通知
            notified.as_mut().enable();
            {
                let state = self.inner.lock();
                if state.running == 0 && state.pending.is_empty() {
                    return;
                }
            }
            notified.await;
        }
    }

    fn next(inner: &Arc<Inner>) {
        let job = {
            let mut state = inner.lock();
            if state.running >= inner.concurrency || state.pending.is_empty() {
                if state.running == 0 && state.pending.is_empty() {
                    inner.idle.notify_waiters();
                }
                return;
            }
            match state.pending.pop_front() {
                Some(job) => {
                    state.running += 1;
                    job
                }
                None => return,
            }
        };

        let worker = inner.clone();
        tokio::spawn(async move {
            // 单独 spawn 以隔离 panic
            match tokio::spawn(job()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Task error"),
                Err(e) => tracing::error!(error = %e, "Task panicked"),
            }
            worker.lock().running -= 1;
            Self::next(&worker);
        });

        // 还有空闲名额时继续准入
        Self::next(inner);
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrency_never_exceeds_ceiling() {
        let queue = TaskQueue::new(3);
        let current = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));

        for _ in 0..20 {
            let current = current.clone();
            let max_seen = max_seen.clone();
            let completed = completed.clone();
            queue.push(move || async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                completed.fetch_add(1, Ordering::SeqCst);
                Ok::<(), String>(())
            });
            assert!(queue.running() <= 3);
        }

        queue.on_idle().await;

        assert_eq!(completed.load(Ordering::SeqCst), 20);
        assert!(max_seen.load(Ordering::SeqCst) <= 3);
        assert!(max_seen.load(Ordering::SeqCst) >= 1);
        assert_eq!(queue.running(), 0);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_finished_task_admits_pending_work() {
        let queue = TaskQueue::new(2);
        let completed = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let completed = completed.clone();
            queue.push(move || async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                completed.fetch_add(1, Ordering::SeqCst);
                Ok::<(), String>(())
            });
        }
        assert_eq!(queue.running(), 2);
        assert_eq!(queue.pending(), 2);

        // 后两个任务只能由前面任务结束时准入
        queue.on_idle().await;
        assert_eq!(completed.load(Ordering::SeqCst), 4);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_failures_do_not_affect_siblings() {
        let queue = TaskQueue::new(2);
        let completed = Arc::new(AtomicUsize::new(0));

        for i in 0..6 {
            let completed = completed.clone();
            queue.push(move || async move {
                if i % 2 == 0 {
                    return Err(format!("task {} failed", i));
                }
                completed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        queue.on_idle().await;
        assert_eq!(completed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_panicking_task_releases_slot() {
        let queue = TaskQueue::new(1);
        let completed = Arc::new(AtomicUsize::new(0));

        queue.push(|| async {
            if true {
                panic!("boom");
            }
            Ok::<(), String>(())
        });
        let c = completed.clone();
        queue.push(move || async move {
            c.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        });

        queue.on_idle().await;
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_idle_on_empty_queue_resolves_immediately() {
        let queue = TaskQueue::new(2);
        tokio::time::timeout(Duration::from_secs(1), queue.on_idle())
            .await
            .expect("idle queue should resolve");
    }

    #[tokio::test]
    async fn test_idle_rearmed_after_new_work() {
        let queue = TaskQueue::new(2);
        let completed = Arc::new(AtomicUsize::new(0));

        let c = completed.clone();
        queue.push(move || async move {
            c.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        });
        queue.on_idle().await;
        assert_eq!(completed.load(Ordering::SeqCst), 1);

        let c = completed.clone();
        queue.push(move || async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            c.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        });
        queue.on_idle().await;
        assert_eq!(completed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fifo_admission_with_single_slot() {
        let queue = TaskQueue::new(1);
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = order.clone();
            queue.push(move || async move {
                order.lock().unwrap().push(i);
                Ok::<(), String>(())
            });
        }

        queue.on_idle().await;
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }
}
