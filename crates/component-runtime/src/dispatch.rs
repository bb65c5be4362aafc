//! 事件派发
//!
//! 每个组件管理器拥有一条串行队列：同一管理器的任务按投递顺序逐个执行，
//! 不同管理器的任务在有界的工作线程池上并行执行。事件生产者只负责投递，
//! 不会被慢组件阻塞。

use scr_common::{RuntimeError, RuntimeResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify, Semaphore};
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// 队列共享的计数与通知
#[derive(Debug, Default)]
struct PendingJobs {
    count: AtomicUsize,
    idle: Notify,
}

impl PendingJobs {
    fn finish(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// 有界派发池
#[derive(Debug, Clone)]
pub(crate) struct DispatchPool {
    handle: Handle,
    permits: Arc<Semaphore>,
    pending: Arc<PendingJobs>,
}

impl DispatchPool {
    /// 在当前 tokio 运行时上创建派发池
    pub(crate) fn new(concurrency: usize) -> RuntimeResult<Self> {
        let handle = Handle::try_current().map_err(|e| RuntimeError::BootstrapFailed {
            message: format!("组件运行时必须在 tokio 运行时内创建: {e}"),
        })?;
        Ok(Self {
            handle,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            pending: Arc::new(PendingJobs::default()),
        })
    }

    /// 为一个管理器创建串行队列
    pub(crate) fn queue(&self, name: impl Into<String>) -> SerialQueue {
        let name = name.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let permits = self.permits.clone();
        let pending = self.pending.clone();
        let queue_name = name.clone();

        self.handle.spawn(async move {
            while let Some(job) = receiver.recv().await {
                let permit = match permits.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        pending.finish();
                        break;
                    }
                };
                if let Err(e) = tokio::task::spawn_blocking(job).await {
                    error!(queue = %queue_name, "派发任务异常终止: {}", e);
                }
                drop(permit);
                pending.finish();
            }
            debug!(queue = %queue_name, "派发队列已关闭");
        });

        SerialQueue {
            name,
            sender,
            pending: self.pending.clone(),
        }
    }

    /// 排队中和执行中的任务数量
    pub(crate) fn pending(&self) -> usize {
        self.pending.count.load(Ordering::SeqCst)
    }

    /// 等待所有队列清空，超时返回 false
    pub(crate) async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.pending.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending() == 0 {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.pending() == 0;
            }
        }
    }
}

/// 单个管理器的串行队列
#[derive(Debug, Clone)]
pub(crate) struct SerialQueue {
    name: String,
    sender: mpsc::UnboundedSender<Job>,
    pending: Arc<PendingJobs>,
}

impl SerialQueue {
    /// 投递任务，队列已关闭时返回 false
    pub(crate) fn post(&self, job: impl FnOnce() + Send + 'static) -> bool {
        self.pending.count.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(Box::new(job)).is_err() {
            debug!(queue = %self.name, "派发队列已关闭, 丢弃任务");
            self.pending.finish();
            return false;
        }
        true
    }
}
