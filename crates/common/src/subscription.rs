//! 订阅句柄
//!
//! 订阅在 [`Subscription::dispose`] 或句柄被丢弃时注销，注销动作只执行一次。

use parking_lot::Mutex;
use std::fmt;

type Cleanup = Box<dyn FnOnce() + Send>;

/// 显式释放的订阅句柄
pub struct Subscription {
    name: String,
    cleanup: Mutex<Option<Cleanup>>,
}

impl Subscription {
    /// 创建新的订阅句柄
    pub fn new(name: impl Into<String>, cleanup: impl FnOnce() + Send + 'static) -> Self {
        Self {
            name: name.into(),
            cleanup: Mutex::new(Some(Box::new(cleanup))),
        }
    }

    /// 不需要注销动作的空句柄
    pub fn noop(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cleanup: Mutex::new(None),
        }
    }

    /// 订阅名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 是否已注销
    pub fn is_disposed(&self) -> bool {
        self.cleanup.lock().is_none()
    }

    /// 注销订阅，重复调用无效果
    pub fn dispose(&self) {
        let cleanup = self.cleanup.lock().take();
        if let Some(cleanup) = cleanup {
            tracing::debug!("注销订阅: {}", self.name);
            cleanup();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
