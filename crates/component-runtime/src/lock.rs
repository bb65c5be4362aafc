//! 组件锁
//!
//! 每个组件管理器持有一把带超时的互斥锁，所有状态转换和引用（重新）绑定都在锁内进行。
//! 等待超过锁超时时间视为疑似死锁：放弃本次操作并返回 [`LifecycleError::LockTimeout`]，
//! 不会无限期挂起。锁不可重入，当前线程已持有时立即返回错误，由调用方改为排队执行。

use parking_lot::{Mutex, MutexGuard};
use scr_common::{ComponentId, LifecycleError, LifecycleResult};
use std::cell::RefCell;
use std::collections::HashSet;
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};
use tracing::error;

thread_local! {
    static HELD_LOCKS: RefCell<HashSet<ComponentId>> = RefCell::new(HashSet::new());
}

/// 带超时的组件锁
pub(crate) struct ComponentLock<T> {
    id: ComponentId,
    name: String,
    timeout: Duration,
    state: Mutex<T>,
}

impl<T> ComponentLock<T> {
    pub(crate) fn new(id: ComponentId, name: impl Into<String>, timeout: Duration, state: T) -> Self {
        Self {
            id,
            name: name.into(),
            timeout,
            state: Mutex::new(state),
        }
    }

    /// 独占访问时直接获取内部状态
    pub(crate) fn get_mut(&mut self) -> &mut T {
        self.state.get_mut()
    }

    /// 当前线程是否持有该锁
    pub(crate) fn is_held_by_current_thread(&self) -> bool {
        HELD_LOCKS.with(|held| held.borrow().contains(&self.id))
    }

    /// 在超时时间内获取锁
    pub(crate) fn acquire(&self) -> LifecycleResult<ComponentLockGuard<'_, T>> {
        if self.is_held_by_current_thread() {
            error!(component = %self.name, "组件锁重入, 放弃本次操作");
            return Err(LifecycleError::LockTimeout {
                component: self.name.clone(),
                waited_ms: 0,
            });
        }

        let started = Instant::now();
        match self.state.try_lock_for(self.timeout) {
            Some(guard) => {
                HELD_LOCKS.with(|held| held.borrow_mut().insert(self.id));
                Ok(ComponentLockGuard {
                    id: self.id,
                    guard,
                })
            }
            None => {
                let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                error!(
                    component = %self.name,
                    waited_ms,
                    "获取组件锁超时, 疑似死锁"
                );
                Err(LifecycleError::LockTimeout {
                    component: self.name.clone(),
                    waited_ms,
                })
            }
        }
    }
}

/// 组件锁守卫，释放时从当前线程的持锁集合中移除
pub(crate) struct ComponentLockGuard<'a, T> {
    id: ComponentId,
    guard: MutexGuard<'a, T>,
}

impl<T> Deref for ComponentLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for ComponentLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for ComponentLockGuard<'_, T> {
    fn drop(&mut self) {
        HELD_LOCKS.with(|held| held.borrow_mut().remove(&self.id));
    }
}
