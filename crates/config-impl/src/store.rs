//! 内存配置存储

use config_abstractions::{
    Configuration, ConfigurationEvent, ConfigurationListener, ConfigurationStore,
    ConfigurationTarget,
};
use parking_lot::{Mutex, RwLock};
use scr_common::{ConfigError, ConfigResult, Properties, Subscription};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// 工厂配置标识的分隔符
pub const FACTORY_PID_SEPARATOR: char = '~';

struct ListenerEntry {
    target: ConfigurationTarget,
    listener: ConfigurationListener,
}

#[derive(Default)]
struct StoreState {
    configurations: BTreeMap<String, Configuration>,
    /// 每个配置标识的最新变更计数，删除后保留
    change_counts: HashMap<String, u64>,
    listeners: HashMap<u64, Arc<ListenerEntry>>,
    next_listener_id: u64,
}

impl StoreState {
    fn next_change_count(&mut self, pid: &str) -> u64 {
        let count = self.change_counts.entry(pid.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    fn listeners_for(&self, pid: &str, factory_pid: Option<&str>) -> Vec<ConfigurationListener> {
        self.listeners
            .values()
            .filter(|entry| entry.target.matches(pid, factory_pid))
            .map(|entry| entry.listener.clone())
            .collect()
    }
}

struct Inner {
    state: RwLock<StoreState>,
    /// 串行化事件投递，保证同一配置的事件按变更计数顺序到达
    delivery: Mutex<()>,
}

/// 内存配置存储
///
/// 每个配置标识维护单调递增的变更计数；删除后重新创建的配置从上次的计数继续。
#[derive(Clone)]
pub struct InMemoryConfigurationStore {
    inner: Arc<Inner>,
}

impl InMemoryConfigurationStore {
    /// 创建新的内存配置存储
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(StoreState::default()),
                delivery: Mutex::new(()),
            }),
        }
    }

    /// 创建或更新单一配置
    ///
    /// 已存在的工厂配置保留其工厂标识。
    pub fn update(&self, pid: &str, properties: Properties) -> Configuration {
        let _delivery = self.inner.delivery.lock();
        let (configuration, listeners) = {
            let mut state = self.inner.state.write();
            let factory_pid = state
                .configurations
                .get(pid)
                .and_then(|c| c.factory_pid.clone());
            let change_count = state.next_change_count(pid);
            let configuration = Configuration::new(pid, factory_pid, properties, change_count);
            state
                .configurations
                .insert(pid.to_string(), configuration.clone());
            let listeners = state.listeners_for(pid, configuration.factory_pid.as_deref());
            (configuration, listeners)
        };

        info!(
            change_count = configuration.change_count,
            "更新配置: {}", configuration.pid
        );
        let event = ConfigurationEvent::Updated(configuration.clone());
        for listener in listeners {
            listener(&event);
        }
        configuration
    }

    /// 创建工厂配置，配置标识为 `<factory_pid>~<uuid>`
    pub fn create_factory_configuration(
        &self,
        factory_pid: &str,
        properties: Properties,
    ) -> Configuration {
        let pid = format!(
            "{factory_pid}{FACTORY_PID_SEPARATOR}{}",
            uuid::Uuid::new_v4()
        );

        let _delivery = self.inner.delivery.lock();
        let (configuration, listeners) = {
            let mut state = self.inner.state.write();
            let change_count = state.next_change_count(&pid);
            let configuration = Configuration::new(
                pid.clone(),
                Some(factory_pid.to_string()),
                properties,
                change_count,
            );
            state.configurations.insert(pid.clone(), configuration.clone());
            let listeners = state.listeners_for(&pid, Some(factory_pid));
            (configuration, listeners)
        };

        info!("创建工厂配置: {} ({})", configuration.pid, factory_pid);
        let event = ConfigurationEvent::Updated(configuration.clone());
        for listener in listeners {
            listener(&event);
        }
        configuration
    }

    /// 删除配置
    pub fn delete(&self, pid: &str) -> ConfigResult<()> {
        let _delivery = self.inner.delivery.lock();
        let (event, listeners) = {
            let mut state = self.inner.state.write();
            let removed = state
                .configurations
                .remove(pid)
                .ok_or_else(|| ConfigError::UnknownConfiguration {
                    pid: pid.to_string(),
                })?;
            let change_count = state.next_change_count(pid);
            let listeners = state.listeners_for(pid, removed.factory_pid.as_deref());
            (
                ConfigurationEvent::Deleted {
                    pid: removed.pid,
                    factory_pid: removed.factory_pid,
                    change_count,
                },
                listeners,
            )
        };

        info!(change_count = event.change_count(), "删除配置: {}", pid);
        for listener in listeners {
            listener(&event);
        }
        Ok(())
    }

    /// 重新投递配置的当前版本（变更计数不变）
    ///
    /// 用于模拟至少一次的投递语义。
    pub fn redeliver(&self, pid: &str) -> ConfigResult<()> {
        let _delivery = self.inner.delivery.lock();
        let (configuration, listeners) = {
            let state = self.inner.state.read();
            let configuration = state.configurations.get(pid).cloned().ok_or_else(|| {
                ConfigError::UnknownConfiguration {
                    pid: pid.to_string(),
                }
            })?;
            let listeners = state.listeners_for(pid, configuration.factory_pid.as_deref());
            (configuration, listeners)
        };

        debug!(
            change_count = configuration.change_count,
            "重新投递配置: {}", pid
        );
        let event = ConfigurationEvent::Updated(configuration);
        for listener in listeners {
            listener(&event);
        }
        Ok(())
    }

    /// 当前配置数量
    pub fn len(&self) -> usize {
        self.inner.state.read().configurations.len()
    }

    /// 是否没有配置
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryConfigurationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryConfigurationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("InMemoryConfigurationStore")
            .field("configurations", &state.configurations.len())
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

impl ConfigurationStore for InMemoryConfigurationStore {
    fn subscribe(
        &self,
        target: ConfigurationTarget,
        listener: ConfigurationListener,
    ) -> Subscription {
        let name = format!("configuration:{target}");
        let listener_id = {
            let mut state = self.inner.state.write();
            state.next_listener_id += 1;
            let listener_id = state.next_listener_id;
            state
                .listeners
                .insert(listener_id, Arc::new(ListenerEntry { target, listener }));
            listener_id
        };

        debug!(listener_id, "新增配置订阅: {}", name);

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        Subscription::new(name, move || {
            if let Some(inner) = weak.upgrade() {
                inner.state.write().listeners.remove(&listener_id);
            }
        })
    }

    fn list(&self, target: &ConfigurationTarget) -> Vec<Configuration> {
        self.inner
            .state
            .read()
            .configurations
            .values()
            .filter(|c| target.matches(&c.pid, c.factory_pid.as_deref()))
            .cloned()
            .collect()
    }

    fn get(&self, pid: &str) -> Option<Configuration> {
        self.inner.state.read().configurations.get(pid).cloned()
    }
}
