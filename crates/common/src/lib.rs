//! # SCR Common
//!
//! 这个 crate 提供了 Lorn SCR 组件运行时各层共享的基础类型和约定。
//!
//! ## 核心内容
//!
//! - [`errors`] - 运行时错误分类（验证、生命周期、注册表、配置）
//! - [`Properties`] - 组件与能力的属性映射
//! - [`TargetFilter`] - 引用的目标过滤条件
//! - [`ComponentState`] - 组件管理器状态机的状态
//! - [`ComponentSnapshot`] - 可查询的组件运行状态快照
//! - [`Subscription`] - 显式释放的订阅句柄
//! - [`HealthStatus`] - 运行时健康状态
//!
//! ## 设计原则
//!
//! - 协作方（能力注册表、配置存储）只通过窄接口交互
//! - 错误只在所属组件内部传播，不回抛给事件生产者
//! - 资源释放是确定性的，不依赖回收时机

pub mod errors;
pub mod filter;
pub mod health;
pub mod lifecycle;
pub mod metadata;
pub mod properties;
pub mod subscription;

pub use errors::*;
pub use filter::*;
pub use health::*;
pub use lifecycle::*;
pub use metadata::*;
pub use properties::*;
pub use subscription::*;
