//! # Component Runtime
//!
//! 声明式组件运行时核心。组件以描述符声明对能力的引用，运行时负责在引用满足时
//! 构造并激活组件、注入绑定的能力、发布组件提供的能力，并在引用或配置变化时
//! 重新绑定或停用组件。
//!
//! ## 核心组件
//!
//! - [`ComponentMetadata`] / [`ComponentDescriptor`] - 组件的原始元数据与验证后的描述符
//! - [`ReferenceMetadata`] / [`ReferenceDescriptor`] - 引用的原始元数据与验证后的描述符
//! - [`ComponentImplementation`] / [`ImplementationCatalog`] - 具名回调表与实现目录
//! - [`ComponentContext`] - 单次激活的上下文
//! - [`ComponentRuntime`] - 接收注册表与配置事件并驱动组件状态机
//!
//! ## 并发模型
//!
//! - 每个组件管理器一把带超时的组件锁，超时视为疑似死锁并放弃本次操作
//! - 每个组件管理器一条串行派发队列，不同管理器在有界工作线程上并行
//! - 用户回调在组件锁内执行，回调中的 panic 转换为激活失败
//!
//! ## 基本使用
//!
//! ```rust,no_run
//! use component_runtime::{
//!     ComponentImplementation, ComponentMetadata, ComponentRuntime, ImplementationCatalog,
//! };
//! use config_abstractions::RuntimeSettings;
//! use config_impl::InMemoryConfigurationStore;
//! use registry_impl::InMemoryCapabilityRegistry;
//! use std::sync::Arc;
//!
//! struct Greeter;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = ImplementationCatalog::new().with(
//!         ComponentImplementation::builder("greeter", |_| Ok(Greeter))
//!             .activate("activate", |_, context| {
//!                 tracing::info!("{} 已激活", context.name());
//!                 Ok(())
//!             })
//!             .build(),
//!     );
//!
//!     let runtime = ComponentRuntime::new(
//!         RuntimeSettings::default(),
//!         Arc::new(InMemoryCapabilityRegistry::new()),
//!         Arc::new(InMemoryConfigurationStore::new()),
//!         Arc::new(catalog),
//!     )?;
//!     runtime.register_descriptor(ComponentMetadata::new("greeter", "greeter"))?;
//!     runtime.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod context;
mod dependency;
pub mod descriptor;
mod dispatch;
mod holder;
pub mod implementation;
mod lock;
mod manager;
pub mod reference;
pub mod runtime;

pub use context::{ComponentAdmin, ComponentContext};
pub use descriptor::{
    ComponentDescriptor, ComponentMetadata, ConfigurationPolicy, SpecVersion, DEFAULT_ACTIVATE,
    DEFAULT_DEACTIVATE,
};
pub use implementation::{
    ComponentImplementation, ComponentInstance, FieldValue, ImplementationBuilder,
    ImplementationCatalog, InjectedValue,
};
pub use reference::{
    Cardinality, FieldBinding, FieldStrategy, FieldValueType, PolicyOption, ReferenceDescriptor,
    ReferenceMetadata, ReferencePolicy,
};
pub use runtime::ComponentRuntime;
