//! # Capability Registry Abstractions
//!
//! 能力注册表抽象层，定义组件运行时与能力注册表协作方之间的窄接口。
//!
//! ## 核心接口
//!
//! - [`CapabilityRef`] - 已发布能力的不可变句柄
//! - [`CapabilityEvent`] - 能力的新增、修改、移除事件
//! - [`CapabilityRegistry`] - 订阅、查找、发布与注销能力

pub mod capability;
pub mod events;
pub mod registry;

pub use capability::*;
pub use events::*;
pub use registry::*;
