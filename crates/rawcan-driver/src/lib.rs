//! 驱动层模块
//!
//! 本模块提供原始 CAN 通道的生命周期管理，包括：
//! - 通道打开 / 无效通道（[`Channel`]、[`ChannelBuilder`]）
//! - 接收线程：只做就绪检测，通过事件队列通知消费端
//! - 就绪交接（互斥锁 + 条件变量），每批数据只通知一次
//! - 消费端批量读取与监听器分发
//! - TOML 配置（[`ChannelConfig`]）
//!
//! # 使用场景
//!
//! 适用于需要直接收发 CAN / CAN FD 帧、并希望所有回调都在自己线程上执行的场景。

mod builder;
mod channel;
pub mod config;
mod dispatch;
mod error;
mod handoff;
pub mod hooks;
mod receiver;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use builder::{ChannelBuilder, ChannelOptions};
pub use channel::Channel;
pub use config::{ChannelConfig, FilterEntry};
pub use dispatch::DispatchReport;
pub use error::ChannelError;
pub use hooks::{
    ChannelListener, ListenerContext, ListenerFault, ListenerKind, ListenerResult,
    message_listener, stopped_listener,
};
pub use receiver::ChannelEvent;
