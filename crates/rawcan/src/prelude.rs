//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use rawcan::prelude::*;
//! ```

// 通道
pub use crate::driver::{
    Channel, ChannelBuilder, ChannelConfig, ChannelEvent, ChannelListener, ChannelOptions,
    ListenerKind,
};

// 帧与信号
pub use crate::protocol::{
    BitLayout, ByteOrder, Frame, FrameFlags, FrameFormat, MessageSpec, SignalSpec, SignalValue,
    Timestamp,
};

// socket 层
pub use crate::socket::{BusSocket, Filter};

// 错误类型
pub use crate::driver::ChannelError;
pub use crate::protocol::ProtocolError;
pub use crate::socket::CanError;
