//! rawcan - Linux 原始 CAN / CAN FD 通道
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **协议层** (`protocol`): 帧类型、FD 长度表、位级信号编解码、报文描述
//! - **socket 层** (`socket`): `PF_CAN` 原始 socket、线上布局、过滤器
//! - **驱动层** (`driver`): 通道生命周期、只做就绪检测的接收线程、消费端分发
//!
//! # 快速开始
//!
//! ```no_run
//! use rawcan::prelude::*;
//! use std::time::Duration;
//!
//! rawcan::logging::init();
//!
//! let mut channel = Channel::open(ChannelOptions::new("vcan0"))?;
//! channel.set_rx_filter(Filter::new(0x100, 0x700))?;
//! channel.on_message(|frame: &Frame| {
//!     println!("0x{:03X} {:02X?}", frame.id(), frame.data());
//!     Ok(())
//! })?;
//! channel.start()?;
//!
//! loop {
//!     channel.process_events(Duration::from_millis(100))?;
//! }
//! # Ok::<(), rawcan::ChannelError>(())
//! ```
//!
//! 信号编解码不依赖 socket：
//!
//! ```rust
//! use rawcan::{ByteOrder, decode_signal, encode_signal};
//!
//! let mut data = [0u8; 8];
//! encode_signal(&mut data, 8, 12, ByteOrder::Intel, 0xABC).unwrap();
//! let value = decode_signal(&data, 8, 12, ByteOrder::Intel, false).unwrap();
//! assert_eq!(value.to_bits(), 0xABC);
//! ```

pub mod logging;
pub mod prelude;

pub use rawcan_driver as driver;
pub use rawcan_protocol as protocol;
pub use rawcan_socket as socket;

// 常用类型
pub use driver::{Channel, ChannelBuilder, ChannelConfig, ChannelError, ChannelEvent, ChannelOptions};
pub use protocol::{
    BitLayout, ByteOrder, Frame, FrameFormat, MessageSpec, ProtocolError, SignalSpec, SignalValue,
    decode_signal, encode_signal, fd_dlc_to_len, fd_len_to_dlc, round_fd_len,
};
pub use socket::{CanError, Filter};
