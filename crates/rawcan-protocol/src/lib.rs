//! # rawcan Protocol
//!
//! CAN / CAN FD 帧模型与位级信号编解码（无硬件依赖）
//!
//! ## 模块
//!
//! - `constants`: 内核帧标志位与掩码
//! - `dlc`: CAN FD 长度查找表
//! - `frame`: 帧模型
//! - `signal`: 位级信号编解码
//! - `message`: 信号 / 报文描述（物理量换算、复用）
//!
//! ## 位编号
//!
//! 信号支持 Motorola（大端）和 Intel（小端）两种位编号，
//! 均在 8 字节数据视图上操作。

pub mod constants;
pub mod dlc;
pub mod error;
pub mod frame;
pub mod message;
pub mod signal;

pub use constants::*;
pub use dlc::{
    CANFD_LEN_SET, DLC_TO_LEN, LEN_TO_DLC, fd_dlc_to_len, fd_len_to_dlc, is_valid_fd_len,
    round_fd_len,
};
pub use error::ProtocolError;
pub use frame::{Frame, FrameFlags, FrameFormat, Timestamp};
pub use message::{DecodedMessage, MessageSpec, SignalReading, SignalSpec};
pub use signal::{BitLayout, ByteOrder, SignalValue, decode_signal, encode_signal, mask};
