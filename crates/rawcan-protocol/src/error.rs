//! 协议层错误类型

use crate::frame::FrameFormat;
use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// 信号位段越界（`length == 0`、`length > 64` 或 `offset + length > 64`）
    #[error("Signal bit range out of bounds: offset {offset}, length {length}")]
    CodecRange { offset: u32, length: u32 },

    /// 数据长度超出帧格式上限
    #[error("Payload of {len} bytes exceeds the {format:?} maximum")]
    PayloadTooLong { format: FrameFormat, len: usize },

    #[error("Invalid CAN ID: 0x{id:X}")]
    InvalidCanId { id: u32 },

    /// 未知的字节序编码
    #[error("Invalid byte order: {0}")]
    InvalidByteOrder(u8),

    /// 缩放因子为 0 或非有限值
    #[error("Invalid scale for signal {signal}: factor {factor}")]
    InvalidScale { signal: String, factor: f64 },

    /// 物理值超出信号定义范围
    #[error("Value {value} out of range [{min}, {max}] for signal {signal}")]
    ValueOutOfRange {
        signal: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Unknown signal: {0}")]
    UnknownSignal(String),
}
