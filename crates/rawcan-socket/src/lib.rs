//! # rawcan Socket Layer
//!
//! 原始 CAN socket 抽象层。
//!
//! - `BusSocket`: 驱动层使用的 socket 接口（就绪检测 / 非阻塞接收 / 发送 / 过滤器）
//! - `RawCanSocket`: Linux `PF_CAN` / `SOCK_RAW` 实现（仅 Linux）
//! - `wire`: 16 字节 `can_frame` 与 72 字节 `canfd_frame` 的线上布局
//! - `filter`: 接收过滤器

use std::collections::TryReserveError;
use std::io;
use std::time::Duration;
use thiserror::Error;

pub use rawcan_protocol::{Frame, FrameFlags, FrameFormat, ProtocolError, Timestamp};

pub mod filter;
pub mod wire;

pub use filter::Filter;

#[cfg(target_os = "linux")]
pub mod error_frame;
#[cfg(target_os = "linux")]
mod interface_check;
#[cfg(target_os = "linux")]
pub mod socket;

#[cfg(target_os = "linux")]
pub use error_frame::describe_error_frame;
#[cfg(target_os = "linux")]
pub use interface_check::check_interface_status;
#[cfg(target_os = "linux")]
pub use socket::{RawCanSocket, SocketConfig};

/// socket 层统一错误类型
#[derive(Error, Debug)]
pub enum CanError {
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    /// 打开 / 配置 / 绑定接口失败
    #[error("Failed to bind CAN interface '{interface}': {source}")]
    Bind {
        interface: String,
        #[source]
        source: io::Error,
    },

    /// 内核发送失败（保留原始 errno）
    #[error("Transmit failed: {0}")]
    Transmit(#[source] io::Error),

    /// 构建过滤器列表时内存不足
    #[error("Failed to allocate filter list: {0}")]
    Allocation(#[from] TryReserveError),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// 接口未协商 CAN FD，无法收发 FD 帧
    #[error("CAN FD frames are not enabled on '{0}'")]
    FdNotSupported(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl CanError {
    pub(crate) fn bind(interface: &str, source: io::Error) -> Self {
        CanError::Bind {
            interface: interface.to_string(),
            source,
        }
    }

    /// 发送失败时的原始 OS 错误码
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            CanError::Transmit(e) | CanError::Io(e) | CanError::Bind { source: e, .. } => {
                e.raw_os_error()
            },
            _ => None,
        }
    }
}

/// 一次就绪检测的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    /// 有数据可读
    pub readable: bool,
    /// 挂断或 socket 出错（POLLHUP / POLLERR / POLLNVAL）
    pub hangup: bool,
}

/// 驱动层使用的总线 socket 接口
///
/// 接收线程只调用 [`poll_readiness`](BusSocket::poll_readiness)，
/// 其余读写操作只在消费端调用，因此实现只需保证 `&self` 上的系统调用可并发。
pub trait BusSocket: Send + Sync {
    /// 绑定的接口名
    fn interface(&self) -> &str;

    /// 打开时协商得到的帧格式（`Fd` 表示可收发 FD 帧）
    fn format(&self) -> FrameFormat;

    /// 是否读取内核接收时间戳
    fn timestamps_enabled(&self) -> bool {
        false
    }

    /// 等待可读，最多 `timeout`；被信号打断时返回空结果
    fn poll_readiness(&self, timeout: Duration) -> Result<Readiness, CanError>;

    /// 非阻塞接收一帧，没有数据时返回 `Ok(None)`
    fn recv_nonblocking(&self) -> Result<Option<Frame>, CanError>;

    /// 发送一帧，返回写入的字节数
    fn send(&self, frame: &Frame) -> Result<usize, CanError>;

    /// 整体替换接收过滤器
    fn set_filters(&self, filters: &[Filter]) -> Result<(), CanError>;

    /// 设置错误帧掩码
    fn set_error_filter(&self, mask: u32) -> Result<(), CanError>;

    fn set_loopback(&self, enabled: bool) -> Result<(), CanError>;
}
