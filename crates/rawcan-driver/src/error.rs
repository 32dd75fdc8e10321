//! 驱动层错误类型定义

use crate::hooks::ListenerFault;
use rawcan_protocol::ProtocolError;
use rawcan_socket::CanError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum ChannelError {
    /// socket 层错误（绑定失败、发送失败、过滤器分配失败等）
    #[error("CAN socket error: {0}")]
    Can(#[from] CanError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 调用参数不合法，在任何系统调用之前拒绝
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// 通道打开失败，之后的所有操作都返回此错误
    #[error("Invalid channel '{interface}': {cause}")]
    InvalidChannel { interface: String, cause: String },

    #[error("Channel already started")]
    AlreadyStarted,

    #[error("Channel not started")]
    NotStarted,

    /// 监听器执行失败（返回错误或 panic）
    #[error("Listener fault: {0}")]
    ListenerFault(#[from] ListenerFault),

    /// 接收线程创建失败
    #[error("Failed to spawn receiver thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::ListenerKind;

    #[test]
    fn test_channel_error_display() {
        let err = ChannelError::InvalidChannel {
            interface: "can7".into(),
            cause: "No such device".into(),
        };
        assert_eq!(err.to_string(), "Invalid channel 'can7': No such device");

        let err: ChannelError = ListenerFault {
            kind: ListenerKind::Message,
            index: 1,
            message: "boom".into(),
        }
        .into();
        let msg = err.to_string();
        assert!(msg.contains("onMessage"), "{}", msg);
        assert!(msg.contains("boom"), "{}", msg);

        let err: ChannelError = ProtocolError::InvalidCanId { id: 0x800 }.into();
        assert!(err.to_string().contains("0x800"));
    }
}
