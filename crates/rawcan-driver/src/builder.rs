//! 通道参数与 Builder
//!
//! 提供链式构造 `Channel` 实例的便捷方式。

use crate::channel::Channel;
use crate::error::ChannelError;
use rawcan_protocol::CAN_RAW;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 通道打开参数
///
/// 可直接从 TOML 反序列化，缺省字段取默认值。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelOptions {
    /// 接口名（如 "can0"、"vcan0"）
    pub interface: String,
    /// 读取内核接收时间戳（`SO_TIMESTAMP`）
    pub timestamps: bool,
    /// `socket()` 的协议号，默认 `CAN_RAW`
    pub protocol: i32,
    /// 发送不阻塞，内核队列满时立即返回错误
    pub non_blocking_send: bool,
    /// 每次 `FramesReady` 最多读取的帧数
    pub max_frames_per_wake: usize,
    /// 接收线程的 poll 超时（毫秒），决定观察退出请求的最长延迟
    pub poll_interval_ms: u64,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            interface: String::from("can0"),
            timestamps: false,
            protocol: CAN_RAW,
            non_blocking_send: false,
            max_frames_per_wake: 100,
            poll_interval_ms: 100,
        }
    }
}

impl ChannelOptions {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            ..Self::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 检查与接口无关的参数（接口名由 socket 层在打开时检查）
    pub fn validate(&self) -> Result<(), ChannelError> {
        if self.max_frames_per_wake == 0 {
            return Err(ChannelError::InvalidArgument(
                "max_frames_per_wake must be at least 1".into(),
            ));
        }
        if self.poll_interval_ms == 0 || self.poll_interval_ms > u64::from(u16::MAX) {
            return Err(ChannelError::InvalidArgument(format!(
                "poll_interval_ms must be in 1..={}, got {}",
                u16::MAX,
                self.poll_interval_ms
            )));
        }
        Ok(())
    }

    #[cfg(target_os = "linux")]
    pub fn socket_config(&self) -> rawcan_socket::SocketConfig {
        rawcan_socket::SocketConfig {
            interface: self.interface.clone(),
            timestamps: self.timestamps,
            protocol: self.protocol,
            non_blocking_send: self.non_blocking_send,
        }
    }
}

/// Channel Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use rawcan_driver::ChannelBuilder;
/// use std::time::Duration;
///
/// let channel = ChannelBuilder::new("vcan0")
///     .timestamps(true)
///     .max_frames_per_wake(32)
///     .poll_interval(Duration::from_millis(50))
///     .build()
///     .unwrap();
/// assert!(channel.is_valid());
/// ```
#[derive(Debug, Clone)]
pub struct ChannelBuilder {
    options: ChannelOptions,
}

impl ChannelBuilder {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            options: ChannelOptions::new(interface),
        }
    }

    pub fn from_options(options: ChannelOptions) -> Self {
        Self { options }
    }

    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.options.timestamps = enabled;
        self
    }

    pub fn protocol(mut self, protocol: i32) -> Self {
        self.options.protocol = protocol;
        self
    }

    pub fn non_blocking_send(mut self, enabled: bool) -> Self {
        self.options.non_blocking_send = enabled;
        self
    }

    pub fn max_frames_per_wake(mut self, max: usize) -> Self {
        self.options.max_frames_per_wake = max;
        self
    }

    /// 不足 1 毫秒按 1 毫秒计
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.options.poll_interval_ms = (interval.as_millis() as u64).max(1);
        self
    }

    pub fn options(&self) -> &ChannelOptions {
        &self.options
    }

    /// 打开通道，失败时返回绑定错误
    #[cfg(target_os = "linux")]
    pub fn build(self) -> Result<Channel, ChannelError> {
        Channel::open(self.options)
    }

    /// 打开通道，失败时返回无效通道
    pub fn build_lenient(self) -> Channel {
        Channel::open_lenient(self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ChannelOptions::default();
        assert_eq!(options.interface, "can0");
        assert!(!options.timestamps);
        assert_eq!(options.protocol, 1);
        assert!(!options.non_blocking_send);
        assert_eq!(options.max_frames_per_wake, 100);
        assert_eq!(options.poll_interval(), Duration::from_millis(100));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let builder = ChannelBuilder::new("vcan1")
            .timestamps(true)
            .non_blocking_send(true)
            .max_frames_per_wake(8)
            .poll_interval(Duration::from_micros(10));
        let options = builder.options();
        assert_eq!(options.interface, "vcan1");
        assert!(options.timestamps);
        assert!(options.non_blocking_send);
        assert_eq!(options.max_frames_per_wake, 8);
        assert_eq!(options.poll_interval_ms, 1);
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let options = ChannelOptions {
            max_frames_per_wake: 0,
            ..ChannelOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ChannelError::InvalidArgument(_))
        ));

        let options = ChannelOptions {
            poll_interval_ms: 100_000,
            ..ChannelOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let options: ChannelOptions =
            toml::from_str("interface = \"vcan0\"\ntimestamps = true\n").unwrap();
        assert_eq!(options.interface, "vcan0");
        assert!(options.timestamps);
        assert_eq!(options.max_frames_per_wake, 100);
    }
}
