//! TOML 通道配置
//!
//! ```toml
//! error_mask = 0x1FFFFFFF
//! loopback = false
//!
//! [channel]
//! interface = "vcan0"
//! timestamps = true
//!
//! [[filters]]
//! id = 0x123
//! mask = 0x7FF
//!
//! [[filters]]
//! id = "0x200"
//! mask = "0x700"
//! invert = true
//! ```
//!
//! 过滤器条目按宽松规则解析：缺少字段、不是整数或超出 32 位的条目记录警告后跳过，
//! 不会让整个配置失败。

use crate::builder::ChannelOptions;
use crate::channel::Channel;
use crate::error::ChannelError;
use rawcan_socket::Filter;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// 未经校验的过滤器条目
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterEntry {
    pub id: Option<toml::Value>,
    pub mask: Option<toml::Value>,
    pub invert: bool,
}

fn parse_u32(value: &toml::Value) -> Option<u32> {
    match value {
        toml::Value::Integer(i) => u32::try_from(*i).ok(),
        toml::Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => s.parse().ok(),
            }
        },
        _ => None,
    }
}

impl FilterEntry {
    /// 校验并转换为过滤器，非法条目返回 `None`
    pub fn to_filter(&self) -> Option<Filter> {
        let id = self.id.as_ref().and_then(parse_u32)?;
        let mask = self.mask.as_ref().and_then(parse_u32)?;
        let filter = Filter::new(id, mask);
        Some(if self.invert { filter.inverted() } else { filter })
    }
}

fn default_loopback() -> bool {
    true
}

/// 通道配置文件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub channel: ChannelOptions,
    #[serde(default)]
    pub filters: Vec<FilterEntry>,
    /// 覆盖默认的错误帧掩码（打开时为 `CAN_ERR_MASK`）
    #[serde(default)]
    pub error_mask: Option<u32>,
    #[serde(default = "default_loopback")]
    pub loopback: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            channel: ChannelOptions::default(),
            filters: Vec::new(),
            error_mask: None,
            loopback: true,
        }
    }
}

impl ChannelConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ChannelError> {
        toml::from_str(s).map_err(|e| ChannelError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ChannelError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ChannelError::Config(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded channel config from {}", path.display());
        Self::from_toml_str(&content)
    }

    /// 合法的过滤器，非法条目被跳过
    pub fn resolved_filters(&self) -> Vec<Filter> {
        self.filters
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let filter = entry.to_filter();
                if filter.is_none() {
                    warn!("Skipping malformed filter entry #{}: {:?}", index, entry);
                }
                filter
            })
            .collect()
    }

    /// 把过滤器、错误掩码和回环设置应用到已打开的通道
    pub fn apply(&self, channel: &Channel) -> Result<(), ChannelError> {
        channel.set_rx_filters(&self.resolved_filters())?;
        if let Some(mask) = self.error_mask {
            channel.set_error_filter(mask)?;
        }
        if !self.loopback {
            channel.disable_loopback()?;
        }
        Ok(())
    }

    /// 打开通道并应用配置
    #[cfg(target_os = "linux")]
    pub fn open(&self) -> Result<Channel, ChannelError> {
        let channel = Channel::open(self.channel.clone())?;
        self.apply(&channel)?;
        Ok(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSocket;
    use std::sync::Arc;

    const SAMPLE: &str = r#"
error_mask = 0x4
loopback = false

[channel]
interface = "vcan0"
timestamps = true
max_frames_per_wake = 16

[[filters]]
id = 0x123
mask = 0x7FF

[[filters]]
id = "0x200"
mask = "0x700"
invert = true

[[filters]]
id = 0x300

[[filters]]
id = "abc"
mask = 0x7FF

[[filters]]
id = -1
mask = 0x7FF

[[filters]]
id = 5000000000
mask = 0x7FF
"#;

    #[test]
    fn test_parse_sample() {
        let config = ChannelConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.channel.interface, "vcan0");
        assert!(config.channel.timestamps);
        assert_eq!(config.channel.max_frames_per_wake, 16);
        assert_eq!(config.channel.poll_interval_ms, 100);
        assert_eq!(config.error_mask, Some(0x4));
        assert!(!config.loopback);
        assert_eq!(config.filters.len(), 6);
    }

    #[test]
    fn test_malformed_filters_skipped() {
        let config = ChannelConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(
            config.resolved_filters(),
            vec![
                Filter::new(0x123, 0x7FF),
                Filter::new(0x200, 0x700).inverted()
            ]
        );
    }

    #[test]
    fn test_defaults() {
        let config = ChannelConfig::from_toml_str("").unwrap();
        assert_eq!(config, ChannelConfig::default());
        assert!(config.loopback);
    }

    #[test]
    fn test_syntax_error() {
        let err = ChannelConfig::from_toml_str("[channel\n").unwrap_err();
        assert!(matches!(err, ChannelError::Config(_)));
    }

    #[test]
    fn test_apply() {
        let socket = Arc::new(MockSocket::new("mock0"));
        let channel = Channel::from_socket(socket.clone(), ChannelOptions::new("mock0")).unwrap();
        let config = ChannelConfig::from_toml_str(SAMPLE).unwrap();
        config.apply(&channel).unwrap();

        assert_eq!(socket.filters().map(|f| f.len()), Some(2));
        assert_eq!(socket.error_mask(), Some(0x4));
        assert!(!socket.loopback());
    }

    #[test]
    fn test_apply_all_filters_malformed() {
        let socket = Arc::new(MockSocket::new("mock0"));
        let channel = Channel::from_socket(socket.clone(), ChannelOptions::new("mock0")).unwrap();
        let config =
            ChannelConfig::from_toml_str("[[filters]]\nid = \"zz\"\nmask = 1\n").unwrap();
        config.apply(&channel).unwrap();

        // 全部非法时保持原有过滤器
        assert_eq!(socket.filters(), None);
        assert!(socket.loopback());
        assert_eq!(socket.error_mask(), None);
    }

    #[test]
    fn test_from_missing_file() {
        let err = ChannelConfig::from_file("/nonexistent/rawcan.toml").unwrap_err();
        assert!(err.to_string().contains("rawcan.toml"));
    }
}
