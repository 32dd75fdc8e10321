//! CAN / CAN FD 帧模型
//!
//! `Frame` 是协议层和 socket 层之间的统一抽象：
//!
//! ```text
//! rawcan-protocol   Frame / SignalCodec（无硬件依赖）
//!     ↓
//! rawcan-socket     线上布局编解码（16 字节 can_frame / 72 字节 canfd_frame）
//!     ↓
//! Kernel (PF_CAN, SOCK_RAW)
//! ```
//!
//! 数据固定存放在 64 字节缓冲区中，真实长度之外的字节始终为 0，
//! 因此位提取越过真实长度时读到的是 0。

use crate::constants::{CAN_EFF_MASK, CAN_MAX_DLEN, CAN_SFF_MASK, CANFD_MAX_DLEN};
use crate::error::ProtocolError;
use crate::signal::{BitLayout, SignalValue};
use std::time::{SystemTime, UNIX_EPOCH};

/// 帧格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrameFormat {
    /// 经典 CAN，数据 0-8 字节
    #[default]
    Classic,
    /// CAN FD，数据 0-64 字节，线上长度取离散档位
    Fd,
}

impl FrameFormat {
    /// 该格式允许的最大数据长度
    pub const fn max_len(self) -> usize {
        match self {
            FrameFormat::Classic => CAN_MAX_DLEN,
            FrameFormat::Fd => CANFD_MAX_DLEN,
        }
    }
}

/// 帧标志位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameFlags {
    /// 扩展帧（29-bit ID）
    pub extended: bool,
    /// 远程帧
    pub remote: bool,
    /// 错误帧（ID 字段携带错误类别）
    pub error: bool,
    /// 比特率切换，仅 FD
    pub brs: bool,
    /// 错误状态指示，仅 FD
    pub esi: bool,
}

/// 墙钟时间戳（秒 + 微秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timestamp {
    pub sec: i64,
    pub usec: i64,
}

impl Timestamp {
    pub const fn new(sec: i64, usec: i64) -> Self {
        Self { sec, usec }
    }

    /// 当前墙钟时间，时钟早于 UNIX 纪元时返回 `None`
    pub fn now() -> Option<Self> {
        Self::from_system_time(SystemTime::now())
    }

    pub fn from_system_time(time: SystemTime) -> Option<Self> {
        let since_epoch = time.duration_since(UNIX_EPOCH).ok()?;
        Some(Self {
            sec: i64::try_from(since_epoch.as_secs()).ok()?,
            usec: i64::from(since_epoch.subsec_micros()),
        })
    }

    /// 总微秒数
    pub fn as_micros(&self) -> i64 {
        self.sec.saturating_mul(1_000_000).saturating_add(self.usec)
    }
}

/// CAN / CAN FD 帧
///
/// # 示例
///
/// ```rust
/// use rawcan_protocol::{Frame, FrameFormat};
///
/// let frame = Frame::classic(0x123, &[1, 2, 3, 4]).unwrap();
/// assert_eq!(frame.id(), 0x123);
/// assert_eq!(frame.data(), &[1, 2, 3, 4]);
/// assert_eq!(frame.format(), FrameFormat::Classic);
///
/// let fd = Frame::fd(0x1ABCDE, &[0xAA; 9]).unwrap().extended().with_brs();
/// assert!(fd.is_extended() && fd.is_brs());
/// assert_eq!(fd.len(), 9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Frame {
    id: u32,
    flags: FrameFlags,
    format: FrameFormat,
    #[cfg_attr(feature = "serde", serde(with = "payload_serde"))]
    data: [u8; CANFD_MAX_DLEN],
    len: u8,
    /// 接收时来自内核（需开启时间戳），发送成功后由本地时钟填写
    pub timestamp: Option<Timestamp>,
}

impl Frame {
    /// 创建经典 CAN 数据帧
    pub fn classic(id: u32, data: &[u8]) -> Result<Self, ProtocolError> {
        Self::new(FrameFormat::Classic, id, data)
    }

    /// 创建 CAN FD 数据帧
    ///
    /// 长度可以不在离散档位上，发送时向上补零到最近档位。
    pub fn fd(id: u32, data: &[u8]) -> Result<Self, ProtocolError> {
        Self::new(FrameFormat::Fd, id, data)
    }

    pub fn new(format: FrameFormat, id: u32, data: &[u8]) -> Result<Self, ProtocolError> {
        if id > CAN_EFF_MASK {
            return Err(ProtocolError::InvalidCanId { id });
        }
        let mut frame = Self {
            id,
            flags: FrameFlags::default(),
            format,
            data: [0u8; CANFD_MAX_DLEN],
            len: 0,
            timestamp: None,
        };
        frame.set_data(data)?;
        Ok(frame)
    }

    /// 标记为扩展帧
    #[must_use]
    pub fn extended(mut self) -> Self {
        self.flags.extended = true;
        self
    }

    /// 标记为远程帧
    #[must_use]
    pub fn remote(mut self) -> Self {
        self.flags.remote = true;
        self
    }

    /// 设置 BRS，仅对 FD 帧有效
    #[must_use]
    pub fn with_brs(mut self) -> Self {
        self.flags.brs = self.format == FrameFormat::Fd;
        self
    }

    /// 设置 ESI，仅对 FD 帧有效
    #[must_use]
    pub fn with_esi(mut self) -> Self {
        self.flags.esi = self.format == FrameFormat::Fd;
        self
    }

    /// 直接指定全部标志位（socket 层解码使用）
    #[must_use]
    pub fn with_flags(mut self, flags: FrameFlags) -> Self {
        self.flags = flags;
        if self.format == FrameFormat::Classic {
            self.flags.brs = false;
            self.flags.esi = false;
        }
        self
    }

    /// 以 FD 格式重新解释同一帧（ID、数据、扩展/远程标志保持不变）
    #[must_use]
    pub fn into_fd(mut self) -> Self {
        self.format = FrameFormat::Fd;
        self
    }

    /// 替换数据，旧数据的剩余部分清零
    pub fn set_data(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        let max = self.format.max_len();
        if data.len() > max {
            return Err(ProtocolError::PayloadTooLong {
                format: self.format,
                len: data.len(),
            });
        }
        self.data = [0u8; CANFD_MAX_DLEN];
        self.data[..data.len()].copy_from_slice(data);
        self.len = data.len() as u8;
        Ok(())
    }

    /// 将 FD 帧长度补齐到离散档位（新增字节为 0），经典帧不变
    pub fn pad_to_fd_len(&mut self) {
        if self.format == FrameFormat::Fd {
            self.len = crate::dlc::round_fd_len(self.len as usize) as u8;
        }
    }

    /// 检查 ID 是否落在标准/扩展帧的合法范围
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let limit = if self.flags.extended {
            CAN_EFF_MASK
        } else {
            CAN_SFF_MASK
        };
        // 错误帧的 ID 是错误类别，不受标准帧范围约束
        if !self.flags.error && self.id > limit {
            return Err(ProtocolError::InvalidCanId { id: self.id });
        }
        if self.len as usize > self.format.max_len() {
            return Err(ProtocolError::PayloadTooLong {
                format: self.format,
                len: self.len as usize,
            });
        }
        Ok(())
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn flags(&self) -> FrameFlags {
        self.flags
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    pub fn is_extended(&self) -> bool {
        self.flags.extended
    }

    pub fn is_remote(&self) -> bool {
        self.flags.remote
    }

    pub fn is_error(&self) -> bool {
        self.flags.error
    }

    pub fn is_fd(&self) -> bool {
        self.format == FrameFormat::Fd
    }

    pub fn is_brs(&self) -> bool {
        self.flags.brs
    }

    pub fn is_esi(&self) -> bool {
        self.flags.esi
    }

    /// 有效数据
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// 完整 64 字节缓冲区（真实长度之外为 0）
    pub fn padded_data(&self) -> &[u8; CANFD_MAX_DLEN] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn timestamp(&self) -> Option<Timestamp> {
        self.timestamp
    }

    /// 按位段读取信号，越过真实长度的位读作 0
    pub fn signal(&self, layout: BitLayout, signed: bool) -> SignalValue {
        layout.decode(&self.data[..8], signed)
    }

    /// 按位段写入信号，必要时把数据长度扩展到覆盖该位段的字节
    pub fn set_signal(&mut self, layout: BitLayout, raw: u64) {
        let needed = layout.bytes_spanned();
        if (self.len as usize) < needed && needed <= self.format.max_len() {
            self.len = needed as u8;
        }
        layout.encode(&mut self.data[..8], raw);
    }
}

#[cfg(feature = "serde")]
mod payload_serde {
    use crate::constants::CANFD_MAX_DLEN;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8; CANFD_MAX_DLEN], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(data.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; CANFD_MAX_DLEN], D::Error> {
        let bytes = Vec::<u8>::deserialize(d)?;
        if bytes.len() > CANFD_MAX_DLEN {
            return Err(D::Error::invalid_length(bytes.len(), &"at most 64 bytes"));
        }
        let mut out = [0u8; CANFD_MAX_DLEN];
        out[..bytes.len()].copy_from_slice(&bytes);
        Ok(out)
    }
}
