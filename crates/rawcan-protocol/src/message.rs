//! 信号与报文描述
//!
//! 在 SignalCodec 之上提供物理量换算（`raw * factor + bias`）和复用（mux）报文。
//! 这里只描述已知的报文结构，不解析任何数据库文件。

use crate::dlc::round_fd_len;
use crate::error::ProtocolError;
use crate::frame::{Frame, FrameFormat};
use crate::signal::{BitLayout, SignalValue};

/// 单个信号的描述
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SignalSpec {
    pub name: String,
    pub layout: BitLayout,
    pub signed: bool,
    /// 物理值 = 原始值 * factor + bias
    pub factor: f64,
    pub bias: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// 所属复用组，空表示不受复用器控制
    pub mux_group: Vec<u64>,
}

impl SignalSpec {
    pub fn new(name: impl Into<String>, layout: BitLayout) -> Self {
        Self {
            name: name.into(),
            layout,
            signed: false,
            factor: 1.0,
            bias: 0.0,
            min: None,
            max: None,
            mux_group: Vec::new(),
        }
    }

    #[must_use]
    pub fn signed(mut self) -> Self {
        self.signed = true;
        self
    }

    #[must_use]
    pub fn scale(mut self, factor: f64, bias: f64) -> Self {
        self.factor = factor;
        self.bias = bias;
        self
    }

    #[must_use]
    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    #[must_use]
    pub fn in_mux_group(mut self, mux: u64) -> Self {
        self.mux_group.push(mux);
        self
    }

    /// 当前复用值下该信号是否有效
    pub fn active_for(&self, mux: Option<u64>) -> bool {
        match mux {
            Some(value) if !self.mux_group.is_empty() => self.mux_group.contains(&value),
            _ => true,
        }
    }

    pub fn in_range(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }

    /// 读取原始值
    pub fn decode_raw(&self, data: &[u8]) -> SignalValue {
        self.layout.decode(data, self.signed)
    }

    /// 读取物理值
    pub fn decode(&self, data: &[u8]) -> f64 {
        self.decode_raw(data).as_f64() * self.factor + self.bias
    }

    /// 物理值换算为原始位模式：`round((value - bias) / factor)`
    pub fn to_raw(&self, value: f64) -> Result<u64, ProtocolError> {
        if self.factor == 0.0 || !self.factor.is_finite() {
            return Err(ProtocolError::InvalidScale {
                signal: self.name.clone(),
                factor: self.factor,
            });
        }
        if !self.in_range(value) {
            return Err(ProtocolError::ValueOutOfRange {
                signal: self.name.clone(),
                value,
                min: self.min.unwrap_or(f64::NEG_INFINITY),
                max: self.max.unwrap_or(f64::INFINITY),
            });
        }
        let raw = ((value - self.bias) / self.factor).round();
        Ok(if self.signed || raw < 0.0 {
            (raw as i64) as u64
        } else {
            raw as u64
        })
    }

    /// 写入物理值
    pub fn encode(&self, data: &mut [u8], value: f64) -> Result<(), ProtocolError> {
        let raw = self.to_raw(value)?;
        self.layout.encode(data, raw);
        Ok(())
    }
}

/// 解码得到的单个信号值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalReading<'a> {
    pub name: &'a str,
    pub raw: SignalValue,
    pub value: f64,
    /// 物理值是否落在 `[min, max]` 内
    pub in_range: bool,
}

/// 解码得到的报文
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage<'a> {
    pub mux: Option<u64>,
    pub signals: Vec<SignalReading<'a>>,
}

impl DecodedMessage<'_> {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.signals
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.value)
    }
}

/// 报文描述
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MessageSpec {
    pub name: String,
    pub id: u32,
    pub extended: bool,
    /// 报文数据长度，超过 8 时按 FD 帧发送
    pub length: usize,
    pub multiplexor: Option<BitLayout>,
    pub signals: Vec<SignalSpec>,
}

impl MessageSpec {
    pub fn new(name: impl Into<String>, id: u32, length: usize) -> Self {
        Self {
            name: name.into(),
            id,
            extended: false,
            length,
            multiplexor: None,
            signals: Vec::new(),
        }
    }

    #[must_use]
    pub fn extended(mut self) -> Self {
        self.extended = true;
        self
    }

    #[must_use]
    pub fn multiplexed_by(mut self, layout: BitLayout) -> Self {
        self.multiplexor = Some(layout);
        self
    }

    #[must_use]
    pub fn with_signal(mut self, signal: SignalSpec) -> Self {
        self.signals.push(signal);
        self
    }

    pub fn signal(&self, name: &str) -> Option<&SignalSpec> {
        self.signals.iter().find(|s| s.name == name)
    }

    /// 帧的 ID 和扩展标志是否与本报文一致
    pub fn matches(&self, frame: &Frame) -> bool {
        frame.id() == self.id && frame.is_extended() == self.extended
    }

    /// 解码一帧
    ///
    /// 远程帧、错误帧以及 ID 不匹配的帧返回 `None`。
    pub fn decode<'a>(&'a self, frame: &Frame) -> Option<DecodedMessage<'a>> {
        if frame.is_remote() || frame.is_error() || !self.matches(frame) {
            return None;
        }
        let data = &frame.padded_data()[..8];
        let mux = self.multiplexor.map(|layout| layout.extract(data));
        let signals = self
            .signals
            .iter()
            .filter(|s| s.active_for(mux))
            .map(|s| {
                let raw = s.decode_raw(data);
                let value = raw.as_f64() * s.factor + s.bias;
                SignalReading {
                    name: &s.name,
                    raw,
                    value,
                    in_range: s.in_range(value),
                }
            })
            .collect();
        Some(DecodedMessage { mux, signals })
    }

    /// 构建一帧
    ///
    /// 未给出的信号保持为 0；不属于当前复用组的信号被忽略。
    pub fn encode(&self, values: &[(&str, f64)], mux: Option<u64>) -> Result<Frame, ProtocolError> {
        let format = if self.length > FrameFormat::Classic.max_len() {
            FrameFormat::Fd
        } else {
            FrameFormat::Classic
        };
        let len = match format {
            FrameFormat::Classic => self.length,
            FrameFormat::Fd => round_fd_len(self.length),
        };
        let mut data = [0u8; 8];

        if let (Some(layout), Some(mux)) = (self.multiplexor, mux) {
            layout.encode(&mut data, mux);
        }

        for &(name, value) in values {
            let signal = self
                .signal(name)
                .ok_or_else(|| ProtocolError::UnknownSignal(name.to_string()))?;
            if signal.active_for(mux) {
                signal.encode(&mut data, value)?;
            }
        }

        let mut payload = [0u8; 64];
        let n = len.min(8);
        payload[..n].copy_from_slice(&data[..n]);

        let frame = Frame::new(format, self.id, &payload[..len])?;
        let frame = if self.extended { frame.extended() } else { frame };
        frame.validate()?;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::ByteOrder;

    fn layout(offset: u32, length: u32, order: ByteOrder) -> BitLayout {
        BitLayout::new(offset, length, order).unwrap()
    }

    fn engine_message() -> MessageSpec {
        MessageSpec::new("Engine", 0x100, 8)
            .with_signal(
                SignalSpec::new("rpm", layout(0, 16, ByteOrder::Intel))
                    .scale(0.25, 0.0)
                    .range(0.0, 16000.0),
            )
            .with_signal(
                SignalSpec::new("coolant", layout(16, 8, ByteOrder::Intel))
                    .scale(1.0, -40.0)
                    .range(-40.0, 215.0),
            )
            .with_signal(
                SignalSpec::new("torque", layout(24, 16, ByteOrder::Intel))
                    .signed()
                    .scale(0.5, 0.0),
            )
    }

    #[test]
    fn test_decode_scaled_signals() {
        let frame = Frame::classic(0x100, &[0x40, 0x1F, 0x82, 0xF6, 0xFF, 0, 0, 0]).unwrap();
        let msg = engine_message();
        let decoded = msg.decode(&frame).unwrap();

        assert_eq!(decoded.get("rpm"), Some(2000.0));
        assert_eq!(decoded.get("coolant"), Some(90.0));
        assert_eq!(decoded.get("torque"), Some(-5.0));
        assert!(decoded.signals.iter().all(|s| s.in_range));
    }

    #[test]
    fn test_decode_skips_remote_and_mismatch() {
        let msg = engine_message();
        let remote = Frame::classic(0x100, &[]).unwrap().remote();
        assert!(msg.decode(&remote).is_none());

        let other = Frame::classic(0x101, &[0; 8]).unwrap();
        assert!(msg.decode(&other).is_none());

        let extended = Frame::classic(0x100, &[0; 8]).unwrap().extended();
        assert!(msg.decode(&extended).is_none());
    }

    #[test]
    fn test_encode_roundtrip_physical() {
        let msg = engine_message();
        let frame = msg
            .encode(&[("rpm", 2000.0), ("coolant", 90.0), ("torque", -5.0)], None)
            .unwrap();
        assert_eq!(frame.data(), &[0x40, 0x1F, 0x82, 0xF6, 0xFF, 0, 0, 0]);

        let decoded = msg.decode(&frame).unwrap();
        assert_eq!(decoded.get("torque"), Some(-5.0));
    }

    #[test]
    fn test_encode_rejects_out_of_range_and_unknown() {
        let msg = engine_message();
        assert!(matches!(
            msg.encode(&[("coolant", 300.0)], None),
            Err(ProtocolError::ValueOutOfRange { .. })
        ));
        assert_eq!(
            msg.encode(&[("boost", 1.0)], None),
            Err(ProtocolError::UnknownSignal("boost".into()))
        );
    }

    #[test]
    fn test_zero_factor_rejected() {
        let signal = SignalSpec::new("x", layout(0, 8, ByteOrder::Intel)).scale(0.0, 0.0);
        assert!(matches!(
            signal.to_raw(1.0),
            Err(ProtocolError::InvalidScale { .. })
        ));
    }

    #[test]
    fn test_multiplexed_message() {
        let msg = MessageSpec::new("Diag", 0x18DA_F110, 8)
            .extended()
            .multiplexed_by(layout(0, 8, ByteOrder::Intel))
            .with_signal(SignalSpec::new("voltage", layout(8, 16, ByteOrder::Intel)).in_mux_group(1))
            .with_signal(SignalSpec::new("current", layout(8, 16, ByteOrder::Intel)).in_mux_group(2))
            .with_signal(SignalSpec::new("counter", layout(56, 8, ByteOrder::Intel)));

        let frame = msg
            .encode(&[("voltage", 1200.0), ("current", 7.0), ("counter", 3.0)], Some(1))
            .unwrap();
        assert!(frame.is_extended());
        assert_eq!(&frame.data()[..3], &[0x01, 0xB0, 0x04]);

        let decoded = msg.decode(&frame).unwrap();
        assert_eq!(decoded.mux, Some(1));
        assert_eq!(decoded.get("voltage"), Some(1200.0));
        assert_eq!(decoded.get("current"), None);
        assert_eq!(decoded.get("counter"), Some(3.0));
    }

    #[test]
    fn test_long_message_uses_fd() {
        let msg = MessageSpec::new("Long", 0x200, 20)
            .with_signal(SignalSpec::new("a", layout(0, 8, ByteOrder::Motorola)));
        let frame = msg.encode(&[("a", 0x5A as f64)], None).unwrap();
        assert!(frame.is_fd());
        assert_eq!(frame.len(), 20);
        assert_eq!(frame.data()[0], 0x5A);

        let odd = MessageSpec::new("Odd", 0x201, 10).encode(&[], None).unwrap();
        assert_eq!(odd.len(), 12);
    }
}
