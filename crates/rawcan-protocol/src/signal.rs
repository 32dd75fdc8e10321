//! 位级信号编解码（SignalCodec）
//!
//! 在 8 字节数据视图中按任意位偏移、任意位宽（1-64）读写整数，支持两种位编号：
//!
//! - **Motorola**：8 字节视为大端 u64 `D`，`shift = 64 - offset - length`
//! - **Intel**：8 字节视为小端 u64 `D`，`shift = offset`
//!
//! 读：`(D >> shift) & mask(length)`；有符号时按 `length` 位补码解释。
//! 写：清除位段后 OR 入 `(raw & mask(length)) << shift`，按同一字节序写回。
//!
//! 不足 8 字节的输入按 0 补齐，写回时只修改调用方提供的字节（最多 8 个）。
//!
//! # 示例
//!
//! ```rust
//! use rawcan_protocol::{ByteOrder, SignalValue, decode_signal, encode_signal};
//!
//! let mut data = [0u8; 8];
//! encode_signal(&mut data, 4, 8, ByteOrder::Intel, 0xEA).unwrap();
//! assert_eq!(&data[..2], &[0xA0, 0x0E]);
//!
//! let value = decode_signal(&data, 4, 8, ByteOrder::Intel, false).unwrap();
//! assert_eq!(value, SignalValue::Unsigned(0xEA));
//! ```

use crate::error::ProtocolError;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 信号位编号方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ByteOrder {
    /// 大端，位 0 为第 0 字节的最高位
    Motorola = 0,
    /// 小端，位 0 为第 0 字节的最低位
    Intel = 1,
}

impl ByteOrder {
    /// 从数值编码解析
    pub fn from_raw(raw: u8) -> Result<Self, ProtocolError> {
        Self::try_from(raw).map_err(|e| ProtocolError::InvalidByteOrder(e.number))
    }

    #[inline]
    fn load(self, data: &[u8]) -> u64 {
        let mut word = [0u8; 8];
        let n = data.len().min(8);
        word[..n].copy_from_slice(&data[..n]);
        match self {
            ByteOrder::Motorola => u64::from_be_bytes(word),
            ByteOrder::Intel => u64::from_le_bytes(word),
        }
    }

    #[inline]
    fn store(self, data: &mut [u8], value: u64) {
        let word = match self {
            ByteOrder::Motorola => value.to_be_bytes(),
            ByteOrder::Intel => value.to_le_bytes(),
        };
        let n = data.len().min(8);
        data[..n].copy_from_slice(&word[..n]);
    }
}

/// 解码结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalValue {
    Unsigned(u64),
    Signed(i64),
}

impl SignalValue {
    pub fn as_f64(self) -> f64 {
        match self {
            SignalValue::Unsigned(v) => v as f64,
            SignalValue::Signed(v) => v as f64,
        }
    }

    /// 原始位模式（有符号值按补码）
    pub fn to_bits(self) -> u64 {
        match self {
            SignalValue::Unsigned(v) => v,
            SignalValue::Signed(v) => v as u64,
        }
    }
}

/// `length` 位全 1 掩码，`mask(64)` 为 `u64::MAX`
#[inline]
pub const fn mask(length: u32) -> u64 {
    if length >= 64 {
        u64::MAX
    } else {
        (1u64 << length) - 1
    }
}

/// 经过校验的信号位段
///
/// `offset` 是信号最高位（Motorola）或最低位（Intel）在 64 位字中的位置：
/// Motorola 从第 0 字节最高位开始往后数，`offset = 7, length = 8` 覆盖
/// 第 0 字节最低位和第 1 字节高 7 位；Intel 从第 0 字节最低位开始往前数。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BitLayout {
    offset: u8,
    length: u8,
    order: ByteOrder,
}

impl BitLayout {
    /// 校验 `1 <= length <= 64` 且 `offset + length <= 64`
    pub fn new(offset: u32, length: u32, order: ByteOrder) -> Result<Self, ProtocolError> {
        let in_range = (1..=64).contains(&length)
            && offset.checked_add(length).is_some_and(|end| end <= 64);
        if !in_range {
            return Err(ProtocolError::CodecRange { offset, length });
        }
        Ok(Self {
            offset: offset as u8,
            length: length as u8,
            order,
        })
    }

    pub fn offset(&self) -> u32 {
        self.offset as u32
    }

    pub fn length(&self) -> u32 {
        self.length as u32
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// 位段覆盖到的字节数（从第 0 字节算起）
    pub fn bytes_spanned(&self) -> usize {
        (self.offset as usize + self.length as usize).div_ceil(8)
    }

    #[inline]
    fn shift(&self) -> u32 {
        match self.order {
            ByteOrder::Motorola => 64 - self.offset() - self.length(),
            ByteOrder::Intel => self.offset(),
        }
    }

    /// 读取无符号原始值
    #[inline]
    pub fn extract(&self, data: &[u8]) -> u64 {
        (self.order.load(data) >> self.shift()) & mask(self.length())
    }

    /// 读取信号；`signed` 时最高位为 1 的值按补码取负
    pub fn decode(&self, data: &[u8], signed: bool) -> SignalValue {
        let raw = self.extract(data);
        if signed {
            // 左移到最高位再算术右移，即 raw - (1 << length)
            let pad = 64 - self.length();
            SignalValue::Signed(((raw << pad) as i64) >> pad)
        } else {
            SignalValue::Unsigned(raw)
        }
    }

    /// 写入原始位模式，超出位宽的高位被掩掉
    pub fn encode(&self, data: &mut [u8], raw: u64) {
        let shift = self.shift();
        let field = mask(self.length()) << shift;
        let mut word = self.order.load(data);
        word &= !field;
        word |= (raw << shift) & field;
        self.order.store(data, word);
    }

    /// 写入有符号值（取 `length` 位补码）
    pub fn encode_signed(&self, data: &mut [u8], value: i64) {
        self.encode(data, value as u64);
    }
}

/// 读取信号
///
/// 位段非法时返回 [`ProtocolError::CodecRange`]。
pub fn decode_signal(
    data: &[u8],
    offset: u32,
    length: u32,
    order: ByteOrder,
    signed: bool,
) -> Result<SignalValue, ProtocolError> {
    Ok(BitLayout::new(offset, length, order)?.decode(data, signed))
}

/// 写入信号原始位模式
///
/// 位段非法时返回 [`ProtocolError::CodecRange`]，缓冲区保持不变。
pub fn encode_signal(
    data: &mut [u8],
    offset: u32,
    length: u32,
    order: ByteOrder,
    raw: u64,
) -> Result<(), ProtocolError> {
    BitLayout::new(offset, length, order)?.encode(data, raw);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEADBEEF: [u8; 8] = [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE, 0xBA, 0xBE];

    fn unsigned(data: &[u8], offset: u32, length: u32, order: ByteOrder) -> u64 {
        match decode_signal(data, offset, length, order, false).unwrap() {
            SignalValue::Unsigned(v) => v,
            SignalValue::Signed(_) => unreachable!(),
        }
    }

    fn signed(data: &[u8], offset: u32, length: u32, order: ByteOrder) -> i64 {
        match decode_signal(data, offset, length, order, true).unwrap() {
            SignalValue::Signed(v) => v,
            SignalValue::Unsigned(_) => unreachable!(),
        }
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask(1), 1);
        assert_eq!(mask(12), 0xFFF);
        assert_eq!(mask(63), u64::MAX >> 1);
        assert_eq!(mask(64), u64::MAX);
    }

    #[test]
    fn test_intel_decode() {
        assert_eq!(unsigned(&DEADBEEF, 0, 8, ByteOrder::Intel), 0xDE);
        assert_eq!(unsigned(&DEADBEEF, 0, 12, ByteOrder::Intel), 0xDDE);
        assert_eq!(unsigned(&DEADBEEF, 0, 16, ByteOrder::Intel), 0xADDE);
        assert_eq!(unsigned(&DEADBEEF, 12, 8, ByteOrder::Intel), 0xEA);
        assert_eq!(unsigned(&DEADBEEF, 12, 12, ByteOrder::Intel), 0xBEA);
        assert_eq!(unsigned(&DEADBEEF, 12, 20, ByteOrder::Intel), 0xEFBEA);
        assert_eq!(
            unsigned(&DEADBEEF, 0, 64, ByteOrder::Intel),
            0xBEBA_FECA_EFBE_ADDE
        );
    }

    #[test]
    fn test_intel_decode_16bit() {
        let data = [0x34, 0x12, 0, 0, 0, 0, 0, 0];
        assert_eq!(unsigned(&data, 0, 16, ByteOrder::Intel), 0x1234);
    }

    #[test]
    fn test_motorola_decode() {
        assert_eq!(unsigned(&DEADBEEF, 0, 8, ByteOrder::Motorola), 0xDE);
        assert_eq!(unsigned(&DEADBEEF, 0, 16, ByteOrder::Motorola), 0xDEAD);
        assert_eq!(unsigned(&DEADBEEF, 7, 8, ByteOrder::Motorola), 0x56);
        assert_eq!(unsigned(&DEADBEEF, 15, 16, ByteOrder::Motorola), 0xDF77);
        assert_eq!(
            unsigned(&DEADBEEF, 0, 64, ByteOrder::Motorola),
            0xDEAD_BEEF_CAFE_BABE
        );

        let bits: Vec<u64> = (0..4)
            .map(|i| unsigned(&DEADBEEF, i, 1, ByteOrder::Motorola))
            .collect();
        assert_eq!(bits, vec![1, 1, 0, 1]);
    }

    #[test]
    fn test_motorola_decode_crossing_byte() {
        let data = [0xFF, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(unsigned(&data, 0, 8, ByteOrder::Motorola), 0xFF);
        // 位 7 是第 0 字节最低位，其后 7 位来自第 1 字节
        assert_eq!(unsigned(&data, 7, 8, ByteOrder::Motorola), 0x80);
    }

    #[test]
    fn test_signed_decode() {
        let data = [0xFE, 0xFF, 0x80];
        assert_eq!(signed(&data, 8, 8, ByteOrder::Intel), -1);
        assert_eq!(signed(&data, 0, 16, ByteOrder::Intel), -2);
        assert_eq!(signed(&data, 16, 8, ByteOrder::Intel), -128);
        assert_eq!(signed(&data, 0, 8, ByteOrder::Intel), -2);
        // 最高位为 0 时与无符号一致
        assert_eq!(signed(&[0x7F], 0, 8, ByteOrder::Intel), 127);
        assert_eq!(signed(&[0xFF; 8], 0, 64, ByteOrder::Intel), -1);
    }

    #[test]
    fn test_intel_encode_sequence() {
        let mut data = [0u8; 3];
        encode_signal(&mut data, 0, 1, ByteOrder::Intel, 1).unwrap();
        encode_signal(&mut data, 1, 1, ByteOrder::Intel, 1).unwrap();
        encode_signal(&mut data, 2, 1, ByteOrder::Intel, 0).unwrap();
        encode_signal(&mut data, 3, 1, ByteOrder::Intel, 1).unwrap();
        assert_eq!(data[0], 0x0B);

        encode_signal(&mut data, 4, 8, ByteOrder::Intel, 0xEA).unwrap();
        assert_eq!(&data[..2], &[0xAB, 0x0E]);

        encode_signal(&mut data, 12, 12, ByteOrder::Intel, 0xEDB).unwrap();
        assert_eq!(data, [0xAB, 0xBE, 0xED]);
    }

    #[test]
    fn test_motorola_encode_sequence() {
        let mut data = [0u8; 3];
        encode_signal(&mut data, 0, 1, ByteOrder::Motorola, 1).unwrap();
        encode_signal(&mut data, 1, 1, ByteOrder::Motorola, 1).unwrap();
        encode_signal(&mut data, 2, 1, ByteOrder::Motorola, 0).unwrap();
        encode_signal(&mut data, 3, 1, ByteOrder::Motorola, 1).unwrap();
        assert_eq!(data[0], 0xD0);

        encode_signal(&mut data, 4, 8, ByteOrder::Motorola, 0xEA).unwrap();
        assert_eq!(&data[..2], &[0xDE, 0xA0]);

        encode_signal(&mut data, 12, 12, ByteOrder::Motorola, 0xDBE).unwrap();
        assert_eq!(data, [0xDE, 0xAD, 0xBE]);
    }

    #[test]
    fn test_signed_encode() {
        let mut data = [0u8; 4];
        BitLayout::new(0, 8, ByteOrder::Motorola)
            .unwrap()
            .encode_signed(&mut data, -1);
        assert_eq!(data[0], 0xFF);

        let mut data = [0u8; 4];
        BitLayout::new(0, 16, ByteOrder::Motorola)
            .unwrap()
            .encode_signed(&mut data, -2);
        assert_eq!(&data[..2], &[0xFF, 0xFE]);

        let mut data = [0u8; 4];
        BitLayout::new(16, 8, ByteOrder::Motorola)
            .unwrap()
            .encode_signed(&mut data, -128);
        assert_eq!(data[2], 0x80);

        let mut data = [0u8; 4];
        BitLayout::new(16, 16, ByteOrder::Motorola)
            .unwrap()
            .encode_signed(&mut data, -32767);
        assert_eq!(&data[2..], &[0x80, 0x01]);
    }

    #[test]
    fn test_encode_preserves_neighbours() {
        let mut data = [0xFFu8; 8];
        encode_signal(&mut data, 4, 8, ByteOrder::Intel, 0).unwrap();
        assert_eq!(&data[..2], &[0x0F, 0xF0]);
        assert!(data[2..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_encode_masks_excess_bits() {
        let mut data = [0u8; 8];
        encode_signal(&mut data, 0, 4, ByteOrder::Intel, 0xFF).unwrap();
        assert_eq!(data[0], 0x0F);
    }

    #[test]
    fn test_encode_only_touches_supplied_bytes() {
        let mut data = [0u8; 2];
        encode_signal(&mut data, 0, 32, ByteOrder::Motorola, 0x1122_3344).unwrap();
        assert_eq!(data, [0x11, 0x22]);
    }

    #[test]
    fn test_range_errors() {
        let mut data = [0xA5u8; 8];
        let err = encode_signal(&mut data, 60, 8, ByteOrder::Intel, 0xFF).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::CodecRange {
                offset: 60,
                length: 8
            }
        );
        assert_eq!(data, [0xA5u8; 8]);

        assert!(decode_signal(&data, 0, 0, ByteOrder::Motorola, false).is_err());
        assert!(decode_signal(&data, 0, 65, ByteOrder::Motorola, false).is_err());
        assert!(decode_signal(&data, u32::MAX, 1, ByteOrder::Intel, false).is_err());
        assert!(decode_signal(&data, 0, 64, ByteOrder::Intel, false).is_ok());
        assert!(decode_signal(&data, 63, 1, ByteOrder::Motorola, false).is_ok());
    }

    #[test]
    fn test_byte_order_from_raw() {
        assert_eq!(ByteOrder::from_raw(0).unwrap(), ByteOrder::Motorola);
        assert_eq!(ByteOrder::from_raw(1).unwrap(), ByteOrder::Intel);
        assert_eq!(
            ByteOrder::from_raw(7).unwrap_err(),
            ProtocolError::InvalidByteOrder(7)
        );
        assert_eq!(u8::from(ByteOrder::Intel), 1);
    }

    #[test]
    fn test_bytes_spanned() {
        assert_eq!(
            BitLayout::new(0, 1, ByteOrder::Intel).unwrap().bytes_spanned(),
            1
        );
        assert_eq!(
            BitLayout::new(4, 8, ByteOrder::Motorola)
                .unwrap()
                .bytes_spanned(),
            2
        );
        assert_eq!(
            BitLayout::new(0, 64, ByteOrder::Intel).unwrap().bytes_spanned(),
            8
        );
    }
}
