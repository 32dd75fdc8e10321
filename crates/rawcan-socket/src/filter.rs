//! 接收过滤器
//!
//! 内核匹配规则：`received_id & mask == filter_id & mask`。
//! 反选通过 `can_id` 中的 `CAN_INV_FILTER` 位表达；
//! 掩码中的 `CAN_ERR_FLAG` 位总是清除，错误帧只受错误掩码控制。

use rawcan_protocol::{CAN_EFF_FLAG, CAN_ERR_FLAG, CAN_INV_FILTER};

/// 单条接收过滤器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Filter {
    pub id: u32,
    pub mask: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub invert: bool,
}

impl Filter {
    pub const fn new(id: u32, mask: u32) -> Self {
        Self {
            id,
            mask,
            invert: false,
        }
    }

    /// 精确匹配一个扩展帧 ID（同时比较 EFF 标志）
    pub const fn extended(id: u32, mask: u32) -> Self {
        Self {
            id: id | CAN_EFF_FLAG,
            mask: mask | CAN_EFF_FLAG,
            invert: false,
        }
    }

    /// 反选：匹配之外的帧才被接收
    #[must_use]
    pub const fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }

    /// 交给内核的 `(can_id, can_mask)`
    pub const fn to_raw(&self) -> (u32, u32) {
        let id = if self.invert {
            self.id | CAN_INV_FILTER
        } else {
            self.id
        };
        (id, self.mask & !CAN_ERR_FLAG)
    }

    /// 按内核规则判断一个原始 ID 字是否通过本过滤器
    pub fn accepts(&self, raw_id: u32) -> bool {
        let mask = self.mask & !CAN_ERR_FLAG;
        let hit = (raw_id & mask) == (self.id & mask);
        hit != self.invert
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_raw_clears_err_flag_in_mask() {
        let filter = Filter::new(0x100, 0xFFFF_FFFF);
        assert_eq!(filter.to_raw(), (0x100, 0xDFFF_FFFF));
    }

    #[test]
    fn test_invert_sets_reserved_bit() {
        let filter = Filter::new(0x100, 0x7FF).inverted();
        assert_eq!(filter.to_raw(), (0x2000_0100, 0x7FF));
    }

    #[test]
    fn test_accepts() {
        let filter = Filter::new(0x100, 0x7FF);
        assert!(filter.accepts(0x100));
        assert!(!filter.accepts(0x200));

        let inverted = filter.inverted();
        assert!(!inverted.accepts(0x100));
        assert!(inverted.accepts(0x200));

        let ext = Filter::extended(0x1234, 0x1FFF_FFFF);
        assert!(ext.accepts(0x1234 | CAN_EFF_FLAG));
        assert!(!ext.accepts(0x1234));
    }
}
