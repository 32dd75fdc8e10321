//! CAN FD 长度查找表
//!
//! CAN FD 的数据长度只能取离散集合 {0..8, 12, 16, 20, 24, 32, 48, 64} 中的值，
//! DLC 高于 8 的部分是非线性编码。

use crate::constants::CANFD_MAX_DLEN;

/// 合法的 CAN FD 数据长度（升序）
pub const CANFD_LEN_SET: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 12, 16, 20, 24, 32, 48, 64];

/// DLC (0-15) → 数据长度
pub const DLC_TO_LEN: [u8; 16] = CANFD_LEN_SET;

/// 数据长度 (0-64) → DLC，非整档长度取向上最近档位的 DLC
pub const LEN_TO_DLC: [u8; 65] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, // 0 - 8
    9, 9, 9, 9, // 9 - 12
    10, 10, 10, 10, // 13 - 16
    11, 11, 11, 11, // 17 - 20
    12, 12, 12, 12, // 21 - 24
    13, 13, 13, 13, 13, 13, 13, 13, // 25 - 32
    14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, 14, // 33 - 48
    15, 15, 15, 15, 15, 15, 15, 15, 15, 15, 15, 15, 15, 15, 15, 15, // 49 - 64
];

/// 数据长度转 DLC，超过 64 的输入先截到 64
#[inline]
pub fn fd_len_to_dlc(len: usize) -> u8 {
    LEN_TO_DLC[len.min(CANFD_MAX_DLEN)]
}

/// DLC 转数据长度，只取低 4 位
#[inline]
pub fn fd_dlc_to_len(dlc: u8) -> u8 {
    DLC_TO_LEN[(dlc & 0x0F) as usize]
}

/// 向上取整到最近的合法 CAN FD 长度
///
/// ```rust
/// use rawcan_protocol::round_fd_len;
///
/// assert_eq!(round_fd_len(9), 12);
/// assert_eq!(round_fd_len(33), 48);
/// assert_eq!(round_fd_len(200), 64);
/// ```
#[inline]
pub fn round_fd_len(len: usize) -> usize {
    fd_dlc_to_len(fd_len_to_dlc(len)) as usize
}

/// 是否为合法的 CAN FD 数据长度
#[inline]
pub fn is_valid_fd_len(len: usize) -> bool {
    len <= CANFD_MAX_DLEN && round_fd_len(len) == len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_identity_on_members() {
        for &len in CANFD_LEN_SET.iter() {
            assert_eq!(round_fd_len(len as usize), len as usize);
            assert!(is_valid_fd_len(len as usize));
        }
    }

    #[test]
    fn test_round_up_between_members() {
        assert_eq!(round_fd_len(9), 12);
        assert_eq!(round_fd_len(12), 12);
        assert_eq!(round_fd_len(13), 16);
        assert_eq!(round_fd_len(21), 24);
        assert_eq!(round_fd_len(25), 32);
        assert_eq!(round_fd_len(47), 48);
        assert_eq!(round_fd_len(49), 64);
    }

    #[test]
    fn test_round_clamps_above_max() {
        assert_eq!(round_fd_len(65), 64);
        assert_eq!(round_fd_len(usize::MAX), 64);
        assert!(!is_valid_fd_len(65));
    }

    #[test]
    fn test_round_never_smaller() {
        for len in 0..=64usize {
            let rounded = round_fd_len(len);
            assert!(rounded >= len);
            assert!(is_valid_fd_len(rounded));
        }
    }

    #[test]
    fn test_dlc_tables_agree() {
        for dlc in 0u8..16 {
            assert_eq!(fd_len_to_dlc(fd_dlc_to_len(dlc) as usize), dlc);
        }
        // 高位被忽略
        assert_eq!(fd_dlc_to_len(0xF9), 12);
    }
}
