//! 线上帧布局
//!
//! ```text
//! can_frame   (16 bytes): can_id u32 | len u8 | pad | res0 | len8_dlc | data[8]
//! canfd_frame (72 bytes): can_id u32 | len u8 | flags u8 | res0 | res1 | data[64]
//! ```
//!
//! `can_id` 为主机字节序。接收时按数据报长度区分两种布局。

use crate::CanError;
use rawcan_protocol::{
    CAN_EFF_FLAG, CAN_EFF_MASK, CAN_ERR_FLAG, CAN_ERR_MASK, CAN_MAX_DLEN, CAN_MTU, CAN_RTR_FLAG,
    CAN_SFF_MASK, CANFD_BRS, CANFD_ESI, CANFD_MAX_DLEN, CANFD_MTU, Frame, FrameFlags, FrameFormat,
    round_fd_len,
};

const DATA_OFFSET: usize = 8;

/// 带标志位的 `can_id` 字
pub fn raw_can_id(frame: &Frame) -> u32 {
    let mut id = frame.id();
    if frame.is_extended() {
        id |= CAN_EFF_FLAG;
    }
    if frame.is_remote() {
        id |= CAN_RTR_FLAG;
    }
    if frame.is_error() {
        id |= CAN_ERR_FLAG;
    }
    id
}

/// 拆分 `can_id` 字为 (ID, 标志)
pub fn split_can_id(word: u32) -> (u32, FrameFlags) {
    let flags = FrameFlags {
        extended: word & CAN_EFF_FLAG != 0,
        remote: word & CAN_RTR_FLAG != 0,
        error: word & CAN_ERR_FLAG != 0,
        brs: false,
        esi: false,
    };
    let id = if flags.error {
        word & CAN_ERR_MASK
    } else if flags.extended {
        word & CAN_EFF_MASK
    } else {
        word & CAN_SFF_MASK
    };
    (id, flags)
}

/// 编码为 16 字节经典布局
pub fn encode_classic(frame: &Frame) -> Result<[u8; CAN_MTU], CanError> {
    if frame.is_fd() {
        return Err(CanError::InvalidFrame(
            "FD frame cannot use the classic layout".into(),
        ));
    }
    frame.validate()?;
    let len = frame.len().min(CAN_MAX_DLEN);
    let mut buf = [0u8; CAN_MTU];
    buf[..4].copy_from_slice(&raw_can_id(frame).to_ne_bytes());
    buf[4] = len as u8;
    buf[DATA_OFFSET..DATA_OFFSET + len].copy_from_slice(&frame.data()[..len]);
    Ok(buf)
}

/// 编码为 72 字节 FD 布局
///
/// 长度向上取整到离散档位，补齐部分为 0。
pub fn encode_fd(frame: &Frame) -> Result<[u8; CANFD_MTU], CanError> {
    frame.validate()?;
    if frame.is_remote() {
        return Err(CanError::InvalidFrame(
            "CAN FD has no remote frames".into(),
        ));
    }
    let len = round_fd_len(frame.len());
    let mut flags = 0u8;
    if frame.is_brs() {
        flags |= CANFD_BRS;
    }
    if frame.is_esi() {
        flags |= CANFD_ESI;
    }
    let mut buf = [0u8; CANFD_MTU];
    buf[..4].copy_from_slice(&raw_can_id(frame).to_ne_bytes());
    buf[4] = len as u8;
    buf[5] = flags;
    buf[DATA_OFFSET..DATA_OFFSET + len].copy_from_slice(&frame.padded_data()[..len]);
    Ok(buf)
}

/// 解码一个数据报
///
/// 16 字节为经典帧，72 字节为 FD 帧，其余长度报错。
/// 长度字段先按格式掩码（经典 `& 0x0F`，FD `& 0x7F`），再截到格式上限。
pub fn decode(buf: &[u8]) -> Result<Frame, CanError> {
    let format = match buf.len() {
        CAN_MTU => FrameFormat::Classic,
        CANFD_MTU => FrameFormat::Fd,
        n => {
            return Err(CanError::InvalidFrame(format!(
                "unexpected datagram size {} (expected {} or {})",
                n, CAN_MTU, CANFD_MTU
            )));
        },
    };

    let mut word = [0u8; 4];
    word.copy_from_slice(&buf[..4]);
    let (id, mut flags) = split_can_id(u32::from_ne_bytes(word));

    let len = match format {
        FrameFormat::Classic => ((buf[4] & 0x0F) as usize).min(CAN_MAX_DLEN),
        FrameFormat::Fd => {
            flags.brs = buf[5] & CANFD_BRS != 0;
            flags.esi = buf[5] & CANFD_ESI != 0;
            ((buf[4] & 0x7F) as usize).min(CANFD_MAX_DLEN)
        },
    };

    let frame = Frame::new(format, id, &buf[DATA_OFFSET..DATA_OFFSET + len])?;
    Ok(frame.with_flags(flags))
}
