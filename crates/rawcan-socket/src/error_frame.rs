//! 错误帧解析
//!
//! 错误帧的 ID 字段携带错误类别，数据区携带控制器 / 协议细节，
//! 具体分类交给 `socketcan` crate。

use rawcan_protocol::{CAN_ERR_FLAG, CAN_MAX_DLEN, Frame};
use socketcan::{CanError as SocketCanError, CanErrorFrame};
use std::convert::TryFrom;

/// 把错误帧翻译为 `socketcan` 的错误分类，非错误帧返回 `None`
pub fn describe_error_frame(frame: &Frame) -> Option<SocketCanError> {
    if !frame.is_error() {
        return None;
    }

    // SAFETY: can_frame 是纯 POD 结构，全零是合法值
    let mut raw: libc::can_frame = unsafe { std::mem::zeroed() };
    raw.can_id = frame.id() | CAN_ERR_FLAG;
    raw.can_dlc = CAN_MAX_DLEN as u8;
    raw.data.copy_from_slice(&frame.padded_data()[..CAN_MAX_DLEN]);

    CanErrorFrame::try_from(raw).ok().map(CanErrorFrame::into_error)
}
