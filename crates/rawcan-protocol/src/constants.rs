//! 内核 CAN 帧标志位与掩码常量
//!
//! 与 `<linux/can.h>` 中的定义逐位一致，协议层不依赖 libc，因此在此单独声明。

/// 扩展帧标志（29-bit ID）
pub const CAN_EFF_FLAG: u32 = 0x8000_0000;
/// 远程帧标志
pub const CAN_RTR_FLAG: u32 = 0x4000_0000;
/// 错误帧标志
pub const CAN_ERR_FLAG: u32 = 0x2000_0000;

/// 标准帧 ID 掩码（11-bit）
pub const CAN_SFF_MASK: u32 = 0x0000_07FF;
/// 扩展帧 ID 掩码（29-bit）
pub const CAN_EFF_MASK: u32 = 0x1FFF_FFFF;
/// 错误类别掩码
pub const CAN_ERR_MASK: u32 = 0x1FFF_FFFF;

/// 过滤器反选标志，编码在 `can_filter.can_id` 中
pub const CAN_INV_FILTER: u32 = 0x2000_0000;

/// CAN FD 比特率切换
pub const CANFD_BRS: u8 = 0x01;
/// CAN FD 错误状态指示
pub const CANFD_ESI: u8 = 0x02;

/// 经典 CAN 最大数据长度
pub const CAN_MAX_DLEN: usize = 8;
/// CAN FD 最大数据长度
pub const CANFD_MAX_DLEN: usize = 64;

/// `struct can_frame` 的线上大小
pub const CAN_MTU: usize = 16;
/// `struct canfd_frame` 的线上大小
pub const CANFD_MTU: usize = 72;

/// 原始 CAN 协议号（`CAN_RAW`）
pub const CAN_RAW: i32 = 1;
