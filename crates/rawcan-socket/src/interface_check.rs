//! CAN 接口检查
//!
//! 接口名校验、`if_nametoindex()` 取索引、`ioctl(SIOCGIFFLAGS)` 读取管理态。
//! 只读操作，普通用户即可执行。

use crate::CanError;
use libc::{AF_INET, IFF_UP, SIOCGIFFLAGS, SOCK_CLOEXEC, SOCK_DGRAM, if_nametoindex, ifreq};
use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use tracing::trace;

/// `IFNAMSIZ - 1`
const MAX_IFACE_NAME_LEN: usize = 15;

/// 解析接口索引
///
/// 名字过长、含 NUL 或接口不存在时返回 [`CanError::Bind`]。
pub(crate) fn resolve_ifindex(interface: &str) -> Result<libc::c_int, CanError> {
    if interface.is_empty() || interface.len() > MAX_IFACE_NAME_LEN {
        return Err(CanError::bind(
            interface,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "interface name must be 1..={} characters",
                    MAX_IFACE_NAME_LEN
                ),
            ),
        ));
    }

    let c_iface = CString::new(interface)
        .map_err(|e| CanError::bind(interface, io::Error::new(io::ErrorKind::InvalidInput, e)))?;

    let ifindex = unsafe { if_nametoindex(c_iface.as_ptr()) };
    if ifindex == 0 {
        return Err(CanError::bind(interface, io::Error::last_os_error()));
    }
    libc::c_int::try_from(ifindex).map_err(|_| {
        CanError::bind(
            interface,
            io::Error::new(io::ErrorKind::InvalidData, "interface index out of range"),
        )
    })
}

/// 检查接口是否存在且处于管理态 UP
///
/// - `Ok(true)`: 存在且 UP
/// - `Ok(false)`: 存在但 DOWN
/// - `Err(CanError::Bind)`: 接口名无效或接口不存在
/// - `Err(CanError::Io)`: socket / ioctl 失败
pub fn check_interface_status(interface: &str) -> Result<bool, CanError> {
    resolve_ifindex(interface)?;

    let mut ifr: ifreq = unsafe { std::mem::zeroed() };
    let name = interface.as_bytes();
    // 长度已在 resolve_ifindex 中校验，ifr_name 末尾保持为 0
    for (dst, &src) in ifr.ifr_name.iter_mut().zip(name) {
        *dst = src as libc::c_char;
    }

    let raw = unsafe { libc::socket(AF_INET, SOCK_DGRAM | SOCK_CLOEXEC, 0) };
    if raw < 0 {
        return Err(CanError::Io(io::Error::last_os_error()));
    }
    // SAFETY: raw 是刚创建的有效 fd，所有权交给 OwnedFd
    let sock = unsafe { OwnedFd::from_raw_fd(raw) };

    let result = unsafe {
        libc::ioctl(
            sock.as_raw_fd(),
            SIOCGIFFLAGS,
            &mut ifr as *mut _ as *mut libc::c_void,
        )
    };
    if result < 0 {
        return Err(CanError::Io(io::Error::last_os_error()));
    }

    // ifru_flags 是 ifr_ifru 联合体的首个字段（c_short）
    let flags = unsafe { *(std::ptr::addr_of!(ifr.ifr_ifru) as *const libc::c_short) };
    let is_up = (flags as i32 & IFF_UP) != 0;

    trace!(
        "Interface '{}' status: {}",
        interface,
        if is_up { "UP" } else { "DOWN" }
    );
    Ok(is_up)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn interface_exists(interface: &str) -> bool {
        Command::new("ip")
            .args(["link", "show", interface])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_name_too_long() {
        let err = check_interface_status("a_very_long_interface_name").unwrap_err();
        assert!(matches!(err, CanError::Bind { .. }), "{:?}", err);
    }

    #[test]
    fn test_name_with_nul() {
        let err = check_interface_status("can\0x").unwrap_err();
        assert!(matches!(err, CanError::Bind { .. }));
    }

    #[test]
    fn test_empty_name() {
        assert!(check_interface_status("").is_err());
    }

    #[test]
    fn test_missing_interface() {
        let err = check_interface_status("nonexist_can9").unwrap_err();
        match err {
            CanError::Bind { interface, .. } => assert_eq!(interface, "nonexist_can9"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_loopback_is_up() {
        if !interface_exists("lo") {
            eprintln!("Skipping test: lo interface not available");
            return;
        }
        assert!(check_interface_status("lo").unwrap());
    }

    #[test]
    fn test_vcan0_status() {
        if !interface_exists("vcan0") {
            eprintln!("Skipping test: vcan0 interface not available");
            return;
        }
        assert!(check_interface_status("vcan0").is_ok());
    }
}
