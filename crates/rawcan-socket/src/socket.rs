//! Linux 原始 CAN socket
//!
//! 打开流程（每一步失败即返回）：
//!
//! 1. `socket(PF_CAN, SOCK_RAW, protocol)`
//! 2. 解析接口索引（接口 DOWN 只记录警告）
//! 3. 尝试 `CAN_RAW_FD_FRAMES`，失败则回退为经典帧（按 socket 记录，不影响其他 socket）
//! 4. 安装 `CAN_RAW_ERR_FILTER = CAN_ERR_MASK`，错误帧作为普通帧投递
//! 5. 按需开启 `SO_TIMESTAMP`，失败只记录警告
//! 6. `bind`

use crate::interface_check::{check_interface_status, resolve_ifindex};
use crate::{BusSocket, CanError, Filter, Readiness, wire};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::socket::{ControlMessageOwned, MsgFlags, SockaddrStorage, recvmsg, send};
use rawcan_protocol::{CAN_ERR_MASK, CAN_MTU, CAN_RAW, CANFD_MTU, Frame, FrameFormat, Timestamp};
use std::io::{self, IoSliceMut};
use std::mem;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// 打开参数
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SocketConfig {
    pub interface: String,
    /// 读取内核接收时间戳
    pub timestamps: bool,
    /// `socket()` 的协议号，默认 `CAN_RAW`
    pub protocol: i32,
    /// 发送使用 `MSG_DONTWAIT`，队列满时立即返回错误
    pub non_blocking_send: bool,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            interface: String::from("can0"),
            timestamps: false,
            protocol: CAN_RAW,
            non_blocking_send: false,
        }
    }
}

impl SocketConfig {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            ..Self::default()
        }
    }
}

/// 原始 CAN socket
///
/// # 示例
///
/// ```no_run
/// use rawcan_socket::{BusSocket, RawCanSocket, SocketConfig};
///
/// let socket = RawCanSocket::open(&SocketConfig::new("vcan0")).unwrap();
/// println!("negotiated {:?}", socket.format());
/// ```
#[derive(Debug)]
pub struct RawCanSocket {
    fd: OwnedFd,
    interface: String,
    format: FrameFormat,
    timestamps: bool,
    non_blocking_send: bool,
}

fn set_option<T>(fd: BorrowedFd<'_>, level: libc::c_int, name: libc::c_int, value: &T) -> io::Result<()> {
    set_option_raw(fd, level, name, value as *const T as *const libc::c_void, mem::size_of::<T>())
}

fn set_option_raw(
    fd: BorrowedFd<'_>,
    level: libc::c_int,
    name: libc::c_int,
    value: *const libc::c_void,
    len: usize,
) -> io::Result<()> {
    let ret = unsafe { libc::setsockopt(fd.as_raw_fd(), level, name, value, len as libc::socklen_t) };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

impl RawCanSocket {
    pub fn open(config: &SocketConfig) -> Result<Self, CanError> {
        let interface = config.interface.as_str();

        let raw = unsafe { libc::socket(libc::PF_CAN, libc::SOCK_RAW | libc::SOCK_CLOEXEC, config.protocol) };
        if raw < 0 {
            return Err(CanError::bind(interface, io::Error::last_os_error()));
        }
        // SAFETY: raw 是刚创建的有效 fd，所有权交给 OwnedFd
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let ifindex = resolve_ifindex(interface)?;
        match check_interface_status(interface) {
            Ok(true) => trace!("CAN interface '{}' is UP", interface),
            Ok(false) => warn!(
                "CAN interface '{}' exists but is not UP, no frames will flow until:\n  sudo ip link set up {}",
                interface, interface
            ),
            Err(e) => warn!("Failed to query state of '{}': {}", interface, e),
        }

        let enable: libc::c_int = 1;
        let format = match set_option(fd.as_fd(), libc::SOL_CAN_RAW, libc::CAN_RAW_FD_FRAMES, &enable) {
            Ok(()) => FrameFormat::Fd,
            Err(e) => {
                debug!(
                    "CAN FD not available on '{}' ({}), falling back to classic frames",
                    interface, e
                );
                FrameFormat::Classic
            },
        };

        let err_mask: u32 = CAN_ERR_MASK;
        set_option(fd.as_fd(), libc::SOL_CAN_RAW, libc::CAN_RAW_ERR_FILTER, &err_mask)
            .map_err(|e| CanError::bind(interface, e))?;

        let timestamps = config.timestamps
            && match set_option(fd.as_fd(), libc::SOL_SOCKET, libc::SO_TIMESTAMP, &enable) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Failed to enable SO_TIMESTAMP on '{}': {}", interface, e);
                    false
                },
            };

        // SAFETY: sockaddr_can 是纯 POD 结构，全零是合法值
        let mut addr: libc::sockaddr_can = unsafe { mem::zeroed() };
        addr.can_family = libc::AF_CAN as libc::sa_family_t;
        addr.can_ifindex = ifindex;
        let ret = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                &addr as *const libc::sockaddr_can as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_can>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(CanError::bind(interface, io::Error::last_os_error()));
        }

        info!(
            "Opened CAN interface '{}' ({:?} frames, timestamps {})",
            interface,
            format,
            if timestamps { "on" } else { "off" }
        );

        Ok(Self {
            fd,
            interface: interface.to_string(),
            format,
            timestamps,
            non_blocking_send: config.non_blocking_send,
        })
    }

    fn read_timestamp(&self, msg: &nix::sys::socket::RecvMsg<'_, '_, SockaddrStorage>) -> Option<Timestamp> {
        match msg.cmsgs() {
            Ok(cmsgs) => {
                for cmsg in cmsgs {
                    if let ControlMessageOwned::ScmTimestamp(tv) = cmsg {
                        return Some(Timestamp::new(tv.tv_sec() as i64, tv.tv_usec() as i64));
                    }
                }
                None
            },
            Err(e) => {
                warn!("Failed to parse CMSG on '{}': {}", self.interface, e);
                None
            },
        }
    }
}

impl AsFd for RawCanSocket {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl BusSocket for RawCanSocket {
    fn interface(&self) -> &str {
        &self.interface
    }

    fn format(&self) -> FrameFormat {
        self.format
    }

    fn timestamps_enabled(&self) -> bool {
        self.timestamps
    }

    fn poll_readiness(&self, timeout: Duration) -> Result<Readiness, CanError> {
        let timeout_ms = timeout.as_millis().min(u16::MAX as u128) as u16;
        let mut fds = [PollFd::new(
            self.fd.as_fd(),
            PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR,
        )];
        match poll(&mut fds, PollTimeout::from(timeout_ms)) {
            Ok(0) => Ok(Readiness::default()),
            Ok(_) => {
                let revents = fds[0].revents().unwrap_or(PollFlags::empty());
                Ok(Readiness {
                    readable: revents.contains(PollFlags::POLLIN),
                    hangup: revents
                        .intersects(PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL),
                })
            },
            Err(Errno::EINTR) => Ok(Readiness::default()),
            Err(e) => Err(CanError::Io(io::Error::from(e))),
        }
    }

    fn recv_nonblocking(&self) -> Result<Option<Frame>, CanError> {
        let datagram_len = match self.format {
            FrameFormat::Classic => CAN_MTU,
            FrameFormat::Fd => CANFD_MTU,
        };

        loop {
            let mut frame_buf = [0u8; CANFD_MTU];
            let mut cmsg_buf = [0u8; 1024];
            let mut iov = [IoSliceMut::new(&mut frame_buf[..datagram_len])];

            let (bytes, timestamp) = match recvmsg::<SockaddrStorage>(
                self.fd.as_raw_fd(),
                &mut iov,
                Some(&mut cmsg_buf),
                MsgFlags::MSG_DONTWAIT,
            ) {
                Ok(msg) => {
                    let timestamp = if self.timestamps {
                        self.read_timestamp(&msg)
                    } else {
                        None
                    };
                    (msg.bytes, timestamp)
                },
                Err(Errno::EAGAIN) => return Ok(None),
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(CanError::Io(io::Error::from(e))),
            };

            match wire::decode(&frame_buf[..bytes]) {
                Ok(mut frame) => {
                    frame.timestamp = timestamp;
                    trace!(
                        "RX '{}': id=0x{:X} len={}",
                        self.interface,
                        frame.id(),
                        frame.len()
                    );
                    return Ok(Some(frame));
                },
                Err(e) => {
                    warn!("Dropping datagram on '{}': {}", self.interface, e);
                },
            }
        }
    }

    fn send(&self, frame: &Frame) -> Result<usize, CanError> {
        let flags = if self.non_blocking_send {
            MsgFlags::MSG_DONTWAIT
        } else {
            MsgFlags::empty()
        };

        let result = if frame.is_fd() {
            if self.format != FrameFormat::Fd {
                return Err(CanError::FdNotSupported(self.interface.clone()));
            }
            let buf = wire::encode_fd(frame)?;
            send(self.fd.as_raw_fd(), &buf, flags)
        } else {
            let buf = wire::encode_classic(frame)?;
            send(self.fd.as_raw_fd(), &buf, flags)
        };

        result.map_err(|e| CanError::Transmit(io::Error::from(e)))
    }

    fn set_filters(&self, filters: &[Filter]) -> Result<(), CanError> {
        let mut raw: Vec<libc::can_filter> = Vec::new();
        raw.try_reserve_exact(filters.len())?;
        raw.extend(filters.iter().map(|f| {
            let (can_id, can_mask) = f.to_raw();
            libc::can_filter { can_id, can_mask }
        }));

        set_option_raw(
            self.fd.as_fd(),
            libc::SOL_CAN_RAW,
            libc::CAN_RAW_FILTER,
            raw.as_ptr() as *const libc::c_void,
            raw.len() * mem::size_of::<libc::can_filter>(),
        )?;
        debug!("Installed {} RX filter(s) on '{}'", raw.len(), self.interface);
        Ok(())
    }

    fn set_error_filter(&self, mask: u32) -> Result<(), CanError> {
        set_option(self.fd.as_fd(), libc::SOL_CAN_RAW, libc::CAN_RAW_ERR_FILTER, &mask)?;
        Ok(())
    }

    fn set_loopback(&self, enabled: bool) -> Result<(), CanError> {
        let value: libc::c_int = enabled.into();
        set_option(self.fd.as_fd(), libc::SOL_CAN_RAW, libc::CAN_RAW_LOOPBACK, &value)?;
        trace!(
            "CAN_RAW_LOOPBACK={} on '{}'",
            value, self.interface
        );
        Ok(())
    }
}

impl Drop for RawCanSocket {
    fn drop(&mut self) {
        trace!("[Auto-Drop] CAN socket on '{}' closed", self.interface);
    }
}
