//! 内存中的 `BusSocket`，用于无 CAN 接口的测试

use parking_lot::{Condvar, Mutex};
use rawcan_protocol::{Frame, FrameFormat};
use rawcan_socket::{BusSocket, CanError, Filter, Readiness};
use std::collections::VecDeque;
use std::io;
use std::thread::{self, ThreadId};
use std::time::Duration;

#[derive(Default)]
struct MockState {
    inbox: VecDeque<Frame>,
    sent: Vec<Frame>,
    filters: Option<Vec<Filter>>,
    error_mask: Option<u32>,
    loopback: bool,
    hangup: bool,
    poll_error: bool,
    send_errno: Option<i32>,
    recv_threads: Vec<ThreadId>,
}

/// 模拟 socket
///
/// `inject` 放入的帧由 `recv_nonblocking` 按顺序取出；`send` 只记录，不回环。
pub struct MockSocket {
    interface: String,
    format: FrameFormat,
    state: Mutex<MockState>,
    cond: Condvar,
}

impl MockSocket {
    pub fn new(interface: impl Into<String>) -> Self {
        Self::with_format(interface, FrameFormat::Fd)
    }

    pub fn with_format(interface: impl Into<String>, format: FrameFormat) -> Self {
        Self {
            interface: interface.into(),
            format,
            state: Mutex::new(MockState {
                loopback: true,
                ..MockState::default()
            }),
            cond: Condvar::new(),
        }
    }

    /// 模拟收到一帧
    pub fn inject(&self, frame: Frame) {
        self.state.lock().inbox.push_back(frame);
        self.cond.notify_all();
    }

    /// 尚未被读取的帧数
    pub fn pending(&self) -> usize {
        self.state.lock().inbox.len()
    }

    /// 模拟 socket 挂断
    pub fn hang_up(&self) {
        self.state.lock().hangup = true;
        self.cond.notify_all();
    }

    /// 之后的 poll 全部失败
    pub fn fail_poll(&self) {
        self.state.lock().poll_error = true;
        self.cond.notify_all();
    }

    /// 之后的发送全部以给定 errno 失败
    pub fn fail_send(&self, errno: i32) {
        self.state.lock().send_errno = Some(errno);
    }

    pub fn sent(&self) -> Vec<Frame> {
        self.state.lock().sent.clone()
    }

    /// 当前过滤器，`None` 表示从未设置
    pub fn filters(&self) -> Option<Vec<Filter>> {
        self.state.lock().filters.clone()
    }

    pub fn error_mask(&self) -> Option<u32> {
        self.state.lock().error_mask
    }

    pub fn loopback(&self) -> bool {
        self.state.lock().loopback
    }

    /// 调用过 `recv_nonblocking` 的线程
    pub fn recv_threads(&self) -> Vec<ThreadId> {
        self.state.lock().recv_threads.clone()
    }
}

impl BusSocket for MockSocket {
    fn interface(&self) -> &str {
        &self.interface
    }

    fn format(&self) -> FrameFormat {
        self.format
    }

    fn poll_readiness(&self, timeout: Duration) -> Result<Readiness, CanError> {
        let mut state = self.state.lock();
        for attempt in 0..2 {
            if state.poll_error {
                return Err(CanError::Io(io::Error::other("mock poll failure")));
            }
            if state.hangup {
                return Ok(Readiness {
                    readable: !state.inbox.is_empty(),
                    hangup: true,
                });
            }
            if !state.inbox.is_empty() {
                return Ok(Readiness {
                    readable: true,
                    hangup: false,
                });
            }
            if attempt == 0 {
                self.cond.wait_for(&mut state, timeout);
            }
        }
        Ok(Readiness::default())
    }

    fn recv_nonblocking(&self) -> Result<Option<Frame>, CanError> {
        let mut state = self.state.lock();
        let current = thread::current().id();
        if !state.recv_threads.contains(&current) {
            state.recv_threads.push(current);
        }
        Ok(state.inbox.pop_front())
    }

    fn send(&self, frame: &Frame) -> Result<usize, CanError> {
        let mut state = self.state.lock();
        if let Some(errno) = state.send_errno {
            return Err(CanError::Transmit(io::Error::from_raw_os_error(errno)));
        }
        if frame.is_fd() && self.format != FrameFormat::Fd {
            return Err(CanError::FdNotSupported(self.interface.clone()));
        }
        state.sent.push(*frame);
        Ok(if frame.is_fd() { 72 } else { 16 })
    }

    fn set_filters(&self, filters: &[Filter]) -> Result<(), CanError> {
        let mut list = Vec::new();
        list.try_reserve_exact(filters.len())?;
        list.extend_from_slice(filters);
        self.state.lock().filters = Some(list);
        Ok(())
    }

    fn set_error_filter(&self, mask: u32) -> Result<(), CanError> {
        self.state.lock().error_mask = Some(mask);
        Ok(())
    }

    fn set_loopback(&self, enabled: bool) -> Result<(), CanError> {
        self.state.lock().loopback = enabled;
        Ok(())
    }
}
