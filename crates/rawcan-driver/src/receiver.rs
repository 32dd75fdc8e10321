//! 接收线程
//!
//! 只做就绪检测，从不读取数据：
//!
//! ```text
//! loop {
//!     等待上一次通知被消费（条件变量）  ── 请求退出 → 退出
//!     poll(interval)                     ── 超时 → 继续（仅用于及时观察退出请求）
//!       可读      → 置 ready，发送 FramesReady
//!       挂断/出错 → 仍可读时先发送 FramesReady，再发送 Stopped，退出
//! }
//! ```

use crate::handoff::ReadyHandoff;
use crossbeam_channel::{SendTimeoutError, Sender, TrySendError};
use rawcan_socket::BusSocket;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, trace, warn};

const STOPPED_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// 发往消费端的通道事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    /// socket 有数据待读
    FramesReady,
    /// socket 挂断或 poll 失败，接收线程已退出
    Stopped,
}

/// 启动接收线程
pub(crate) fn spawn(
    socket: Arc<dyn BusSocket>,
    handoff: Arc<ReadyHandoff>,
    events: Sender<ChannelEvent>,
    poll_interval: Duration,
) -> io::Result<JoinHandle<()>> {
    let name = format!("rawcan-rx-{}", socket.interface());
    thread::Builder::new()
        .name(name)
        .spawn(move || receiver_loop(socket.as_ref(), &handoff, &events, poll_interval))
}

fn notify(events: &Sender<ChannelEvent>, event: ChannelEvent) -> bool {
    match events.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            // 队列里已有未处理的事件，消费端终会处理
            warn!("Event queue full, dropping {:?}", event);
            true
        },
        Err(TrySendError::Disconnected(_)) => false,
    }
}

/// `Stopped` 不能丢：队列满时重试，直到消费端腾出空间或请求退出
fn notify_stopped(events: &Sender<ChannelEvent>, handoff: &ReadyHandoff) {
    let mut warned = false;
    loop {
        match events.send_timeout(ChannelEvent::Stopped, STOPPED_RETRY_INTERVAL) {
            Ok(()) | Err(SendTimeoutError::Disconnected(_)) => return,
            Err(SendTimeoutError::Timeout(_)) if handoff.stop_requested() => {
                debug!("RX thread: stop requested while posting Stopped");
                return;
            },
            Err(SendTimeoutError::Timeout(_)) => {
                if !warned {
                    warn!("Event queue full, waiting to post Stopped");
                    warned = true;
                }
            },
        }
    }
}

pub(crate) fn receiver_loop(
    socket: &dyn BusSocket,
    handoff: &ReadyHandoff,
    events: &Sender<ChannelEvent>,
    poll_interval: Duration,
) {
    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;
        use tracing::info;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => {
                info!("RX thread priority set to MAX (realtime)");
            },
            Err(e) => {
                warn!(
                    "Failed to set RX thread priority: {}. \
                    On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                    e
                );
            },
        }
    }

    debug!("Receiver thread for '{}' started", socket.interface());

    loop {
        if !handoff.wait_until_consumed() {
            trace!("RX thread: stop requested, exiting");
            break;
        }

        match socket.poll_readiness(poll_interval) {
            Ok(readiness) if readiness.hangup => {
                // 挂断前已排队的帧交给消费端读完
                if readiness.readable && handoff.mark_ready() {
                    notify(events, ChannelEvent::FramesReady);
                }
                warn!("CAN socket on '{}' hung up", socket.interface());
                notify_stopped(events, handoff);
                break;
            },
            Ok(readiness) if readiness.readable => {
                if handoff.mark_ready() && !notify(events, ChannelEvent::FramesReady) {
                    debug!("RX thread: consumer gone, exiting");
                    break;
                }
            },
            Ok(_) => {},
            Err(e) => {
                error!("poll failed on '{}': {}", socket.interface(), e);
                notify_stopped(events, handoff);
                break;
            },
        }
    }

    debug!("Receiver thread for '{}' exited", socket.interface());
}
