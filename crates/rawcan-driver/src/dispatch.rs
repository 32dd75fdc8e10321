//! 消费端批量读取
//!
//! 收到 `FramesReady` 后在消费端线程上调用：非阻塞地读到队列为空或达到单次上限，
//! 每帧按注册顺序交给 `onMessage` 监听器。剩余数据留到下一次通知。

use crate::hooks::{ListenerFault, ListenerRegistry};
use rawcan_protocol::Frame;
use rawcan_socket::BusSocket;
use tracing::{trace, warn};

/// 一批读取的结果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// 本批交付的帧数
    pub delivered: usize,
    /// 因达到单次上限而提前结束
    pub limit_hit: bool,
    /// 本批第一个监听器失败
    pub fault: Option<ListenerFault>,
}

fn log_error_frame(frame: &Frame) {
    #[cfg(target_os = "linux")]
    {
        match rawcan_socket::describe_error_frame(frame) {
            Some(err) => warn!("CAN error frame 0x{:X}: {}", frame.id(), err),
            None => warn!("CAN error frame 0x{:X} (unclassified)", frame.id()),
        }
    }
    #[cfg(not(target_os = "linux"))]
    warn!("CAN error frame 0x{:X}", frame.id());
}

/// 读取并分发一批帧
pub(crate) fn drain_batch(
    socket: &dyn BusSocket,
    listeners: &ListenerRegistry,
    max_frames: usize,
) -> DispatchReport {
    let mut report = DispatchReport::default();

    while report.delivered < max_frames {
        let frame = match socket.recv_nonblocking() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                warn!("recv failed on '{}': {}", socket.interface(), e);
                break;
            },
        };

        trace!("RX 0x{:X} len={}", frame.id(), frame.len());
        if frame.is_error() {
            log_error_frame(&frame);
        }

        if let Some(fault) = listeners.dispatch_message(&frame)
            && report.fault.is_none()
        {
            report.fault = Some(fault);
        }
        report.delivered += 1;
    }

    report.limit_hit = report.delivered == max_frames;
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{ListenerKind, message_listener};
    use crate::mock::MockSocket;
    use crossbeam_channel::unbounded;
    use rawcan_protocol::FrameFlags;

    fn collecting(registry: &mut ListenerRegistry) -> crossbeam_channel::Receiver<u32> {
        let (tx, rx) = unbounded();
        registry.add(
            ListenerKind::Message,
            message_listener(move |frame: &Frame| {
                tx.send(frame.id())?;
                Ok(())
            }),
            None,
        );
        rx
    }

    #[test]
    fn test_drains_in_order() {
        let socket = MockSocket::new("mock0");
        for id in 1..=5 {
            socket.inject(Frame::classic(id, &[id as u8]).unwrap());
        }
        let mut registry = ListenerRegistry::new();
        let rx = collecting(&mut registry);

        let report = drain_batch(&socket, &registry, 100);
        assert_eq!(report.delivered, 5);
        assert!(!report.limit_hit);
        assert!(report.fault.is_none());
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_respects_batch_limit() {
        let socket = MockSocket::new("mock0");
        for id in 0..250 {
            socket.inject(Frame::classic(id, &[]).unwrap());
        }
        let mut registry = ListenerRegistry::new();
        let rx = collecting(&mut registry);

        let report = drain_batch(&socket, &registry, 100);
        assert_eq!(report.delivered, 100);
        assert!(report.limit_hit);
        assert_eq!(socket.pending(), 150);

        drain_batch(&socket, &registry, 100);
        drain_batch(&socket, &registry, 100);
        let ids: Vec<u32> = rx.try_iter().collect();
        assert_eq!(ids, (0..250).collect::<Vec<_>>());
    }

    #[test]
    fn test_fault_reported_after_batch() {
        let socket = MockSocket::new("mock0");
        for id in 1..=3 {
            socket.inject(Frame::classic(id, &[]).unwrap());
        }
        let mut registry = ListenerRegistry::new();
        registry.add(
            ListenerKind::Message,
            message_listener(|frame: &Frame| {
                if frame.id() >= 2 {
                    Err(format!("bad 0x{:X}", frame.id()).into())
                } else {
                    Ok(())
                }
            }),
            None,
        );
        let rx = collecting(&mut registry);

        let report = drain_batch(&socket, &registry, 100);
        assert_eq!(report.delivered, 3);
        assert_eq!(report.fault.unwrap().message, "bad 0x2");
        assert_eq!(rx.try_iter().count(), 3);
    }

    #[test]
    fn test_error_frames_are_delivered() {
        let socket = MockSocket::new("mock0");
        let flags = FrameFlags {
            error: true,
            ..FrameFlags::default()
        };
        socket.inject(Frame::classic(0x40, &[0; 8]).unwrap().with_flags(flags));
        let mut registry = ListenerRegistry::new();
        let rx = collecting(&mut registry);

        let report = drain_batch(&socket, &registry, 100);
        assert_eq!(report.delivered, 1);
        assert_eq!(rx.try_recv().unwrap(), 0x40);
    }
}
