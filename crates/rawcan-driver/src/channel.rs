//! 原始 CAN 通道
//!
//! 一个通道持有一个已绑定的 socket、一个按需启动的接收线程和一组监听器。
//!
//! - 接收线程只检测就绪，通过事件队列通知消费端
//! - 所有读取与监听器调用都在消费端线程上进行（[`Channel::process_events`] 或
//!   [`Channel::handle_event`]）
//! - 打开失败的通道是“无效通道”：所有操作都返回 [`ChannelError::InvalidChannel`]

use crate::builder::ChannelOptions;
use crate::dispatch::{DispatchReport, drain_batch};
use crate::error::ChannelError;
use crate::handoff::ReadyHandoff;
use crate::hooks::{
    ChannelListener, ListenerContext, ListenerFault, ListenerKind, ListenerRegistry,
    ListenerResult, message_listener, stopped_listener,
};
use crate::receiver::{self, ChannelEvent};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use rawcan_protocol::{Frame, FrameFormat, Timestamp};
use rawcan_socket::{BusSocket, Filter};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// 最多同时排队一个 `FramesReady` 和一个 `Stopped`，留少量余量
const EVENT_QUEUE_CAPACITY: usize = 4;

/// 原始 CAN 通道
///
/// # Example
///
/// ```no_run
/// use rawcan_driver::{Channel, ChannelOptions};
/// use rawcan_protocol::Frame;
/// use std::time::Duration;
///
/// let mut channel = Channel::open(ChannelOptions::new("vcan0")).unwrap();
/// channel
///     .on_message(|frame: &Frame| {
///         println!("0x{:03X} {:02X?}", frame.id(), frame.data());
///         Ok(())
///     })
///     .unwrap();
/// channel.start().unwrap();
///
/// let mut frame = Frame::classic(0x123, &[0xDE, 0xAD]).unwrap();
/// channel.send(&mut frame).unwrap();
///
/// channel.process_events(Duration::from_millis(500)).unwrap();
/// channel.stop().unwrap();
/// ```
pub struct Channel {
    interface: String,
    socket: Option<Arc<dyn BusSocket>>,
    bind_error: Option<String>,
    options: ChannelOptions,
    listeners: ListenerRegistry,
    handoff: Arc<ReadyHandoff>,
    events_tx: Sender<ChannelEvent>,
    events_rx: Receiver<ChannelEvent>,
    receiver: Option<JoinHandle<()>>,
}

impl Channel {
    fn with_parts(
        interface: String,
        socket: Option<Arc<dyn BusSocket>>,
        bind_error: Option<String>,
        options: ChannelOptions,
    ) -> Self {
        let (events_tx, events_rx) = bounded(EVENT_QUEUE_CAPACITY);
        Self {
            interface,
            socket,
            bind_error,
            options,
            listeners: ListenerRegistry::new(),
            handoff: Arc::new(ReadyHandoff::new()),
            events_tx,
            events_rx,
            receiver: None,
        }
    }

    /// 打开并绑定 `PF_CAN` 原始 socket
    ///
    /// # 错误
    /// - `InvalidArgument`: 批量上限或 poll 间隔非法
    /// - `Can(Bind)`: 创建、配置或绑定 socket 失败
    #[cfg(target_os = "linux")]
    pub fn open(options: ChannelOptions) -> Result<Self, ChannelError> {
        options.validate()?;
        let socket = rawcan_socket::RawCanSocket::open(&options.socket_config())?;
        Self::from_socket(Arc::new(socket), options)
    }

    /// 打开通道，失败时返回无效通道而不是错误
    ///
    /// 失败原因可通过 [`bind_error`](Self::bind_error) 查看。
    pub fn open_lenient(options: ChannelOptions) -> Self {
        #[cfg(target_os = "linux")]
        let result = Self::open(options.clone());
        #[cfg(not(target_os = "linux"))]
        let result: Result<Self, ChannelError> = Err(ChannelError::Config(
            "raw CAN sockets are only available on Linux".into(),
        ));

        match result {
            Ok(channel) => channel,
            Err(e) => {
                warn!("Channel '{}' is invalid: {}", options.interface, e);
                Self::with_parts(
                    options.interface.clone(),
                    None,
                    Some(e.to_string()),
                    options,
                )
            },
        }
    }

    /// 使用已打开的 socket 构造通道（自定义后端或测试）
    ///
    /// # 错误
    /// - `InvalidArgument`: 批量上限或 poll 间隔非法
    pub fn from_socket(
        socket: Arc<dyn BusSocket>,
        options: ChannelOptions,
    ) -> Result<Self, ChannelError> {
        options.validate()?;
        let interface = socket.interface().to_string();
        debug!(
            "Channel '{}' ready ({:?} frames)",
            interface,
            socket.format()
        );
        Ok(Self::with_parts(interface, Some(socket), None, options))
    }

    fn socket(&self) -> Result<&Arc<dyn BusSocket>, ChannelError> {
        self.socket
            .as_ref()
            .ok_or_else(|| ChannelError::InvalidChannel {
                interface: self.interface.clone(),
                cause: self
                    .bind_error
                    .clone()
                    .unwrap_or_else(|| "channel was not opened".into()),
            })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn options(&self) -> &ChannelOptions {
        &self.options
    }

    pub fn is_valid(&self) -> bool {
        self.socket.is_some()
    }

    /// 打开失败的原因（仅无效通道）
    pub fn bind_error(&self) -> Option<&str> {
        self.bind_error.as_deref()
    }

    /// 协商得到的帧格式，无效通道返回 `None`
    pub fn format(&self) -> Option<FrameFormat> {
        self.socket.as_ref().map(|s| s.format())
    }

    pub fn is_started(&self) -> bool {
        self.receiver.is_some()
    }

    fn drain_stale_events(&self) {
        let stale = self.events_rx.try_iter().count();
        if stale > 0 {
            trace!("Discarded {} stale channel events", stale);
        }
    }

    /// 启动接收线程
    pub fn start(&mut self) -> Result<(), ChannelError> {
        let socket = self.socket()?.clone();
        if self.receiver.is_some() {
            return Err(ChannelError::AlreadyStarted);
        }

        self.handoff.reset();
        self.drain_stale_events();

        let handle = receiver::spawn(
            socket,
            self.handoff.clone(),
            self.events_tx.clone(),
            self.options.poll_interval(),
        )
        .map_err(ChannelError::ThreadSpawn)?;
        self.receiver = Some(handle);

        info!("Channel '{}' started", self.interface);
        Ok(())
    }

    fn join_receiver(&mut self) {
        if let Some(handle) = self.receiver.take()
            && handle.join().is_err()
        {
            error!("Receiver thread for '{}' panicked", self.interface);
        }
    }

    /// 停止接收线程
    ///
    /// 阻塞到线程退出（最长约一个 poll 间隔），然后调用 `onStopped` 监听器。
    /// 停止后可以再次 `start()`。
    pub fn stop(&mut self) -> Result<(), ChannelError> {
        self.socket()?;
        if self.receiver.is_none() {
            return Err(ChannelError::NotStarted);
        }

        self.handoff.request_stop();
        self.join_receiver();
        // 线程退出前可能已经排入事件，这些事件属于本次运行
        self.drain_stale_events();

        info!("Channel '{}' stopped", self.interface);
        match self.listeners.dispatch_stopped() {
            Some(fault) => Err(fault.into()),
            None => Ok(()),
        }
    }

    /// 发送一帧
    ///
    /// FD 帧的长度向上补零到最近的离散档位；成功后 `frame.timestamp`
    /// 写入本地墙钟时间。失败时 `frame` 保持原样。
    ///
    /// # 错误
    /// - `InvalidArgument`: ID 超出范围，或在经典通道上发送 FD 帧
    /// - `Can(Transmit)`: 内核拒绝发送（保留 errno，不重试）
    pub fn send(&self, frame: &mut Frame) -> Result<usize, ChannelError> {
        let socket = self.socket()?;
        let (written, sent) = self.transmit(socket.as_ref(), *frame)?;
        *frame = sent;
        Ok(written)
    }

    /// 以 CAN FD 布局发送一帧（经典帧会被转换）
    pub fn send_fd(&self, frame: &mut Frame) -> Result<usize, ChannelError> {
        let socket = self.socket()?;
        if frame.is_remote() {
            return Err(ChannelError::InvalidArgument(
                "remote frames cannot be sent as CAN FD".into(),
            ));
        }
        let (written, sent) = self.transmit(socket.as_ref(), frame.into_fd())?;
        *frame = sent;
        Ok(written)
    }

    /// 校验、补齐并发送 `frame` 的副本，成功后返回实际发出的帧
    fn transmit(
        &self,
        socket: &dyn BusSocket,
        mut frame: Frame,
    ) -> Result<(usize, Frame), ChannelError> {
        frame
            .validate()
            .map_err(|e| ChannelError::InvalidArgument(e.to_string()))?;
        if frame.is_fd() {
            if socket.format() != FrameFormat::Fd {
                return Err(ChannelError::InvalidArgument(format!(
                    "'{}' does not accept CAN FD frames",
                    self.interface
                )));
            }
            frame.pad_to_fd_len();
        }

        let written = socket.send(&frame)?;
        frame.timestamp = Timestamp::now();
        trace!("TX 0x{:X} len={} ({} bytes)", frame.id(), frame.len(), written);
        Ok((written, frame))
    }

    /// 整体替换接收过滤器
    ///
    /// 空列表不做任何修改，保持当前内核过滤器。
    pub fn set_rx_filters(&self, filters: &[Filter]) -> Result<(), ChannelError> {
        let socket = self.socket()?;
        if filters.is_empty() {
            debug!("Empty filter list for '{}', keeping current filters", self.interface);
            return Ok(());
        }
        socket.set_filters(filters)?;
        debug!("Installed {} RX filters on '{}'", filters.len(), self.interface);
        Ok(())
    }

    pub fn set_rx_filter(&self, filter: Filter) -> Result<(), ChannelError> {
        self.set_rx_filters(&[filter])
    }

    /// 设置错误帧掩码（`CAN_RAW_ERR_FILTER`）
    pub fn set_error_filter(&self, mask: u32) -> Result<(), ChannelError> {
        self.socket()?.set_error_filter(mask)?;
        Ok(())
    }

    /// 关闭本地回环，之后同一主机上的其他 socket 不再收到本通道发送的帧
    pub fn disable_loopback(&self) -> Result<(), ChannelError> {
        self.socket()?.set_loopback(false)?;
        debug!("Loopback disabled on '{}'", self.interface);
        Ok(())
    }

    /// 注册监听器
    pub fn add_listener(
        &mut self,
        kind: ListenerKind,
        listener: Arc<dyn ChannelListener>,
        context: Option<ListenerContext>,
    ) -> Result<(), ChannelError> {
        self.socket()?;
        self.listeners.add(kind, listener, context);
        Ok(())
    }

    /// 按事件名注册监听器（`"onMessage"` / `"onStopped"`）
    pub fn add_listener_named(
        &mut self,
        event: &str,
        listener: Arc<dyn ChannelListener>,
        context: Option<ListenerContext>,
    ) -> Result<(), ChannelError> {
        let kind = event
            .parse::<ListenerKind>()
            .map_err(ChannelError::InvalidArgument)?;
        self.add_listener(kind, listener, context)
    }

    pub fn on_message<F>(&mut self, f: F) -> Result<(), ChannelError>
    where
        F: Fn(&Frame) -> ListenerResult + Send + Sync + 'static,
    {
        self.add_listener(ListenerKind::Message, message_listener(f), None)
    }

    pub fn on_stopped<F>(&mut self, f: F) -> Result<(), ChannelError>
    where
        F: Fn() -> ListenerResult + Send + Sync + 'static,
    {
        self.add_listener(ListenerKind::Stopped, stopped_listener(f), None)
    }

    /// 事件队列的接收端，可放入外部 `select!` 循环
    ///
    /// 收到的事件必须交回 [`handle_event`](Self::handle_event)。
    pub fn events(&self) -> Receiver<ChannelEvent> {
        self.events_rx.clone()
    }

    /// 读取一批帧并交给 `onMessage` 监听器，然后唤醒接收线程
    pub fn dispatch(&self) -> Result<DispatchReport, ChannelError> {
        let socket = self.socket()?;
        let mut report = drain_batch(
            socket.as_ref(),
            &self.listeners,
            self.options.max_frames_per_wake,
        );
        self.handoff.clear_ready();

        if report.limit_hit {
            trace!(
                "Batch limit ({}) reached on '{}'",
                self.options.max_frames_per_wake, self.interface
            );
        }
        match report.fault.take() {
            Some(fault) => Err(fault.into()),
            None => Ok(report),
        }
    }

    /// 接收线程退出后读完 socket 中剩余的帧，返回第一个监听器错误
    fn drain_remaining(&self) -> Result<Option<ListenerFault>, ChannelError> {
        let socket = self.socket()?;
        let mut first_fault = None;
        let mut delivered = 0;
        loop {
            let report = drain_batch(
                socket.as_ref(),
                &self.listeners,
                self.options.max_frames_per_wake,
            );
            delivered += report.delivered;
            if first_fault.is_none() {
                first_fault = report.fault;
            }
            if !report.limit_hit {
                break;
            }
        }
        self.handoff.clear_ready();
        if delivered > 0 {
            debug!(
                "Delivered {} queued frames after hang-up on '{}'",
                delivered, self.interface
            );
        }
        Ok(first_fault)
    }

    /// 处理一个通道事件
    pub fn handle_event(&mut self, event: ChannelEvent) -> Result<(), ChannelError> {
        self.socket()?;
        match event {
            ChannelEvent::FramesReady => {
                if self.receiver.is_none() {
                    trace!("Ignoring FramesReady on stopped channel '{}'", self.interface);
                    return Ok(());
                }
                self.dispatch().map(|_| ())
            },
            ChannelEvent::Stopped => {
                if self.receiver.is_none() {
                    return Ok(());
                }
                self.join_receiver();
                warn!("Channel '{}' stopped by receiver thread", self.interface);
                let message_fault = self.drain_remaining()?;
                let stopped_fault = self.listeners.dispatch_stopped();
                match message_fault.or(stopped_fault) {
                    Some(fault) => Err(fault.into()),
                    None => Ok(()),
                }
            },
        }
    }

    /// 等待最多 `timeout` 直到有事件，然后处理所有已排队的事件
    ///
    /// 返回处理的事件数（超时返回 0）。某个事件处理失败时其余事件照常处理，
    /// 返回第一个错误。
    pub fn process_events(&mut self, timeout: Duration) -> Result<usize, ChannelError> {
        self.socket()?;
        let events = self.events_rx.clone();

        let first = match events.recv_timeout(timeout) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => return Ok(0),
            Err(RecvTimeoutError::Disconnected) => return Ok(0),
        };

        let mut handled = 0;
        let mut first_error = None;
        for event in std::iter::once(first).chain(events.try_iter()) {
            handled += 1;
            if let Err(e) = self.handle_event(event)
                && first_error.is_none()
            {
                first_error = Some(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(handled),
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if self.receiver.is_some() {
            self.handoff.request_stop();
            self.join_receiver();
        }
        self.listeners.clear();
        trace!("Channel '{}' dropped", self.interface);
    }
}
