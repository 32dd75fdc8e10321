//! 监听器系统
//!
//! 通道按注册顺序保存两类监听器：
//!
//! - `onMessage`: 每收到一帧调用一次
//! - `onStopped`: 通道停止（主动 `stop()` 或 socket 挂断）时调用
//!
//! 监听器只在消费端线程上同步调用。某个监听器失败（返回错误或 panic）时，
//! 同一事件的其余监听器照常执行，第一个失败在整批结束后向上返回。
//!
//! # 使用示例
//!
//! ```rust
//! use rawcan_driver::hooks::{ListenerKind, ListenerRegistry, message_listener};
//! use rawcan_protocol::Frame;
//!
//! let mut listeners = ListenerRegistry::new();
//! listeners.add(
//!     ListenerKind::Message,
//!     message_listener(|frame: &Frame| {
//!         println!("0x{:X}", frame.id());
//!         Ok(())
//!     }),
//!     None,
//! );
//!
//! let frame = Frame::classic(0x251, &[1, 2, 3, 4]).unwrap();
//! assert!(listeners.dispatch_message(&frame).is_none());
//! ```

use rawcan_protocol::Frame;
use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, trace};

/// 注册时附带的不透明上下文，原样传回回调
pub type ListenerContext = Arc<dyn Any + Send + Sync>;

/// 监听器返回值
pub type ListenerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// 监听器事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    Message,
    Stopped,
}

impl ListenerKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ListenerKind::Message => "onMessage",
            ListenerKind::Stopped => "onStopped",
        }
    }
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListenerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "onMessage" => Ok(ListenerKind::Message),
            "onStopped" => Ok(ListenerKind::Stopped),
            other => Err(format!("Event not supported: {}", other)),
        }
    }
}

/// 通道监听器
///
/// 两个方法都有空的默认实现，只需实现关心的事件。
pub trait ChannelListener: Send + Sync {
    /// 收到一帧
    fn on_message(&self, frame: &Frame, context: Option<&ListenerContext>) -> ListenerResult {
        let _ = (frame, context);
        Ok(())
    }

    /// 通道已停止
    fn on_stopped(&self, context: Option<&ListenerContext>) -> ListenerResult {
        let _ = context;
        Ok(())
    }
}

struct FnMessage<F>(F);

impl<F> ChannelListener for FnMessage<F>
where
    F: Fn(&Frame) -> ListenerResult + Send + Sync,
{
    fn on_message(&self, frame: &Frame, _context: Option<&ListenerContext>) -> ListenerResult {
        (self.0)(frame)
    }
}

struct FnStopped<F>(F);

impl<F> ChannelListener for FnStopped<F>
where
    F: Fn() -> ListenerResult + Send + Sync,
{
    fn on_stopped(&self, _context: Option<&ListenerContext>) -> ListenerResult {
        (self.0)()
    }
}

/// 把闭包包装为 `onMessage` 监听器
pub fn message_listener<F>(f: F) -> Arc<dyn ChannelListener>
where
    F: Fn(&Frame) -> ListenerResult + Send + Sync + 'static,
{
    Arc::new(FnMessage(f))
}

/// 把闭包包装为 `onStopped` 监听器
pub fn stopped_listener<F>(f: F) -> Arc<dyn ChannelListener>
where
    F: Fn() -> ListenerResult + Send + Sync + 'static,
{
    Arc::new(FnStopped(f))
}

/// 监听器失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} listener #{index} failed: {message}")]
pub struct ListenerFault {
    pub kind: ListenerKind,
    /// 在同类监听器中的注册序号
    pub index: usize,
    pub message: String,
}

struct Registered {
    listener: Arc<dyn ChannelListener>,
    context: Option<ListenerContext>,
}

/// 监听器列表
///
/// 只能追加，不能单独移除；随通道一起释放。
#[derive(Default)]
pub struct ListenerRegistry {
    message: Vec<Registered>,
    stopped: Vec<Registered>,
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "listener panicked".to_string()
    }
}

impl ListenerRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            message: Vec::new(),
            stopped: Vec::new(),
        }
    }

    pub fn add(
        &mut self,
        kind: ListenerKind,
        listener: Arc<dyn ChannelListener>,
        context: Option<ListenerContext>,
    ) {
        let entry = Registered { listener, context };
        match kind {
            ListenerKind::Message => self.message.push(entry),
            ListenerKind::Stopped => self.stopped.push(entry),
        }
        trace!("Registered {} listener", kind);
    }

    pub fn len(&self, kind: ListenerKind) -> usize {
        match kind {
            ListenerKind::Message => self.message.len(),
            ListenerKind::Stopped => self.stopped.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.message.is_empty() && self.stopped.is_empty()
    }

    pub fn clear(&mut self) {
        self.message.clear();
        self.stopped.clear();
    }

    fn run<F>(entries: &[Registered], kind: ListenerKind, call: F) -> Option<ListenerFault>
    where
        F: Fn(&Registered) -> ListenerResult,
    {
        let mut first_fault = None;
        for (index, entry) in entries.iter().enumerate() {
            let message = match catch_unwind(AssertUnwindSafe(|| call(entry))) {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => panic_message(payload),
            };
            error!("{} listener #{} failed: {}", kind, index, message);
            if first_fault.is_none() {
                first_fault = Some(ListenerFault {
                    kind,
                    index,
                    message,
                });
            }
        }
        first_fault
    }

    /// 按注册顺序调用所有 `onMessage` 监听器，返回第一个失败
    pub fn dispatch_message(&self, frame: &Frame) -> Option<ListenerFault> {
        Self::run(&self.message, ListenerKind::Message, |entry| {
            entry.listener.on_message(frame, entry.context.as_ref())
        })
    }

    /// 按注册顺序调用所有 `onStopped` 监听器，返回第一个失败
    pub fn dispatch_stopped(&self) -> Option<ListenerFault> {
        Self::run(&self.stopped, ListenerKind::Stopped, |entry| {
            entry.listener.on_stopped(entry.context.as_ref())
        })
    }
}
