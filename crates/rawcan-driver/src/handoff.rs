//! 接收线程与消费端之间的就绪交接
//!
//! 单个 `ready` 标志加条件变量：
//!
//! - 接收线程检测到可读后置位 `ready` 并通知消费端，之后阻塞在条件变量上，
//!   直到消费端清除 `ready`，不会重复通知同一批数据
//! - 消费端处理完一批后清除 `ready` 并唤醒接收线程
//! - `stop_requested` 同样受这把锁保护，请求退出时唤醒所有等待者

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct HandoffState {
    ready: bool,
    stop_requested: bool,
}

#[derive(Debug, Default)]
pub struct ReadyHandoff {
    state: Mutex<HandoffState>,
    cond: Condvar,
}

impl ReadyHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启动前复位
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.ready = false;
        state.stop_requested = false;
    }

    /// 接收线程：等待上一次通知被消费
    ///
    /// 返回 `false` 表示已请求退出。
    pub fn wait_until_consumed(&self) -> bool {
        let mut state = self.state.lock();
        while state.ready && !state.stop_requested {
            self.cond.wait(&mut state);
        }
        !state.stop_requested
    }

    /// 接收线程：标记有数据待读
    ///
    /// 已请求退出或上一批尚未消费时返回 `false`，此时不应再发通知。
    pub fn mark_ready(&self) -> bool {
        let mut state = self.state.lock();
        if state.stop_requested || state.ready {
            return false;
        }
        state.ready = true;
        true
    }

    /// 消费端：一批处理完毕，唤醒接收线程
    pub fn clear_ready(&self) {
        let mut state = self.state.lock();
        state.ready = false;
        self.cond.notify_all();
    }

    /// 请求接收线程退出
    pub fn request_stop(&self) {
        let mut state = self.state.lock();
        state.stop_requested = true;
        state.ready = false;
        self.cond.notify_all();
    }

    pub fn stop_requested(&self) -> bool {
        self.state.lock().stop_requested
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().ready
    }
}
