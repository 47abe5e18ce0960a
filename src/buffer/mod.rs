//! 溢出缓冲
//!
//! 时限性的 store-and-forward 队列：只有发布时刻没有任何在线
//! 接收者的事件才会进来。FIFO、消费即删除、条目超过保留窗口
//! (默认 24 小时) 未被消费则过期丢弃。
//!
//! 核心只依赖 [`OverflowBuffer`] 抽象：
//! - [`MemoryOverflowBuffer`]: 内存实现，测试与非持久化模式
//! - [`FileOverflowBuffer`]: 追加日志实现，实例重启不丢事件

pub mod file;
pub mod memory;

pub use file::FileOverflowBuffer;
pub use memory::MemoryOverflowBuffer;

use crate::notification::NotificationEvent;
use crate::Result;
use std::time::Duration;

/// 缓冲条目保留窗口
pub const RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// 溢出缓冲抽象
///
/// 实现方自行保证并发安全；弹出单个条目只允许持有缓冲自身的
/// 锁，不得牵连注册表。
pub trait OverflowBuffer: Send + Sync {
    /// 事件入队（附带入队时间，供过期判定）
    fn enqueue(&self, event: &NotificationEvent) -> Result<()>;

    /// 弹出最旧的未过期事件
    ///
    /// 消费是破坏性的：返回过的条目不会再次出现。过期条目在此
    /// 时被跳过并丢弃。缓冲为空返回 `Ok(None)`。
    fn dequeue_oldest(&self) -> Result<Option<NotificationEvent>>;

    /// 当前未消费条目数（含可能已过期但尚未被扫过的条目）
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
