//! 内存溢出缓冲
//!
//! Mutex 保护的 VecDeque，进程退出即失。测试与显式关闭持久化
//! 的部署使用。

use super::{OverflowBuffer, RETENTION};
use crate::notification::NotificationEvent;
use crate::Result;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

struct BufferedEntry {
    event: NotificationEvent,
    enqueued_at: Instant,
}

/// 内存溢出缓冲
pub struct MemoryOverflowBuffer {
    entries: Mutex<VecDeque<BufferedEntry>>,
    retention: Duration,
}

impl MemoryOverflowBuffer {
    pub fn new() -> Self {
        Self::with_retention(RETENTION)
    }

    /// 自定义保留窗口（测试用）
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            retention,
        }
    }
}

impl Default for MemoryOverflowBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl OverflowBuffer for MemoryOverflowBuffer {
    fn enqueue(&self, event: &NotificationEvent) -> Result<()> {
        self.entries.lock().push_back(BufferedEntry {
            event: event.clone(),
            enqueued_at: Instant::now(),
        });
        Ok(())
    }

    fn dequeue_oldest(&self) -> Result<Option<NotificationEvent>> {
        let mut entries = self.entries.lock();

        while let Some(entry) = entries.pop_front() {
            if entry.enqueued_at.elapsed() > self.retention {
                log::debug!(
                    "Discarding expired buffered notification: orderId={}",
                    entry.event.order_id
                );
                continue;
            }
            return Ok(Some(entry.event));
        }

        Ok(None)
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::event::{OrderItem, ORDER_STATUS_PLACED};

    fn sample_event(order_id: i64) -> NotificationEvent {
        NotificationEvent::new(
            order_id,
            "customer@example.com",
            1,
            ORDER_STATUS_PLACED,
            vec![OrderItem {
                product_id: 100,
                quantity: 1,
            }],
        )
    }

    #[test]
    fn test_fifo_order() {
        let buffer = MemoryOverflowBuffer::new();

        for order_id in [1, 2, 3] {
            buffer.enqueue(&sample_event(order_id)).unwrap();
        }

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.dequeue_oldest().unwrap().unwrap().order_id, 1);
        assert_eq!(buffer.dequeue_oldest().unwrap().unwrap().order_id, 2);
        assert_eq!(buffer.dequeue_oldest().unwrap().unwrap().order_id, 3);
        assert!(buffer.dequeue_oldest().unwrap().is_none());
    }

    #[test]
    fn test_consumption_is_destructive() {
        let buffer = MemoryOverflowBuffer::new();
        buffer.enqueue(&sample_event(1)).unwrap();

        assert!(buffer.dequeue_oldest().unwrap().is_some());
        assert!(buffer.dequeue_oldest().unwrap().is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_expired_entries_discarded() {
        let buffer = MemoryOverflowBuffer::with_retention(Duration::from_millis(10));

        buffer.enqueue(&sample_event(1)).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        buffer.enqueue(&sample_event(2)).unwrap();

        // 过期的 1 被跳过丢弃，直接拿到 2
        assert_eq!(buffer.dequeue_oldest().unwrap().unwrap().order_id, 2);
        assert!(buffer.dequeue_oldest().unwrap().is_none());
    }
}
