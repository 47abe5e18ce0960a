//! 订单通知发布器
//!
//! 订单流程与通知侧通道之间的唯一接口。下单成功后调用
//! [`OrderNotifier::notify_order_placed`]，把事件发布到广播通道。
//!
//! 通知是订单流程的附加能力，不是记录系统：发布失败只记录日志并
//! 吞掉，绝不允许错误回传进订单处理控制流。

use super::event::NotificationEvent;
use crate::broadcast::{BroadcastChannel, ORDER_PLACED_TOPIC};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 发布统计信息
#[derive(Debug, Default)]
pub struct NotifierStats {
    /// 成功发布数
    pub published: AtomicU64,

    /// 发布失败数（已吞掉）
    pub failed: AtomicU64,

    /// 非下单状态被跳过的事件数
    pub skipped: AtomicU64,
}

/// 统计信息快照
#[derive(Debug, Clone, serde::Serialize)]
pub struct NotifierStatsSnapshot {
    pub published: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// 订单通知发布器
pub struct OrderNotifier {
    channel: Arc<dyn BroadcastChannel>,
    stats: Arc<NotifierStats>,
}

impl OrderNotifier {
    pub fn new(channel: Arc<dyn BroadcastChannel>) -> Self {
        Self {
            channel,
            stats: Arc::new(NotifierStats::default()),
        }
    }

    /// 发布新订单通知（fire-and-forget）
    ///
    /// 只有已下单状态的订单触发通知。任何失败（序列化、发布）
    /// 都在此处消化，调用方不感知。
    pub fn notify_order_placed(&self, event: &NotificationEvent) {
        if !event.is_placed() {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            log::debug!(
                "Skipping notification for order {} in status {}",
                event.order_id,
                event.order_status
            );
            return;
        }

        let bytes = match event.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                log::error!(
                    "Failed to encode order notification: orderId={}: {}",
                    event.order_id,
                    e
                );
                return;
            }
        };

        match self.channel.publish(ORDER_PLACED_TOPIC, bytes) {
            Ok(()) => {
                self.stats.published.fetch_add(1, Ordering::Relaxed);
                log::info!(
                    "Order notification sent to admin: orderId={}, customer={}",
                    event.order_id,
                    event.customer_email
                );
            }
            Err(e) => {
                // 通知失败不影响订单处理
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                log::error!(
                    "Failed to send order notification to admin: orderId={}: {}",
                    event.order_id,
                    e
                );
            }
        }
    }

    /// 获取统计信息
    pub fn get_stats(&self) -> NotifierStatsSnapshot {
        NotifierStatsSnapshot {
            published: self.stats.published.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            skipped: self.stats.skipped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::InProcessBroadcast;
    use crate::notification::event::{OrderItem, ORDER_STATUS_PLACED};
    use crate::{NotifyError, Result};
    use tokio::sync::mpsc;

    fn sample_event(status: &str) -> NotificationEvent {
        NotificationEvent::new(
            42,
            "customer@example.com",
            1,
            status,
            vec![OrderItem {
                product_id: 100,
                quantity: 1,
            }],
        )
    }

    /// 始终失败的广播通道
    struct FailingChannel;

    impl BroadcastChannel for FailingChannel {
        fn publish(&self, _topic: &str, _payload: Vec<u8>) -> Result<()> {
            Err(NotifyError::BroadcastError("broker unavailable".to_string()))
        }

        fn subscribe(
            &self,
            _topic: &str,
            _subscriber_id: &str,
        ) -> mpsc::UnboundedReceiver<Vec<u8>> {
            let (_tx, rx) = mpsc::unbounded_channel();
            rx
        }

        fn unsubscribe(&self, _topic: &str, _subscriber_id: &str) {}
    }

    #[tokio::test]
    async fn test_placed_order_is_published() {
        let channel = Arc::new(InProcessBroadcast::new());
        let mut rx = channel.subscribe(ORDER_PLACED_TOPIC, "probe");

        let notifier = OrderNotifier::new(channel.clone());
        notifier.notify_order_placed(&sample_event(ORDER_STATUS_PLACED));

        let payload = rx.recv().await.unwrap();
        let decoded = NotificationEvent::from_bytes(&payload).unwrap();
        assert_eq!(decoded.order_id, 42);
        assert_eq!(notifier.get_stats().published, 1);
    }

    #[tokio::test]
    async fn test_non_placed_order_is_skipped() {
        let channel = Arc::new(InProcessBroadcast::new());
        let mut rx = channel.subscribe(ORDER_PLACED_TOPIC, "probe");

        let notifier = OrderNotifier::new(channel.clone());
        notifier.notify_order_placed(&sample_event("CANCELED"));

        assert_eq!(notifier.get_stats().skipped, 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_publish_failure_is_swallowed() {
        let notifier = OrderNotifier::new(Arc::new(FailingChannel));

        // 不 panic、不返回错误：失败只体现在统计里
        notifier.notify_order_placed(&sample_event(ORDER_STATUS_PLACED));

        let stats = notifier.get_stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.published, 0);
    }
}
