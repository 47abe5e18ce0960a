//! 进程内广播实现
//!
//! 订阅者表 + 逐一投递。单进程部署与测试用；多实例部署由
//! 消息中间件实现同一抽象。

use super::BroadcastChannel;
use crate::Result;
use dashmap::DashMap;
use tokio::sync::mpsc;

/// 进程内广播通道
pub struct InProcessBroadcast {
    /// 订阅者映射 (subscriber_id -> (topic, Sender))
    subscribers: DashMap<String, (String, mpsc::UnboundedSender<Vec<u8>>)>,
}

impl InProcessBroadcast {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
        }
    }

    /// 当前订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl Default for InProcessBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastChannel for InProcessBroadcast {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        for entry in self.subscribers.iter() {
            let (subscriber_id, (subscribed_topic, sender)) = entry.pair();

            if subscribed_topic != topic {
                continue;
            }

            if sender.send(payload.clone()).is_err() {
                log::warn!(
                    "Failed to deliver broadcast to subscriber {} (receiver gone)",
                    subscriber_id
                );
            }
        }

        Ok(())
    }

    fn subscribe(&self, topic: &str, subscriber_id: &str) -> mpsc::UnboundedReceiver<Vec<u8>> {
        let (sender, receiver) = mpsc::unbounded_channel();

        self.subscribers
            .insert(subscriber_id.to_string(), (topic.to_string(), sender));

        log::info!("Subscriber {} subscribed to topic {}", subscriber_id, topic);

        receiver
    }

    fn unsubscribe(&self, _topic: &str, subscriber_id: &str) {
        self.subscribers.remove(subscriber_id);
        log::info!("Subscriber {} unsubscribed", subscriber_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::ORDER_PLACED_TOPIC;

    #[tokio::test]
    async fn test_every_subscriber_receives_every_publish() {
        let channel = InProcessBroadcast::new();

        let mut rx_a = channel.subscribe(ORDER_PLACED_TOPIC, "instance_a");
        let mut rx_b = channel.subscribe(ORDER_PLACED_TOPIC, "instance_b");

        channel.publish(ORDER_PLACED_TOPIC, b"one".to_vec()).unwrap();
        channel.publish(ORDER_PLACED_TOPIC, b"two".to_vec()).unwrap();

        for rx in [&mut rx_a, &mut rx_b] {
            assert_eq!(rx.recv().await.unwrap(), b"one");
            assert_eq!(rx.recv().await.unwrap(), b"two");
        }
    }

    #[tokio::test]
    async fn test_topic_isolation() {
        let channel = InProcessBroadcast::new();

        let mut rx = channel.subscribe("other.topic", "instance_a");

        channel
            .publish(ORDER_PLACED_TOPIC, b"order".to_vec())
            .unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let channel = InProcessBroadcast::new();

        let mut rx = channel.subscribe(ORDER_PLACED_TOPIC, "instance_a");
        channel.unsubscribe(ORDER_PLACED_TOPIC, "instance_a");

        channel
            .publish(ORDER_PLACED_TOPIC, b"order".to_vec())
            .unwrap();

        // 发送端已移除，流终止
        assert!(rx.recv().await.is_none());
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_dead_subscriber_does_not_fail_publish() {
        let channel = InProcessBroadcast::new();

        let rx = channel.subscribe(ORDER_PLACED_TOPIC, "instance_a");
        drop(rx);

        // 接收端已销毁也不报错，发布继续
        assert!(channel.publish(ORDER_PLACED_TOPIC, b"x".to_vec()).is_ok());
    }
}
