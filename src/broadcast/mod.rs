//! 广播通道
//!
//! 发布/订阅主题：每条发布的消息独立送达每一个订阅了该主题的
//! 消费者（水平扩展时即每个服务实例一份）。核心只依赖这里的
//! [`BroadcastChannel`] 抽象；事件在通道上以序列化字节流传递。
//!
//! 进程内实现 [`InProcessBroadcast`] 覆盖单实例部署与测试；
//! 多实例部署换用消息中间件背书的实现，接口不变。

pub mod in_process;

pub use in_process::InProcessBroadcast;

use crate::Result;
use tokio::sync::mpsc;

/// 订单已下单事件的固定路由键
pub const ORDER_PLACED_TOPIC: &str = "order.created";

/// 广播通道抽象
///
/// 实现方保证：发布对每个订阅者独立投递（at-least-once），
/// 且自身的并发安全不依赖调用方加锁。
pub trait BroadcastChannel: Send + Sync {
    /// 发布一条消息到主题
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// 订阅主题
    ///
    /// # 参数
    /// - `topic`: 主题
    /// - `subscriber_id`: 订阅者标识（通常是实例/消费者 ID）
    ///
    /// # 返回
    /// 消息接收端，订阅者从中逐条读取序列化载荷。
    fn subscribe(&self, topic: &str, subscriber_id: &str) -> mpsc::UnboundedReceiver<Vec<u8>>;

    /// 取消订阅
    fn unsubscribe(&self, topic: &str, subscriber_id: &str);
}
