//! 心跳发射器
//!
//! 每条 OPEN 连接一个周期任务，固定间隔发送 `heartbeat` 帧，
//! 防止中间代理和客户端 polyfill 掐断空闲长连接。
//!
//! 任务在连接离开 OPEN 时恰好停止一次：关闭信号在 select 循环中
//! 即时唤醒任务退出，发送失败则走与分发失败相同的强制关闭路径，
//! 不会留下为历史连接空转的定时器。

use super::event::SseFrame;
use super::registry::{Connection, ConnectionRegistry, DisconnectReason};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// 心跳间隔
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// 心跳发射器
#[derive(Debug, Clone)]
pub struct HeartbeatEmitter {
    period: Duration,
}

impl HeartbeatEmitter {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// 为一条连接启动心跳任务
    ///
    /// 首个心跳在一个完整周期之后发出。任务退出条件：
    /// - 收到连接的关闭信号
    /// - tick 时发现连接已关闭
    /// - 心跳发送失败（视为传输失败，强制关闭并摘除连接）
    pub fn spawn(
        &self,
        conn: Arc<Connection>,
        registry: Arc<ConnectionRegistry>,
    ) -> JoinHandle<()> {
        let period = self.period;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // interval 的首个 tick 立即完成，先消费掉
            ticker.tick().await;

            let closed = conn.closed_signal();
            tokio::pin!(closed);

            loop {
                tokio::select! {
                    _ = &mut closed => break,

                    _ = ticker.tick() => {
                        if conn.is_closed() {
                            break;
                        }

                        if let Err(e) = conn.send(&SseFrame::heartbeat()) {
                            log::debug!(
                                "Heartbeat delivery failed for {}: {}",
                                conn.admin_id(),
                                e
                            );
                            registry.force_close(&conn, DisconnectReason::TransportError);
                            break;
                        }

                        log::trace!("Heartbeat sent to {}", conn.admin_id());
                    }
                }
            }

            log::debug!("Heartbeat emitter stopped for {}", conn.admin_id());
        })
    }
}

impl Default for HeartbeatEmitter {
    fn default() -> Self {
        Self::new(HEARTBEAT_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::MemoryOverflowBuffer;

    fn short_registry(period: Duration) -> Arc<ConnectionRegistry> {
        Arc::new(ConnectionRegistry::new(
            Arc::new(MemoryOverflowBuffer::new()),
            HeartbeatEmitter::new(period),
        ))
    }

    #[tokio::test]
    async fn test_heartbeats_arrive_periodically() {
        let registry = short_registry(Duration::from_millis(50));
        let mut rx = registry.subscribe("admin@example.com").unwrap();

        let ack = rx.recv().await.unwrap();
        assert!(ack.starts_with("event: connect"));

        // 一个观察窗口内应收到至少 2 个心跳
        let mut heartbeats = 0;
        let deadline = tokio::time::Instant::now() + Duration::from_millis(250);
        while let Ok(Some(frame)) =
            tokio::time::timeout_at(deadline, rx.recv()).await
        {
            if frame.starts_with("event: heartbeat") {
                assert!(frame.contains("keep-alive"));
                heartbeats += 1;
            }
        }

        assert!(heartbeats >= 2, "expected >=2 heartbeats, got {}", heartbeats);
    }

    #[tokio::test]
    async fn test_heartbeat_stops_after_close() {
        let registry = short_registry(Duration::from_millis(50));
        let mut rx = registry.subscribe("admin@example.com").unwrap();
        let _ack = rx.recv().await.unwrap();

        registry.unsubscribe("admin@example.com", DisconnectReason::Completed);

        // 关闭后发送端被取走，流应随即终止且不再出现任何心跳
        let terminated = tokio::time::timeout(Duration::from_millis(150), async {
            while let Some(frame) = rx.recv().await {
                assert!(
                    !frame.starts_with("event: heartbeat"),
                    "heartbeat observed after close"
                );
            }
        })
        .await;

        assert!(terminated.is_ok(), "stream did not terminate after close");
    }

    #[tokio::test]
    async fn test_heartbeat_failure_evicts_connection() {
        let registry = short_registry(Duration::from_millis(30));
        let rx = registry.subscribe("admin@example.com").unwrap();
        assert_eq!(registry.len(), 1);

        // 客户端断连：接收端销毁后下一次心跳发送失败
        drop(rx);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(registry.len(), 0);
    }
}
