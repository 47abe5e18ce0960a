//! 实时分发器
//!
//! 职责：
//! 1. 以单一消费者订阅广播通道，按接收顺序处理事件
//! 2. 有在线连接：单次遍历推送 `new-order` 帧，失败连接当场摘除
//! 3. 无在线连接（或本次推送全部失败）：事件转入溢出缓冲
//!
//! 先推送再复查空表，而不是先查空再推送：避免查空与推送之间
//! 注册表由空变非空时多余入缓冲。跨实例重复投递是有界的既定
//! 代价，静默丢失才是错误。

use super::event::{NotificationEvent, SseFrame};
use super::registry::ConnectionRegistry;
use crate::broadcast::BroadcastChannel;
use crate::buffer::OverflowBuffer;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// 分发统计信息
#[derive(Debug, Default)]
pub struct DispatcherStats {
    /// 实时送达的 (事件, 连接) 次数
    pub delivered: AtomicU64,

    /// 转入溢出缓冲的事件数
    pub buffered: AtomicU64,

    /// 入缓冲失败的事件数（仅此路径可能静默丢失）
    pub dropped: AtomicU64,

    /// 反序列化失败的广播载荷数
    pub decode_errors: AtomicU64,
}

/// 统计信息快照
#[derive(Debug, Clone, serde::Serialize)]
pub struct DispatcherStatsSnapshot {
    pub delivered: u64,
    pub buffered: u64,
    pub dropped: u64,
    pub decode_errors: u64,
}

/// 实时分发器
pub struct LiveDispatcher {
    registry: Arc<ConnectionRegistry>,
    buffer: Arc<dyn OverflowBuffer>,
    stats: Arc<DispatcherStats>,
}

impl LiveDispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>, buffer: Arc<dyn OverflowBuffer>) -> Self {
        Self {
            registry,
            buffer,
            stats: Arc::new(DispatcherStats::default()),
        }
    }

    /// 处理一条广播事件
    pub fn on_broadcast_event(&self, event: &NotificationEvent) {
        // 本实例无在线连接：事件属于溢出缓冲
        if self.registry.is_empty() {
            self.buffer_event(event);
            return;
        }

        let frame = match SseFrame::new_order(event) {
            Ok(frame) => frame,
            Err(e) => {
                log::error!(
                    "Failed to encode notification orderId={}: {}",
                    event.order_id,
                    e
                );
                return;
            }
        };

        let delivered = self.registry.fan_out(&frame);

        if delivered > 0 {
            self.stats
                .delivered
                .fetch_add(delivered as u64, Ordering::Relaxed);
            log::info!(
                "Order notification delivered live: orderId={}, recipients={}",
                event.order_id,
                delivered
            );
        }

        // 推送使注册表清空（全部发送失败）：从本实例视角事件未送达任何人
        if delivered == 0 && self.registry.is_empty() {
            self.buffer_event(event);
        }
    }

    fn buffer_event(&self, event: &NotificationEvent) {
        match self.buffer.enqueue(event) {
            Ok(()) => {
                self.stats.buffered.fetch_add(1, Ordering::Relaxed);
                log::info!(
                    "No live recipients, order notification buffered: orderId={}",
                    event.order_id
                );
            }
            Err(e) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                log::error!(
                    "Failed to buffer order notification orderId={}: {}",
                    event.order_id,
                    e
                );
            }
        }
    }

    /// 启动广播消费任务
    ///
    /// 订阅固定主题，逐条反序列化并交给 [`Self::on_broadcast_event`]。
    /// 无法解码的载荷记录后跳过。
    pub fn start_broadcast_consumer(
        self: Arc<Self>,
        channel: Arc<dyn BroadcastChannel>,
        consumer_id: impl Into<String>,
    ) -> JoinHandle<()> {
        let consumer_id = consumer_id.into();
        let mut receiver = channel.subscribe(crate::broadcast::ORDER_PLACED_TOPIC, &consumer_id);

        tokio::spawn(async move {
            log::info!("Broadcast consumer {} started", consumer_id);

            while let Some(payload) = receiver.recv().await {
                match NotificationEvent::from_bytes(&payload) {
                    Ok(event) => self.on_broadcast_event(&event),
                    Err(e) => {
                        self.stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                        log::error!("Undecodable broadcast payload skipped: {}", e);
                    }
                }
            }

            log::info!("Broadcast consumer {} stopped", consumer_id);
        })
    }

    /// 获取统计信息
    pub fn get_stats(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            delivered: self.stats.delivered.load(Ordering::Relaxed),
            buffered: self.stats.buffered.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
            decode_errors: self.stats.decode_errors.load(Ordering::Relaxed),
        }
    }
}
