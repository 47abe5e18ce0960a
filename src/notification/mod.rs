//! 通知核心
//!
//! 提供完整的订单通知功能：
//! - 事件定义和 SSE 帧格式（event）
//! - 连接注册表与生命周期管理（registry）
//! - 广播事件实时分发（dispatcher）
//! - 连接保活心跳（heartbeat）
//! - 订单侧发布入口（notifier）
//!
//! # 架构
//!
//! ```text
//! 订单流程
//!     ↓ notify_order_placed
//! OrderNotifier ──publish──▶ BroadcastChannel (order.created)
//!                                  ↓ 每实例独立消费
//!                           LiveDispatcher
//!                          ↙ 在线        ↘ 无人在线
//!            ConnectionRegistry       OverflowBuffer
//!                    ↓ SSE 帧             ↑↓ 订阅时补发
//!               管理员客户端 ◀────────────┘
//! ```
//!
//! # 示例
//!
//! ```rust,no_run
//! use ordernotify::broadcast::InProcessBroadcast;
//! use ordernotify::buffer::MemoryOverflowBuffer;
//! use ordernotify::notification::{
//!     ConnectionRegistry, HeartbeatEmitter, LiveDispatcher, NotificationEvent, OrderItem,
//!     OrderNotifier,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     // 1. 基础设施
//!     let channel = Arc::new(InProcessBroadcast::new());
//!     let buffer = Arc::new(MemoryOverflowBuffer::new());
//!
//!     // 2. 注册表 + 分发器
//!     let registry = Arc::new(ConnectionRegistry::new(
//!         buffer.clone(),
//!         HeartbeatEmitter::default(),
//!     ));
//!     let dispatcher = Arc::new(LiveDispatcher::new(registry.clone(), buffer.clone()));
//!     let _consumer = dispatcher
//!         .clone()
//!         .start_broadcast_consumer(channel.clone(), "instance_01");
//!
//!     // 3. 管理员订阅
//!     let mut rx = registry.subscribe("admin@example.com").unwrap();
//!
//!     // 4. 订单侧发布
//!     let notifier = OrderNotifier::new(channel);
//!     let event = NotificationEvent::new(
//!         1001,
//!         "customer@example.com",
//!         7,
//!         "ORDERED",
//!         vec![OrderItem { product_id: 1, quantity: 2 }],
//!     );
//!     notifier.notify_order_placed(&event);
//!
//!     // 5. SSE 帧到达
//!     while let Some(frame) = rx.recv().await {
//!         println!("{}", frame);
//!     }
//! }
//! ```

pub mod dispatcher;
pub mod event;
pub mod heartbeat;
pub mod notifier;
pub mod registry;

// 导出核心类型
pub use dispatcher::{DispatcherStats, DispatcherStatsSnapshot, LiveDispatcher};
pub use event::{NotificationEvent, OrderItem, SseFrame, ORDER_STATUS_PLACED};
pub use heartbeat::{HeartbeatEmitter, HEARTBEAT_INTERVAL};
pub use notifier::{NotifierStats, NotifierStatsSnapshot, OrderNotifier};
pub use registry::{
    Connection, ConnectionRegistry, ConnectionState, DisconnectReason, RegistryStats,
    RegistryStatsSnapshot, DRAIN_BATCH_SIZE,
};
