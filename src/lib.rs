//! # ORDERNOTIFY-RS
//!
//! 订单通知服务 - 管理员实时推送系统
//!
//! ## 核心能力
//!
//! - **连接注册表**: 每实例维护管理员 SSE 连接 (identity -> Connection)
//! - **实时分发**: 广播事件推送到本实例所有在线连接
//! - **溢出缓冲**: 无人在线时事件落入持久化 FIFO 队列 (24小时保留)
//! - **补发机制**: 管理员重新订阅时批量补发积压通知 (单次最多100条)
//! - **心跳保活**: 每连接 30 秒心跳，防止中间代理断开空闲连接
//! - **对外服务**: HTTP API + SSE 长连接 (基于 Actix-web)
//!
//! ## 架构设计
//!
//! ```text
//! 订单系统 (Event Source)
//!     ↓ publish
//! Broadcast Channel (order.created) ← 每个实例独立订阅
//!     ↓
//! Live Dispatcher (notification/dispatcher)
//!     ↓                      ↘ 无在线连接
//! Connection Registry          Overflow Buffer (持久化)
//!     ↓                      ↗ 订阅时补发
//! SSE 客户端 (管理员)
//! ```

#![allow(dead_code)]
#![allow(unused_imports)]

// ============================================================================
// 外部依赖
// ============================================================================

// Web 框架
pub use actix_web;

// 异步运行时
pub use futures;
pub use tokio;

// 并发工具
pub use dashmap;
pub use parking_lot;

// 序列化
pub use serde;
pub use serde_json;

// 时间
pub use chrono;

// 日志
pub use log;

// 错误处理
pub use thiserror;

// UUID
pub use uuid;

// ============================================================================
// 内部模块
// ============================================================================

/// 通知核心 (事件、注册表、分发器、心跳)
pub mod notification;

/// 广播通道 (发布/订阅)
pub mod broadcast;

/// 溢出缓冲 (持久化 FIFO 队列)
pub mod buffer;

/// 对外服务层 (HTTP + SSE)
pub mod service;

/// 工具模块
pub mod utils;

// ============================================================================
// 重导出常用类型
// ============================================================================

pub use broadcast::{BroadcastChannel, InProcessBroadcast, ORDER_PLACED_TOPIC};
pub use buffer::{FileOverflowBuffer, MemoryOverflowBuffer, OverflowBuffer};
pub use notification::{
    Connection, ConnectionRegistry, ConnectionState, DisconnectReason, LiveDispatcher,
    NotificationEvent, OrderItem, OrderNotifier, SseFrame,
};

// ============================================================================
// 全局错误类型
// ============================================================================

/// 通知服务错误类型
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Broadcast error: {0}")]
    BroadcastError(String),

    #[error("Buffer error: {0}")]
    BufferError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),
}

pub type Result<T> = std::result::Result<T, NotifyError>;
