//! 连接注册表与生命周期管理
//!
//! 职责：
//! 1. 维护本实例的管理员连接 (identity -> Connection)
//! 2. 订阅建立：原子替换同身份旧连接、发送连接确认、补发积压通知、启动心跳
//! 3. 订阅拆除：完成/超时/传输错误三种触发，全部幂等
//! 4. 供分发器做单次遍历推送（失败即摘除）
//!
//! 注册表是核心中唯一的共享可变状态，使用 DashMap 分片并发访问，
//! 不同身份的订阅互不阻塞。

use super::event::SseFrame;
use super::heartbeat::HeartbeatEmitter;
use crate::buffer::OverflowBuffer;
use crate::{NotifyError, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Notify;

/// 单次订阅补发的积压通知上限（防止重连风暴压垮传输层）
pub const DRAIN_BATCH_SIZE: usize = 100;

/// 连接生命周期状态
///
/// OPEN -> CLOSED 单向转移，CLOSED 为终态。
/// 注册表中存在的连接恒为 OPEN。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closed,
}

/// 连接断开原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// 客户端正常结束
    Completed,
    /// 传输层超时
    Timeout,
    /// 发送失败（含 broken-pipe 类断连，属预期的客户端行为）
    TransportError,
}

/// 管理员连接
///
/// 一个管理员在本实例上的 SSE 通道。发送句柄被取走即视为 CLOSED，
/// 关闭转移只会发生一次，后续 close 调用均为空操作。
pub struct Connection {
    /// 所属管理员身份（邮箱）
    admin_id: Arc<str>,

    /// 连接 ID（同一身份重复订阅时区分新旧连接）
    conn_id: String,

    /// 帧发送通道；None 表示已关闭
    sender: Mutex<Option<mpsc::UnboundedSender<String>>>,

    /// 关闭信号（心跳任务据此立即退出）
    close_notify: Notify,

    /// 建立时间 (Unix 秒)
    connected_at: i64,
}

impl Connection {
    /// 创建连接，返回连接本体与帧接收端（交给 HTTP 层做流式响应）
    pub fn new(admin_id: Arc<str>) -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let conn = Arc::new(Self {
            admin_id,
            conn_id: uuid::Uuid::new_v4().to_string(),
            sender: Mutex::new(Some(tx)),
            close_notify: Notify::new(),
            connected_at: chrono::Utc::now().timestamp(),
        });

        (conn, rx)
    }

    pub fn admin_id(&self) -> &str {
        &self.admin_id
    }

    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    pub fn connected_at(&self) -> i64 {
        self.connected_at
    }

    pub fn state(&self) -> ConnectionState {
        if self.is_closed() {
            ConnectionState::Closed
        } else {
            ConnectionState::Open
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// 发送一帧
    ///
    /// 连接已关闭或对端接收器已销毁（客户端断连）时返回错误。
    pub fn send(&self, frame: &SseFrame) -> Result<()> {
        let guard = self.sender.lock();
        match guard.as_ref() {
            Some(tx) => tx.send(frame.render()).map_err(|_| {
                NotifyError::ConnectionClosed(format!(
                    "receiver dropped for {}",
                    self.admin_id
                ))
            }),
            None => Err(NotifyError::ConnectionClosed(format!(
                "connection closed for {}",
                self.admin_id
            ))),
        }
    }

    /// 关闭连接（幂等）
    ///
    /// 返回 true 表示本次调用完成了 OPEN -> CLOSED 转移。
    /// 取走发送端使接收流终止，并唤醒心跳任务。
    pub fn close(&self) -> bool {
        let taken = self.sender.lock().take();
        if taken.is_some() {
            self.close_notify.notify_waiters();
            true
        } else {
            false
        }
    }

    /// 关闭信号，在心跳任务的 select 循环中等待
    pub(crate) fn closed_signal(&self) -> tokio::sync::futures::Notified<'_> {
        self.close_notify.notified()
    }
}

/// 注册表统计信息
#[derive(Debug, Default)]
pub struct RegistryStats {
    /// 累计订阅数
    pub subscribed: AtomicU64,

    /// 被新订阅替换的旧连接数
    pub superseded: AtomicU64,

    /// 累计补发的积压通知数
    pub drained: AtomicU64,

    /// 因发送失败被摘除的连接数
    pub evicted: AtomicU64,
}

/// 统计信息快照
#[derive(Debug, Clone, serde::Serialize)]
pub struct RegistryStatsSnapshot {
    pub active_connections: usize,
    pub subscribed: u64,
    pub superseded: u64,
    pub drained: u64,
    pub evicted: u64,
}

/// 连接注册表
pub struct ConnectionRegistry {
    /// 连接表：admin_id -> Connection，每身份至多一条 OPEN 连接
    connections: DashMap<Arc<str>, Arc<Connection>>,

    /// 溢出缓冲（订阅时从这里补发）
    buffer: Arc<dyn OverflowBuffer>,

    /// 心跳发射器
    heartbeat: HeartbeatEmitter,

    /// 单次补发上限
    drain_batch_size: usize,

    /// 统计信息
    stats: Arc<RegistryStats>,
}

impl ConnectionRegistry {
    pub fn new(buffer: Arc<dyn OverflowBuffer>, heartbeat: HeartbeatEmitter) -> Self {
        Self {
            connections: DashMap::new(),
            buffer,
            heartbeat,
            drain_batch_size: DRAIN_BATCH_SIZE,
            stats: Arc::new(RegistryStats::default()),
        }
    }

    /// 覆盖单次补发上限（测试用）
    pub fn with_drain_batch_size(mut self, size: usize) -> Self {
        self.drain_batch_size = size;
        self
    }

    /// 建立订阅
    ///
    /// # 流程
    /// 1. 原子替换同身份旧连接（旧连接尽力关闭，错误忽略）
    /// 2. 发送 `connect` 确认帧
    /// 3. 同步补发溢出缓冲中的积压通知（见 [`Self::drain_pending`]）
    /// 4. 启动心跳任务
    ///
    /// # 返回
    /// 帧接收端，由 HTTP 层包装为长连接流式响应。
    pub fn subscribe(self: &Arc<Self>, admin_id: &str) -> Result<mpsc::UnboundedReceiver<String>> {
        let admin_id: Arc<str> = Arc::from(admin_id);
        let (conn, rx) = Connection::new(admin_id.clone());

        if let Some(old) = self.connections.insert(admin_id.clone(), conn.clone()) {
            old.close();
            self.stats.superseded.fetch_add(1, Ordering::Relaxed);
            log::info!("Superseded stale connection for {}", admin_id);
        }

        if let Err(e) = conn.send(&SseFrame::connect()) {
            // 确认帧都发不出去，视为订阅失败并回收刚插入的表项
            self.connections
                .remove_if(admin_id.as_ref(), |_, held| held.conn_id() == conn.conn_id());
            conn.close();
            return Err(e);
        }

        self.drain_pending(&conn);

        self.heartbeat.spawn(conn.clone(), self.clone());
        self.stats.subscribed.fetch_add(1, Ordering::Relaxed);

        log::info!(
            "Administrator {} subscribed (conn {})",
            admin_id,
            conn.conn_id()
        );

        Ok(rx)
    }

    /// 拆除订阅（幂等）
    ///
    /// 身份不存在或重复调用均为空操作。
    pub fn unsubscribe(&self, admin_id: &str, reason: DisconnectReason) {
        if let Some((_, conn)) = self.connections.remove(admin_id) {
            conn.close();

            match reason {
                // broken-pipe 类断连是预期的客户端行为，降低日志级别
                DisconnectReason::TransportError => {
                    log::debug!("Administrator {} disconnected by transport", admin_id)
                }
                _ => log::info!(
                    "Administrator {} unsubscribed ({:?})",
                    admin_id,
                    reason
                ),
            }
        }
    }

    /// 统一的强制关闭入口
    ///
    /// 分发失败、心跳失败、生命周期拆除三处探测共用此路径。
    /// 只有表项仍指向同一条连接时才摘除，避免旧连接的探测器
    /// 误伤已替换它的新连接。
    pub fn force_close(&self, conn: &Arc<Connection>, reason: DisconnectReason) {
        if conn.close() {
            match reason {
                DisconnectReason::TransportError => log::debug!(
                    "Connection {} for {} dropped by transport",
                    conn.conn_id(),
                    conn.admin_id()
                ),
                _ => log::info!(
                    "Connection {} for {} force-closed ({:?})",
                    conn.conn_id(),
                    conn.admin_id(),
                    reason
                ),
            }
        }

        self.connections
            .remove_if(conn.admin_id(), |_, held| held.conn_id() == conn.conn_id());
    }

    /// 单次遍历推送
    ///
    /// 对每个表项尝试发送；失败的连接尽力关闭并当场摘除，
    /// 每个表项只检查一次。返回成功送达的连接数。
    pub fn fan_out(&self, frame: &SseFrame) -> usize {
        let mut delivered = 0usize;

        self.connections.retain(|admin_id, conn| {
            match conn.send(frame) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    conn.close();
                    self.stats.evicted.fetch_add(1, Ordering::Relaxed);
                    log::debug!("Evicting dead connection for {} during dispatch", admin_id);
                    false
                }
            }
        });

        delivered
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// 指定身份当前是否在线
    pub fn contains(&self, admin_id: &str) -> bool {
        self.connections.contains_key(admin_id)
    }

    /// 补发积压通知
    ///
    /// 逐条弹出最旧事件并以 `pending-order` 帧发送，直到缓冲为空或
    /// 达到单次上限。发送失败即中止，已弹出未送达的事件不再回灌
    /// 缓冲（补发是尽力而为的追赶路径，客户端重连即可再次追上）。
    fn drain_pending(&self, conn: &Arc<Connection>) {
        let mut drained = 0usize;

        while drained < self.drain_batch_size {
            match self.buffer.dequeue_oldest() {
                Ok(Some(event)) => {
                    let frame = match SseFrame::pending_order(&event) {
                        Ok(frame) => frame,
                        Err(e) => {
                            log::error!(
                                "Failed to encode pending notification orderId={}: {}",
                                event.order_id,
                                e
                            );
                            continue;
                        }
                    };

                    if let Err(e) = conn.send(&frame) {
                        log::warn!(
                            "Catch-up delivery aborted for {}: {}",
                            conn.admin_id(),
                            e
                        );
                        return;
                    }

                    drained += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    // 读缓冲失败只中止本次补发，不影响其他订阅者
                    log::error!("Overflow buffer read failed during drain: {}", e);
                    break;
                }
            }
        }

        if drained > 0 {
            self.stats
                .drained
                .fetch_add(drained as u64, Ordering::Relaxed);
            log::info!(
                "Drained {} pending notifications to {}",
                drained,
                conn.admin_id()
            );
        }
    }

    /// 获取统计信息
    pub fn get_stats(&self) -> RegistryStatsSnapshot {
        RegistryStatsSnapshot {
            active_connections: self.connections.len(),
            subscribed: self.stats.subscribed.load(Ordering::Relaxed),
            superseded: self.stats.superseded.load(Ordering::Relaxed),
            drained: self.stats.drained.load(Ordering::Relaxed),
            evicted: self.stats.evicted.load(Ordering::Relaxed),
        }
    }
}
