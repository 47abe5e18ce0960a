//! 通知事件结构定义
//!
//! 设计原则：
//! 1. 不可变值对象 - 事件一经产生不再修改
//! 2. 跨进程传递 - 以 JSON 字节流穿越广播通道和溢出缓冲
//! 3. 字段命名与前端约定一致 (camelCase)

use crate::{NotifyError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 已下单状态标识（只有该状态的订单触发通知）
pub const ORDER_STATUS_PLACED: &str = "ORDERED";

/// 订单通知事件
///
/// 一条 "新订单已下单" 事实。由订单系统产生一次，随后原样流经
/// 广播通道、溢出缓冲和 SSE 推送，全程不做语义修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    /// 订单 ID（管理员定位订单用）
    pub order_id: i64,

    /// 下单客户邮箱
    pub customer_email: String,

    /// 下单客户 ID
    pub customer_id: i64,

    /// 订单状态（ORDERED / CANCELED 等）
    pub order_status: String,

    /// 商品总数量
    pub total_items: i64,

    /// 下单时间，格式 yyyy-MM-dd HH:mm:ss
    #[serde(with = "order_time_format")]
    pub order_time: NaiveDateTime,

    /// 订单明细
    pub order_items: Vec<OrderItem>,
}

/// 订单明细条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: i64,
    pub quantity: i64,
}

impl NotificationEvent {
    /// 从订单要素构造事件
    ///
    /// `total_items` 为明细数量之和，`order_time` 取当前本地时间。
    pub fn new(
        order_id: i64,
        customer_email: impl Into<String>,
        customer_id: i64,
        order_status: impl Into<String>,
        order_items: Vec<OrderItem>,
    ) -> Self {
        let total_items = order_items.iter().map(|item| item.quantity).sum();

        Self {
            order_id,
            customer_email: customer_email.into(),
            customer_id,
            order_status: order_status.into(),
            total_items,
            order_time: chrono::Local::now().naive_local(),
            order_items,
        }
    }

    /// 是否为已下单事件
    pub fn is_placed(&self) -> bool {
        self.order_status == ORDER_STATUS_PLACED
    }

    /// 序列化为 JSON 字节流（广播通道/溢出缓冲的线上格式）
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| NotifyError::SerializationError(e.to_string()))
    }

    /// 从 JSON 字节流反序列化
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| NotifyError::SerializationError(e.to_string()))
    }
}

/// 下单时间序列化格式 (yyyy-MM-dd HH:mm:ss，无时区)
mod order_time_format {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(dt: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&dt.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}

/// SSE 帧
///
/// 推送到客户端的单条消息，带命名事件类型：
/// - `connect`: 连接确认
/// - `new-order`: 实时订单通知
/// - `pending-order`: 补发的积压通知（客户端据此区分展示）
/// - `heartbeat`: 保活信号
#[derive(Debug, Clone, PartialEq)]
pub struct SseFrame {
    pub event: &'static str,
    pub data: String,
}

impl SseFrame {
    /// 连接确认帧
    pub fn connect() -> Self {
        Self {
            event: "connect",
            data: "connected!!".to_string(),
        }
    }

    /// 心跳帧
    pub fn heartbeat() -> Self {
        Self {
            event: "heartbeat",
            data: "keep-alive".to_string(),
        }
    }

    /// 实时订单帧
    pub fn new_order(event: &NotificationEvent) -> Result<Self> {
        Ok(Self {
            event: "new-order",
            data: serde_json::to_string(event)
                .map_err(|e| NotifyError::SerializationError(e.to_string()))?,
        })
    }

    /// 补发订单帧（与 new-order 同 schema，仅事件名不同）
    pub fn pending_order(event: &NotificationEvent) -> Result<Self> {
        Ok(Self {
            event: "pending-order",
            data: serde_json::to_string(event)
                .map_err(|e| NotifyError::SerializationError(e.to_string()))?,
        })
    }

    /// 渲染为 SSE 线上格式
    pub fn render(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_event() -> NotificationEvent {
        NotificationEvent {
            order_id: 42,
            customer_email: "alice@example.com".to_string(),
            customer_id: 7,
            order_status: ORDER_STATUS_PLACED.to_string(),
            total_items: 3,
            order_time: NaiveDate::from_ymd_opt(2025, 1, 2)
                .unwrap()
                .and_hms_opt(3, 4, 5)
                .unwrap(),
            order_items: vec![
                OrderItem {
                    product_id: 100,
                    quantity: 1,
                },
                OrderItem {
                    product_id: 200,
                    quantity: 2,
                },
            ],
        }
    }

    #[test]
    fn test_json_schema_field_names() {
        let json = serde_json::to_string(&sample_event()).unwrap();

        assert!(json.contains("\"orderId\":42"));
        assert!(json.contains("\"customerEmail\":\"alice@example.com\""));
        assert!(json.contains("\"customerId\":7"));
        assert!(json.contains("\"orderStatus\":\"ORDERED\""));
        assert!(json.contains("\"totalItems\":3"));
        assert!(json.contains("\"orderTime\":\"2025-01-02 03:04:05\""));
        assert!(json.contains("\"orderItems\""));
        assert!(json.contains("\"productId\":100"));
        assert!(json.contains("\"quantity\":2"));
    }

    #[test]
    fn test_bytes_round_trip() {
        let event = sample_event();
        let bytes = event.to_bytes().unwrap();
        let decoded = NotificationEvent::from_bytes(&bytes).unwrap();

        assert_eq!(decoded, event);
    }

    #[test]
    fn test_total_items_is_quantity_sum() {
        let event = NotificationEvent::new(
            1,
            "bob@example.com",
            2,
            ORDER_STATUS_PLACED,
            vec![
                OrderItem {
                    product_id: 10,
                    quantity: 4,
                },
                OrderItem {
                    product_id: 20,
                    quantity: 6,
                },
            ],
        );

        assert_eq!(event.total_items, 10);
        assert!(event.is_placed());
    }

    #[test]
    fn test_frame_rendering() {
        let frame = SseFrame::connect();
        assert_eq!(frame.render(), "event: connect\ndata: connected!!\n\n");

        let frame = SseFrame::heartbeat();
        assert_eq!(frame.render(), "event: heartbeat\ndata: keep-alive\n\n");

        let frame = SseFrame::new_order(&sample_event()).unwrap();
        assert!(frame.render().starts_with("event: new-order\ndata: {"));
        assert!(frame.render().ends_with("\n\n"));

        let frame = SseFrame::pending_order(&sample_event()).unwrap();
        assert!(frame.render().starts_with("event: pending-order\ndata: {"));
        // 补发帧与实时帧共用同一 JSON schema
        assert!(frame.data.contains("\"orderId\":42"));
    }

    #[test]
    fn test_invalid_bytes_rejected() {
        let result = NotificationEvent::from_bytes(b"not json at all");
        assert!(result.is_err());
    }
}
