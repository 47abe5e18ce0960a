//! HTTP API 处理器（健康检查、订单通知入口）

use super::models::ApiResponse;
use crate::buffer::OverflowBuffer;
use crate::notification::{ConnectionRegistry, LiveDispatcher, NotificationEvent, OrderNotifier};
use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;

/// 应用状态
pub struct AppState {
    /// 连接注册表
    pub registry: Arc<ConnectionRegistry>,

    /// 实时分发器
    pub dispatcher: Arc<LiveDispatcher>,

    /// 订单通知发布器
    pub notifier: Arc<OrderNotifier>,

    /// 溢出缓冲（监控用）
    pub buffer: Arc<dyn OverflowBuffer>,
}

/// 健康检查
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("OK")
}

/// 订单已下单事件入口
///
/// 订单流程在订单落库成功后调用；通知侧任何失败都不回传
/// （fire-and-forget），因此只要请求体合法一律 200。
pub async fn notify_order_placed(
    state: web::Data<Arc<AppState>>,
    event: web::Json<NotificationEvent>,
) -> HttpResponse {
    state.notifier.notify_order_placed(&event);
    HttpResponse::Ok().json(ApiResponse::success("accepted"))
}
