//! HTTP API 路由配置

use super::handlers;
use super::monitoring;
use super::sse;
use actix_web::web;

/// 配置所有路由
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        // 健康检查
        .route("/health", web::get().to(handlers::health_check))
        // SSE 订阅（管理员）
        .route("/subscribe", web::get().to(sse::subscribe))
        // 订单事件入口
        .service(
            web::scope("/api/orders")
                .route("/notify", web::post().to(handlers::notify_order_placed)),
        )
        // 监控和统计
        .service(
            web::scope("/api/monitoring")
                .route(
                    "/notifications",
                    web::get().to(monitoring::get_notification_monitoring),
                ),
        );
}
