//! 通知子系统监控端点

use super::handlers::AppState;
use super::models::{ApiResponse, NotificationMonitoringReport};
use actix_web::{web, HttpResponse};
use std::sync::Arc;

/// 通知子系统统计
pub async fn get_notification_monitoring(state: web::Data<Arc<AppState>>) -> HttpResponse {
    let report = NotificationMonitoringReport {
        registry: state.registry.get_stats(),
        dispatcher: state.dispatcher.get_stats(),
        notifier: state.notifier.get_stats(),
        buffer_depth: state.buffer.len(),
    };

    HttpResponse::Ok().json(ApiResponse::success(report))
}
