//! SSE 订阅端点
//!
//! 管理员携带 Bearer token 调用 `GET /subscribe`，认证通过后
//! 建立长连接流式响应。帧序列：`connect` 确认 → 积压补发
//! (`pending-order`) → 实时推送 (`new-order`) 与周期 `heartbeat`。

use super::handlers::AppState;
use super::models::ApiResponse;
use crate::utils::jwt::{self, Claims};
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use futures::StreamExt;
use std::sync::Arc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// 订阅实时订单通知
pub async fn subscribe(req: HttpRequest, state: web::Data<Arc<AppState>>) -> HttpResponse {
    let claims = match authenticate(&req) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    if !claims.is_admin() {
        return HttpResponse::Forbidden().json(ApiResponse::<()>::error(
            403,
            "administrator role required".to_string(),
        ));
    }

    log::info!("Subscribing to {}", claims.sub);

    match state.registry.subscribe(&claims.sub) {
        Ok(receiver) => {
            let stream = UnboundedReceiverStream::new(receiver)
                .map(|frame| Ok::<web::Bytes, actix_web::Error>(web::Bytes::from(frame)));

            HttpResponse::Ok()
                .content_type("text/event-stream")
                .insert_header((header::CACHE_CONTROL, "no-cache"))
                .streaming(stream)
        }
        Err(e) => HttpResponse::InternalServerError()
            .json(ApiResponse::<()>::error(500, e.to_string())),
    }
}

/// 从 Authorization 头解析并验证 Bearer token
fn authenticate(req: &HttpRequest) -> Result<Claims, HttpResponse> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            HttpResponse::Unauthorized().json(ApiResponse::<()>::error(
                401,
                "missing bearer token".to_string(),
            ))
        })?;

    jwt::verify_token(token).map_err(|e| {
        HttpResponse::Unauthorized()
            .json(ApiResponse::<()>::error(401, format!("invalid token: {}", e)))
    })
}
