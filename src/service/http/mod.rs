//! HTTP API 服务模块
//!
//! 提供 SSE 订阅端点、订单事件入口和监控接口

pub mod handlers;
pub mod models;
pub mod monitoring;
pub mod routes;
pub mod sse;

use actix_web::{middleware, web, App, HttpServer as ActixHttpServer};
use std::io;
use std::sync::Arc;

use crate::buffer::OverflowBuffer;
use crate::notification::{ConnectionRegistry, LiveDispatcher, OrderNotifier};
use handlers::AppState;

/// HTTP 服务器
pub struct HttpServer {
    /// 应用状态
    app_state: Arc<AppState>,

    /// 监听地址
    bind_address: String,
}

impl HttpServer {
    /// 创建新的 HTTP 服务器
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        dispatcher: Arc<LiveDispatcher>,
        notifier: Arc<OrderNotifier>,
        buffer: Arc<dyn OverflowBuffer>,
        bind_address: String,
    ) -> Self {
        let app_state = Arc::new(AppState {
            registry,
            dispatcher,
            notifier,
            buffer,
        });

        Self {
            app_state,
            bind_address,
        }
    }

    /// 启动 HTTP 服务器
    pub async fn run(self) -> io::Result<()> {
        log::info!("Starting HTTP server at {}", self.bind_address);

        let app_state = self.app_state.clone();
        let bind_address = self.bind_address.clone();

        ActixHttpServer::new(move || {
            App::new()
                // 应用状态
                .app_data(web::Data::new(app_state.clone()))
                // 中间件
                .wrap(middleware::Logger::default())
                .wrap(middleware::Compress::default())
                // CORS 支持
                .wrap(
                    actix_cors::Cors::default()
                        .allow_any_origin()
                        .allow_any_method()
                        .allow_any_header()
                        .max_age(3600),
                )
                // 配置路由
                .configure(routes::configure)
        })
        .bind(&bind_address)?
        .run()
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{BroadcastChannel, InProcessBroadcast};
    use crate::buffer::MemoryOverflowBuffer;
    use crate::notification::heartbeat::HeartbeatEmitter;
    use crate::utils::jwt::{generate_token, ROLE_ADMIN};
    use actix_web::{test, App};
    use std::time::Duration;

    fn test_state() -> (Arc<AppState>, Arc<MemoryOverflowBuffer>) {
        let buffer = Arc::new(MemoryOverflowBuffer::new());
        let channel = Arc::new(InProcessBroadcast::new());
        let registry = Arc::new(ConnectionRegistry::new(
            buffer.clone(),
            HeartbeatEmitter::new(Duration::from_secs(30)),
        ));
        let dispatcher = Arc::new(LiveDispatcher::new(registry.clone(), buffer.clone()));
        let notifier = Arc::new(OrderNotifier::new(channel as Arc<dyn BroadcastChannel>));

        (
            Arc::new(AppState {
                registry,
                dispatcher,
                notifier,
                buffer: buffer.clone(),
            }),
            buffer,
        )
    }

    #[actix_web::test]
    async fn test_health_endpoint() {
        let (state, _buffer) = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(routes::configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn test_subscribe_requires_token() {
        let (state, _buffer) = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(routes::configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/subscribe").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_subscribe_rejects_non_admin() {
        let (state, _buffer) = test_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(routes::configure),
        )
        .await;

        let token = generate_token("user@example.com", "USER").unwrap();
        let req = test::TestRequest::get()
            .uri("/subscribe")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), actix_web::http::StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn test_subscribe_streams_events() {
        let (state, _buffer) = test_state();
        let registry = state.registry.clone();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(routes::configure),
        )
        .await;

        let token = generate_token("admin@example.com", ROLE_ADMIN).unwrap();
        let req = test::TestRequest::get()
            .uri("/subscribe")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());
        assert_eq!(
            resp.headers()
                .get(actix_web::http::header::CONTENT_TYPE)
                .unwrap(),
            "text/event-stream"
        );
        assert!(registry.contains("admin@example.com"));
    }

    #[actix_web::test]
    async fn test_notify_endpoint_accepts_event() {
        let (state, _buffer) = test_state();
        let notifier = state.notifier.clone();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(routes::configure),
        )
        .await;

        let body = serde_json::json!({
            "orderId": 1001,
            "customerEmail": "customer@example.com",
            "customerId": 7,
            "orderStatus": "ORDERED",
            "totalItems": 3,
            "orderTime": "2025-01-02 03:04:05",
            "orderItems": [{"productId": 100, "quantity": 3}]
        });

        let req = test::TestRequest::post()
            .uri("/api/orders/notify")
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());
        assert_eq!(notifier.get_stats().published, 1);
    }

    #[actix_web::test]
    async fn test_monitoring_endpoint() {
        let (state, buffer) = test_state();

        // 预置一条积压通知
        use crate::notification::event::{NotificationEvent, OrderItem, ORDER_STATUS_PLACED};
        buffer
            .enqueue(&NotificationEvent::new(
                1,
                "c@example.com",
                1,
                ORDER_STATUS_PLACED,
                vec![OrderItem {
                    product_id: 1,
                    quantity: 1,
                }],
            ))
            .unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(routes::configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/monitoring/notifications")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["buffer_depth"], 1);
    }
}
