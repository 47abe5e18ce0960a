//! OrderNotify 通知服务
//!
//! 集成功能：
//! 1. SSE 订阅端点（管理员实时接收新订单通知）
//! 2. 广播通道消费（每实例独立消费 order.created）
//! 3. 溢出缓冲（无人在线时事件落盘，订阅时补发）
//! 4. 订单事件入口（订单流程的 fire-and-forget 通知钩子）
//!
//! 运行: cargo run --bin ordernotify-server

use ordernotify::broadcast::{BroadcastChannel, InProcessBroadcast};
use ordernotify::buffer::{FileOverflowBuffer, MemoryOverflowBuffer, OverflowBuffer};
use ordernotify::notification::{
    ConnectionRegistry, HeartbeatEmitter, LiveDispatcher, OrderNotifier,
};
use ordernotify::service::http::HttpServer;
use ordernotify::utils::config::NotifyConfig;
use std::io;
use std::sync::Arc;
use std::time::Duration;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // 初始化日志
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 1. 加载配置文件
    let mut config = match NotifyConfig::load_default() {
        Ok(cfg) => cfg,
        Err(e) => {
            log::warn!("Failed to load config file: {}, using defaults", e);
            NotifyConfig::default()
        }
    };

    // 2. 命令行覆盖
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        match args[i].as_str() {
            "--http" | "-h" => {
                if i + 1 < args.len() {
                    if let Some((host, port)) = args[i + 1].split_once(':') {
                        config.http.host = host.to_string();
                        if let Ok(port) = port.parse() {
                            config.http.port = port;
                        }
                    }
                }
            }
            "--buffer-path" | "-b" => {
                if i + 1 < args.len() {
                    config.buffer.base_path = args[i + 1].clone();
                }
            }
            "--no-durable" => {
                config.buffer.durable = false;
            }
            _ => {}
        }
    }

    log::info!("Configuration loaded");
    log::info!("  HTTP address: {}", config.http.bind_address());
    log::info!("  Buffer durable: {}", config.buffer.durable);

    // 3. 溢出缓冲
    let retention = Duration::from_secs(config.buffer.retention_hours * 3600);
    let buffer: Arc<dyn OverflowBuffer> = if config.buffer.durable {
        let file_buffer =
            FileOverflowBuffer::open_with_retention(&config.buffer.base_path, retention)
                .map_err(|e| {
                    io::Error::new(io::ErrorKind::Other, format!("open overflow buffer: {}", e))
                })?;
        log::info!("✅ Durable overflow buffer at {}", config.buffer.base_path);
        Arc::new(file_buffer)
    } else {
        log::info!("✅ In-memory overflow buffer (events lost on restart)");
        Arc::new(MemoryOverflowBuffer::with_retention(retention))
    };

    // 4. 广播通道
    // 进程内实现：单实例部署。多实例部署换成消息中间件背书的实现。
    let channel: Arc<dyn BroadcastChannel> = Arc::new(InProcessBroadcast::new());

    // 5. 注册表 + 分发器 + 广播消费
    let heartbeat = HeartbeatEmitter::new(Duration::from_secs(config.sse.heartbeat_interval_secs));
    let registry = Arc::new(
        ConnectionRegistry::new(buffer.clone(), heartbeat)
            .with_drain_batch_size(config.sse.drain_batch_size),
    );
    let dispatcher = Arc::new(LiveDispatcher::new(registry.clone(), buffer.clone()));

    let instance_id = format!("ordernotify_{}", uuid::Uuid::new_v4().simple());
    let _consumer = dispatcher
        .clone()
        .start_broadcast_consumer(channel.clone(), instance_id.clone());
    log::info!("✅ Broadcast consumer started ({})", instance_id);

    // 6. 订单侧发布器
    let notifier = Arc::new(OrderNotifier::new(channel));

    // 7. HTTP 服务器
    let bind_address = config.http.bind_address();
    print_startup_banner(&config);

    HttpServer::new(registry, dispatcher, notifier, buffer, bind_address)
        .run()
        .await
}

/// 打印启动横幅
fn print_startup_banner(config: &NotifyConfig) {
    let addr = config.http.bind_address();

    println!("\n╔═══════════════════════════════════════════════════════════╗");
    println!("║                OrderNotify Server Started                 ║");
    println!("╚═══════════════════════════════════════════════════════════╝\n");

    println!("📡 Service Endpoints:");
    println!("   • Subscribe:   http://{}/subscribe  (SSE, Bearer token)", addr);
    println!("   • Order hook:  http://{}/api/orders/notify", addr);
    println!("   • Monitoring:  http://{}/api/monitoring/notifications", addr);
    println!("   • Health:      http://{}/health", addr);

    println!("\n💾 Overflow Buffer:");
    if config.buffer.durable {
        println!("   • Mode:        Durable ({})", config.buffer.base_path);
    } else {
        println!("   • Mode:        In-memory");
    }
    println!("   • Retention:   {}h", config.buffer.retention_hours);

    println!("\n💓 Heartbeat: every {}s per connection", config.sse.heartbeat_interval_secs);

    println!("\n🟢 Server is running. Press Ctrl+C to stop.\n");
}
