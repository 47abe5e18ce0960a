//! 配置管理模块

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub sse: SseConfig,
    #[serde(default)]
    pub buffer: BufferConfig,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            http: HttpConfig::default(),
            sse: SseConfig::default(),
            buffer: BufferConfig::default(),
        }
    }
}

impl NotifyConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {}", e))
    }

    pub fn load_default() -> Result<Self, String> {
        Self::load_from_file("config/notify.toml")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_name")]
    pub name: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            environment: default_environment(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl HttpConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// SSE 推送配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SseConfig {
    /// 心跳间隔（秒）
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// 单次订阅补发上限
    #[serde(default = "default_drain_batch_size")]
    pub drain_batch_size: usize,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval(),
            drain_batch_size: default_drain_batch_size(),
        }
    }
}

/// 溢出缓冲配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// 是否落盘（false 时用内存缓冲，重启丢失）
    #[serde(default = "default_true")]
    pub durable: bool,

    /// 缓冲目录
    #[serde(default = "default_buffer_path")]
    pub base_path: String,

    /// 条目保留窗口（小时）
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            durable: default_true(),
            base_path: default_buffer_path(),
            retention_hours: default_retention_hours(),
        }
    }
}

// 默认值函数
fn default_server_name() -> String {
    "OrderNotify".to_string()
}
fn default_environment() -> String {
    "development".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8090
}
fn default_heartbeat_interval() -> u64 {
    30
}
fn default_drain_batch_size() -> usize {
    100
}
fn default_true() -> bool {
    true
}
fn default_buffer_path() -> String {
    "/tmp/ordernotify/buffer".to_string()
}
fn default_retention_hours() -> u64 {
    24
}
