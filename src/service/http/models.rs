//! HTTP API 请求/响应模型

use crate::notification::{DispatcherStatsSnapshot, NotifierStatsSnapshot, RegistryStatsSnapshot};
use serde::{Deserialize, Serialize};

/// 通用响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// API 错误
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: u32,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: u32, message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError { code, message }),
        }
    }
}

/// 通知子系统监控报告
#[derive(Debug, Clone, Serialize)]
pub struct NotificationMonitoringReport {
    /// 连接注册表统计
    pub registry: RegistryStatsSnapshot,

    /// 分发统计
    pub dispatcher: DispatcherStatsSnapshot,

    /// 发布统计
    pub notifier: NotifierStatsSnapshot,

    /// 溢出缓冲当前深度
    pub buffer_depth: usize,
}
