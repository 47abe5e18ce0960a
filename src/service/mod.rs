//! 对外服务层
//!
//! HTTP API + SSE 长连接推送

pub mod http;
