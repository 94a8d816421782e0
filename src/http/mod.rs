//! HTTP 服务器模块 - 使用 Axum 提供推送测试 API
//!
//! 功能包括：
//! - 单设备 FCM 发送接口
//! - 健康检查与 Prometheus 指标
//! - 可选的前端静态文件服务

pub mod routes;
pub mod server;

pub use server::{HttpServer, HttpServerState};
