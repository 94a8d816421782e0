//! HTTP 路由模块
//!
//! 路由结构：
//! - `POST /api/send-fcm` - 上传 service account 并发送一条推送
//! - `GET /health` - 健康检查
//! - `GET /metrics` - Prometheus 指标

pub mod health;
pub mod metrics;
pub mod send_fcm;

use axum::{routing::get, Router};
use crate::http::HttpServerState;

/// 创建所有路由
pub fn create_routes() -> Router<HttpServerState> {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .merge(send_fcm::create_route()) // /api/send-fcm
}
