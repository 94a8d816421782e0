//! GET /metrics

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};

use crate::error::ErrorResponse;
use crate::infra::metrics;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// 一次抓取的结果
#[derive(Debug)]
pub enum MetricsExport {
    /// Prometheus 文本格式
    Rendered(String),
    /// Recorder 未安装（启动时 init 失败或未调用）
    Unavailable,
}

impl MetricsExport {
    pub fn current() -> Self {
        match metrics::render_metrics() {
            Some(body) => Self::Rendered(body),
            None => Self::Unavailable,
        }
    }
}

impl IntoResponse for MetricsExport {
    fn into_response(self) -> Response {
        match self {
            Self::Rendered(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
                body,
            )
                .into_response(),
            Self::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    success: false,
                    error: "Metrics recorder is not installed".to_string(),
                }),
            )
                .into_response(),
        }
    }
}

pub async fn metrics_handler() -> MetricsExport {
    MetricsExport::current()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendered_is_prometheus_text() {
        let response = MetricsExport::Rendered("fcm_tester_live_scopes 0\n".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            PROMETHEUS_CONTENT_TYPE
        );
    }

    #[test]
    fn test_unavailable_is_503() {
        let response = MetricsExport::Unavailable.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
