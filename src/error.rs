use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::push::provider::BackendError;

/// 服务器错误类型
///
/// 所有变体都以失败信封 `{ "success": false, "error": ... }` + 400 返回给调用方。
#[derive(Debug, Clone, Error)]
pub enum ServerError {
    /// 缺少必填表单字段（未触碰任何凭据）
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    /// data 字段不是 string→string 的 JSON 对象
    #[error("Invalid data JSON format: {0}")]
    InvalidDataFormat(String),
    /// 客户端创建或发送失败，原样携带后端错误文本
    #[error("{0}")]
    DispatchFailed(String),
    /// 无法读取的请求体
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

impl From<BackendError> for ServerError {
    fn from(err: BackendError) -> Self {
        ServerError::DispatchFailed(err.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        (status_code, Json(ErrorResponse::new(&self))).into_response()
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ServerError>;

/// 失败信封
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: &ServerError) -> Self {
        Self {
            success: false,
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_failed_keeps_backend_text() {
        let err = ServerError::from(BackendError::Api {
            status: 404,
            message: "Requested entity was not found.".to_string(),
        });
        assert_eq!(err.to_string(), "Requested entity was not found.");
    }

    #[test]
    fn test_error_envelope_shape() {
        let body = serde_json::to_value(ErrorResponse::new(&ServerError::MissingField("deviceToken"))).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Missing required field: deviceToken");
    }

    #[test]
    fn test_every_variant_is_bad_request() {
        let errors = [
            ServerError::MissingField("privateKeyFile"),
            ServerError::InvalidDataFormat("expected a map".into()),
            ServerError::DispatchFailed("boom".into()),
            ServerError::InvalidRequest("bad multipart".into()),
        ];
        for err in errors {
            assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }
}
