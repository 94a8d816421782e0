use thiserror::Error;

/// 消息后端错误
#[derive(Error, Debug, Clone)]
pub enum BackendError {
    #[error("Failed to parse service account key: {0}")]
    KeyParse(String),

    #[error("Failed to encode JWT: {0}")]
    JwtEncode(String),

    #[error("Failed to get access token: {0}")]
    TokenRequest(String),

    #[error("Failed to parse token response: {0}")]
    TokenParse(String),

    #[error("FCM send request failed: {0}")]
    SendRequest(String),

    #[error("Failed to parse FCM response: {0}")]
    ResponseParse(String),

    /// 后端返回的错误，只保留其 message 文本
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Client scope already registered: {0}")]
    DuplicateScope(String),

    #[error("Invalid backend endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Client scope has been disposed")]
    Disposed,
}
