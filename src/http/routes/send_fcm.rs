//! FCM 发送路由
//!
//! 路由：POST /api/send-fcm
//! 表单：privateKeyFile（文件，必填）、deviceToken（必填）、message、notificationTitle、data、bundleId

use axum::{extract::State, response::Json, routing::post, Router};
use axum_extra::extract::multipart::{Field, Multipart, MultipartRejection};
use bytes::{Bytes, BytesMut};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Result, ServerError};
use crate::http::HttpServerState;
use crate::push::{FcmMessage, SendRequest};

pub const FIELD_PRIVATE_KEY_FILE: &str = "privateKeyFile";
pub const FIELD_DEVICE_TOKEN: &str = "deviceToken";
pub const FIELD_MESSAGE: &str = "message";
pub const FIELD_DATA: &str = "data";
pub const FIELD_BUNDLE_ID: &str = "bundleId";
pub const FIELD_NOTIFICATION_TITLE: &str = "notificationTitle";

/// 成功信封
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendFcmResponse {
    pub success: bool,
    pub message_id: String,
    pub message: FcmMessage,
}

/// 创建发送路由
pub fn create_route() -> Router<HttpServerState> {
    Router::new().route("/api/send-fcm", post(send_fcm))
}

/// 发送处理器
async fn send_fcm(
    State(state): State<HttpServerState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<SendFcmResponse>> {
    info!("[HTTP] Processing FCM send request");

    let mut multipart = multipart.map_err(|e| ServerError::InvalidRequest(e.to_string()))?;
    let request = read_send_request(&mut multipart, state.max_key_file_bytes)
        .await
        .inspect_err(|e| warn!("[HTTP] Rejected FCM send request: {}", e))?;

    let (message_id, sent_payload) = state.dispatcher.dispatch(request).await.into_result()?;

    Ok(Json(SendFcmResponse {
        success: true,
        message_id,
        message: sent_payload,
    }))
}

/// 读取并校验表单
///
/// 必填字段缺失时返回 `MissingField`；可选字段的空字符串视为未提供。
pub async fn read_send_request(
    multipart: &mut Multipart,
    max_key_file_bytes: usize,
) -> Result<SendRequest> {
    let mut credential = None;
    let mut device_token = None;
    let mut message = None;
    let mut data = None;
    let mut bundle_id = None;
    let mut notification_title = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::InvalidRequest(format!("failed to parse multipart body: {}", e)))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            FIELD_PRIVATE_KEY_FILE => {
                let bytes = read_key_file(field, max_key_file_bytes).await?;
                credential = Some(bytes).filter(|b| !b.is_empty());
            }
            FIELD_DEVICE_TOKEN => device_token = read_text(field).await?,
            FIELD_MESSAGE => message = read_text(field).await?,
            FIELD_DATA => data = read_text(field).await?,
            FIELD_BUNDLE_ID => bundle_id = read_text(field).await?,
            FIELD_NOTIFICATION_TITLE => notification_title = read_text(field).await?,
            _ => {}
        }
    }

    let credential = credential.ok_or(ServerError::MissingField(FIELD_PRIVATE_KEY_FILE))?;
    // 设备 token 原样转发，只拒绝全空白
    let device_token = device_token
        .filter(|t| !t.trim().is_empty())
        .ok_or(ServerError::MissingField(FIELD_DEVICE_TOKEN))?;

    Ok(SendRequest {
        credential,
        device_token,
        message,
        notification_title,
        data,
        bundle_id,
    })
}

/// 分块读取凭据文件，超过上限立即停止
async fn read_key_file(mut field: Field, max_key_file_bytes: usize) -> Result<Bytes> {
    let mut buf = BytesMut::new();

    while let Some(chunk) = field.chunk().await.map_err(|e| {
        ServerError::InvalidRequest(format!("failed to read {}: {}", FIELD_PRIVATE_KEY_FILE, e))
    })? {
        if buf.len() + chunk.len() > max_key_file_bytes {
            return Err(ServerError::InvalidRequest(format!(
                "{} exceeds the {} byte limit",
                FIELD_PRIVATE_KEY_FILE, max_key_file_bytes
            )));
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(buf.freeze())
}

async fn read_text(field: Field) -> Result<Option<String>> {
    let name = field.name().unwrap_or("").to_string();
    let text = field
        .text()
        .await
        .map_err(|e| ServerError::InvalidRequest(format!("failed to read {}: {}", name, e)))?;
    Ok(Some(text).filter(|t| !t.is_empty()))
}
