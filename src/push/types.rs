use bytes::Bytes;
use serde::Serialize;
use std::collections::BTreeMap;

/// 携带 bundle id 的 APNs header 名称
pub const APNS_BUNDLE_HEADER: &str = "apns-token";
pub const APNS_PRIORITY_HEADER: &str = "apns-priority";
pub const APNS_PUSH_TYPE_HEADER: &str = "apns-push-type";

/// 通知块（用户可见）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub body: String,
}

/// aps 字典中我们会设置的部分
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aps {
    pub content_available: bool,
}

/// APNs 平台配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApnsConfig {
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aps: Option<Aps>,
}

impl ApnsConfig {
    /// 前台/提醒投递：priority 10，push-type alert
    pub fn alert(bundle_id: &str) -> Self {
        Self {
            headers: Self::headers("10", "alert", bundle_id),
            aps: None,
        }
    }

    /// 后台静默投递：priority 5，push-type background，content-available 唤醒 App
    pub fn background(bundle_id: &str) -> Self {
        Self {
            headers: Self::headers("5", "background", bundle_id),
            aps: Some(Aps {
                content_available: true,
            }),
        }
    }

    fn headers(priority: &str, push_type: &str, bundle_id: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            (APNS_PRIORITY_HEADER.to_string(), priority.to_string()),
            (APNS_PUSH_TYPE_HEADER.to_string(), push_type.to_string()),
            (APNS_BUNDLE_HEADER.to_string(), bundle_id.to_string()),
        ])
    }

    pub fn priority(&self) -> Option<&str> {
        self.headers.get(APNS_PRIORITY_HEADER).map(String::as_str)
    }

    pub fn push_type(&self) -> Option<&str> {
        self.headers.get(APNS_PUSH_TYPE_HEADER).map(String::as_str)
    }

    pub fn content_available(&self) -> bool {
        self.aps.as_ref().is_some_and(|aps| aps.content_available)
    }
}

/// 构建完成、准备发送的单设备消息
///
/// 序列化形式（camelCase）同时用于响应回显。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FcmMessage {
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apns: Option<ApnsConfig>,
}

/// 经过表单校验的一次发送请求
///
/// 凭据字节只存在于内存中，随请求一起被丢弃。
#[derive(Clone)]
pub struct SendRequest {
    pub credential: Bytes,
    pub device_token: String,
    pub message: Option<String>,
    pub notification_title: Option<String>,
    pub data: Option<String>,
    pub bundle_id: Option<String>,
}

impl SendRequest {
    pub fn new(credential: impl Into<Bytes>, device_token: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
            device_token: device_token.into(),
            message: None,
            notification_title: None,
            data: None,
            bundle_id: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.notification_title = Some(title.into());
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_bundle_id(mut self, bundle_id: impl Into<String>) -> Self {
        self.bundle_id = Some(bundle_id.into());
        self
    }
}

impl std::fmt::Debug for SendRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendRequest")
            .field("credential", &format_args!("<{} bytes>", self.credential.len()))
            .field("device_token", &self.device_token)
            .field("message", &self.message)
            .field("notification_title", &self.notification_title)
            .field("data", &self.data)
            .field("bundle_id", &self.bundle_id)
            .finish()
    }
}
