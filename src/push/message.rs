//! 消息构建：根据表单中出现的可选内容选择通知 / 数据 / 平台配置组合

use std::collections::BTreeMap;

use crate::error::{Result, ServerError};
use crate::push::types::{ApnsConfig, FcmMessage, Notification, SendRequest};

/// 消息形态（四者互斥）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageVariant {
    /// 仅通知：alert 平台配置
    NotificationOnly,
    /// 仅数据：静默后台投递
    DataOnly,
    /// 通知 + 数据：平台配置跟随通知（alert）
    Combined,
    /// 两者都没有：只带 token
    TokenOnly,
}

impl MessageVariant {
    pub fn select(has_notification: bool, has_data: bool) -> Self {
        match (has_notification, has_data) {
            (true, false) => MessageVariant::NotificationOnly,
            (false, true) => MessageVariant::DataOnly,
            (true, true) => MessageVariant::Combined,
            (false, false) => MessageVariant::TokenOnly,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageVariant::NotificationOnly => "notification",
            MessageVariant::DataOnly => "data",
            MessageVariant::Combined => "combined",
            MessageVariant::TokenOnly => "token_only",
        }
    }

    /// 通知存在时总是使用 alert 配置
    fn apns_config(&self, bundle_id: &str) -> Option<ApnsConfig> {
        match self {
            MessageVariant::NotificationOnly | MessageVariant::Combined => {
                Some(ApnsConfig::alert(bundle_id))
            }
            MessageVariant::DataOnly => Some(ApnsConfig::background(bundle_id)),
            MessageVariant::TokenOnly => None,
        }
    }
}

/// 解析 data 字段：必须是 string→string 的 JSON 对象
pub fn parse_data(raw: &str) -> Result<BTreeMap<String, String>> {
    serde_json::from_str::<BTreeMap<String, String>>(raw)
        .map_err(|e| ServerError::InvalidDataFormat(e.to_string()))
}

/// 把校验过的请求转换为一条待发送消息
///
/// data 在这里解析，早于任何后端客户端的创建。
pub fn build_message(request: &SendRequest) -> Result<(MessageVariant, FcmMessage)> {
    let notification = request
        .message
        .as_deref()
        .filter(|body| !body.is_empty())
        .map(|body| Notification {
            title: request
                .notification_title
                .clone()
                .filter(|title| !title.is_empty()),
            body: body.to_string(),
        });

    let data = match request.data.as_deref().filter(|raw| !raw.is_empty()) {
        Some(raw) => Some(parse_data(raw)?),
        None => None,
    };

    let variant = MessageVariant::select(notification.is_some(), data.is_some());
    let bundle_id = request.bundle_id.as_deref().unwrap_or("");

    let message = FcmMessage {
        token: request.device_token.clone(),
        notification,
        data,
        apns: variant.apns_config(bundle_id),
    };

    Ok((variant, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SendRequest {
        SendRequest::new(&b"{}"[..], "device-token-abc")
    }

    #[test]
    fn test_notification_only() {
        let req = request().with_message("Hello").with_title("Hi");
        let (variant, message) = build_message(&req).unwrap();

        assert_eq!(variant, MessageVariant::NotificationOnly);
        assert_eq!(
            message.notification,
            Some(Notification {
                title: Some("Hi".to_string()),
                body: "Hello".to_string(),
            })
        );
        assert!(message.data.is_none());

        let apns = message.apns.unwrap();
        assert_eq!(apns.priority(), Some("10"));
        assert_eq!(apns.push_type(), Some("alert"));
        assert!(!apns.content_available());
    }

    #[test]
    fn test_data_only_is_silent() {
        let req = request().with_data(r#"{"k":"v"}"#);
        let (variant, message) = build_message(&req).unwrap();

        assert_eq!(variant, MessageVariant::DataOnly);
        assert!(message.notification.is_none());
        assert_eq!(
            message.data,
            Some(BTreeMap::from([("k".to_string(), "v".to_string())]))
        );

        let apns = message.apns.unwrap();
        assert_eq!(apns.priority(), Some("5"));
        assert_eq!(apns.push_type(), Some("background"));
        assert!(apns.content_available());
    }

    #[test]
    fn test_combined_prefers_alert_config() {
        let req = request().with_message("Hello").with_data(r#"{"k":"v"}"#);
        let (variant, message) = build_message(&req).unwrap();

        assert_eq!(variant, MessageVariant::Combined);
        assert!(message.notification.is_some());
        assert!(message.data.is_some());
        assert_eq!(message.apns.unwrap().push_type(), Some("alert"));
    }

    #[test]
    fn test_token_only() {
        let (variant, message) = build_message(&request()).unwrap();

        assert_eq!(variant, MessageVariant::TokenOnly);
        assert_eq!(message.token, "device-token-abc");
        assert!(message.notification.is_none());
        assert!(message.data.is_none());
        assert!(message.apns.is_none());
    }

    #[test]
    fn test_empty_strings_count_as_absent() {
        let req = request().with_message("").with_data("").with_title("Hi");
        let (variant, _) = build_message(&req).unwrap();
        assert_eq!(variant, MessageVariant::TokenOnly);
    }

    #[test]
    fn test_title_is_optional() {
        let req = request().with_message("Hello");
        let (_, message) = build_message(&req).unwrap();
        assert_eq!(message.notification.unwrap().title, None);
    }

    #[test]
    fn test_bundle_id_lands_in_headers() {
        let req = request().with_message("Hello").with_bundle_id("com.example.app");
        let (_, message) = build_message(&req).unwrap();
        assert_eq!(
            message.apns.unwrap().headers.get("apns-token").map(String::as_str),
            Some("com.example.app")
        );
    }

    #[test]
    fn test_rejects_non_string_values() {
        for raw in [
            r#"{"k":1}"#,
            r#"{"k":null}"#,
            r#"{"k":{"nested":"v"}}"#,
            r#"["k","v"]"#,
            "null",
            "not json",
        ] {
            let req = request().with_message("Hello").with_data(raw);
            match build_message(&req) {
                Err(ServerError::InvalidDataFormat(_)) => {}
                other => panic!("expected InvalidDataFormat for {raw}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_echo_uses_camel_case() {
        let req = request().with_data(r#"{"k":"v"}"#).with_bundle_id("b");
        let (_, message) = build_message(&req).unwrap();
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["token"], "device-token-abc");
        assert_eq!(json["data"]["k"], "v");
        assert_eq!(json["apns"]["aps"]["contentAvailable"], true);
        assert!(json.get("notification").is_none());
    }
}
