use async_trait::async_trait;
use jsonwebtoken::EncodingKey;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

use crate::config::FcmConfig;
use crate::push::provider::credential::{
    sign_assertion, GoogleTokenError, GoogleTokenResponse, ServiceAccountKey, JWT_BEARER_GRANT_TYPE,
};
use crate::push::provider::error::BackendError;
use crate::push::provider::provider_trait::{MessagingBackend, ScopedClient};
use crate::push::provider::registry::ScopeRegistry;
use crate::push::types::FcmMessage;

/// FCM API Response
#[derive(Debug, Deserialize)]
struct FcmApiResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GoogleApiError {
    error: GoogleApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GoogleApiErrorBody {
    message: String,
}

/// FCM (Firebase Cloud Messaging) 后端
///
/// 使用 FCM HTTP v1 API。每个请求创建一个独立的 [`FcmScopedClient`]，
/// 凭据只在该客户端内部存活，客户端之间没有共享的默认实例。
pub struct FcmBackend {
    http_client: Client,
    api_base_url: Url,
    token_uri_override: Option<String>,
    registry: ScopeRegistry,
}

impl FcmBackend {
    pub fn new(config: &FcmConfig) -> Result<Self, BackendError> {
        let mut api_base_url = Url::parse(&config.api_base_url)
            .map_err(|e| BackendError::InvalidEndpoint(format!("{}: {}", config.api_base_url, e)))?;
        // join() 会替换最后一段路径，基地址统一以 / 结尾
        if !api_base_url.path().ends_with('/') {
            let path = format!("{}/", api_base_url.path());
            api_base_url.set_path(&path);
        }

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BackendError::InvalidEndpoint(e.to_string()))?;

        Ok(Self {
            http_client,
            api_base_url,
            token_uri_override: config.token_uri_override.clone(),
            registry: ScopeRegistry::new(),
        })
    }

    pub fn registry(&self) -> &ScopeRegistry {
        &self.registry
    }

    fn send_url(&self, project_id: &str) -> Result<Url, BackendError> {
        self.api_base_url
            .join(&format!("v1/projects/{}/messages:send", project_id))
            .map_err(|e| BackendError::InvalidEndpoint(e.to_string()))
    }
}

#[async_trait]
impl MessagingBackend for FcmBackend {
    async fn create_scoped_client(
        &self,
        scope_name: &str,
        credential: &[u8],
    ) -> Result<Box<dyn ScopedClient>, BackendError> {
        let key = ServiceAccountKey::from_bytes(credential)?;
        let encoding_key = key.encoding_key()?;
        let send_url = self.send_url(&key.project_id)?;
        let token_uri = self
            .token_uri_override
            .clone()
            .unwrap_or_else(|| key.token_uri.clone());

        self.registry.register(scope_name)?;

        info!(
            "[FCM] Created client scope: scope={}, project_id={}, client_email={}",
            scope_name, key.project_id, key.client_email
        );

        Ok(Box::new(FcmScopedClient {
            scope_name: scope_name.to_string(),
            http_client: self.http_client.clone(),
            send_url,
            token_uri,
            client_email: key.client_email,
            private_key_id: key.private_key_id,
            encoding_key: Some(encoding_key),
            registry: self.registry.clone(),
        }))
    }

    fn live_scopes(&self) -> usize {
        self.registry.len()
    }

    fn name(&self) -> &'static str {
        "fcm"
    }
}

/// 绑定到单个 service account 的一次性客户端
pub struct FcmScopedClient {
    scope_name: String,
    http_client: Client,
    send_url: Url,
    token_uri: String,
    client_email: String,
    private_key_id: Option<String>,
    encoding_key: Option<EncodingKey>,
    registry: ScopeRegistry,
}

impl FcmScopedClient {
    /// 用 JWT 断言换取 access token（不缓存）
    async fn fetch_access_token(&self, key: &EncodingKey) -> Result<String, BackendError> {
        let assertion = sign_assertion(
            &self.client_email,
            self.private_key_id.as_deref(),
            &self.token_uri,
            key,
        )?;

        let params = [("grant_type", JWT_BEARER_GRANT_TYPE), ("assertion", assertion.as_str())];

        let response = self
            .http_client
            .post(&self.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| BackendError::TokenRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<GoogleTokenError>(&error_text) {
                Ok(token_error) => token_error.to_string(),
                Err(_) => format!("status={}, error={}", status, error_text),
            };
            return Err(BackendError::TokenRequest(detail));
        }

        let token_response: GoogleTokenResponse = response
            .json()
            .await
            .map_err(|e| BackendError::TokenParse(e.to_string()))?;

        debug!(
            "[FCM] Access token issued: scope={}, expires_in={}s",
            self.scope_name, token_response.expires_in
        );

        Ok(token_response.access_token)
    }
}

#[async_trait]
impl ScopedClient for FcmScopedClient {
    fn scope_name(&self) -> &str {
        &self.scope_name
    }

    async fn send(&self, message: &FcmMessage) -> Result<String, BackendError> {
        let key = self.encoding_key.as_ref().ok_or(BackendError::Disposed)?;
        let access_token = self.fetch_access_token(key).await?;

        let payload = build_fcm_payload(message);

        info!("[FCM] Sending push: scope={}", self.scope_name);

        let response = self
            .http_client
            .post(self.send_url.clone())
            .bearer_auth(&access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| BackendError::SendRequest(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let fcm_response: FcmApiResponse = response
                .json()
                .await
                .map_err(|e| BackendError::ResponseParse(e.to_string()))?;
            info!(
                "[FCM] Push sent successfully: scope={}, message_id={}",
                self.scope_name, fcm_response.name
            );
            Ok(fcm_response.name)
        } else {
            let error_text = response.text().await.unwrap_or_default();
            error!(
                "[FCM] Push failed: scope={}, status={}, error={}",
                self.scope_name, status, error_text
            );

            let message = match serde_json::from_str::<GoogleApiError>(&error_text) {
                Ok(api_error) => api_error.error.message,
                Err(_) if error_text.is_empty() => format!("FCM push failed: status={}", status),
                Err(_) => format!("FCM push failed: status={}, error={}", status, error_text),
            };

            Err(BackendError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    fn dispose(&mut self) {
        self.encoding_key = None;
        if self.registry.release(&self.scope_name) {
            debug!("[FCM] Released client scope: scope={}", self.scope_name);
        }
    }
}

/// 构建 FCM v1 请求体
///
/// 回显使用的是 [`FcmMessage`] 的 camelCase 形式，线上格式的 aps 位于 `apns.payload.aps`。
pub fn build_fcm_payload(message: &FcmMessage) -> Value {
    let mut body = json!({ "token": message.token });

    if let Some(notification) = &message.notification {
        let mut block = json!({ "body": notification.body });
        if let Some(title) = &notification.title {
            block["title"] = json!(title);
        }
        body["notification"] = block;
    }

    if let Some(data) = &message.data {
        body["data"] = json!(data);
    }

    if let Some(apns) = &message.apns {
        let mut config = json!({ "headers": apns.headers });
        if apns.content_available() {
            config["payload"] = json!({ "aps": { "content-available": 1 } });
        }
        body["apns"] = config;
    }

    json!({ "message": body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::types::{ApnsConfig, Notification};
    use std::collections::BTreeMap;

    fn config(api_base_url: &str) -> FcmConfig {
        FcmConfig {
            api_base_url: api_base_url.to_string(),
            ..FcmConfig::default()
        }
    }

    #[test]
    fn test_send_url_with_and_without_trailing_slash() {
        for base in ["https://fcm.googleapis.com", "https://fcm.googleapis.com/"] {
            let backend = FcmBackend::new(&config(base)).unwrap();
            assert_eq!(
                backend.send_url("demo").unwrap().as_str(),
                "https://fcm.googleapis.com/v1/projects/demo/messages:send"
            );
        }
    }

    #[test]
    fn test_send_url_keeps_base_path() {
        let backend = FcmBackend::new(&config("http://127.0.0.1:8080/fake")).unwrap();
        assert_eq!(
            backend.send_url("demo").unwrap().as_str(),
            "http://127.0.0.1:8080/fake/v1/projects/demo/messages:send"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            FcmBackend::new(&config("not a url")),
            Err(BackendError::InvalidEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_bad_credential_leaves_no_scope() {
        let backend = FcmBackend::new(&FcmConfig::default()).unwrap();
        let result = backend.create_scoped_client("scope-1", b"{}").await;
        assert!(matches!(result, Err(BackendError::KeyParse(_))));
        assert_eq!(backend.live_scopes(), 0);
    }

    #[test]
    fn test_wire_payload_background() {
        let message = FcmMessage {
            token: "tok".to_string(),
            notification: None,
            data: Some(BTreeMap::from([("k".to_string(), "v".to_string())])),
            apns: Some(ApnsConfig::background("com.example")),
        };
        let payload = build_fcm_payload(&message);

        assert_eq!(payload["message"]["token"], "tok");
        assert_eq!(payload["message"]["data"]["k"], "v");
        assert_eq!(payload["message"]["apns"]["payload"]["aps"]["content-available"], 1);
        assert_eq!(payload["message"]["apns"]["headers"]["apns-push-type"], "background");
        assert!(payload["message"].get("notification").is_none());
    }

    #[test]
    fn test_wire_payload_alert_without_title() {
        let message = FcmMessage {
            token: "tok".to_string(),
            notification: Some(Notification {
                title: None,
                body: "Hello".to_string(),
            }),
            data: None,
            apns: Some(ApnsConfig::alert("")),
        };
        let payload = build_fcm_payload(&message);

        assert_eq!(payload["message"]["notification"]["body"], "Hello");
        assert!(payload["message"]["notification"].get("title").is_none());
        assert!(payload["message"]["apns"].get("payload").is_none());
        assert_eq!(payload["message"]["apns"]["headers"]["apns-priority"], "10");
    }

    #[test]
    fn test_wire_payload_token_only() {
        let message = FcmMessage {
            token: "tok".to_string(),
            notification: None,
            data: None,
            apns: None,
        };
        assert_eq!(build_fcm_payload(&message), json!({ "message": { "token": "tok" } }));
    }
}
