use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::push::provider::error::BackendError;

/// FCM 发送所需的 OAuth2 scope
pub const FIREBASE_MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Firebase Service Account Key（上传的 JSON 文件）
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,
    pub project_id: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    /// 从上传的字节解析，只检查结构，不校验私钥
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BackendError> {
        let key: ServiceAccountKey = serde_json::from_slice(bytes)
            .map_err(|e| BackendError::KeyParse(e.to_string()))?;

        if let Some(kind) = key.key_type.as_deref() {
            if kind != "service_account" {
                return Err(BackendError::KeyParse(format!(
                    "expected type \"service_account\", got \"{}\"",
                    kind
                )));
            }
        }
        for (field, value) in [
            ("project_id", &key.project_id),
            ("private_key", &key.private_key),
            ("client_email", &key.client_email),
            ("token_uri", &key.token_uri),
        ] {
            if value.trim().is_empty() {
                return Err(BackendError::KeyParse(format!("field `{}` is empty", field)));
            }
        }

        Ok(key)
    }

    /// 解析 RSA 私钥
    pub fn encoding_key(&self) -> Result<EncodingKey, BackendError> {
        EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| BackendError::KeyParse(e.to_string()))
    }
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

/// JWT Claims for Google OAuth2
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub iss: String,
    pub sub: String,
    pub scope: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
}

/// 签发换取 access token 用的 JWT 断言（有效期 1 小时）
pub fn sign_assertion(
    client_email: &str,
    private_key_id: Option<&str>,
    token_uri: &str,
    key: &EncodingKey,
) -> Result<String, BackendError> {
    let now = Utc::now();
    let claims = JwtClaims {
        iss: client_email.to_string(),
        sub: client_email.to_string(),
        scope: FIREBASE_MESSAGING_SCOPE.to_string(),
        aud: token_uri.to_string(),
        exp: (now + Duration::hours(1)).timestamp(),
        iat: now.timestamp(),
    };

    let mut header = Header::new(Algorithm::RS256);
    header.kid = private_key_id.map(str::to_string);

    encode(&header, &claims, key).map_err(|e| BackendError::JwtEncode(e.to_string()))
}

/// Google OAuth2 Token Response
#[derive(Debug, Deserialize)]
pub struct GoogleTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// token 端点的错误响应
#[derive(Debug, Deserialize)]
pub struct GoogleTokenError {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl std::fmt::Display for GoogleTokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {}", self.error, description),
            None => write!(f, "{}", self.error),
        }
    }
}
