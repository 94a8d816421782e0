use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

use crate::push::provider::credential::ServiceAccountKey;
use crate::push::provider::error::BackendError;
use crate::push::provider::provider_trait::{MessagingBackend, ScopedClient};
use crate::push::provider::registry::ScopeRegistry;
use crate::push::types::FcmMessage;

/// Mock 后端的行为
#[derive(Debug, Clone, Default)]
pub enum MockBehavior {
    #[default]
    Succeed,
    /// 创建客户端时失败
    FailOnCreate(String),
    /// send 返回错误
    FailOnSend(String),
    /// send 直接 panic，只用于验证 panic 时客户端仍被释放
    #[cfg(test)]
    PanicOnSend,
}

/// Mock 调用记录
#[derive(Debug, Default)]
struct MockJournal {
    created: Vec<String>,
    sent: Vec<FcmMessage>,
    disposed: Vec<String>,
}

/// Mock Backend（dry-run 模式和测试替身）
///
/// 不调用真实 API，只记录调用并打印日志
#[derive(Clone, Default)]
pub struct MockBackend {
    behavior: MockBehavior,
    validate_credentials: bool,
    registry: ScopeRegistry,
    journal: Arc<Mutex<MockJournal>>,
}

impl MockBackend {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            ..Self::default()
        }
    }

    /// dry-run：解析上传的 service account 结构，但不联系 Google
    pub fn dry_run() -> Self {
        Self {
            validate_credentials: true,
            ..Self::default()
        }
    }

    pub fn registry(&self) -> &ScopeRegistry {
        &self.registry
    }

    pub fn created_scopes(&self) -> Vec<String> {
        self.journal.lock().created.clone()
    }

    pub fn disposed_scopes(&self) -> Vec<String> {
        self.journal.lock().disposed.clone()
    }

    pub fn sent_messages(&self) -> Vec<FcmMessage> {
        self.journal.lock().sent.clone()
    }

    pub fn created_count(&self) -> usize {
        self.journal.lock().created.len()
    }

    pub fn disposed_count(&self) -> usize {
        self.journal.lock().disposed.len()
    }
}

#[async_trait]
impl MessagingBackend for MockBackend {
    async fn create_scoped_client(
        &self,
        scope_name: &str,
        credential: &[u8],
    ) -> Result<Box<dyn ScopedClient>, BackendError> {
        if let MockBehavior::FailOnCreate(msg) = &self.behavior {
            return Err(BackendError::KeyParse(msg.clone()));
        }

        let project_id = if self.validate_credentials {
            ServiceAccountKey::from_bytes(credential)?.project_id
        } else {
            "mock".to_string()
        };

        self.registry.register(scope_name)?;
        self.journal.lock().created.push(scope_name.to_string());

        info!("[MOCK PUSH] Created client scope: scope={}", scope_name);

        Ok(Box::new(MockScopedClient {
            scope_name: scope_name.to_string(),
            project_id,
            behavior: self.behavior.clone(),
            registry: self.registry.clone(),
            journal: self.journal.clone(),
        }))
    }

    fn live_scopes(&self) -> usize {
        self.registry.len()
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

struct MockScopedClient {
    scope_name: String,
    project_id: String,
    behavior: MockBehavior,
    registry: ScopeRegistry,
    journal: Arc<Mutex<MockJournal>>,
}

#[async_trait]
impl ScopedClient for MockScopedClient {
    fn scope_name(&self) -> &str {
        &self.scope_name
    }

    async fn send(&self, message: &FcmMessage) -> Result<String, BackendError> {
        match &self.behavior {
            MockBehavior::FailOnSend(msg) => {
                return Err(BackendError::Api {
                    status: 400,
                    message: msg.clone(),
                })
            }
            #[cfg(test)]
            MockBehavior::PanicOnSend => panic!("mock backend panicked during send"),
            MockBehavior::Succeed | MockBehavior::FailOnCreate(_) => {}
        }

        let mut journal = self.journal.lock();
        journal.sent.push(message.clone());
        let message_id = format!("projects/{}/messages/{}", self.project_id, journal.sent.len());

        info!(
            "[MOCK PUSH] Sending push: scope={}, message_id={}, token={}",
            self.scope_name, message_id, message.token
        );

        Ok(message_id)
    }

    fn dispose(&mut self) {
        self.registry.release(&self.scope_name);
        self.journal.lock().disposed.push(self.scope_name.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> FcmMessage {
        FcmMessage {
            token: "tok".to_string(),
            notification: None,
            data: None,
            apns: None,
        }
    }

    #[tokio::test]
    async fn test_records_lifecycle() {
        let backend = MockBackend::new(MockBehavior::Succeed);
        let mut client = backend.create_scoped_client("scope-1", b"key").await.unwrap();
        assert_eq!(backend.live_scopes(), 1);

        let id = client.send(&message()).await.unwrap();
        assert_eq!(id, "projects/mock/messages/1");

        client.dispose();
        assert_eq!(backend.live_scopes(), 0);
        assert_eq!(backend.created_scopes(), vec!["scope-1".to_string()]);
        assert_eq!(backend.disposed_scopes(), vec!["scope-1".to_string()]);
        assert_eq!(backend.sent_messages().len(), 1);
    }

    #[tokio::test]
    async fn test_fail_on_create_registers_nothing() {
        let backend = MockBackend::new(MockBehavior::FailOnCreate("bad key".into()));
        let result = backend.create_scoped_client("scope-1", b"key").await;
        assert!(result.is_err());
        assert_eq!(backend.created_count(), 0);
        assert_eq!(backend.live_scopes(), 0);
    }

    #[tokio::test]
    async fn test_dry_run_validates_credential() {
        let backend = MockBackend::dry_run();
        let result = backend.create_scoped_client("scope-1", b"not json").await;
        assert!(matches!(result, Err(BackendError::KeyParse(_))));

        let key = br#"{"project_id":"demo","private_key":"pem","client_email":"a@b.c"}"#;
        let client = backend.create_scoped_client("scope-2", key).await.unwrap();
        assert_eq!(client.send(&message()).await.unwrap(), "projects/demo/messages/1");
    }
}
