use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{Result, ServerError};
use crate::infra::metrics;
use crate::push::message::build_message;
use crate::push::provider::{BackendError, MessagingBackend, ScopedClient};
use crate::push::types::{FcmMessage, SendRequest};

/// 一次发送的结果，构造后不再修改
#[derive(Debug)]
pub enum DispatchOutcome {
    Sent {
        message_id: String,
        sent_payload: FcmMessage,
    },
    Failed(ServerError),
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent { .. })
    }

    pub fn into_result(self) -> Result<(String, FcmMessage)> {
        match self {
            DispatchOutcome::Sent {
                message_id,
                sent_payload,
            } => Ok((message_id, sent_payload)),
            DispatchOutcome::Failed(err) => Err(err),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Sent { .. } => "sent",
            DispatchOutcome::Failed(ServerError::InvalidDataFormat(_)) => "invalid_data",
            DispatchOutcome::Failed(_) => "failed",
        }
    }
}

/// 临时客户端的作用域守卫
///
/// Drop 时无条件 dispose：正常返回、send 出错、send 中 panic 都会执行。
pub struct ClientScope {
    client: Box<dyn ScopedClient>,
}

impl ClientScope {
    pub fn new(client: Box<dyn ScopedClient>) -> Self {
        Self { client }
    }

    pub fn scope_name(&self) -> &str {
        self.client.scope_name()
    }

    pub async fn send(&self, message: &FcmMessage) -> std::result::Result<String, BackendError> {
        self.client.send(message).await
    }
}

impl Drop for ClientScope {
    fn drop(&mut self) {
        self.client.dispose();
        info!("[DISPATCH] Cleaned up client scope: scope={}", self.client.scope_name());
    }
}

/// Push Dispatcher（发送核心）
///
/// 职责：
/// - 解析 data 并选择消息形态
/// - 为每个请求创建唯一命名的临时客户端
/// - 发送恰好一次，随后释放客户端
pub struct PushDispatcher {
    backend: Arc<dyn MessagingBackend>,
}

impl PushDispatcher {
    pub fn new(backend: Arc<dyn MessagingBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn MessagingBackend> {
        &self.backend
    }

    pub async fn dispatch(&self, request: SendRequest) -> DispatchOutcome {
        let started = Instant::now();
        let outcome = self.dispatch_inner(request).await;

        metrics::record_send(outcome.label(), started.elapsed().as_secs_f64());
        metrics::record_live_scopes(self.backend.live_scopes());

        outcome
    }

    async fn dispatch_inner(&self, request: SendRequest) -> DispatchOutcome {
        // data 在创建客户端之前解析，格式错误时不会触碰凭据
        let (variant, message) = match build_message(&request) {
            Ok(built) => built,
            Err(err) => {
                warn!("[DISPATCH] Rejected payload: {}", err);
                return DispatchOutcome::Failed(err);
            }
        };

        let scope_name = Uuid::new_v4().to_string();
        info!(
            "[DISPATCH] Dispatching: scope={}, variant={}, backend={}",
            scope_name,
            variant.as_str(),
            self.backend.name()
        );

        match self.send_in_scope(&scope_name, &request, &message).await {
            Ok(message_id) => {
                info!(
                    "[DISPATCH] Message sent: scope={}, message_id={}",
                    scope_name, message_id
                );
                if let Ok(pretty) = serde_json::to_string_pretty(&message) {
                    debug!("[DISPATCH] Sent payload:\n{}", pretty);
                }
                DispatchOutcome::Sent {
                    message_id,
                    sent_payload: message,
                }
            }
            Err(err) => {
                error!("[DISPATCH] Dispatch failed: scope={}, error={}", scope_name, err);
                DispatchOutcome::Failed(err.into())
            }
        }
    }

    async fn send_in_scope(
        &self,
        scope_name: &str,
        request: &SendRequest,
        message: &FcmMessage,
    ) -> std::result::Result<String, BackendError> {
        let client = self
            .backend
            .create_scoped_client(scope_name, &request.credential)
            .await?;
        let scope = ClientScope::new(client);
        scope.send(message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::provider::{MockBackend, MockBehavior};

    fn dispatcher(behavior: MockBehavior) -> (PushDispatcher, MockBackend) {
        let backend = MockBackend::new(behavior);
        (PushDispatcher::new(Arc::new(backend.clone())), backend)
    }

    fn request() -> SendRequest {
        SendRequest::new(&b"{\"project_id\":\"demo\"}"[..], "device-token")
    }

    #[tokio::test]
    async fn test_sent_outcome_disposes_client() {
        let (dispatcher, backend) = dispatcher(MockBehavior::Succeed);
        let outcome = dispatcher
            .dispatch(request().with_message("Hello").with_title("Hi"))
            .await;

        let (message_id, payload) = outcome.into_result().unwrap();
        assert_eq!(message_id, "projects/mock/messages/1");
        assert_eq!(payload.notification.unwrap().body, "Hello");
        assert_eq!(backend.created_count(), 1);
        assert_eq!(backend.disposed_count(), 1);
        assert_eq!(backend.live_scopes(), 0);
    }

    #[tokio::test]
    async fn test_send_failure_still_disposes() {
        let (dispatcher, backend) =
            dispatcher(MockBehavior::FailOnSend("Requested entity was not found.".into()));
        let outcome = dispatcher.dispatch(request()).await;

        match outcome {
            DispatchOutcome::Failed(ServerError::DispatchFailed(msg)) => {
                assert_eq!(msg, "Requested entity was not found.")
            }
            other => panic!("expected DispatchFailed, got {:?}", other),
        }
        assert_eq!(backend.created_count(), 1);
        assert_eq!(backend.disposed_count(), 1);
        assert_eq!(backend.live_scopes(), 0);
    }

    #[tokio::test]
    async fn test_create_failure_is_dispatch_failed() {
        let (dispatcher, backend) = dispatcher(MockBehavior::FailOnCreate("no key".into()));
        let outcome = dispatcher.dispatch(request()).await;

        match outcome {
            DispatchOutcome::Failed(ServerError::DispatchFailed(msg)) => assert!(msg.contains("no key")),
            other => panic!("expected DispatchFailed, got {:?}", other),
        }
        assert_eq!(backend.disposed_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_data_never_creates_client() {
        let (dispatcher, backend) = dispatcher(MockBehavior::Succeed);
        let outcome = dispatcher.dispatch(request().with_data("{oops")).await;

        assert!(matches!(
            outcome,
            DispatchOutcome::Failed(ServerError::InvalidDataFormat(_))
        ));
        assert_eq!(backend.created_count(), 0);
        assert_eq!(backend.disposed_count(), 0);
    }

    #[tokio::test]
    async fn test_panic_during_send_still_disposes() {
        let (dispatcher, backend) = dispatcher(MockBehavior::PanicOnSend);
        let handle = tokio::spawn(async move { dispatcher.dispatch(request()).await });

        let join = handle.await;
        assert!(join.unwrap_err().is_panic());
        assert_eq!(backend.created_count(), 1);
        assert_eq!(backend.disposed_count(), 1);
        assert_eq!(backend.live_scopes(), 0);
    }

    #[tokio::test]
    async fn test_scope_names_are_unique() {
        let (dispatcher, backend) = dispatcher(MockBehavior::Succeed);
        for _ in 0..5 {
            assert!(dispatcher.dispatch(request()).await.is_sent());
        }

        let mut created = backend.created_scopes();
        created.sort();
        created.dedup();
        assert_eq!(created.len(), 5);
        assert_eq!(backend.disposed_scopes().len(), 5);
    }

    #[tokio::test]
    async fn test_concurrent_dispatches_are_isolated() {
        let (dispatcher, backend) = dispatcher(MockBehavior::Succeed);
        let dispatcher = Arc::new(dispatcher);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    dispatcher
                        .dispatch(SendRequest::new(&b"{}"[..], format!("token-{}", i)))
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_sent());
        }
        assert_eq!(backend.created_count(), 16);
        assert_eq!(backend.disposed_count(), 16);
        assert_eq!(backend.live_scopes(), 0);
    }
}
