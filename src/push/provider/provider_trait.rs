use async_trait::async_trait;

use crate::push::provider::error::BackendError;
use crate::push::types::FcmMessage;

/// 消息后端工厂
///
/// 每个请求通过它创建一个绑定到本次凭据的临时客户端。
#[async_trait]
pub trait MessagingBackend: Send + Sync {
    /// 创建绑定到 `scope_name` 的客户端；凭据解析由后端负责
    async fn create_scoped_client(
        &self,
        scope_name: &str,
        credential: &[u8],
    ) -> Result<Box<dyn ScopedClient>, BackendError>;

    /// 当前仍然存活（未 dispose）的作用域数量
    fn live_scopes(&self) -> usize;

    /// 日志中使用的后端名称
    fn name(&self) -> &'static str;
}

/// 只服务于一次发送的临时客户端
#[async_trait]
pub trait ScopedClient: Send + Sync {
    fn scope_name(&self) -> &str;

    /// 发送一条消息，返回后端分配的消息 ID
    async fn send(&self, message: &FcmMessage) -> Result<String, BackendError>;

    /// 释放凭据并注销作用域。只调用一次。
    fn dispose(&mut self);
}
