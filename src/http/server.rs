//! HTTP 服务器 - 使用 Axum 提供推送测试接口

use axum::{http::HeaderValue, Router};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::http::routes;
use crate::push::provider::{BackendError, FcmBackend, MessagingBackend, MockBackend};
use crate::push::PushDispatcher;

/// HTTP 服务器共享状态
#[derive(Clone)]
pub struct HttpServerState {
    pub dispatcher: Arc<PushDispatcher>,
    pub max_key_file_bytes: usize,
}

/// HTTP 服务器
pub struct HttpServer {
    state: HttpServerState,
    config: ServerConfig,
}

impl HttpServer {
    /// 使用给定的 dispatcher 创建服务器
    pub fn new(config: ServerConfig, dispatcher: Arc<PushDispatcher>) -> Self {
        Self {
            state: HttpServerState {
                dispatcher,
                max_key_file_bytes: config.max_key_file_bytes,
            },
            config,
        }
    }

    /// 按配置选择后端：dry-run 使用 Mock，否则使用 FCM HTTP v1
    pub fn from_config(config: ServerConfig) -> Result<Self, BackendError> {
        let backend: Arc<dyn MessagingBackend> = if config.fcm.dry_run {
            warn!("🧪 dry-run 模式：消息不会真正发送");
            Arc::new(MockBackend::dry_run())
        } else {
            Arc::new(FcmBackend::new(&config.fcm)?)
        };

        Ok(Self::new(config, Arc::new(PushDispatcher::new(backend))))
    }

    pub fn state(&self) -> &HttpServerState {
        &self.state
    }

    /// 构建路由（含 CORS、压缩与可选的静态文件服务）
    pub fn router(&self) -> Router {
        let mut app = Router::new()
            .merge(routes::create_routes())
            .with_state(self.state.clone());

        if let Some(dir) = &self.config.static_dir {
            info!("📁 静态文件目录: {}", dir.display());
            // 未命中文件的路径交给前端路由，保持 200
            let index = ServeFile::new(dir.join("index.html"));
            app = app.fallback_service(ServeDir::new(dir).fallback(index));
        }

        app.layer(CompressionLayer::new())
            .layer(cors_layer(&self.config.cors_allowed_origins))
    }

    /// 启动 HTTP 服务器，收到 Ctrl-C 后优雅退出
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let app = self.router();

        let addr = self.config.bind_address();
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!("🌐 HTTP 服务器启动在 {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("🛑 收到退出信号，停止接收新请求");
                }
            })
            .await?;

        Ok(())
    }
}

/// 来源列表为空时使用宽松 CORS
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("⚠️ 忽略无效的 CORS 来源: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
