use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const DEFAULT_FCM_API_BASE_URL: &str = "https://fcm.googleapis.com";

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 服务器监听地址
    pub host: String,
    /// HTTP 端口
    pub port: u16,
    /// 前端静态文件目录（可选，配置后同时提供 SPA 回退）
    pub static_dir: Option<PathBuf>,
    /// 允许的跨域来源；为空时使用宽松 CORS
    pub cors_allowed_origins: Vec<String>,
    /// 上传的 service account 文件大小上限（字节）
    pub max_key_file_bytes: usize,
    /// FCM 配置
    pub fcm: FcmConfig,
}

/// FCM 后端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FcmConfig {
    /// FCM API 基础 URL
    pub api_base_url: String,
    /// 覆盖 service account 中的 token_uri（测试环境使用）
    pub token_uri_override: Option<String>,
    /// 出站 HTTP 请求超时（秒）
    pub request_timeout_secs: u64,
    /// dry-run：不联系 Google，只记录消息
    pub dry_run: bool,
}

impl Default for FcmConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_FCM_API_BASE_URL.to_string(),
            token_uri_override: None,
            request_timeout_secs: 30,
            dry_run: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            static_dir: None,
            cors_allowed_origins: Vec::new(),
            max_key_file_bytes: 64 * 1024,
            fcm: FcmConfig::default(),
        }
    }
}

impl ServerConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 监听地址
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 从 TOML 文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("无法读取配置文件: {:?}", path.as_ref()))?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let toml_config: TomlConfig = toml::from_str(content).context("配置文件格式错误")?;
        Ok(toml_config.into())
    }

    /// 从环境变量加载配置（FCM_TESTER_ 前缀）
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(host) = env::var("FCM_TESTER_HOST") {
            self.host = host;
        }
        if let Ok(port) = env::var("FCM_TESTER_PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("FCM_TESTER_PORT 无效: {}", port))?;
        }
        if let Ok(dir) = env::var("FCM_TESTER_STATIC_DIR") {
            self.static_dir = Some(PathBuf::from(dir));
        }
        if let Ok(origins) = env::var("FCM_TESTER_CORS_ORIGINS") {
            self.cors_allowed_origins = split_list(&origins);
        }
        if let Ok(base_url) = env::var("FCM_TESTER_FCM_API_BASE_URL") {
            self.fcm.api_base_url = base_url;
        }
        if let Ok(token_uri) = env::var("FCM_TESTER_TOKEN_URI") {
            self.fcm.token_uri_override = Some(token_uri);
        }
        if let Ok(dry_run) = env::var("FCM_TESTER_DRY_RUN") {
            self.fcm.dry_run = matches!(dry_run.as_str(), "1" | "true" | "yes");
        }

        Ok(())
    }

    /// 从命令行参数合并配置
    pub fn merge_from_cli(&mut self, cli: &crate::cli::Cli) {
        if let Some(host) = &cli.host {
            self.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(dir) = &cli.static_dir {
            self.static_dir = Some(dir.clone());
        }
        if let Some(base_url) = &cli.fcm_api_base_url {
            self.fcm.api_base_url = base_url.clone();
        }
        if cli.dry_run {
            self.fcm.dry_run = true;
        }
    }

    /// 加载配置（按优先级：命令行 > 环境变量 > 配置文件 > 默认值）
    pub fn load(cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = Self::new();

        if let Some(config_file) = &cli.config_file {
            if Path::new(config_file).exists() {
                info!("📄 从配置文件加载: {}", config_file);
                config = Self::from_toml_file(config_file)?;
            } else {
                tracing::warn!("⚠️ 配置文件不存在: {}", config_file);
            }
        } else if Path::new("config.toml").exists() {
            info!("📄 从默认配置文件加载: config.toml");
            config = Self::from_toml_file("config.toml")?;
        }

        config.merge_from_env()?;
        config.merge_from_cli(cli);

        Ok(config)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// 日志段，在完整配置之前读取
#[derive(Debug, Default, Clone, Deserialize)]
pub struct EarlyLoggingConfig {
    pub level: Option<String>,
    pub format: Option<String>,
    pub file: Option<String>,
}

impl EarlyLoggingConfig {
    /// 用 FCM_TESTER_LOG_* 覆盖文件中的值（环境变量 > 配置文件）
    pub fn merge_from_env_with<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("FCM_TESTER_LOG_LEVEL") {
            self.level = Some(level);
        }
        if let Some(format) = lookup("FCM_TESTER_LOG_FORMAT") {
            self.format = Some(format);
        }
        if let Some(file) = lookup("FCM_TESTER_LOG_FILE") {
            self.file = Some(file);
        }
        self
    }
}

/// 快速读取 [logging] 段并合并环境变量；文件缺失或格式错误时只使用环境变量
pub fn load_early_logging_config(config_file: Option<&str>) -> EarlyLoggingConfig {
    read_logging_section(config_file.unwrap_or("config.toml"))
        .merge_from_env_with(|key| env::var(key).ok())
}

fn read_logging_section(path: &str) -> EarlyLoggingConfig {
    let Ok(content) = fs::read_to_string(path) else {
        return EarlyLoggingConfig::default();
    };

    toml::from_str::<TomlConfig>(&content)
        .ok()
        .and_then(|c| c.logging)
        .map(|l| EarlyLoggingConfig {
            level: l.level,
            format: l.format,
            file: l.file,
        })
        .unwrap_or_default()
}

/// TOML 配置文件结构（用于反序列化）
///
/// `[logging]` 只由 [`load_early_logging_config`] 读取，日志在完整配置之前初始化。
#[derive(Debug, Deserialize)]
struct TomlConfig {
    server: Option<TomlServerConfig>,
    fcm: Option<TomlFcmConfig>,
    logging: Option<TomlLoggingConfig>,
}

#[derive(Debug, Deserialize)]
struct TomlServerConfig {
    host: Option<String>,
    port: Option<u16>,
    static_dir: Option<PathBuf>,
    cors_allowed_origins: Option<Vec<String>>,
    max_key_file_bytes: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TomlFcmConfig {
    api_base_url: Option<String>,
    token_uri_override: Option<String>,
    request_timeout_secs: Option<u64>,
    dry_run: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct TomlLoggingConfig {
    level: Option<String>,
    format: Option<String>,
    file: Option<String>,
}

impl From<TomlConfig> for ServerConfig {
    fn from(toml: TomlConfig) -> Self {
        let mut config = Self::default();

        if let Some(server) = toml.server {
            if let Some(host) = server.host {
                config.host = host;
            }
            if let Some(port) = server.port {
                config.port = port;
            }
            if server.static_dir.is_some() {
                config.static_dir = server.static_dir;
            }
            if let Some(origins) = server.cors_allowed_origins {
                config.cors_allowed_origins = origins;
            }
            if let Some(max) = server.max_key_file_bytes {
                config.max_key_file_bytes = max;
            }
        }

        if let Some(fcm) = toml.fcm {
            if let Some(base_url) = fcm.api_base_url {
                config.fcm.api_base_url = base_url;
            }
            if fcm.token_uri_override.is_some() {
                config.fcm.token_uri_override = fcm.token_uri_override;
            }
            if let Some(timeout) = fcm.request_timeout_secs {
                config.fcm.request_timeout_secs = timeout;
            }
            if let Some(dry_run) = fcm.dry_run {
                config.fcm.dry_run = dry_run;
            }
        }

        config
    }
}
