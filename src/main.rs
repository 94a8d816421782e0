use anyhow::{Context, Result};
use fcm_tester::{
    cli::{Cli, Commands},
    config::{self, ServerConfig},
    infra::metrics,
    logging, HttpServer,
};
use std::fs;
use std::process;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载 .env 文件（如果存在）
    let _ = dotenvy::dotenv();

    // 解析命令行参数
    let cli = Cli::parse();

    // 处理子命令
    if let Some(command) = &cli.command {
        match command {
            Commands::GenerateConfig { path } => return generate_config(path),
            Commands::ValidateConfig { path } => return validate_config(path),
            Commands::ShowConfig => return show_config(&cli),
        }
    }

    // 快速读取 [logging] 段与 FCM_TESTER_LOG_* 环境变量（不加载完整配置）
    let early_log = config::load_early_logging_config(cli.config_file.as_deref());

    // 合并日志配置（优先级：CLI > 环境变量 > config.toml > 默认值）
    let log_level = cli
        .get_log_level()
        .or(early_log.level)
        .unwrap_or_else(|| "info".to_string());
    let log_format = cli.get_log_format().or(early_log.format);
    let log_file = cli.log_file.clone().or(early_log.file);

    let _log_guard = logging::init_logging(
        &log_level,
        log_format.as_deref(),
        log_file.as_deref(),
        cli.quiet,
    )?;

    tracing::info!("🚀 FCM Tester starting... version {}", env!("CARGO_PKG_VERSION"));

    // 加载配置（按优先级：命令行 > 环境变量 > 配置文件 > 默认值）
    let config = ServerConfig::load(&cli).context("加载配置失败")?;

    tracing::info!("📊 Server Configuration:");
    tracing::info!("  - Listen: {}", config.bind_address());
    tracing::info!("  - FCM API: {}", config.fcm.api_base_url);
    tracing::info!("  - Dry Run: {}", config.fcm.dry_run);
    tracing::info!("  - Request Timeout: {}s", config.fcm.request_timeout_secs);
    tracing::info!("  - Max Key File: {} bytes", config.max_key_file_bytes);
    tracing::info!(
        "  - Static Dir: {}",
        config
            .static_dir
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    tracing::info!("  - CORS Origins: {:?}", config.cors_allowed_origins);
    tracing::info!(
        "  - Log Format: {:?}",
        log_format.as_deref().unwrap_or("compact")
    );
    if let Some(f) = &log_file {
        tracing::info!("  - Log File: {}", f);
    }

    if let Err(e) = metrics::init() {
        tracing::warn!("⚠️ Prometheus 指标初始化失败: {}", e);
    }

    let server = match HttpServer::from_config(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("❌ 服务器初始化失败: {}", e);
            tracing::error!("💡 请检查 [fcm] 配置后重试");
            process::exit(1);
        }
    };

    if let Err(e) = server.start().await {
        tracing::error!("❌ 服务器运行失败: {}", e);
        process::exit(1);
    }

    Ok(())
}

/// 生成默认配置文件
fn generate_config(path: &str) -> Result<()> {
    let default_config = r#"# FCM Tester 配置文件
# 此文件由 fcm-tester generate-config 生成

[server]
host = "0.0.0.0"
port = 5000
# 前端构建产物目录，配置后提供静态文件与 SPA 回退
# static_dir = "./frontend/dist"
# 为空时允许任意来源
cors_allowed_origins = []
max_key_file_bytes = 65536

[fcm]
api_base_url = "https://fcm.googleapis.com"
# token_uri_override = "http://127.0.0.1:8085/token"
request_timeout_secs = 30
dry_run = false

[logging]
level = "info"
format = "compact"
# file = "./logs/fcm-tester.log"
"#;

    fs::write(path, default_config).with_context(|| format!("无法写入配置文件: {}", path))?;

    println!("✅ 配置文件已生成: {}", path);
    Ok(())
}

/// 验证配置文件
fn validate_config(path: &str) -> Result<()> {
    let config = ServerConfig::from_toml_file(path)
        .with_context(|| format!("配置文件验证失败: {}", path))?;

    url::Url::parse(&config.fcm.api_base_url)
        .with_context(|| format!("fcm.api_base_url 无效: {}", config.fcm.api_base_url))?;

    println!("✅ 配置文件有效: {}", path);
    println!("📊 配置摘要:");
    println!("  - Listen: {}", config.bind_address());
    println!("  - FCM API: {}", config.fcm.api_base_url);
    println!("  - Dry Run: {}", config.fcm.dry_run);

    Ok(())
}

/// 显示最终配置（合并后的配置）
fn show_config(cli: &Cli) -> Result<()> {
    let _guard = logging::init_logging("info", None, None, false)?;

    let config = ServerConfig::load(cli).context("加载配置失败")?;

    println!("📊 最终配置（合并后的配置）:");
    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(())
}
