//! Prometheus 指标：发送次数、发送耗时、存活客户端作用域数
//!
//! 通过 `init()` 安装全局 Recorder，通过 HTTP GET `/metrics` 暴露抓取端点。

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::OnceLock;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// 指标名称
const COUNTER_SEND_TOTAL: &str = "fcm_tester_send_total";
const HISTOGRAM_SEND_DURATION: &str = "fcm_tester_send_duration_seconds";
const GAUGE_LIVE_SCOPES: &str = "fcm_tester_live_scopes";

/// 初始化 Prometheus 指标（安装全局 Recorder，返回 Handle 用于 HTTP 暴露）。
/// 仅需在进程内调用一次；重复调用会返回 Err。
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
    HANDLE
        .set(handle)
        .map_err(|_| "metrics already initialized")?;
    Ok(())
}

/// 渲染当前指标为 Prometheus 文本格式，供 GET /metrics 使用。
pub fn render_metrics() -> Option<String> {
    HANDLE.get().map(|h| h.render())
}

/// 记录一次发送：按结果计数 + 耗时直方图。
pub fn record_send(outcome: &'static str, duration_secs: f64) {
    metrics::counter!(COUNTER_SEND_TOTAL, "outcome" => outcome).increment(1);
    metrics::histogram!(HISTOGRAM_SEND_DURATION, "outcome" => outcome).record(duration_secs);
}

/// 更新存活的客户端作用域数（Gauge）。每次发送结束后调用，正常情况下应为 0。
pub fn record_live_scopes(count: usize) {
    metrics::gauge!(GAUGE_LIVE_SCOPES).set(count as f64);
}
