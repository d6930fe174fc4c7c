//! 业务指标
//!
//! 基于 metrics crate 的 facade 记录计数器与直方图，
//! 导出方式（Prometheus 等）由宿主进程安装的 recorder 决定。

/// 注册指标描述
///
/// 这些描述会出现在导出端点的 HELP 注释中。
pub fn describe() {
    metrics::describe_counter!("campaign_previews_total", "Total number of audience previews");
    metrics::describe_histogram!(
        "audience_evaluation_duration_seconds",
        "Audience evaluation duration in seconds"
    );

    metrics::describe_counter!(
        "campaign_executions_total",
        "Total number of campaign executions by final status"
    );
    metrics::describe_histogram!(
        "campaign_execution_duration_seconds",
        "Campaign execution duration in seconds"
    );

    metrics::describe_counter!(
        "campaign_deliveries_total",
        "Total number of per-recipient delivery attempts"
    );

    metrics::describe_counter!("push_dispatch_total", "Total number of push dispatches");
    metrics::describe_counter!(
        "push_devices_invalidated_total",
        "Total number of devices deactivated on provider feedback"
    );
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录受众评估
#[inline]
pub fn record_audience_evaluation(count: usize, duration_secs: f64) {
    metrics::counter!("campaign_previews_total").increment(1);
    metrics::histogram!(
        "audience_evaluation_duration_seconds",
        "empty" => (count == 0).to_string()
    )
    .record(duration_secs);
}

/// 记录活动执行结果
#[inline]
pub fn record_campaign_execution(status: &str, duration_secs: f64) {
    metrics::counter!(
        "campaign_executions_total",
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "campaign_execution_duration_seconds",
        "status" => status.to_string()
    )
    .record(duration_secs);
}

/// 记录单个接收人的投递结果
#[inline]
pub fn record_delivery(success: bool) {
    let result = if success { "success" } else { "failure" };
    metrics::counter!("campaign_deliveries_total", "result" => result).increment(1);
}

/// 记录推送分发
#[inline]
pub fn record_dispatch(outcome: &str, category: &str) {
    metrics::counter!(
        "push_dispatch_total",
        "outcome" => outcome.to_string(),
        "category" => category.to_string()
    )
    .increment(1);
}

/// 记录失效设备数
#[inline]
pub fn record_devices_invalidated(count: usize) {
    metrics::counter!("push_devices_invalidated_total").increment(count as u64);
}
