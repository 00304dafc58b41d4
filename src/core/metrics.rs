use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

pub(crate) const EMAILS_TOTAL: &str = "notification_emails_total";
pub(crate) const NOTIFICATIONS_CREATED_TOTAL: &str = "notifications_created_total";
pub(crate) const GRADES_RECORDED_TOTAL: &str = "grades_recorded_total";

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);

    metrics::describe_counter!(EMAILS_TOTAL, "Notification email attempts by outcome");
    metrics::describe_counter!(NOTIFICATIONS_CREATED_TOTAL, "Notification rows persisted");
    metrics::describe_counter!(GRADES_RECORDED_TOTAL, "Grades created or corrected");
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}
