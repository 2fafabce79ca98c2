//! Status reports and converted-site exports

use crate::service::CrawlStatusReport;
use crate::storage::{ConversionStatus, ConvertedSiteRecord, LogStatus};
use crate::{FerryError, Result};
use std::fs;
use std::path::Path;

/// Formats a crawl status report with its most recent log lines
pub fn format_status_report(report: &CrawlStatusReport, recent_logs: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("Crawl {}: {}\n", report.crawl_id, report.status));
    out.push_str(&format!("  Seed: {}\n", report.seed_url));
    out.push_str(&format!("  Pages: {}\n", report.page_count));
    out.push_str(&format!("  Started: {}\n", report.started_at));
    if let Some(completed) = &report.completed_at {
        out.push_str(&format!("  Completed: {}\n", completed));
    }
    if let Some(error) = &report.error {
        out.push_str(&format!("  Error: {}\n", error));
    }

    let skip = report.logs.len().saturating_sub(recent_logs);
    if skip < report.logs.len() {
        out.push_str("\nRecent log:\n");
        for entry in &report.logs[skip..] {
            out.push_str(&format!(
                "  [{}] {:<7} {}\n",
                entry.timestamp,
                log_label(entry.status),
                entry.message
            ));
        }
    }
    out
}

fn log_label(status: LogStatus) -> &'static str {
    match status {
        LogStatus::Success => "OK",
        LogStatus::Info => "INFO",
        LogStatus::Warning => "WARN",
        LogStatus::Error => "ERROR",
    }
}

/// Writes the manifest of a completed conversion as pretty-printed JSON
pub fn write_manifest(site: &ConvertedSiteRecord, path: &Path) -> Result<()> {
    if site.status != ConversionStatus::Completed {
        return Err(FerryError::ConversionFailure(format!(
            "converted site {} is {}",
            site.id,
            site.status.to_db_string()
        )));
    }
    let manifest = site.manifest.as_deref().ok_or_else(|| {
        FerryError::ConversionFailure(format!("converted site {} has no manifest", site.id))
    })?;

    let value: serde_json::Value = serde_json::from_str(manifest)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(&value)?)?;

    tracing::info!("Wrote manifest of converted site {} to {}", site.id, path.display());
    Ok(())
}
