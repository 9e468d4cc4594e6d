//! End-of-run summary written for the report-file adapter.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stats::StatsSnapshot;
use crate::config::Config;
use crate::Error;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub format: String,
    pub output: String,
    pub emitted_traces: u64,
    pub emitted_spans: u64,
    pub traces_per_second: f64,
    pub spans_per_second: f64,
}

pub fn build_report(
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    cfg: &Config,
    snapshot: &StatsSnapshot,
) -> RunReport {
    let mut duration = (finished_at - started_at)
        .to_std()
        .unwrap_or_default()
        .as_secs_f64();
    if duration <= 0.0 {
        duration = 1e-9;
    }
    RunReport {
        started_at,
        finished_at,
        duration_seconds: duration,
        format: cfg.format.to_string(),
        output: cfg.output.to_string(),
        emitted_traces: snapshot.emitted_traces,
        emitted_spans: snapshot.emitted_spans,
        traces_per_second: snapshot.emitted_traces as f64 / duration,
        spans_per_second: snapshot.emitted_spans as f64 / duration,
    }
}

pub fn write_report(path: &Path, report: &RunReport) -> Result<(), Error> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    let mut data = serde_json::to_vec_pretty(report)
        .map_err(|e| Error::Encode(format!("marshal report: {e}")))?;
    data.push(b'\n');
    fs::write(path, data)?;
    Ok(())
}
