//! Run orchestration: wires the producer, consumer, and admin endpoint
//! together under one cancellation signal and surfaces the first error.

pub mod admin;
mod consumer;
mod producer;
mod report;
mod stats;

pub use report::RunReport;
pub use stats::{EmitterStats, StatsSnapshot};

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{Config, Output};
use crate::model::Trace;
use crate::Error;

use consumer::Consumer;

/// Executes one full run of the pipeline against the given writer.
///
/// The writer receives encoded spans for `stdout`-style outputs and the
/// benchmark summary for `noop`; file output opens its own writer. Returns
/// the first error raised by any stage, or `Ok` after the report is
/// emitted.
pub async fn run(cfg: Config, out: Box<dyn Write + Send>) -> Result<(), Error> {
    cfg.validate()?;
    let stats = Arc::new(EmitterStats::new());
    let started_at = Utc::now();
    debug!(
        format = %cfg.format,
        output = %cfg.output,
        rate = cfg.rate_value,
        unit = cfg.rate_unit.as_str(),
        count = cfg.count,
        workers = cfg.workers,
        "starting run"
    );

    // noop never writes spans; keep the caller's writer for the summary.
    let (consumer_out, mut summary_out): (Box<dyn Write + Send>, Option<Box<dyn Write + Send>>) =
        if cfg.output == Output::Noop {
            (Box::new(io::sink()), Some(out))
        } else if cfg.output == Output::File {
            (Box::new(File::create(&cfg.file)?), None)
        } else {
            (out, None)
        };

    let token = CancellationToken::new();
    let (err_tx, mut err_rx) = mpsc::channel::<Error>(1);

    let admin_handle = if cfg.http_listen.is_empty() {
        None
    } else {
        let listen = cfg.http_listen.clone();
        let stats = stats.clone();
        let token = token.clone();
        let err_tx = err_tx.clone();
        Some(tokio::spawn(async move {
            if let Err(err) = admin::serve(&listen, stats, token.clone()).await {
                let _ = err_tx.try_send(err);
                token.cancel();
            }
        }))
    };

    let (trace_tx, trace_rx) = mpsc::channel::<Trace>(cfg.batch_size);
    let consumer = Consumer::new(cfg.clone(), consumer_out, stats.clone(), token.clone());
    let consumer_handle = tokio::spawn({
        let token = token.clone();
        let err_tx = err_tx.clone();
        async move {
            if let Err(err) = consumer.run(trace_rx).await {
                let _ = err_tx.try_send(err);
                token.cancel();
            }
        }
    });

    let producer_cfg = cfg.clone();
    let producer_token = token.clone();
    let produced = tokio::task::spawn_blocking(move || {
        producer::produce_traces(&producer_cfg, trace_tx, &producer_token)
    })
    .await
    .map_err(|e| Error::Internal(format!("producer task failed: {e}")))
    .and_then(|result| result);

    if let Err(err) = produced {
        token.cancel();
        let _ = consumer_handle.await;
        if let Some(handle) = admin_handle {
            let _ = handle.await;
        }
        return Err(err);
    }

    // the producer dropped the trace channel; the consumer drains and exits
    let _ = consumer_handle.await;
    token.cancel();
    if let Some(handle) = admin_handle {
        let _ = handle.await;
    }

    if let Ok(err) = err_rx.try_recv() {
        return Err(err);
    }

    let finished_at = Utc::now();
    let snapshot = stats.snapshot();
    let run_report = report::build_report(started_at, finished_at, &cfg, &snapshot);
    if let Some(writer) = summary_out.as_mut() {
        writeln!(
            writer,
            "benchmark summary: emitted_traces={} emitted_spans={} duration={:.2}s traces/sec={:.2} spans/sec={:.2}",
            run_report.emitted_traces,
            run_report.emitted_spans,
            run_report.duration_seconds,
            run_report.traces_per_second,
            run_report.spans_per_second,
        )?;
        writer.flush()?;
    }
    if !cfg.report_file.is_empty() {
        report::write_report(Path::new(&cfg.report_file), &run_report)?;
    }
    Ok(())
}
