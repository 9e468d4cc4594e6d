//! Single-consumer batching stage: buffers spans per format, flushes on
//! size or time, and dispatches network sends through a bounded in-flight
//! pool with retry.

use std::io::{BufWriter, Write};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::stats::EmitterStats;
use crate::config::{Compression, Config, Format, Output};
use crate::model::{Span, Trace};
use crate::sink::{self, OtlpGrpcClient, OtlpHttpClient, SinkClient, ZipkinClient};
use crate::{encode, Error};

pub struct Consumer {
    cfg: Config,
    writer: BufWriter<Box<dyn Write + Send>>,
    stats: Arc<EmitterStats>,
    token: CancellationToken,
    sink: Option<Arc<SinkClient>>,
    permits: Arc<Semaphore>,
    tasks: JoinSet<()>,
    net_err_tx: mpsc::Sender<Error>,
    net_err_rx: mpsc::Receiver<Error>,
    batch: Vec<Span>,
    pending_traces: u64,
}

impl Consumer {
    pub fn new(
        cfg: Config,
        out: Box<dyn Write + Send>,
        stats: Arc<EmitterStats>,
        token: CancellationToken,
    ) -> Self {
        let sink = match (cfg.format, cfg.output) {
            (Format::OtlpHttp, Output::Otlp) => {
                Some(Arc::new(SinkClient::OtlpHttp(OtlpHttpClient::new(
                    &cfg.otlp_endpoint,
                    cfg.headers.clone(),
                    cfg.compress == Compression::Gzip,
                ))))
            }
            (Format::OtlpGrpc, Output::Otlp) => {
                Some(Arc::new(SinkClient::OtlpGrpc(OtlpGrpcClient::new(
                    &cfg.otlp_endpoint,
                    cfg.headers.clone(),
                    cfg.otlp_insecure,
                    cfg.sink_timeout,
                ))))
            }
            (Format::ZipkinJson, Output::Zipkin) => Some(Arc::new(SinkClient::Zipkin(
                ZipkinClient::new(&cfg.zipkin_endpoint, cfg.headers.clone()),
            ))),
            _ => None,
        };
        let (net_err_tx, net_err_rx) = mpsc::channel(1);
        Consumer {
            writer: BufWriter::new(out),
            permits: Arc::new(Semaphore::new(cfg.sink_max_in_flight)),
            tasks: JoinSet::new(),
            net_err_tx,
            net_err_rx,
            batch: Vec::new(),
            pending_traces: 0,
            sink,
            stats,
            token,
            cfg,
        }
    }

    /// Drains the trace channel until it closes or the run is cancelled,
    /// then finalizes: residual flush, in-flight drain, writer flush.
    pub async fn run(mut self, mut traces: mpsc::Receiver<Trace>) -> Result<(), Error> {
        let start = tokio::time::Instant::now() + self.cfg.flush_interval;
        let mut flush_ticker = tokio::time::interval_at(start, self.cfg.flush_interval);
        flush_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                Some(err) = self.net_err_rx.recv() => return Err(err),
                _ = self.token.cancelled() => return self.finalize().await,
                received = traces.recv() => match received {
                    Some(trace) => {
                        if let Err(err) = self.handle_trace(trace).await {
                            return Err(self.first_error(err));
                        }
                    }
                    None => return self.finalize().await,
                },
                _ = flush_ticker.tick() => {
                    if let Err(err) = self.flush().await {
                        return Err(self.first_error(err));
                    }
                }
            }
        }
    }

    /// Prefers the error that caused a cancellation over the cancellation
    /// itself.
    fn first_error(&mut self, err: Error) -> Error {
        if matches!(err, Error::Cancelled) {
            if let Ok(slot) = self.net_err_rx.try_recv() {
                return slot;
            }
        }
        err
    }

    async fn handle_trace(&mut self, trace: Trace) -> Result<(), Error> {
        if self.cfg.output == Output::Noop {
            self.stats.add(1, trace.spans.len() as u64);
            return Ok(());
        }
        match self.cfg.format {
            Format::Pretty => {
                let rendered = encode::pretty::render_trace(&trace);
                self.writer.write_all(rendered.as_bytes())?;
                self.writer.flush()?;
                self.stats.add(1, trace.spans.len() as u64);
                debug!(spans = trace.spans.len(), "wrote trace");
            }
            Format::Jsonl | Format::OtlpHttp | Format::OtlpGrpc | Format::ZipkinJson => {
                self.pending_traces += 1;
                self.batch.extend(trace.spans);
                if self.batch.len() >= self.cfg.batch_size {
                    self.flush().await?;
                }
            }
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), Error> {
        if self.batch.is_empty() {
            return Ok(());
        }
        match self.cfg.format {
            Format::Jsonl => self.flush_jsonl(),
            Format::OtlpHttp | Format::OtlpGrpc | Format::ZipkinJson => {
                self.dispatch_batch().await
            }
            Format::Pretty => Ok(()),
        }
    }

    /// Serializes the buffer straight to the writer and flushes it
    /// synchronously.
    fn flush_jsonl(&mut self) -> Result<(), Error> {
        let spans = std::mem::take(&mut self.batch);
        let traces = std::mem::take(&mut self.pending_traces);
        encode::jsonl::write_spans(&mut self.writer, &spans)?;
        self.writer.flush()?;
        self.stats.add(traces, spans.len() as u64);
        debug!(traces, spans = spans.len(), "wrote batch");
        Ok(())
    }

    /// Moves the buffer into an asynchronous send task, gated by the
    /// in-flight semaphore. The first failed send wins the error slot and
    /// cancels the run.
    async fn dispatch_batch(&mut self) -> Result<(), Error> {
        let spans = std::mem::take(&mut self.batch);
        let traces = std::mem::take(&mut self.pending_traces);
        let Some(sink) = self.sink.clone() else {
            return Err(Error::Config(format!(
                "format {} has no sink client for output {}",
                self.cfg.format, self.cfg.output
            )));
        };

        let permit = tokio::select! {
            _ = self.token.cancelled() => return Err(Error::Cancelled),
            permit = self.permits.clone().acquire_owned() => {
                permit.map_err(|_| Error::Cancelled)?
            }
        };

        let token = self.token.clone();
        let stats = self.stats.clone();
        let net_err_tx = self.net_err_tx.clone();
        let retries = self.cfg.sink_retries;
        let backoff = self.cfg.sink_retry_backoff;
        let timeout = self.cfg.sink_timeout;
        let span_count = spans.len() as u64;
        debug!(traces, spans = span_count, "dispatching batch");
        self.tasks.spawn(async move {
            let result =
                sink::send_with_retry(&token, retries, backoff, timeout, || {
                    sink.send_spans(&spans)
                })
                .await;
            drop(permit);
            match result {
                Ok(()) => {
                    stats.add(traces, span_count);
                    debug!(traces, spans = span_count, "batch sent");
                }
                Err(err) => {
                    debug!(error = %err, "batch send failed");
                    let _ = net_err_tx.try_send(err);
                    token.cancel();
                }
            }
        });
        Ok(())
    }

    async fn finalize(mut self) -> Result<(), Error> {
        let mut flush_err: Option<Error> = None;
        if self.cfg.output != Output::Noop {
            let result = match self.cfg.format {
                Format::Jsonl => {
                    if self.batch.is_empty() {
                        Ok(())
                    } else {
                        self.flush_jsonl()
                    }
                }
                Format::OtlpHttp | Format::OtlpGrpc | Format::ZipkinJson => {
                    if self.batch.is_empty() {
                        Ok(())
                    } else {
                        self.dispatch_batch().await
                    }
                }
                Format::Pretty => self.writer.flush().map_err(Error::from),
            };
            if let Err(err) = result {
                flush_err = Some(err);
            }
        }

        while self.tasks.join_next().await.is_some() {}
        if let Some(sink) = &self.sink {
            sink.shutdown().await;
        }

        let slot_err = self.net_err_rx.try_recv().ok();
        match (flush_err, slot_err) {
            // a fatal send predates the cancellation it triggered
            (Some(Error::Cancelled), Some(err)) => Err(err),
            (Some(err), _) => Err(err),
            (None, Some(err)) => Err(err),
            (None, None) => {
                self.writer.flush()?;
                Ok(())
            }
        }
    }
}
