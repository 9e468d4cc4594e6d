//! Token-bucket paced trace production across a pool of worker threads.
//!
//! The producer refills a token bucket on a 10 ms tick and pushes scheduled
//! timestamps onto a bounded jobs queue; worker threads drain the queue,
//! generate traces, and publish them to the consumer's channel. Scheduled
//! timestamps advance from a fixed logical epoch rather than the wall
//! clock, so identical `(seed, config)` runs emit identical traces; the
//! wall clock only bounds the run duration.

use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam_channel::TrySendError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{Config, RateUnit};
use crate::generator::Generator;
use crate::model::Trace;
use crate::Error;

const TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Base of the logical schedule that trace start times advance from.
const SCHEDULE_EPOCH: Duration = Duration::from_secs(1_700_000_000);

/// Runs the scheduler and worker pool to completion. Blocking; the caller
/// runs it on a dedicated thread.
pub fn produce_traces(
    cfg: &Config,
    trace_tx: mpsc::Sender<Trace>,
    token: &CancellationToken,
) -> Result<(), Error> {
    let (jobs_tx, jobs_rx) = crossbeam_channel::bounded::<SystemTime>(cfg.workers * 2);

    let mut workers = Vec::with_capacity(cfg.workers);
    for worker_id in 0..cfg.workers {
        let jobs_rx = jobs_rx.clone();
        let trace_tx = trace_tx.clone();
        let generator = Generator::new(cfg.clone(), cfg.seed.wrapping_add(worker_id as u64));
        let handle = thread::Builder::new()
            .name(format!("spanforge-worker-{worker_id}"))
            .spawn(move || {
                for start in jobs_rx {
                    let trace = generator.generate_trace(start);
                    if trace_tx.blocking_send(trace).is_err() {
                        return;
                    }
                }
            })?;
        workers.push(handle);
    }
    drop(jobs_rx);
    drop(trace_tx);

    let rate = effective_traces_per_interval(cfg) / cfg.rate_interval.as_secs_f64();
    if rate <= 0.0 {
        drop(jobs_tx);
        join_workers(workers);
        return Ok(());
    }

    let ticker = crossbeam_channel::tick(TICK_INTERVAL);
    let capacity = rate.max(1.0);
    let mut tokens = capacity;
    let mut last_refill = Instant::now();
    let schedule_base = UNIX_EPOCH + SCHEDULE_EPOCH;
    let deadline = (cfg.count == 0 && !cfg.duration.is_zero())
        .then(|| Instant::now() + cfg.duration);

    let mut sent: u64 = 0;
    'pacing: loop {
        if cfg.count > 0 && sent >= cfg.count {
            break;
        }
        if deadline.is_some_and(|d| Instant::now() > d) {
            break;
        }
        if token.is_cancelled() {
            break;
        }

        let now = Instant::now();
        tokens += now.duration_since(last_refill).as_secs_f64() * rate;
        last_refill = now;
        if tokens > capacity {
            tokens = capacity;
        }

        let mut dispatched = false;
        while tokens >= 1.0 {
            if cfg.count > 0 && sent >= cfg.count {
                break;
            }
            if deadline.is_some_and(|d| Instant::now() > d) {
                break;
            }

            let scheduled = schedule_base + Duration::from_secs_f64(sent as f64 / rate);
            match jobs_tx.try_send(scheduled) {
                Ok(()) => {
                    sent += 1;
                    tokens -= 1.0;
                    dispatched = true;
                }
                Err(TrySendError::Full(_)) => {
                    tokens = 0.0;
                    break;
                }
                Err(TrySendError::Disconnected(_)) => break 'pacing,
            }
        }

        if dispatched {
            continue;
        }
        let _ = ticker.recv();
    }

    debug!(sent, "producer finished dispatching jobs");
    drop(jobs_tx);
    join_workers(workers);
    Ok(())
}

fn join_workers(workers: Vec<thread::JoinHandle<()>>) {
    for handle in workers {
        let _ = handle.join();
    }
}

/// Target trace creations per rate interval. A spans-based rate is divided
/// by the estimated spans per trace, clamped to at least one trace.
pub(crate) fn effective_traces_per_interval(cfg: &Config) -> f64 {
    match cfg.rate_unit {
        RateUnit::Traces => cfg.rate_value,
        RateUnit::Spans => {
            let spans_per_trace = estimate_spans_per_trace(cfg.depth, cfg.fanout);
            if spans_per_trace <= 0.0 {
                return 1.0;
            }
            (cfg.rate_value / spans_per_trace).max(1.0)
        }
    }
}

/// Geometric-series estimate `1 + fanout + … + fanout^(depth-1)`, with
/// `depth` standing in when fanout does not exceed one.
pub(crate) fn estimate_spans_per_trace(depth: usize, fanout: f64) -> f64 {
    if depth <= 1 {
        return 1.0;
    }
    if fanout <= 1.0 {
        return depth as f64;
    }
    let mut total = 1.0;
    let mut level = 1.0;
    for _ in 1..depth {
        level *= fanout;
        total += level;
    }
    total
}
