use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use spanforge::config::{Config, ConfigOverrides};

/// Generate synthetic distributed traces.
#[derive(Debug, Parser)]
#[command(name = "spanforge", version, about)]
struct Cli {
    /// Path to a YAML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Generation rate amount
    #[arg(long)]
    rate: Option<f64>,

    /// Rate unit: spans or traces
    #[arg(long)]
    rate_unit: Option<String>,

    /// Time interval for the rate amount, in milliseconds
    #[arg(long)]
    rate_interval_ms: Option<u64>,

    /// Run duration in milliseconds (0 for no time limit)
    #[arg(long)]
    duration_ms: Option<u64>,

    /// Total trace count (overrides duration when > 0)
    #[arg(long)]
    count: Option<u64>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Concurrent generator workers
    #[arg(long)]
    workers: Option<usize>,

    /// Generation profile: web, grpc, queue, or batch
    #[arg(long)]
    profile: Option<String>,

    /// Number of named routes/methods per profile
    #[arg(long)]
    routes: Option<usize>,

    /// Number of services
    #[arg(long)]
    services: Option<usize>,

    /// Max trace depth
    #[arg(long)]
    depth: Option<usize>,

    /// Average span fanout
    #[arg(long)]
    fanout: Option<f64>,

    /// Service name prefix
    #[arg(long)]
    service_prefix: Option<String>,

    /// p50 span latency in milliseconds
    #[arg(long)]
    p50_ms: Option<u64>,

    /// p95 span latency in milliseconds
    #[arg(long)]
    p95_ms: Option<u64>,

    /// p99 span latency in milliseconds
    #[arg(long)]
    p99_ms: Option<u64>,

    /// Error rate percentage (e.g. "0.5%")
    #[arg(long)]
    errors: Option<String>,

    /// Retry rate percentage
    #[arg(long)]
    retries: Option<String>,

    /// DB-intensive operation ratio
    #[arg(long)]
    db_heavy: Option<String>,

    /// Cache hit ratio
    #[arg(long)]
    cache_hit_rate: Option<String>,

    /// Variety level: low, medium, or high
    #[arg(long)]
    variety: Option<String>,

    /// Enable high-cardinality attributes (request IDs, message IDs)
    #[arg(long)]
    high_cardinality: bool,

    /// Output format
    #[arg(long)]
    format: Option<String>,

    /// Output sink
    #[arg(long)]
    output: Option<String>,

    /// Output file path
    #[arg(long)]
    file: Option<String>,

    /// OTLP endpoint
    #[arg(long)]
    otlp_endpoint: Option<String>,

    /// Zipkin endpoint
    #[arg(long)]
    zipkin_endpoint: Option<String>,

    /// Use an insecure OTLP gRPC transport
    #[arg(long)]
    otlp_insecure: Option<bool>,

    /// Additional headers (repeat k=v)
    #[arg(long)]
    headers: Vec<String>,

    /// Compression for OTLP HTTP (gzip)
    #[arg(long)]
    compress: Option<String>,

    /// Spans per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Sink flush interval in milliseconds
    #[arg(long)]
    flush_interval_ms: Option<u64>,

    /// Retry attempts for sink requests
    #[arg(long)]
    sink_retries: Option<u32>,

    /// Backoff between sink retries in milliseconds
    #[arg(long)]
    sink_retry_backoff_ms: Option<u64>,

    /// Per-request sink timeout in milliseconds
    #[arg(long)]
    sink_timeout_ms: Option<u64>,

    /// Maximum concurrent in-flight sink requests
    #[arg(long)]
    sink_max_in_flight: Option<usize>,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    report_file: Option<String>,

    /// Admin HTTP listen address for /healthz and /stats
    #[arg(long)]
    http_listen: Option<String>,

    /// Enable debug logs for trace emission and sink sends
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            rate: self.rate,
            rate_unit: self.rate_unit.clone(),
            rate_interval_ms: self.rate_interval_ms,
            duration_ms: self.duration_ms,
            count: self.count,
            seed: self.seed,
            workers: self.workers,
            profile: self.profile.clone(),
            routes: self.routes,
            services: self.services,
            depth: self.depth,
            fanout: self.fanout,
            service_prefix: self.service_prefix.clone(),
            p50_ms: self.p50_ms,
            p95_ms: self.p95_ms,
            p99_ms: self.p99_ms,
            errors: self.errors.clone(),
            retries: self.retries.clone(),
            db_heavy: self.db_heavy.clone(),
            cache_hit_rate: self.cache_hit_rate.clone(),
            variety: self.variety.clone(),
            high_cardinality: self.high_cardinality.then_some(true),
            format: self.format.clone(),
            output: self.output.clone(),
            file: self.file.clone(),
            otlp_endpoint: self.otlp_endpoint.clone(),
            zipkin_endpoint: self.zipkin_endpoint.clone(),
            otlp_insecure: self.otlp_insecure,
            headers: (!self.headers.is_empty()).then(|| self.headers.clone()),
            compress: self.compress.clone(),
            batch_size: self.batch_size,
            flush_interval_ms: self.flush_interval_ms,
            sink_retries: self.sink_retries,
            sink_retry_backoff_ms: self.sink_retry_backoff_ms,
            sink_timeout_ms: self.sink_timeout_ms,
            sink_max_in_flight: self.sink_max_in_flight,
            report_file: self.report_file.clone(),
            http_listen: self.http_listen.clone(),
            debug: self.debug.then_some(true),
        }
    }
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "spanforge=debug" } else { "spanforge=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load(&cli.overrides(), cli.config.as_deref())?;
    init_tracing(cfg.debug);
    spanforge::run(cfg, Box::new(io::stdout())).await?;
    Ok(())
}
