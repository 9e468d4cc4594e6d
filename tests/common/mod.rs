//! Shared helpers for end-to-end tests: an inspectable writer and mock
//! collectors for the network sinks.

#![allow(dead_code)]

use std::io::{self, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use prost::Message;
use spanforge::config::{Config, Format, Output, RateUnit};
use spanforge::generator::Profile;

use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;

/// A clonable writer over a shared buffer, so tests can read back what a
/// run produced.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        match self.0.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.0.lock() {
            Ok(mut guard) => guard.extend_from_slice(buf),
            Err(poisoned) => poisoned.into_inner().extend_from_slice(buf),
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A small, fast base configuration for end-to-end runs. The admin
/// endpoint is disabled so parallel tests do not fight over ports.
pub fn base_config() -> Config {
    Config {
        rate_value: 100.0,
        rate_unit: RateUnit::Traces,
        rate_interval: Duration::from_secs(1),
        duration: Duration::from_secs(1),
        count: 1,
        seed: 1,
        workers: 1,
        profile: Profile::Web,
        routes: 2,
        services: 2,
        depth: 2,
        fanout: 1.0,
        p50: Duration::from_millis(10),
        p95: Duration::from_millis(50),
        p99: Duration::from_millis(80),
        errors: 0.0,
        retries: 0.0,
        db_heavy: 0.0,
        cache_hit_rate: 1.0,
        variety: "low".parse().unwrap(),
        format: Format::Jsonl,
        output: Output::Stdout,
        batch_size: 32,
        flush_interval: Duration::from_millis(100),
        sink_retries: 0,
        sink_retry_backoff: Duration::from_millis(10),
        sink_timeout: Duration::from_secs(1),
        sink_max_in_flight: 1,
        http_listen: String::new(),
        ..Config::default()
    }
}

/// A mock HTTP collector that records request bodies and can fail the
/// first N requests with 503.
#[derive(Clone)]
pub struct MockHttpCollector {
    pub addr: SocketAddr,
    calls: Arc<AtomicUsize>,
    bodies: Arc<Mutex<Vec<Bytes>>>,
    fail_first: Arc<AtomicUsize>,
}

impl MockHttpCollector {
    /// Starts a collector accepting POSTs on `path`, failing the first
    /// `fail_first` requests with 503.
    pub async fn start(path: &str, fail_first: usize) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock collector");
        let addr = listener.local_addr().expect("local addr");
        let collector = MockHttpCollector {
            addr,
            calls: Arc::new(AtomicUsize::new(0)),
            bodies: Arc::new(Mutex::new(Vec::new())),
            fail_first: Arc::new(AtomicUsize::new(fail_first)),
        };

        let state = collector.clone();
        let app = Router::new()
            .route(path, post(handle_export))
            .with_state(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock collector");
        });
        collector
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn bodies(&self) -> Vec<Bytes> {
        match self.bodies.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Total spans across all recorded OTLP protobuf bodies.
    pub fn decoded_otlp_span_count(&self) -> usize {
        self.bodies()
            .iter()
            .map(|body| {
                let request =
                    ExportTraceServiceRequest::decode(body.as_ref()).expect("decode OTLP body");
                request
                    .resource_spans
                    .iter()
                    .flat_map(|rs| rs.scope_spans.iter())
                    .map(|ss| ss.spans.len())
                    .sum::<usize>()
            })
            .sum()
    }
}

async fn handle_export(
    State(collector): State<MockHttpCollector>,
    body: Bytes,
) -> (StatusCode, &'static str) {
    collector.calls.fetch_add(1, Ordering::SeqCst);
    let remaining = collector
        .fail_first
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if remaining {
        return (StatusCode::SERVICE_UNAVAILABLE, "try again");
    }
    match collector.bodies.lock() {
        Ok(mut guard) => guard.push(body),
        Err(poisoned) => poisoned.into_inner().push(body),
    }
    (StatusCode::OK, "")
}
