//! End-to-end OTLP/gRPC delivery against a mock TraceService.

mod common;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{base_config, SharedBuf};
use opentelemetry_proto::tonic::collector::trace::v1::trace_service_server::{
    TraceService, TraceServiceServer,
};
use opentelemetry_proto::tonic::collector::trace::v1::{
    ExportTraceServiceRequest, ExportTraceServiceResponse,
};
use spanforge::config::{Config, Format, Output};
use tokio_stream::wrappers::TcpListenerStream;

#[derive(Clone, Default)]
struct MockTraceService {
    calls: Arc<AtomicUsize>,
    spans: Arc<AtomicUsize>,
}

#[tonic::async_trait]
impl TraceService for MockTraceService {
    async fn export(
        &self,
        request: tonic::Request<ExportTraceServiceRequest>,
    ) -> Result<tonic::Response<ExportTraceServiceResponse>, tonic::Status> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let spans = request
            .into_inner()
            .resource_spans
            .iter()
            .flat_map(|rs| rs.scope_spans.iter())
            .map(|ss| ss.spans.len())
            .sum::<usize>();
        self.spans.fetch_add(spans, Ordering::SeqCst);
        Ok(tonic::Response::new(ExportTraceServiceResponse::default()))
    }
}

async fn start_mock_collector() -> (SocketAddr, MockTraceService) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock grpc collector");
    let addr = listener.local_addr().expect("local addr");
    let service = MockTraceService::default();
    let server = service.clone();
    tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(TraceServiceServer::new(server))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .expect("mock grpc collector");
    });
    (addr, service)
}

#[tokio::test]
async fn delivers_spans_over_grpc() {
    let (addr, service) = start_mock_collector().await;
    let cfg = Config {
        format: Format::OtlpGrpc,
        output: Output::Otlp,
        otlp_endpoint: format!("http://{addr}"),
        otlp_insecure: true,
        count: 2,
        depth: 2,
        ..base_config()
    };
    spanforge::run(cfg, Box::new(SharedBuf::new())).await.unwrap();

    assert!(service.calls.load(Ordering::SeqCst) >= 1);
    assert!(
        service.spans.load(Ordering::SeqCst) >= 2,
        "want >= 2 spans, got {}",
        service.spans.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn unreachable_collector_fails_the_run() {
    let cfg = Config {
        format: Format::OtlpGrpc,
        output: Output::Otlp,
        // reserved port with nothing listening
        otlp_endpoint: "http://127.0.0.1:1".to_string(),
        otlp_insecure: true,
        count: 1,
        sink_retries: 0,
        sink_timeout: std::time::Duration::from_millis(500),
        ..base_config()
    };
    let err = spanforge::run(cfg, Box::new(SharedBuf::new()))
        .await
        .expect_err("dial must fail");
    let rendered = err.to_string();
    assert!(
        rendered.contains("sink") || rendered.contains("timed out"),
        "unexpected error {rendered}"
    );
}
