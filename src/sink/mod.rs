//! Network sinks and the shared retry-with-timeout send policy.

pub mod otlp_grpc;
pub mod otlp_http;
pub mod zipkin;

pub use otlp_grpc::OtlpGrpcClient;
pub use otlp_http::OtlpHttpClient;
pub use zipkin::ZipkinClient;

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::model::Span;
use crate::Error;

const MAX_BODY_SNIPPET: usize = 4096;

/// The transport behind a network output.
#[derive(Debug)]
pub enum SinkClient {
    OtlpHttp(OtlpHttpClient),
    OtlpGrpc(OtlpGrpcClient),
    Zipkin(ZipkinClient),
}

impl SinkClient {
    pub async fn send_spans(&self, spans: &[Span]) -> Result<(), Error> {
        match self {
            SinkClient::OtlpHttp(client) => client.send_spans(spans).await,
            SinkClient::OtlpGrpc(client) => client.send_spans(spans).await,
            SinkClient::Zipkin(client) => client.send_spans(spans).await,
        }
    }

    pub async fn shutdown(&self) {
        if let SinkClient::OtlpGrpc(client) = self {
            client.shutdown().await;
        }
    }
}

/// Runs `send` up to `retries + 1` times, each attempt bounded by
/// `timeout`. Backoff sleeps between failed attempts abort with
/// [`Error::Cancelled`] when `token` fires; the final failure returns the
/// last attempt's error.
pub async fn send_with_retry<F, Fut>(
    token: &CancellationToken,
    retries: u32,
    backoff: Duration,
    timeout: Duration,
    mut send: F,
) -> Result<(), Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), Error>>,
{
    let mut attempt = 0;
    loop {
        let attempt_result = tokio::select! {
            _ = token.cancelled() => return Err(Error::Cancelled),
            result = tokio::time::timeout(timeout, send()) => result,
        };
        let err = match attempt_result {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => err,
            Err(_) => Error::SinkTimeout(timeout),
        };
        if attempt >= retries {
            return Err(err);
        }
        attempt += 1;
        tokio::select! {
            _ = token.cancelled() => return Err(Error::Cancelled),
            _ = tokio::time::sleep(backoff) => {}
        }
    }
}

/// Trims an error response body to a short, printable snippet.
pub(crate) fn body_snippet(bytes: &[u8]) -> String {
    let end = bytes.len().min(MAX_BODY_SNIPPET);
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}
