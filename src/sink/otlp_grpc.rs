//! OTLP/gRPC sink: lazily dials the collector and calls
//! `TraceService/Export` on the pooled channel.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use opentelemetry_proto::tonic::collector::trace::v1::trace_service_client::TraceServiceClient;
use tokio::sync::Mutex;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue};
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

use crate::encode::otlp;
use crate::model::Span;
use crate::Error;

#[derive(Debug)]
pub struct OtlpGrpcClient {
    endpoint: String,
    headers: HashMap<String, String>,
    insecure: bool,
    timeout: Duration,
    client: Mutex<Option<TraceServiceClient<Channel>>>,
}

impl OtlpGrpcClient {
    pub fn new(
        endpoint: &str,
        headers: HashMap<String, String>,
        insecure: bool,
        timeout: Duration,
    ) -> Self {
        let endpoint = endpoint
            .trim_start_matches("http://")
            .trim_start_matches("https://")
            .to_string();
        OtlpGrpcClient {
            endpoint,
            headers,
            insecure,
            timeout,
            client: Mutex::new(None),
        }
    }

    pub async fn send_spans(&self, spans: &[Span]) -> Result<(), Error> {
        if spans.is_empty() {
            return Ok(());
        }
        let mut client = self.ensure_client().await?;

        let mut request = tonic::Request::new(otlp::encode_request(spans));
        for (key, value) in &self.headers {
            let key = AsciiMetadataKey::from_str(&key.to_ascii_lowercase()).map_err(|_| {
                Error::Sink {
                    endpoint: self.endpoint.clone(),
                    message: format!("invalid metadata key {key:?}"),
                }
            })?;
            let value = AsciiMetadataValue::from_str(value).map_err(|_| Error::Sink {
                endpoint: self.endpoint.clone(),
                message: "invalid metadata value".to_string(),
            })?;
            request.metadata_mut().insert(key, value);
        }

        client.export(request).await.map_err(|status| Error::Sink {
            endpoint: self.endpoint.clone(),
            message: format!("otlp grpc export: {status}"),
        })?;
        Ok(())
    }

    /// Closes the pooled channel; a later send would dial again.
    pub async fn shutdown(&self) {
        self.client.lock().await.take();
    }

    async fn ensure_client(&self) -> Result<TraceServiceClient<Channel>, Error> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }
        if self.endpoint.is_empty() {
            return Err(Error::Sink {
                endpoint: String::new(),
                message: "empty OTLP gRPC endpoint".to_string(),
            });
        }

        let scheme = if self.insecure { "http" } else { "https" };
        let mut endpoint = Endpoint::from_shared(format!("{scheme}://{}", self.endpoint))
            .map_err(|e| Error::Sink {
                endpoint: self.endpoint.clone(),
                message: format!("invalid endpoint: {e}"),
            })?
            .connect_timeout(self.timeout);
        if !self.insecure {
            endpoint = endpoint
                .tls_config(ClientTlsConfig::new().with_native_roots())
                .map_err(|e| Error::Sink {
                    endpoint: self.endpoint.clone(),
                    message: format!("tls config: {e}"),
                })?;
        }

        let channel = endpoint.connect().await.map_err(|e| Error::Sink {
            endpoint: self.endpoint.clone(),
            message: format!("dial: {e}"),
        })?;
        let client = TraceServiceClient::new(channel);
        *guard = Some(client.clone());
        Ok(client)
    }
}
