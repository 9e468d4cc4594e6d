//! OTLP/HTTP sink: POSTs protobuf-encoded batches to `<endpoint>/v1/traces`.

use std::collections::HashMap;
use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression as GzLevel;
use prost::Message;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};

use super::body_snippet;
use crate::encode::otlp;
use crate::model::Span;
use crate::Error;

#[derive(Debug)]
pub struct OtlpHttpClient {
    endpoint: String,
    headers: HashMap<String, String>,
    gzip: bool,
    client: reqwest::Client,
}

impl OtlpHttpClient {
    pub fn new(endpoint: &str, headers: HashMap<String, String>, gzip: bool) -> Self {
        OtlpHttpClient {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            headers,
            gzip,
            client: reqwest::Client::new(),
        }
    }

    pub async fn send_spans(&self, spans: &[Span]) -> Result<(), Error> {
        if spans.is_empty() {
            return Ok(());
        }
        let url = format!("{}/v1/traces", self.endpoint);
        let mut body = otlp::encode_request(spans).encode_to_vec();
        if self.gzip {
            body = gzip(&body)?;
        }

        let mut request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/x-protobuf");
        if self.gzip {
            request = request.header(CONTENT_ENCODING, "gzip");
        }
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request.body(body).send().await.map_err(|e| Error::Sink {
            endpoint: url.clone(),
            message: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = body_snippet(&response.bytes().await.unwrap_or_default());
            return Err(Error::SinkStatus {
                endpoint: url,
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

fn gzip(data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut encoder = GzEncoder::new(Vec::new(), GzLevel::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
