//! Zipkin sink: POSTs the JSON array to the collector's v2 span endpoint.

use std::collections::HashMap;

use reqwest::header::CONTENT_TYPE;
use reqwest::Url;

use super::body_snippet;
use crate::encode::zipkin;
use crate::model::Span;
use crate::Error;

#[derive(Debug)]
pub struct ZipkinClient {
    endpoint: String,
    headers: HashMap<String, String>,
    client: reqwest::Client,
}

impl ZipkinClient {
    pub fn new(endpoint: &str, headers: HashMap<String, String>) -> Self {
        ZipkinClient {
            endpoint: endpoint.to_string(),
            headers,
            client: reqwest::Client::new(),
        }
    }

    pub async fn send_spans(&self, spans: &[Span]) -> Result<(), Error> {
        if spans.is_empty() {
            return Ok(());
        }
        let payload = zipkin::encode_spans(spans)?;
        let url = spans_url(&self.endpoint)?;

        let mut request = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json");
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request.body(payload).send().await.map_err(|e| Error::Sink {
            endpoint: url.clone(),
            message: e.to_string(),
        })?;
        let status = response.status();
        if status.as_u16() >= 300 {
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

/// Normalizes the configured endpoint: scheme defaults to `http`, the path
/// defaults to `/api/v2/spans` when empty or `/`.
pub(crate) fn spans_url(base: &str) -> Result<String, Error> {
    let raw = if base.contains("://") {
        base.to_string()
    } else {
        format!("http://{base}")
    };
    let mut url = Url::parse(&raw).map_err(|e| Error::Sink {
        endpoint: base.to_string(),
        message: format!("invalid zipkin endpoint: {e}"),
    })?;
    if url.path().is_empty() || url.path() == "/" {
        url.set_path("/api/v2/spans");
    }
    Ok(url.to_string())
}
