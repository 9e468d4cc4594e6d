//! Zipkin v2 JSON encoding of span batches.

use std::collections::BTreeMap;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::model::{AttrValue, Span};
use crate::Error;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ZipkinSpan<'a> {
    trace_id: String,
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<String>,
    #[serde(skip_serializing_if = "str::is_empty")]
    name: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    kind: &'a str,
    timestamp: i64,
    duration: i64,
    local_endpoint: Endpoint<'a>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    tags: BTreeMap<&'a str, String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Endpoint<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    service_name: &'a str,
}

pub fn encode_spans(spans: &[Span]) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(spans.len());
    for span in spans {
        let since_epoch = span
            .start_time
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        if since_epoch.is_zero() {
            return Err(Error::Encode(format!(
                "span {:x} has zero start time",
                span.span_id
            )));
        }

        let mut tags: BTreeMap<&str, String> = span
            .attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.to_string()))
            .collect();
        if span.status.is_error() {
            let message = span.status.message();
            tags.insert(
                "error",
                if message.is_empty() {
                    "true".to_string()
                } else {
                    message.to_string()
                },
            );
        }

        out.push(ZipkinSpan {
            trace_id: span.trace_id.to_hex(),
            id: span.span_id.to_hex(),
            parent_id: span.parent_span_id.map(|id| id.to_hex()),
            name: &span.name,
            kind: span.kind.as_str(),
            timestamp: since_epoch.as_micros() as i64,
            duration: (span.duration.as_micros() as i64).max(1),
            local_endpoint: Endpoint {
                service_name: service_name(span),
            },
            tags,
        });
    }
    serde_json::to_vec(&out).map_err(|e| Error::Encode(format!("encode zipkin spans: {e}")))
}

fn service_name(span: &Span) -> &str {
    if let Some(AttrValue::Str(name)) = span.resource.attributes.get("service.name") {
        if !name.is_empty() {
            return name;
        }
    }
    span.service_name().unwrap_or("unknown")
}
