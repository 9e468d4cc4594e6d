//! Conversion from the trace model into OTLP protobuf messages.
//!
//! Spans are grouped into one `ResourceSpans` per `service.name` attribute
//! (falling back to `unknown-service`), with services in lexicographic
//! order and attribute keys sorted within each span.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue, KeyValue};
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1::{
    span, status, ResourceSpans, ScopeSpans, Span as OtlpSpan, Status as OtlpStatus,
};

use crate::model::{AttrValue, Attrs, Span, SpanKind, Status};

const UNKNOWN_SERVICE: &str = "unknown-service";

pub fn encode_request(spans: &[Span]) -> ExportTraceServiceRequest {
    let mut by_service: BTreeMap<&str, Vec<&Span>> = BTreeMap::new();
    for span in spans {
        let service = span
            .service_name()
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_SERVICE);
        by_service.entry(service).or_default().push(span);
    }

    let resource_spans = by_service
        .into_iter()
        .map(|(service, spans)| ResourceSpans {
            resource: Some(Resource {
                attributes: vec![KeyValue {
                    key: "service.name".to_string(),
                    value: Some(AnyValue {
                        value: Some(any_value::Value::StringValue(service.to_string())),
                    }),
                }],
                ..Default::default()
            }),
            scope_spans: vec![ScopeSpans {
                spans: spans.iter().map(|s| to_otlp_span(s)).collect(),
                ..Default::default()
            }],
            ..Default::default()
        })
        .collect();

    ExportTraceServiceRequest { resource_spans }
}

fn to_otlp_span(s: &Span) -> OtlpSpan {
    OtlpSpan {
        trace_id: s.trace_id.to_bytes().to_vec(),
        span_id: s.span_id.to_bytes().to_vec(),
        parent_span_id: s
            .parent_span_id
            .map(|id| id.to_bytes().to_vec())
            .unwrap_or_default(),
        name: s.name.clone(),
        kind: to_otlp_kind(s.kind) as i32,
        start_time_unix_nano: to_nanos(s.start_time),
        end_time_unix_nano: to_nanos(s.end_time()),
        attributes: to_key_values(&s.attributes),
        events: s
            .events
            .iter()
            .map(|event| span::Event {
                name: event.name.clone(),
                time_unix_nano: to_nanos(event.time),
                attributes: to_key_values(&event.attributes),
                ..Default::default()
            })
            .collect(),
        links: s
            .links
            .iter()
            .map(|link| span::Link {
                trace_id: link.trace_id.to_bytes().to_vec(),
                span_id: link.span_id.to_bytes().to_vec(),
                attributes: to_key_values(&link.attributes),
                ..Default::default()
            })
            .collect(),
        status: Some(OtlpStatus {
            code: to_otlp_status_code(&s.status) as i32,
            message: s.status.message().to_string(),
        }),
        ..Default::default()
    }
}

fn to_otlp_kind(kind: SpanKind) -> span::SpanKind {
    match kind {
        SpanKind::Internal => span::SpanKind::Internal,
        SpanKind::Server => span::SpanKind::Server,
        SpanKind::Client => span::SpanKind::Client,
        SpanKind::Producer => span::SpanKind::Producer,
        SpanKind::Consumer => span::SpanKind::Consumer,
        SpanKind::Unspecified => span::SpanKind::Unspecified,
    }
}

fn to_otlp_status_code(value: &Status) -> status::StatusCode {
    match value {
        Status::Ok => status::StatusCode::Ok,
        Status::Error { .. } => status::StatusCode::Error,
        Status::Unset => status::StatusCode::Unset,
    }
}

fn to_nanos(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

fn to_key_values(attrs: &Attrs) -> Vec<KeyValue> {
    attrs
        .iter()
        .map(|(key, value)| KeyValue {
            key: key.clone(),
            value: Some(to_any_value(value)),
        })
        .collect()
}

fn to_any_value(value: &AttrValue) -> AnyValue {
    let value = match value {
        AttrValue::Str(v) => any_value::Value::StringValue(v.clone()),
        AttrValue::Bool(v) => any_value::Value::BoolValue(*v),
        AttrValue::Int(v) => any_value::Value::IntValue(*v),
        AttrValue::Float(v) => any_value::Value::DoubleValue(*v),
        AttrValue::Duration(v) => any_value::Value::DoubleValue(v.as_secs_f64() * 1e3),
    };
    AnyValue { value: Some(value) }
}
