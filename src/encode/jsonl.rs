//! Line-delimited JSON encoding: one object per span.

use std::collections::BTreeMap;
use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::model::{Attrs, Span, Trace};
use crate::Error;

#[derive(Serialize)]
struct SpanLine<'a> {
    trace_id: String,
    span_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<String>,
    name: &'a str,
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_name: Option<&'a str>,
    start_time: String,
    duration_ms: f64,
    status: &'a str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    attributes: &'a Attrs,
}

pub fn write_trace<W: Write>(w: &mut W, trace: &Trace) -> Result<(), Error> {
    write_spans(w, &trace.spans)
}

pub fn write_spans<W: Write>(w: &mut W, spans: &[Span]) -> Result<(), Error> {
    for span in spans {
        let line = SpanLine {
            trace_id: span.trace_id.to_hex(),
            span_id: span.span_id.to_hex(),
            parent_id: span.parent_span_id.map(|id| id.to_hex()),
            name: &span.name,
            kind: span.kind.as_str(),
            service_name: span.service_name(),
            start_time: DateTime::<Utc>::from(span.start_time)
                .to_rfc3339_opts(SecondsFormat::Nanos, true),
            duration_ms: span.duration.as_secs_f64() * 1e3,
            status: span.status.code(),
            attributes: &span.attributes,
        };
        serde_json::to_writer(&mut *w, &line)
            .map_err(|e| Error::Encode(format!("encode jsonl line: {e}")))?;
        w.write_all(b"\n")?;
    }
    Ok(())
}
