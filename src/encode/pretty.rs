//! Human-readable rendering of a trace as an indented forest.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::model::{Span, SpanId, Trace};

pub fn render_trace(trace: &Trace) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "trace {:x}", trace.trace_id);

    let mut children: HashMap<SpanId, Vec<&Span>> = HashMap::new();
    let mut roots: Vec<&Span> = Vec::new();
    for span in &trace.spans {
        match span.parent_span_id {
            Some(parent) => children.entry(parent).or_default().push(span),
            None => roots.push(span),
        }
    }

    roots.sort_by_key(|s| s.start_time);
    for root in roots {
        render_span(&mut out, root, &children, 0);
    }
    out
}

fn render_span(out: &mut String, span: &Span, children: &HashMap<SpanId, Vec<&Span>>, level: usize) {
    for _ in 0..level {
        out.push_str("  ");
    }
    let _ = writeln!(
        out,
        "- {} [{}] ({}, {:.2}ms, {})",
        span.name,
        span.kind,
        span.service_name().unwrap_or_default(),
        span.duration.as_secs_f64() * 1e3,
        span.status.code(),
    );

    let mut next: Vec<&Span> = children
        .get(&span.span_id)
        .map(|spans| spans.to_vec())
        .unwrap_or_default();
    next.sort_by_key(|s| s.start_time);
    for child in next {
        render_span(out, child, children, level + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;
    use crate::model::{Resource, SpanKind, Status, TraceId};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    fn span(
        id: u8,
        parent: Option<u8>,
        name: &str,
        start: SystemTime,
        service: &str,
    ) -> Span {
        Span {
            trace_id: TraceId::new([9; 16]),
            span_id: SpanId::new([id; 8]),
            parent_span_id: parent.map(|p| SpanId::new([p; 8])),
            name: name.to_string(),
            kind: SpanKind::Server,
            start_time: start,
            duration: Duration::from_millis(10),
            attributes: attrs! { "service.name" => service },
            events: Vec::new(),
            links: Vec::new(),
            status: Status::Ok,
            resource: Resource::default(),
        }
    }

    #[test]
    fn renders_forest_sorted_by_start_time() {
        let base = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let trace = Trace {
            trace_id: TraceId::new([9; 16]),
            resource: Resource::default(),
            spans: vec![
                span(1, None, "root", base, "api-gateway"),
                // later child listed first; rendering must reorder
                span(3, Some(1), "second", base + Duration::from_millis(2), "svc-2"),
                span(2, Some(1), "first", base + Duration::from_millis(1), "svc-1"),
                span(4, Some(2), "leaf", base + Duration::from_millis(3), "svc-3"),
            ],
        };
        let rendered = render_trace(&trace);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], format!("trace {:x}", trace.trace_id));
        assert_eq!(lines[1], "- root [SERVER] (api-gateway, 10.00ms, OK)");
        assert_eq!(lines[2], "  - first [SERVER] (svc-1, 10.00ms, OK)");
        assert_eq!(lines[3], "    - leaf [SERVER] (svc-3, 10.00ms, OK)");
        assert_eq!(lines[4], "  - second [SERVER] (svc-2, 10.00ms, OK)");
    }

    #[test]
    fn spans_without_service_render_empty_name() {
        let base = UNIX_EPOCH + Duration::from_secs(1);
        let mut only = span(1, None, "root", base, "x");
        only.attributes.clear();
        let trace = Trace {
            trace_id: TraceId::new([9; 16]),
            resource: Resource::default(),
            spans: vec![only],
        };
        assert!(render_trace(&trace).contains("- root [SERVER] (, 10.00ms, OK)"));
    }
}
