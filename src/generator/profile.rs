//! The four span-shaping profiles: web, grpc, queue, and batch.
//!
//! The profile set is closed and part of the reproducibility surface, so it
//! is a plain enum dispatched by `match` rather than an open trait. The
//! operation tables below are fixed verbatim; `route_idx % table.len()`
//! selects an entry.

use std::str::FromStr;
use std::time::{Duration, SystemTime};

use crate::attrs;
use crate::model::{Attrs, AttrValue, Link, Resource, Span, SpanId, SpanKind, Status, TraceId};
use crate::Error;

const WEB_OPERATIONS: [(&str, &str); 8] = [
    ("GET", "/catalog"),
    ("GET", "/cart"),
    ("POST", "/checkout"),
    ("POST", "/payments"),
    ("GET", "/orders/:id"),
    ("GET", "/inventory"),
    ("POST", "/login"),
    ("GET", "/search"),
];

const GRPC_METHODS: [&str; 8] = [
    "GetCatalog",
    "GetCart",
    "PlaceOrder",
    "AuthorizePayment",
    "ReserveInventory",
    "ShipOrder",
    "ListOrders",
    "TrackOrder",
];

const QUEUE_TOPICS: [&str; 6] = [
    "orders",
    "payments",
    "shipments",
    "returns",
    "invoices",
    "notifications",
];

const BATCH_JOBS: [&str; 6] = [
    "reindex-catalog",
    "daily-billing-rollup",
    "inventory-reconcile",
    "order-archive",
    "sla-report",
    "fraud-retrain",
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Web,
    Grpc,
    Queue,
    Batch,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Web => "web",
            Profile::Grpc => "grpc",
            Profile::Queue => "queue",
            Profile::Batch => "batch",
        }
    }

    pub fn latency_factor(&self) -> f64 {
        match self {
            Profile::Web => 1.0,
            Profile::Grpc => 1.15,
            Profile::Queue => 1.4,
            Profile::Batch => 1.8,
        }
    }

    pub fn error_factor(&self) -> f64 {
        match self {
            Profile::Web => 1.0,
            Profile::Grpc => 0.9,
            Profile::Queue => 1.2,
            Profile::Batch => 1.1,
        }
    }

    /// Name of the event injected by [`maybe_profile_event`].
    ///
    /// [`maybe_profile_event`]: crate::generator::Generator
    pub fn event_name(&self) -> &'static str {
        match self {
            Profile::Grpc => "grpc.message",
            Profile::Queue => "message.visible",
            Profile::Batch => "batch.chunk.complete",
            Profile::Web => "app.log",
        }
    }

    pub fn build_root(
        &self,
        frontdoor: &str,
        route_idx: usize,
        start: SystemTime,
        span_id: SpanId,
        trace_id: TraceId,
        dur: Duration,
    ) -> Span {
        match self {
            Profile::Web => {
                let (method, route) = web_operation(route_idx);
                span(
                    trace_id,
                    span_id,
                    None,
                    format!("{method} {route}"),
                    SpanKind::Server,
                    start,
                    dur,
                    attrs! {
                        "service.name" => frontdoor,
                        "http.method" => method,
                        "http.route" => route,
                        "http.status_code" => 200,
                    },
                    frontdoor,
                )
            }
            Profile::Grpc => {
                let method = grpc_method(route_idx);
                span(
                    trace_id,
                    span_id,
                    None,
                    format!("rpc Gateway/{method}"),
                    SpanKind::Server,
                    start,
                    dur,
                    attrs! {
                        "service.name" => frontdoor,
                        "rpc.system" => "grpc",
                        "rpc.service" => "Gateway",
                        "rpc.method" => method,
                    },
                    frontdoor,
                )
            }
            Profile::Queue => {
                let topic = queue_topic(route_idx);
                span(
                    trace_id,
                    span_id,
                    None,
                    format!("enqueue {topic}"),
                    SpanKind::Server,
                    start,
                    dur,
                    attrs! {
                        "service.name" => frontdoor,
                        "messaging.system" => "kafka",
                        "messaging.destination.name" => topic,
                        "messaging.operation" => "publish",
                    },
                    frontdoor,
                )
            }
            Profile::Batch => {
                let job = batch_job(route_idx);
                span(
                    trace_id,
                    span_id,
                    None,
                    format!("batch {job}"),
                    SpanKind::Internal,
                    start,
                    dur,
                    attrs! {
                        "service.name" => frontdoor,
                        "batch.job" => job,
                        "batch.run_id" => "run-fixed",
                    },
                    frontdoor,
                )
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn build_child(
        &self,
        parent: &Span,
        service: &str,
        route_idx: usize,
        start: SystemTime,
        span_id: SpanId,
        trace_id: TraceId,
        dur: Duration,
        db_heavy: bool,
        cache_hit: bool,
    ) -> Span {
        let (name, kind, mut attributes) = match self {
            Profile::Web => {
                let (method, route) = web_operation(route_idx);
                (
                    format!("{method} {route}"),
                    SpanKind::Client,
                    attrs! {
                        "service.name" => service,
                        "peer.service" => service,
                        "http.method" => method,
                        "http.route" => route,
                        "http.status_code" => 200,
                    },
                )
            }
            Profile::Grpc => {
                let method = grpc_method(route_idx);
                (
                    format!("rpc {service}/{method}"),
                    SpanKind::Client,
                    attrs! {
                        "service.name" => service,
                        "peer.service" => service,
                        "rpc.system" => "grpc",
                        "rpc.service" => format!("{}.API", service.replace('-', "")),
                        "rpc.method" => method,
                    },
                )
            }
            Profile::Queue => (
                "handle work".to_string(),
                SpanKind::Internal,
                attrs! {
                    "service.name" => service,
                    "peer.service" => service,
                },
            ),
            Profile::Batch => {
                let job = batch_job(route_idx);
                (
                    format!("batch step {job}"),
                    SpanKind::Internal,
                    attrs! {
                        "service.name" => service,
                        "batch.job" => job,
                        "batch.chunk" => route_idx,
                    },
                )
            }
        };
        add_store_attrs(&mut attributes, db_heavy, cache_hit);
        span(
            trace_id,
            span_id,
            Some(parent.span_id),
            name,
            kind,
            start,
            dur,
            attributes,
            service,
        )
    }

    /// Builds the producer/consumer pair for the queue profile.
    ///
    /// The producer carries a `follows_from` link to the consumer; child
    /// recursion descends from the consumer. Other profiles return `None`.
    #[allow(clippy::too_many_arguments)]
    pub fn build_queue_pair(
        &self,
        parent: &Span,
        service: &str,
        route_idx: usize,
        start: SystemTime,
        producer_id: SpanId,
        consumer_id: SpanId,
        trace_id: TraceId,
        dur: Duration,
    ) -> Option<(Span, Span)> {
        if *self != Profile::Queue {
            return None;
        }
        let topic = queue_topic(route_idx);
        let mut producer = span(
            trace_id,
            producer_id,
            Some(parent.span_id),
            format!("publish {topic}"),
            SpanKind::Producer,
            start,
            dur / 3,
            attrs! {
                "service.name" => service,
                "messaging.system" => "kafka",
                "messaging.destination.name" => topic,
                "messaging.operation" => "publish",
            },
            service,
        );
        let consumer = span(
            trace_id,
            consumer_id,
            Some(parent.span_id),
            format!("consume {topic}"),
            SpanKind::Consumer,
            start.checked_add(dur / 2).unwrap_or(start),
            dur / 2,
            attrs! {
                "service.name" => service,
                "messaging.system" => "kafka",
                "messaging.destination.name" => topic,
                "messaging.operation" => "process",
            },
            service,
        );
        producer.links.push(Link {
            trace_id,
            span_id: consumer_id,
            attributes: attrs! { "link.type" => "follows_from" },
        });
        Some((producer, consumer))
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Error> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(Profile::Web),
            "grpc" => Ok(Profile::Grpc),
            "queue" => Ok(Profile::Queue),
            "batch" => Ok(Profile::Batch),
            _ => Err(Error::Config(format!(
                "profile must be one of web, grpc, queue, batch (got {raw:?})"
            ))),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn span(
    trace_id: TraceId,
    span_id: SpanId,
    parent_span_id: Option<SpanId>,
    name: String,
    kind: SpanKind,
    start_time: SystemTime,
    duration: Duration,
    attributes: Attrs,
    service: &str,
) -> Span {
    Span {
        trace_id,
        span_id,
        parent_span_id,
        name,
        kind,
        start_time,
        duration,
        attributes,
        events: Vec::new(),
        links: Vec::new(),
        status: Status::Ok,
        resource: Resource {
            attributes: attrs! { "service.name" => service },
        },
    }
}

fn add_store_attrs(attributes: &mut Attrs, db_heavy: bool, cache_hit: bool) {
    if db_heavy {
        attributes.insert("db.system".to_string(), AttrValue::from("postgresql"));
        attributes.insert("db.operation".to_string(), AttrValue::from("SELECT"));
    }
    attributes.insert("cache.hit".to_string(), AttrValue::from(cache_hit));
}

fn web_operation(idx: usize) -> (&'static str, &'static str) {
    WEB_OPERATIONS[idx % WEB_OPERATIONS.len()]
}

fn grpc_method(idx: usize) -> &'static str {
    GRPC_METHODS[idx % GRPC_METHODS.len()]
}

fn queue_topic(idx: usize) -> &'static str {
    QUEUE_TOPICS[idx % QUEUE_TOPICS.len()]
}

fn batch_job(idx: usize) -> &'static str {
    BATCH_JOBS[idx % BATCH_JOBS.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    fn ids() -> (TraceId, SpanId) {
        (TraceId::new([1; 16]), SpanId::new([2; 8]))
    }

    fn start() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    #[test]
    fn web_root_is_a_server_span_with_http_attrs() {
        let (trace_id, span_id) = ids();
        let root = Profile::Web.build_root(
            "api-gateway",
            0,
            start(),
            span_id,
            trace_id,
            Duration::from_millis(12),
        );
        assert_eq!(root.name, "GET /catalog");
        assert_eq!(root.kind, SpanKind::Server);
        assert_eq!(root.parent_span_id, None);
        assert_eq!(root.service_name(), Some("api-gateway"));
        assert_eq!(
            root.attributes.get("http.status_code"),
            Some(&AttrValue::Int(200))
        );
        assert_eq!(
            root.resource.attributes.get("service.name"),
            Some(&AttrValue::Str("api-gateway".to_string()))
        );
    }

    #[test]
    fn batch_root_is_internal_with_fixed_run_id() {
        let (trace_id, span_id) = ids();
        let root = Profile::Batch.build_root(
            "api-gateway",
            1,
            start(),
            span_id,
            trace_id,
            Duration::from_millis(40),
        );
        assert_eq!(root.name, "batch daily-billing-rollup");
        assert_eq!(root.kind, SpanKind::Internal);
        assert_eq!(
            root.attributes.get("batch.run_id"),
            Some(&AttrValue::Str("run-fixed".to_string()))
        );
    }

    #[test]
    fn route_index_wraps_around_tables() {
        let (trace_id, span_id) = ids();
        let wrapped = Profile::Web.build_root(
            "api-gateway",
            8,
            start(),
            span_id,
            trace_id,
            Duration::from_millis(1),
        );
        assert_eq!(wrapped.name, "GET /catalog");
        let queue = Profile::Queue.build_root(
            "api-gateway",
            7,
            start(),
            span_id,
            trace_id,
            Duration::from_millis(1),
        );
        assert_eq!(queue.name, "enqueue payments");
    }

    #[test]
    fn grpc_child_names_service_api() {
        let (trace_id, span_id) = ids();
        let root = Profile::Grpc.build_root(
            "api-gateway",
            2,
            start(),
            span_id,
            trace_id,
            Duration::from_millis(5),
        );
        let child = Profile::Grpc.build_child(
            &root,
            "svc-3",
            2,
            start(),
            SpanId::new([3; 8]),
            trace_id,
            Duration::from_millis(4),
            false,
            true,
        );
        assert_eq!(child.name, "rpc svc-3/PlaceOrder");
        assert_eq!(child.kind, SpanKind::Client);
        assert_eq!(
            child.attributes.get("rpc.service"),
            Some(&AttrValue::Str("svc3.API".to_string()))
        );
        assert_eq!(child.parent_span_id, Some(root.span_id));
    }

    #[test]
    fn db_heavy_children_carry_store_attrs() {
        let (trace_id, span_id) = ids();
        let root = Profile::Web.build_root(
            "api-gateway",
            0,
            start(),
            span_id,
            trace_id,
            Duration::from_millis(5),
        );
        let child = Profile::Web.build_child(
            &root,
            "svc-1",
            0,
            start(),
            SpanId::new([4; 8]),
            trace_id,
            Duration::from_millis(3),
            true,
            false,
        );
        assert_eq!(
            child.attributes.get("db.system"),
            Some(&AttrValue::Str("postgresql".to_string()))
        );
        assert_eq!(
            child.attributes.get("db.operation"),
            Some(&AttrValue::Str("SELECT".to_string()))
        );
        assert_eq!(child.attributes.get("cache.hit"), Some(&AttrValue::Bool(false)));
    }

    #[test]
    fn queue_pair_links_producer_to_consumer() {
        let (trace_id, span_id) = ids();
        let root = Profile::Queue.build_root(
            "api-gateway",
            0,
            start(),
            span_id,
            trace_id,
            Duration::from_millis(30),
        );
        let producer_id = SpanId::new([5; 8]);
        let consumer_id = SpanId::new([6; 8]);
        let (producer, consumer) = Profile::Queue
            .build_queue_pair(
                &root,
                "svc-2",
                0,
                start(),
                producer_id,
                consumer_id,
                trace_id,
                Duration::from_millis(30),
            )
            .expect("queue profile builds a pair");

        assert_eq!(producer.kind, SpanKind::Producer);
        assert_eq!(producer.duration, Duration::from_millis(10));
        assert_eq!(consumer.kind, SpanKind::Consumer);
        assert_eq!(consumer.duration, Duration::from_millis(15));
        assert_eq!(
            consumer.start_time,
            start() + Duration::from_millis(15),
        );
        assert_eq!(producer.links.len(), 1);
        assert_eq!(producer.links[0].span_id, consumer_id);
        assert_eq!(
            producer.links[0].attributes.get("link.type"),
            Some(&AttrValue::Str("follows_from".to_string()))
        );
    }

    #[test]
    fn only_queue_profile_builds_pairs() {
        let (trace_id, span_id) = ids();
        let root = Profile::Web.build_root(
            "api-gateway",
            0,
            start(),
            span_id,
            trace_id,
            Duration::from_millis(5),
        );
        for profile in [Profile::Web, Profile::Grpc, Profile::Batch] {
            assert!(profile
                .build_queue_pair(
                    &root,
                    "svc-1",
                    0,
                    start(),
                    SpanId::new([7; 8]),
                    SpanId::new([8; 8]),
                    trace_id,
                    Duration::from_millis(5),
                )
                .is_none());
        }
    }
}
