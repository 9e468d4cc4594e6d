//! Deterministic trace generation.
//!
//! A [`Generator`] owns one seeded random stream and materializes full
//! parent-child span trees: profile-shaped roots and children, log-normal
//! latencies, variety-controlled events and slow tails, error and retry
//! injection, and optional high-cardinality attributes.

mod rng;
mod sampler;
mod topology;

pub mod profile;

pub use profile::Profile;
pub use rng::Rng;
pub use sampler::LatencySampler;
pub use topology::Topology;

use std::time::{Duration, SystemTime};

use crate::attrs;
use crate::config::Config;
use crate::model::{AttrValue, Event, Resource, Span, SpanId, Status, Trace, TraceId};

pub struct Generator {
    cfg: Config,
    rng: Rng,
    topology: Topology,
    sampler: LatencySampler,
}

impl Generator {
    /// Builds a generator seeded with `seed`; callers hand worker `i` the
    /// seed `cfg.seed + i`.
    pub fn new(cfg: Config, seed: u64) -> Self {
        let topology = Topology::build(&cfg.service_prefix, cfg.services);
        let sampler = LatencySampler::new(cfg.p50, cfg.p95);
        Generator {
            rng: Rng::new(seed),
            topology,
            sampler,
            cfg,
        }
    }

    /// Materializes one trace rooted at `start`.
    pub fn generate_trace(&self, start: SystemTime) -> Trace {
        let trace_id = self.new_trace_id();
        let mut trace = Trace {
            trace_id,
            resource: Resource {
                attributes: attrs! { "deployment.environment" => "dev" },
            },
            spans: Vec::new(),
        };

        let root_id = self.new_span_id();
        let route_idx = self.rng.intn(self.cfg.routes.max(1));
        let mut root = self.cfg.profile.build_root(
            self.topology.frontdoor(),
            route_idx,
            start,
            root_id,
            trace_id,
            self.sample_profile_duration(),
        );
        self.apply_cardinality_attrs(&mut root);
        self.maybe_profile_event(&mut root);
        let retry_span = self.maybe_error_and_retry(&mut root);
        trace.spans.push(root.clone());
        if let Some(mut retry) = retry_span {
            self.apply_cardinality_attrs(&mut retry);
            trace.spans.push(retry);
        }

        self.generate_children(&mut trace, &root, 1);
        trace
    }

    fn generate_children(&self, trace: &mut Trace, parent: &Span, level: usize) {
        if level >= self.cfg.depth {
            return;
        }

        let mut child_count = self.cfg.fanout as usize;
        if self.rng.f64() < self.cfg.fanout - child_count as f64 {
            child_count += 1;
        }
        let child_count = child_count.max(1);

        for i in 0..child_count {
            let service =
                self.topology.services()[self.rng.intn(self.topology.services().len())].clone();
            let start = parent.start_time + Duration::from_millis(i as u64 + 1);
            let route_idx = self.rng.intn(self.cfg.routes.max(1));

            if self.cfg.profile == Profile::Queue {
                let Some((mut producer, mut consumer)) = self.cfg.profile.build_queue_pair(
                    parent,
                    &service,
                    route_idx,
                    start,
                    self.new_span_id(),
                    self.new_span_id(),
                    trace.trace_id,
                    self.sample_profile_duration(),
                ) else {
                    continue;
                };
                self.apply_cardinality_attrs(&mut producer);
                self.apply_cardinality_attrs(&mut consumer);
                self.maybe_profile_event(&mut producer);
                self.maybe_profile_event(&mut consumer);
                let producer_retry = self.maybe_error_and_retry(&mut producer);
                let consumer_retry = self.maybe_error_and_retry(&mut consumer);
                trace.spans.push(producer);
                trace.spans.push(consumer.clone());
                if let Some(mut retry) = producer_retry {
                    self.apply_cardinality_attrs(&mut retry);
                    trace.spans.push(retry);
                }
                if let Some(mut retry) = consumer_retry {
                    self.apply_cardinality_attrs(&mut retry);
                    trace.spans.push(retry);
                }
                self.generate_children(trace, &consumer, level + 1);
                continue;
            }

            let mut child = self.cfg.profile.build_child(
                parent,
                &service,
                route_idx,
                start,
                self.new_span_id(),
                trace.trace_id,
                self.sample_profile_duration(),
                self.rng.f64() < self.cfg.db_heavy,
                self.rng.f64() < self.cfg.cache_hit_rate,
            );
            self.apply_cardinality_attrs(&mut child);
            self.maybe_profile_event(&mut child);
            let retry_span = self.maybe_error_and_retry(&mut child);
            trace.spans.push(child.clone());
            if let Some(mut retry) = retry_span {
                self.apply_cardinality_attrs(&mut retry);
                trace.spans.push(retry);
            }
            self.generate_children(trace, &child, level + 1);
        }
    }

    fn maybe_profile_event(&self, span: &mut Span) {
        if self.rng.f64() >= self.cfg.variety.event_probability() {
            return;
        }
        span.events.push(Event {
            name: self.cfg.profile.event_name().to_string(),
            time: span.start_time + span.duration / 3,
            attributes: attrs! { "profile" => self.cfg.profile.as_str() },
        });
    }

    /// Flips the span into an error with the configured probability and,
    /// with probability `retries`, extends it and returns a sibling retry
    /// span parented on the errored one.
    fn maybe_error_and_retry(&self, span: &mut Span) -> Option<Span> {
        if self.rng.f64() >= self.error_probability(span) {
            return None;
        }
        span.status = Status::Error {
            message: "synthetic failure".to_string(),
        };
        span.attributes
            .insert("error".to_string(), AttrValue::Bool(true));
        if span.attributes.contains_key("http.method") {
            span.attributes
                .insert("http.status_code".to_string(), AttrValue::Int(500));
        }
        span.events.push(Event {
            name: "exception".to_string(),
            time: span.start_time + span.duration / 2,
            attributes: attrs! {
                "exception.type" => "SyntheticError",
                "exception.message" => "generated error",
            },
        });

        if self.rng.f64() >= self.cfg.retries {
            return None;
        }
        span.events.push(Event {
            name: "retry".to_string(),
            time: span.start_time + span.duration,
            attributes: attrs! { "retry.attempt" => 1 },
        });
        let retry_duration = self.sampler.sample(&self.rng) / 2;
        span.duration += retry_duration;
        let service_name = span.service_name().unwrap_or_default().to_string();
        let mut retry = Span {
            trace_id: span.trace_id,
            span_id: self.new_span_id(),
            parent_span_id: Some(span.span_id),
            name: "retry attempt".to_string(),
            kind: crate::model::SpanKind::Internal,
            start_time: span.start_time + (span.duration - retry_duration),
            duration: retry_duration,
            attributes: attrs! {
                "service.name" => service_name.as_str(),
                "retry.attempt" => 1,
            },
            events: Vec::new(),
            links: Vec::new(),
            status: Status::Ok,
            resource: Resource {
                attributes: attrs! { "service.name" => service_name.as_str() },
            },
        };
        if span.attributes.contains_key("http.method") {
            retry
                .attributes
                .insert("http.status_code".to_string(), AttrValue::Int(200));
        }
        Some(retry)
    }

    fn error_probability(&self, span: &Span) -> f64 {
        let mut rate = self.cfg.errors * self.cfg.profile.error_factor();
        if span.duration >= self.cfg.p95 {
            rate += self.cfg.errors * 0.75 + 0.02;
        }
        if span.duration >= self.cfg.p99 {
            rate += self.cfg.errors + 0.03;
        }
        rate += self.cfg.variety.error_adjustment();
        rate.clamp(0.0, 1.0)
    }

    fn sample_profile_duration(&self) -> Duration {
        let mut nanos =
            self.sampler.sample(&self.rng).as_nanos() as f64 * self.cfg.profile.latency_factor();
        if self.rng.f64() < self.cfg.variety.slow_probability() {
            nanos *= self.cfg.variety.slow_factor();
        }
        Duration::from_nanos(nanos as u64).max(Duration::from_micros(1))
    }

    fn apply_cardinality_attrs(&self, span: &mut Span) {
        if !self.cfg.high_cardinality {
            return;
        }
        span.attributes
            .insert("span.id".to_string(), AttrValue::Str(span.span_id.to_hex()));
        span.attributes.insert(
            "trace.id".to_string(),
            AttrValue::Str(span.trace_id.to_hex()),
        );
        let request_id = format!("{:x}-{:x}", span.trace_id, span.span_id);
        if span.attributes.contains_key("http.method") {
            span.attributes.insert(
                "http.request_id".to_string(),
                AttrValue::Str(request_id.clone()),
            );
        }
        if span.attributes.contains_key("messaging.system") {
            span.attributes.insert(
                "messaging.message_id".to_string(),
                AttrValue::Str(request_id.clone()),
            );
        }
        if span.attributes.contains_key("batch.job") {
            span.attributes
                .insert("batch.run_id".to_string(), AttrValue::Str(request_id));
        }
    }

    fn new_trace_id(&self) -> TraceId {
        let mut bytes = [0u8; 16];
        self.rng.fill(&mut bytes);
        TraceId::new(bytes)
    }

    fn new_span_id(&self) -> SpanId {
        let mut bytes = [0u8; 8];
        self.rng.fill(&mut bytes);
        SpanId::new(bytes)
    }
}
