//! Stable service-name universe derived from a prefix and count.

/// The reserved frontdoor service name used for every root span.
pub const FRONTDOOR: &str = "api-gateway";

/// An ordered list of service names, stable for a given `(prefix, n)`.
#[derive(Clone, Debug)]
pub struct Topology {
    services: Vec<String>,
}

impl Topology {
    pub fn build(prefix: &str, n: usize) -> Self {
        let mut services = Vec::with_capacity(n.max(1));
        services.push(FRONTDOOR.to_string());
        for i in 1..n {
            services.push(format!("{prefix}{i}"));
        }
        Topology { services }
    }

    pub fn frontdoor(&self) -> &str {
        &self.services[0]
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }
}
