//! Core trace data model: identifiers, attributes, spans, and traces.
//!
//! All entities are value-typed and single-owner. A worker constructs a
//! [`Trace`], hands it through the pipeline, and the consumer releases it
//! after encoding; spans are never mutated after a trace leaves the
//! generator.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, SystemTime};

use serde::{Serialize, Serializer};

/// A 16-byte trace identifier.
///
/// All zeros is legal but discouraged; uniqueness is the generator's
/// contract, not an invariant enforced here.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceId([u8; 16]);

impl TraceId {
    pub const fn new(bytes: [u8; 16]) -> Self {
        TraceId(bytes)
    }

    pub fn to_bytes(self) -> [u8; 16] {
        self.0
    }

    pub fn to_hex(self) -> String {
        format!("{self:x}")
    }
}

impl fmt::LowerHex for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// An 8-byte span identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpanId([u8; 8]);

impl SpanId {
    pub const fn new(bytes: [u8; 8]) -> Self {
        SpanId(bytes)
    }

    pub fn to_bytes(self) -> [u8; 8] {
        self.0
    }

    pub fn to_hex(self) -> String {
        format!("{self:x}")
    }
}

impl fmt::LowerHex for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// A tagged attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    Duration(Duration),
}

impl Serialize for AttrValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AttrValue::Str(v) => serializer.serialize_str(v),
            AttrValue::Bool(v) => serializer.serialize_bool(*v),
            AttrValue::Int(v) => serializer.serialize_i64(*v),
            AttrValue::Float(v) => serializer.serialize_f64(*v),
            AttrValue::Duration(v) => serializer.serialize_f64(v.as_secs_f64() * 1e3),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(v) => f.write_str(v),
            AttrValue::Bool(v) => write!(f, "{v}"),
            AttrValue::Int(v) => write!(f, "{v}"),
            AttrValue::Float(v) => write!(f, "{v}"),
            AttrValue::Duration(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Int(i64::from(v))
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<usize> for AttrValue {
    fn from(v: usize) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<Duration> for AttrValue {
    fn from(v: Duration) -> Self {
        AttrValue::Duration(v)
    }
}

/// Span and resource attributes, ordered by key on encode.
///
/// Construction is last-write-wins; duplicate keys cannot exist.
pub type Attrs = BTreeMap<String, AttrValue>;

/// Builds an [`Attrs`] map from `key => value` pairs.
#[macro_export]
macro_rules! attrs {
    ($($key:expr => $value:expr),* $(,)?) => {{
        let mut map = $crate::model::Attrs::new();
        $(map.insert(($key).to_string(), $crate::model::AttrValue::from($value));)*
        map
    }};
}

/// The resource that emitted a span, identified by its attributes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Resource {
    pub attributes: Attrs,
}

/// A timestamped event attached to a span.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub name: String,
    pub time: SystemTime,
    pub attributes: Attrs,
}

/// A reference to another span, within or across traces.
#[derive(Clone, Debug, PartialEq)]
pub struct Link {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub attributes: Attrs,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpanKind {
    Internal,
    Server,
    Client,
    Producer,
    Consumer,
    Unspecified,
}

impl SpanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanKind::Internal => "INTERNAL",
            SpanKind::Server => "SERVER",
            SpanKind::Client => "CLIENT",
            SpanKind::Producer => "PRODUCER",
            SpanKind::Consumer => "CONSUMER",
            SpanKind::Unspecified => "UNSPECIFIED",
        }
    }
}

impl fmt::Display for SpanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Span completion status.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Status {
    #[default]
    Unset,
    Ok,
    Error {
        message: String,
    },
}

impl Status {
    pub fn code(&self) -> &'static str {
        match self {
            Status::Unset => "UNSET",
            Status::Ok => "OK",
            Status::Error { .. } => "ERROR",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Status::Error { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Status::Error { message } => message,
            _ => "",
        }
    }
}

/// A single unit of timed work within a trace.
#[derive(Clone, Debug, PartialEq)]
pub struct Span {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub parent_span_id: Option<SpanId>,
    pub name: String,
    pub kind: SpanKind,
    pub start_time: SystemTime,
    pub duration: Duration,
    pub attributes: Attrs,
    pub events: Vec<Event>,
    pub links: Vec<Link>,
    pub status: Status,
    pub resource: Resource,
}

impl Span {
    /// The `service.name` attribute, when set to a string value.
    pub fn service_name(&self) -> Option<&str> {
        match self.attributes.get("service.name") {
            Some(AttrValue::Str(name)) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn end_time(&self) -> SystemTime {
        self.start_time
            .checked_add(self.duration)
            .unwrap_or(self.start_time)
    }
}

/// A rooted tree of spans sharing one [`TraceId`].
///
/// `spans[0]` is the root; the rest follow in construction order, which is
/// not necessarily topological. Encoders that need an order re-derive it.
#[derive(Clone, Debug, PartialEq)]
pub struct Trace {
    pub trace_id: TraceId,
    pub resource: Resource,
    pub spans: Vec<Span>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_id_renders_lowercase_hex() {
        let id = TraceId::new([
            0x4e, 0x44, 0x18, 0x24, 0xec, 0x2b, 0x6a, 0x44, 0xff, 0xdc, 0x9b, 0xb9, 0xa6, 0x45,
            0x3d, 0xf3,
        ]);
        assert_eq!(id.to_hex(), "4e441824ec2b6a44ffdc9bb9a6453df3");
    }

    #[test]
    fn span_id_renders_lowercase_hex() {
        let id = SpanId::new([0xff, 0xdc, 0x9b, 0xb9, 0xa6, 0x45, 0x3d, 0xf3]);
        assert_eq!(id.to_hex(), "ffdc9bb9a6453df3");
    }

    #[test]
    fn attrs_macro_is_last_write_wins() {
        let attrs = attrs! {
            "http.status_code" => 200,
            "http.status_code" => 500,
            "cache.hit" => true,
        };
        assert_eq!(attrs.get("http.status_code"), Some(&AttrValue::Int(500)));
        assert_eq!(attrs.len(), 2);
    }

    #[test]
    fn attr_value_display_is_stringified_form() {
        assert_eq!(AttrValue::from("kafka").to_string(), "kafka");
        assert_eq!(AttrValue::from(true).to_string(), "true");
        assert_eq!(AttrValue::from(500).to_string(), "500");
        assert_eq!(AttrValue::from(0.25).to_string(), "0.25");
    }

    #[test]
    fn status_codes() {
        assert_eq!(Status::Ok.code(), "OK");
        assert_eq!(Status::Unset.code(), "UNSET");
        let err = Status::Error {
            message: "synthetic failure".to_string(),
        };
        assert_eq!(err.code(), "ERROR");
        assert!(err.is_error());
        assert_eq!(err.message(), "synthetic failure");
    }
}
