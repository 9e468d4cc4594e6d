//! Wire encodings for span batches: line-delimited JSON, a human-readable
//! tree rendering, OTLP protobuf, and Zipkin v2 JSON.

pub mod jsonl;
pub mod otlp;
pub mod pretty;
pub mod zipkin;
