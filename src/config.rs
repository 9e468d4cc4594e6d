//! Run configuration: the validated, immutable record consumed by the
//! pipeline, plus the YAML / environment / CLI override merge.
//!
//! Merge precedence is CLI over environment (`SPANFORGE_*`) over the YAML
//! file over built-in defaults. External duration fields are integer
//! milliseconds; everything is a [`std::time::Duration`] internally.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::generator::Profile;
use crate::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateUnit {
    Spans,
    Traces,
}

impl RateUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateUnit::Spans => "spans",
            RateUnit::Traces => "traces",
        }
    }
}

impl FromStr for RateUnit {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Error> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "spans" => Ok(RateUnit::Spans),
            "traces" => Ok(RateUnit::Traces),
            _ => Err(Error::Config(format!(
                "invalid rate-unit {raw:?} (must be spans or traces)"
            ))),
        }
    }
}

/// Knob controlling event probability and slow-tail behavior.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Variety {
    Low,
    #[default]
    Medium,
    High,
}

impl Variety {
    /// Probability of attaching a profile event to a span.
    pub fn event_probability(&self) -> f64 {
        match self {
            Variety::Low => 0.15,
            Variety::Medium => 0.35,
            Variety::High => 0.65,
        }
    }

    /// Probability of stretching a sampled latency into the slow tail.
    pub fn slow_probability(&self) -> f64 {
        match self {
            Variety::Low => 0.01,
            Variety::Medium => 0.05,
            Variety::High => 0.15,
        }
    }

    pub fn slow_factor(&self) -> f64 {
        match self {
            Variety::Low => 2.0,
            Variety::Medium => 4.0,
            Variety::High => 8.0,
        }
    }

    /// Additive adjustment to the error-injection rate.
    pub fn error_adjustment(&self) -> f64 {
        match self {
            Variety::Low => -0.01,
            Variety::Medium => 0.0,
            Variety::High => 0.02,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Variety::Low => "low",
            Variety::Medium => "medium",
            Variety::High => "high",
        }
    }
}

impl FromStr for Variety {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Error> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "medium" => Ok(Variety::Medium),
            "low" => Ok(Variety::Low),
            "high" => Ok(Variety::High),
            _ => Err(Error::Config(format!(
                "invalid variety {raw:?} (must be low, medium, or high)"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Jsonl,
    Pretty,
    OtlpHttp,
    OtlpGrpc,
    ZipkinJson,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Jsonl => "jsonl",
            Format::Pretty => "pretty",
            Format::OtlpHttp => "otlp-http",
            Format::OtlpGrpc => "otlp-grpc",
            Format::ZipkinJson => "zipkin-json",
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Error> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "jsonl" => Ok(Format::Jsonl),
            "pretty" => Ok(Format::Pretty),
            "otlp-http" => Ok(Format::OtlpHttp),
            "otlp-grpc" => Ok(Format::OtlpGrpc),
            "zipkin-json" => Ok(Format::ZipkinJson),
            _ => Err(Error::Config(format!("unsupported format {raw:?}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Output {
    Stdout,
    File,
    Otlp,
    Zipkin,
    Noop,
}

impl Output {
    pub fn as_str(&self) -> &'static str {
        match self {
            Output::Stdout => "stdout",
            Output::File => "file",
            Output::Otlp => "otlp",
            Output::Zipkin => "zipkin",
            Output::Noop => "noop",
        }
    }
}

impl std::fmt::Display for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Output {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Error> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "stdout" => Ok(Output::Stdout),
            "file" => Ok(Output::File),
            "otlp" => Ok(Output::Otlp),
            "zipkin" => Ok(Output::Zipkin),
            "noop" => Ok(Output::Noop),
            _ => Err(Error::Config(format!("unsupported output {raw:?}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

impl FromStr for Compression {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Error> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" => Ok(Compression::None),
            "gzip" => Ok(Compression::Gzip),
            _ => Err(Error::Config(format!(
                "invalid compress {raw:?} (must be empty or gzip)"
            ))),
        }
    }
}

/// Validated run configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub rate_value: f64,
    pub rate_unit: RateUnit,
    pub rate_interval: Duration,
    pub duration: Duration,
    pub count: u64,
    pub seed: u64,
    pub workers: usize,
    pub profile: Profile,
    pub routes: usize,
    pub services: usize,
    pub depth: usize,
    pub fanout: f64,
    pub service_prefix: String,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub errors: f64,
    pub retries: f64,
    pub db_heavy: f64,
    pub cache_hit_rate: f64,
    pub variety: Variety,
    pub high_cardinality: bool,
    pub format: Format,
    pub output: Output,
    pub file: String,
    pub otlp_endpoint: String,
    pub zipkin_endpoint: String,
    pub otlp_insecure: bool,
    pub headers: HashMap<String, String>,
    pub compress: Compression,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub sink_retries: u32,
    pub sink_retry_backoff: Duration,
    pub sink_timeout: Duration,
    pub sink_max_in_flight: usize,
    pub report_file: String,
    pub http_listen: String,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            rate_value: 200.0,
            rate_unit: RateUnit::Spans,
            rate_interval: Duration::from_secs(1),
            duration: Duration::from_secs(30),
            count: 0,
            seed: 1,
            workers: 1,
            profile: Profile::Web,
            routes: 8,
            services: 8,
            depth: 4,
            fanout: 2.0,
            service_prefix: "svc-".to_string(),
            p50: Duration::from_millis(30),
            p95: Duration::from_millis(120),
            p99: Duration::from_millis(350),
            errors: 0.005,
            retries: 0.01,
            db_heavy: 0.2,
            cache_hit_rate: 0.85,
            variety: Variety::Medium,
            high_cardinality: false,
            format: Format::Jsonl,
            output: Output::Stdout,
            file: String::new(),
            otlp_endpoint: String::new(),
            zipkin_endpoint: String::new(),
            otlp_insecure: true,
            headers: HashMap::new(),
            compress: Compression::None,
            batch_size: 512,
            flush_interval: Duration::from_millis(200),
            sink_retries: 2,
            sink_retry_backoff: Duration::from_millis(300),
            sink_timeout: Duration::from_secs(10),
            sink_max_in_flight: 2,
            report_file: String::new(),
            http_listen: "127.0.0.1:8080".to_string(),
            debug: false,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), Error> {
        if self.rate_value <= 0.0 {
            return Err(Error::Config("rate must be > 0".into()));
        }
        if self.rate_interval.is_zero() {
            return Err(Error::Config("rate-interval must be > 0".into()));
        }
        if self.workers == 0 {
            return Err(Error::Config("workers must be > 0".into()));
        }
        if self.services == 0 {
            return Err(Error::Config("services must be > 0".into()));
        }
        if self.routes == 0 {
            return Err(Error::Config("routes must be > 0".into()));
        }
        if self.depth == 0 {
            return Err(Error::Config("depth must be > 0".into()));
        }
        if self.fanout <= 0.0 {
            return Err(Error::Config("fanout must be > 0".into()));
        }
        if self.p50.is_zero() || self.p95.is_zero() || self.p99.is_zero() {
            return Err(Error::Config("p50/p95/p99 must be > 0".into()));
        }
        if self.p50 > self.p95 || self.p95 > self.p99 {
            return Err(Error::Config(
                "latency percentiles must satisfy p50 <= p95 <= p99".into(),
            ));
        }
        for (name, value) in [
            ("errors", self.errors),
            ("retries", self.retries),
            ("db-heavy", self.db_heavy),
            ("cache-hit-rate", self.cache_hit_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("{name} must be in [0,1]")));
            }
        }

        let needs_otlp_endpoint = self.output == Output::Otlp
            || (matches!(self.format, Format::OtlpHttp | Format::OtlpGrpc)
                && self.output != Output::Noop);
        if needs_otlp_endpoint && self.otlp_endpoint.trim().is_empty() {
            return Err(Error::Config(format!(
                "otlp endpoint required for output={} format={}",
                self.output, self.format
            )));
        }
        let needs_zipkin_endpoint = self.output == Output::Zipkin
            || (self.format == Format::ZipkinJson && self.output != Output::Noop);
        if needs_zipkin_endpoint && self.zipkin_endpoint.trim().is_empty() {
            return Err(Error::Config(format!(
                "zipkin endpoint required for output={} format={}",
                self.output, self.format
            )));
        }

        if self.batch_size == 0 {
            return Err(Error::Config("batch-size must be > 0".into()));
        }
        if self.flush_interval.is_zero() {
            return Err(Error::Config("flush-interval must be > 0".into()));
        }
        if self.sink_retry_backoff.is_zero() {
            return Err(Error::Config("sink-retry-backoff must be > 0".into()));
        }
        if self.sink_timeout.is_zero() {
            return Err(Error::Config("sink-timeout must be > 0".into()));
        }
        if self.sink_max_in_flight == 0 {
            return Err(Error::Config("sink-max-in-flight must be > 0".into()));
        }

        let output_ok = match self.format {
            Format::Jsonl => matches!(self.output, Output::Stdout | Output::File | Output::Noop),
            Format::Pretty => matches!(self.output, Output::Stdout | Output::Noop),
            Format::OtlpHttp | Format::OtlpGrpc => {
                matches!(self.output, Output::Otlp | Output::Noop)
            }
            Format::ZipkinJson => matches!(self.output, Output::Zipkin | Output::Noop),
        };
        if !output_ok {
            return Err(Error::Config(format!(
                "format {} does not support output {}",
                self.format, self.output
            )));
        }
        if self.output == Output::File && self.file.trim().is_empty() {
            return Err(Error::Config("file output requires --file".into()));
        }

        Ok(())
    }

    /// Builds the effective config from defaults, the optional YAML file,
    /// the `SPANFORGE_*` environment, and CLI overrides, in that order.
    pub fn load(cli: &ConfigOverrides, config_file: Option<&Path>) -> Result<Config, Error> {
        let env_file = env::var("SPANFORGE_CONFIG").ok();
        let file = match config_file {
            Some(path) => Some(path.to_path_buf()),
            None => env_file
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(Into::into),
        };

        let mut cfg = Config::default();
        if let Some(path) = file {
            cfg.apply(&ConfigOverrides::from_yaml(&path)?)?;
        }
        cfg.apply(&ConfigOverrides::from_env()?)?;
        cfg.apply(cli)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply(&mut self, overrides: &ConfigOverrides) -> Result<(), Error> {
        if let Some(v) = overrides.rate {
            self.rate_value = v;
        }
        if let Some(v) = &overrides.rate_unit {
            self.rate_unit = v.parse()?;
        }
        if let Some(v) = overrides.rate_interval_ms {
            self.rate_interval = Duration::from_millis(v);
        }
        if let Some(v) = overrides.duration_ms {
            self.duration = Duration::from_millis(v);
        }
        if let Some(v) = overrides.count {
            self.count = v;
        }
        if let Some(v) = overrides.seed {
            self.seed = v;
        }
        if let Some(v) = overrides.workers {
            self.workers = v;
        }
        if let Some(v) = &overrides.profile {
            self.profile = v.parse()?;
        }
        if let Some(v) = overrides.routes {
            self.routes = v;
        }
        if let Some(v) = overrides.services {
            self.services = v;
        }
        if let Some(v) = overrides.depth {
            self.depth = v;
        }
        if let Some(v) = overrides.fanout {
            self.fanout = v;
        }
        if let Some(v) = &overrides.service_prefix {
            self.service_prefix = v.clone();
        }
        if let Some(v) = overrides.p50_ms {
            self.p50 = Duration::from_millis(v);
        }
        if let Some(v) = overrides.p95_ms {
            self.p95 = Duration::from_millis(v);
        }
        if let Some(v) = overrides.p99_ms {
            self.p99 = Duration::from_millis(v);
        }
        if let Some(v) = &overrides.errors {
            self.errors = parse_percent(v)?;
        }
        if let Some(v) = &overrides.retries {
            self.retries = parse_percent(v)?;
        }
        if let Some(v) = &overrides.db_heavy {
            self.db_heavy = parse_percent(v)?;
        }
        if let Some(v) = &overrides.cache_hit_rate {
            self.cache_hit_rate = parse_percent(v)?;
        }
        if let Some(v) = &overrides.variety {
            self.variety = v.parse()?;
        }
        if let Some(v) = overrides.high_cardinality {
            self.high_cardinality = v;
        }
        if let Some(v) = &overrides.format {
            self.format = v.parse()?;
        }
        if let Some(v) = &overrides.output {
            self.output = v.parse()?;
        }
        if let Some(v) = &overrides.file {
            self.file = v.clone();
        }
        if let Some(v) = &overrides.otlp_endpoint {
            self.otlp_endpoint = v.clone();
        }
        if let Some(v) = &overrides.zipkin_endpoint {
            self.zipkin_endpoint = v.clone();
        }
        if let Some(v) = overrides.otlp_insecure {
            self.otlp_insecure = v;
        }
        if let Some(v) = &overrides.headers {
            self.headers = parse_headers(v)?;
        }
        if let Some(v) = &overrides.compress {
            self.compress = v.parse()?;
        }
        if let Some(v) = overrides.batch_size {
            self.batch_size = v;
        }
        if let Some(v) = overrides.flush_interval_ms {
            self.flush_interval = Duration::from_millis(v);
        }
        if let Some(v) = overrides.sink_retries {
            self.sink_retries = v;
        }
        if let Some(v) = overrides.sink_retry_backoff_ms {
            self.sink_retry_backoff = Duration::from_millis(v);
        }
        if let Some(v) = overrides.sink_timeout_ms {
            self.sink_timeout = Duration::from_millis(v);
        }
        if let Some(v) = overrides.sink_max_in_flight {
            self.sink_max_in_flight = v;
        }
        if let Some(v) = &overrides.report_file {
            self.report_file = v.clone();
        }
        if let Some(v) = &overrides.http_listen {
            self.http_listen = v.clone();
        }
        if let Some(v) = overrides.debug {
            self.debug = v;
        }
        Ok(())
    }
}

/// One layer of optional overrides, sourced from the YAML file, the
/// environment, or the CLI. Unset fields leave the lower layer untouched.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    pub rate: Option<f64>,
    pub rate_unit: Option<String>,
    pub rate_interval_ms: Option<u64>,
    pub duration_ms: Option<u64>,
    pub count: Option<u64>,
    pub seed: Option<u64>,
    pub workers: Option<usize>,
    pub profile: Option<String>,
    pub routes: Option<usize>,
    pub services: Option<usize>,
    pub depth: Option<usize>,
    pub fanout: Option<f64>,
    pub service_prefix: Option<String>,
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
    pub errors: Option<String>,
    pub retries: Option<String>,
    pub db_heavy: Option<String>,
    pub cache_hit_rate: Option<String>,
    pub variety: Option<String>,
    pub high_cardinality: Option<bool>,
    pub format: Option<String>,
    pub output: Option<String>,
    pub file: Option<String>,
    pub otlp_endpoint: Option<String>,
    pub zipkin_endpoint: Option<String>,
    pub otlp_insecure: Option<bool>,
    pub headers: Option<Vec<String>>,
    pub compress: Option<String>,
    pub batch_size: Option<usize>,
    pub flush_interval_ms: Option<u64>,
    pub sink_retries: Option<u32>,
    pub sink_retry_backoff_ms: Option<u64>,
    pub sink_timeout_ms: Option<u64>,
    pub sink_max_in_flight: Option<usize>,
    pub report_file: Option<String>,
    pub http_listen: Option<String>,
    pub debug: Option<bool>,
}

impl ConfigOverrides {
    pub fn from_yaml(path: &Path) -> Result<ConfigOverrides, Error> {
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read config file {}: {e}", path.display())))?;
        serde_yaml::from_str(&raw)
            .map_err(|e| Error::Config(format!("parse config yaml {}: {e}", path.display())))
    }

    pub fn from_env() -> Result<ConfigOverrides, Error> {
        let mut o = ConfigOverrides {
            rate: env_parse("SPANFORGE_RATE")?,
            rate_unit: env_string("SPANFORGE_RATE_UNIT"),
            rate_interval_ms: env_parse("SPANFORGE_RATE_INTERVAL_MS")?,
            duration_ms: env_parse("SPANFORGE_DURATION_MS")?,
            count: env_parse("SPANFORGE_COUNT")?,
            seed: env_parse("SPANFORGE_SEED")?,
            workers: env_parse("SPANFORGE_WORKERS")?,
            profile: env_string("SPANFORGE_PROFILE"),
            routes: env_parse("SPANFORGE_ROUTES")?,
            services: env_parse("SPANFORGE_SERVICES")?,
            depth: env_parse("SPANFORGE_DEPTH")?,
            fanout: env_parse("SPANFORGE_FANOUT")?,
            service_prefix: env_string("SPANFORGE_SERVICE_PREFIX"),
            p50_ms: env_parse("SPANFORGE_P50_MS")?,
            p95_ms: env_parse("SPANFORGE_P95_MS")?,
            p99_ms: env_parse("SPANFORGE_P99_MS")?,
            errors: env_string("SPANFORGE_ERRORS"),
            retries: env_string("SPANFORGE_RETRIES"),
            db_heavy: env_string("SPANFORGE_DB_HEAVY"),
            cache_hit_rate: env_string("SPANFORGE_CACHE_HIT_RATE"),
            variety: env_string("SPANFORGE_VARIETY"),
            high_cardinality: env_parse("SPANFORGE_HIGH_CARDINALITY")?,
            format: env_string("SPANFORGE_FORMAT"),
            output: env_string("SPANFORGE_OUTPUT"),
            file: env_string("SPANFORGE_FILE"),
            otlp_endpoint: env_string("SPANFORGE_OTLP_ENDPOINT"),
            zipkin_endpoint: env_string("SPANFORGE_ZIPKIN_ENDPOINT"),
            otlp_insecure: env_parse("SPANFORGE_OTLP_INSECURE")?,
            headers: None,
            compress: env_string("SPANFORGE_COMPRESS"),
            batch_size: env_parse("SPANFORGE_BATCH_SIZE")?,
            flush_interval_ms: env_parse("SPANFORGE_FLUSH_INTERVAL_MS")?,
            sink_retries: env_parse("SPANFORGE_SINK_RETRIES")?,
            sink_retry_backoff_ms: env_parse("SPANFORGE_SINK_RETRY_BACKOFF_MS")?,
            sink_timeout_ms: env_parse("SPANFORGE_SINK_TIMEOUT_MS")?,
            sink_max_in_flight: env_parse("SPANFORGE_SINK_MAX_IN_FLIGHT")?,
            report_file: env_string("SPANFORGE_REPORT_FILE"),
            http_listen: env_string("SPANFORGE_HTTP_LISTEN"),
            debug: env_parse("SPANFORGE_DEBUG")?,
        };
        if let Ok(raw) = env::var("SPANFORGE_HEADERS") {
            let items: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect();
            if !items.is_empty() {
                o.headers = Some(items);
            }
        }
        Ok(o)
    }
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, Error> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("invalid {name}={raw:?}"))),
        Err(_) => Ok(None),
    }
}

/// Parses a percentage such as `"0.5%"` or `"20"` into a rate in [0,1].
pub fn parse_percent(raw: &str) -> Result<f64, Error> {
    let trimmed = raw.trim().trim_end_matches('%');
    let value: f64 = trimmed
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid percent {raw:?}")))?;
    if !(0.0..=100.0).contains(&value) {
        return Err(Error::Config(format!(
            "percent out of range [0,100]: {raw:?}"
        )));
    }
    Ok(value / 100.0)
}

/// Parses repeated `key=value` header items.
pub fn parse_headers(items: &[String]) -> Result<HashMap<String, String>, Error> {
    let mut out = HashMap::with_capacity(items.len());
    for item in items {
        let (key, value) = item
            .split_once('=')
            .ok_or_else(|| Error::Config(format!("invalid header {item:?} (expected k=v)")))?;
        if key.trim().is_empty() {
            return Err(Error::Config(format!("invalid header {item:?} (expected k=v)")));
        }
        out.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        Config::default().validate().expect("defaults must be valid");
    }

    #[test]
    fn parse_percent_handles_suffix_and_range() {
        assert_eq!(parse_percent("0.5%").unwrap(), 0.005);
        assert_eq!(parse_percent("20").unwrap(), 0.2);
        assert_eq!(parse_percent(" 85 % ").unwrap(), 0.85);
        assert!(parse_percent("101").is_err());
        assert!(parse_percent("-1%").is_err());
        assert!(parse_percent("abc").is_err());
    }

    #[test]
    fn parse_headers_splits_on_first_equals() {
        let headers =
            parse_headers(&["x-api-key=secret".to_string(), "a = b=c ".to_string()]).unwrap();
        assert_eq!(headers.get("x-api-key").map(String::as_str), Some("secret"));
        assert_eq!(headers.get("a").map(String::as_str), Some("b=c"));
        assert!(parse_headers(&["broken".to_string()]).is_err());
        assert!(parse_headers(&["=v".to_string()]).is_err());
    }

    #[test]
    fn format_output_matrix() {
        let cases = [
            (Format::Jsonl, Output::Stdout, true),
            (Format::Jsonl, Output::File, true),
            (Format::Jsonl, Output::Noop, true),
            (Format::Jsonl, Output::Otlp, false),
            (Format::Pretty, Output::Stdout, true),
            (Format::Pretty, Output::Noop, true),
            (Format::Pretty, Output::File, false),
            (Format::OtlpHttp, Output::Otlp, true),
            (Format::OtlpHttp, Output::Noop, true),
            (Format::OtlpHttp, Output::Stdout, false),
            (Format::OtlpGrpc, Output::Otlp, true),
            (Format::OtlpGrpc, Output::Zipkin, false),
            (Format::ZipkinJson, Output::Zipkin, true),
            (Format::ZipkinJson, Output::Noop, true),
            (Format::ZipkinJson, Output::Otlp, false),
        ];
        for (format, output, ok) in cases {
            let cfg = Config {
                format,
                output,
                file: "out.jsonl".to_string(),
                otlp_endpoint: "http://127.0.0.1:4318".to_string(),
                zipkin_endpoint: "http://127.0.0.1:9411".to_string(),
                ..Config::default()
            };
            assert_eq!(
                cfg.validate().is_ok(),
                ok,
                "format={format} output={output}"
            );
        }
    }

    #[test]
    fn network_outputs_require_endpoints() {
        let cfg = Config {
            format: Format::OtlpHttp,
            output: Output::Otlp,
            otlp_endpoint: String::new(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            format: Format::ZipkinJson,
            output: Output::Zipkin,
            zipkin_endpoint: String::new(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        // noop never needs an endpoint
        let cfg = Config {
            format: Format::OtlpGrpc,
            output: Output::Noop,
            ..Config::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn percentile_ordering_is_enforced() {
        let cfg = Config {
            p50: Duration::from_millis(100),
            p95: Duration::from_millis(50),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn overrides_apply_in_layers() {
        let mut cfg = Config::default();
        let yaml: ConfigOverrides = serde_yaml::from_str(
            "rate: 50\nprofile: grpc\nvariety: high\nerrors: \"2%\"\nbatch_size: 64\n",
        )
        .unwrap();
        cfg.apply(&yaml).unwrap();
        assert_eq!(cfg.rate_value, 50.0);
        assert_eq!(cfg.profile, Profile::Grpc);
        assert_eq!(cfg.variety, Variety::High);
        assert_eq!(cfg.errors, 0.02);
        assert_eq!(cfg.batch_size, 64);

        let cli = ConfigOverrides {
            profile: Some("queue".to_string()),
            ..ConfigOverrides::default()
        };
        cfg.apply(&cli).unwrap();
        assert_eq!(cfg.profile, Profile::Queue);
        // untouched layers survive
        assert_eq!(cfg.rate_value, 50.0);
    }

    #[test]
    fn variety_parses_empty_as_medium() {
        assert_eq!("".parse::<Variety>().unwrap(), Variety::Medium);
        assert_eq!("LOW".parse::<Variety>().unwrap(), Variety::Low);
        assert!("extreme".parse::<Variety>().is_err());
    }
}
