//! Core data types for the metrics edge hub.
//!
//! This module defines the data structures shared by every crate in the
//! workspace: labels for series identification, samples for timestamped
//! observations, and metric families for batched push and scrape.

use std::collections::HashMap;

/// A label is a name-value pair attached to a sample.
///
/// Label names within one sample are unique. For Prometheus compatibility,
/// label names should match `[a-zA-Z_][a-zA-Z0-9_]*`, but this is not
/// enforced by the API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelPair {
    /// The label name (key).
    pub name: String,
    /// The label value.
    pub value: String,
}

impl LabelPair {
    /// Creates a new label with the given name and value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The kind of a metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
    Summary,
    #[default]
    Untyped,
}

impl MetricKind {
    /// The text-exposition spelling of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
            MetricKind::Summary => "summary",
            MetricKind::Untyped => "untyped",
        }
    }

    /// Parses the text-exposition spelling of a kind.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "counter" => Some(MetricKind::Counter),
            "gauge" => Some(MetricKind::Gauge),
            "histogram" => Some(MetricKind::Histogram),
            "summary" => Some(MetricKind::Summary),
            "untyped" => Some(MetricKind::Untyped),
            _ => None,
        }
    }
}

/// One cumulative bucket of a histogram sample.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBucket {
    /// Inclusive upper bound of the bucket (`le`). May be `+Inf`.
    pub upper_bound: f64,
    /// Number of observations less than or equal to the upper bound.
    pub cumulative_count: u64,
}

/// One quantile of a summary sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantile {
    pub quantile: f64,
    pub value: f64,
}

/// The observed payload of a sample.
///
/// Scalar kinds carry a single value; histograms and summaries carry the
/// auxiliary structure the exposition format requires.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    Counter(f64),
    Gauge(f64),
    Untyped(f64),
    Histogram {
        sample_count: u64,
        sample_sum: f64,
        buckets: Vec<HistogramBucket>,
    },
    Summary {
        sample_count: u64,
        sample_sum: f64,
        quantiles: Vec<Quantile>,
    },
}

/// A single observation of one series.
///
/// The timestamp is client-supplied milliseconds since the Unix epoch and
/// is never rewritten. A sample is immutable once accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Labels identifying the series within its family.
    pub labels: Vec<LabelPair>,
    /// Client-supplied timestamp in milliseconds, if any.
    pub timestamp_ms: Option<i64>,
    /// The observed value.
    pub value: SampleValue,
}

impl Sample {
    /// Ordering key within a series queue.
    ///
    /// Samples without a timestamp sort before all timestamped samples.
    pub fn order_key(&self) -> i64 {
        self.timestamp_ms.unwrap_or(i64::MIN)
    }

    /// Sorts the labels by name so permuted label orderings render and
    /// hash identically.
    pub fn canonicalize_labels(&mut self) {
        self.labels.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

/// A named group of samples sharing one kind and one help string.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub samples: Vec<Sample>,
}

/// A push batch keyed by family name.
pub type FamilyBatch = HashMap<String, MetricFamily>;

/// Builds the canonical labeled series name: the family name followed by
/// a `_name_value` segment per label in lexicographic name order.
///
/// Two samples with permuted label orderings resolve to the same name.
pub fn labeled_name(family: &str, labels: &[LabelPair]) -> String {
    let mut sorted: Vec<&LabelPair> = labels.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut name = String::from(family);
    for label in sorted {
        name.push('_');
        name.push_str(&label.name);
        name.push('_');
        name.push_str(&label.value);
    }
    name
}
