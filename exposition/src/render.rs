//! Prometheus text format renderer.
//!
//! Renders one family at a time so callers can parallelise across
//! families and drop individually failing ones.

use std::fmt::Write as _;

use common::{LabelPair, MetricFamily, SampleValue};

use crate::error::RenderError;

/// Renders a family into its text exposition block: a `# HELP` line when
/// help text is present, a `# TYPE` line, then one line per sample in the
/// supplied order. Trailing timestamps are emitted only when present.
pub fn render_family(family: &MetricFamily) -> Result<String, RenderError> {
    if family.name.is_empty() {
        return Err(RenderError::EmptyFamilyName);
    }

    let mut out = String::new();
    if !family.help.is_empty() {
        let _ = writeln!(
            out,
            "# HELP {} {}",
            family.name,
            escape_help(&family.help)
        );
    }
    let _ = writeln!(out, "# TYPE {} {}", family.name, family.kind.as_str());

    for sample in &family.samples {
        match &sample.value {
            SampleValue::Counter(v) | SampleValue::Gauge(v) | SampleValue::Untyped(v) => {
                write_line(
                    &mut out,
                    &family.name,
                    &sample.labels,
                    None,
                    *v,
                    sample.timestamp_ms,
                );
            }
            SampleValue::Histogram {
                sample_count,
                sample_sum,
                buckets,
            } => {
                let bucket_name = format!("{}_bucket", family.name);
                for bucket in buckets {
                    write_line(
                        &mut out,
                        &bucket_name,
                        &sample.labels,
                        Some(("le", &format_value(bucket.upper_bound))),
                        bucket.cumulative_count as f64,
                        sample.timestamp_ms,
                    );
                }
                write_line(
                    &mut out,
                    &format!("{}_sum", family.name),
                    &sample.labels,
                    None,
                    *sample_sum,
                    sample.timestamp_ms,
                );
                write_line(
                    &mut out,
                    &format!("{}_count", family.name),
                    &sample.labels,
                    None,
                    *sample_count as f64,
                    sample.timestamp_ms,
                );
            }
            SampleValue::Summary {
                sample_count,
                sample_sum,
                quantiles,
            } => {
                for quantile in quantiles {
                    write_line(
                        &mut out,
                        &family.name,
                        &sample.labels,
                        Some(("quantile", &format_value(quantile.quantile))),
                        quantile.value,
                        sample.timestamp_ms,
                    );
                }
                write_line(
                    &mut out,
                    &format!("{}_sum", family.name),
                    &sample.labels,
                    None,
                    *sample_sum,
                    sample.timestamp_ms,
                );
                write_line(
                    &mut out,
                    &format!("{}_count", family.name),
                    &sample.labels,
                    None,
                    *sample_count as f64,
                    sample.timestamp_ms,
                );
            }
        }
    }

    Ok(out)
}

fn write_line(
    out: &mut String,
    name: &str,
    labels: &[LabelPair],
    extra: Option<(&str, &str)>,
    value: f64,
    timestamp_ms: Option<i64>,
) {
    out.push_str(name);
    write_labels(out, labels, extra);
    out.push(' ');
    out.push_str(&format_value(value));
    if let Some(ts) = timestamp_ms {
        let _ = write!(out, " {}", ts);
    }
    out.push('\n');
}

fn write_labels(out: &mut String, labels: &[LabelPair], extra: Option<(&str, &str)>) {
    if labels.is_empty() && extra.is_none() {
        return;
    }
    out.push('{');
    let mut first = true;
    for label in labels {
        if !first {
            out.push(',');
        }
        first = false;
        let _ = write!(out, "{}=\"{}\"", label.name, escape_label_value(&label.value));
    }
    if let Some((name, value)) = extra {
        if !first {
            out.push(',');
        }
        let _ = write!(out, "{}=\"{}\"", name, escape_label_value(value));
    }
    out.push('}');
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use common::{HistogramBucket, MetricKind, Quantile, Sample};

    use super::*;

    fn scalar_family() -> MetricFamily {
        MetricFamily {
            name: "mf1".to_string(),
            help: String::new(),
            kind: MetricKind::Counter,
            samples: vec![
                Sample {
                    labels: vec![],
                    timestamp_ms: Some(1),
                    value: SampleValue::Counter(123.0),
                },
                Sample {
                    labels: vec![],
                    timestamp_ms: Some(2),
                    value: SampleValue::Counter(234.0),
                },
                Sample {
                    labels: vec![],
                    timestamp_ms: Some(3),
                    value: SampleValue::Counter(456.0),
                },
            ],
        }
    }

    #[test]
    fn should_render_samples_in_supplied_order() {
        // when
        let text = render_family(&scalar_family()).unwrap();

        // then
        assert_eq!(text, "# TYPE mf1 counter\nmf1 123 1\nmf1 234 2\nmf1 456 3\n");
    }

    #[test]
    fn should_render_help_line_when_present() {
        let family = MetricFamily {
            name: "cpu_usage".to_string(),
            help: "The total CPU usage.".to_string(),
            kind: MetricKind::Gauge,
            samples: vec![Sample {
                labels: vec![LabelPair::new("host", "A")],
                timestamp_ms: Some(1395066363000),
                value: SampleValue::Gauge(1027.0),
            }],
        };

        let text = render_family(&family).unwrap();
        assert_eq!(
            text,
            "# HELP cpu_usage The total CPU usage.\n\
             # TYPE cpu_usage gauge\n\
             cpu_usage{host=\"A\"} 1027 1395066363000\n"
        );
    }

    #[test]
    fn should_omit_timestamp_when_absent() {
        let family = MetricFamily {
            name: "m".to_string(),
            help: String::new(),
            kind: MetricKind::Untyped,
            samples: vec![Sample {
                labels: vec![],
                timestamp_ms: None,
                value: SampleValue::Untyped(0.5),
            }],
        };

        assert_eq!(render_family(&family).unwrap(), "# TYPE m untyped\nm 0.5\n");
    }

    #[test]
    fn should_render_histogram_with_bucket_sum_and_count_lines() {
        // given
        let family = MetricFamily {
            name: "latency".to_string(),
            help: String::new(),
            kind: MetricKind::Histogram,
            samples: vec![Sample {
                labels: vec![LabelPair::new("path", "/a")],
                timestamp_ms: Some(10),
                value: SampleValue::Histogram {
                    sample_count: 4,
                    sample_sum: 2.5,
                    buckets: vec![
                        HistogramBucket {
                            upper_bound: 0.5,
                            cumulative_count: 3,
                        },
                        HistogramBucket {
                            upper_bound: f64::INFINITY,
                            cumulative_count: 4,
                        },
                    ],
                },
            }],
        };

        // when
        let text = render_family(&family).unwrap();

        // then
        assert_eq!(
            text,
            "# TYPE latency histogram\n\
             latency_bucket{path=\"/a\",le=\"0.5\"} 3 10\n\
             latency_bucket{path=\"/a\",le=\"+Inf\"} 4 10\n\
             latency_sum{path=\"/a\"} 2.5 10\n\
             latency_count{path=\"/a\"} 4 10\n"
        );
    }

    #[test]
    fn should_render_summary_with_quantile_lines() {
        let family = MetricFamily {
            name: "rpc".to_string(),
            help: String::new(),
            kind: MetricKind::Summary,
            samples: vec![Sample {
                labels: vec![],
                timestamp_ms: None,
                value: SampleValue::Summary {
                    sample_count: 20,
                    sample_sum: 101.5,
                    quantiles: vec![Quantile {
                        quantile: 0.99,
                        value: 8.1,
                    }],
                },
            }],
        };

        let text = render_family(&family).unwrap();
        assert_eq!(
            text,
            "# TYPE rpc summary\n\
             rpc{quantile=\"0.99\"} 8.1\n\
             rpc_sum 101.5\n\
             rpc_count 20\n"
        );
    }

    #[test]
    fn should_escape_label_values_and_help() {
        let family = MetricFamily {
            name: "m".to_string(),
            help: "line1\nline2\\end".to_string(),
            kind: MetricKind::Gauge,
            samples: vec![Sample {
                labels: vec![LabelPair::new("msg", "a\\b\"c\nd")],
                timestamp_ms: None,
                value: SampleValue::Gauge(1.0),
            }],
        };

        let text = render_family(&family).unwrap();
        assert_eq!(
            text,
            "# HELP m line1\\nline2\\\\end\n\
             # TYPE m gauge\n\
             m{msg=\"a\\\\b\\\"c\\nd\"} 1\n"
        );
    }

    #[test]
    fn should_reject_empty_family_name() {
        let family = MetricFamily {
            name: String::new(),
            help: String::new(),
            kind: MetricKind::Untyped,
            samples: vec![],
        };

        assert_eq!(render_family(&family), Err(RenderError::EmptyFamilyName));
    }

    #[test]
    fn should_render_special_float_values() {
        let family = MetricFamily {
            name: "m".to_string(),
            help: String::new(),
            kind: MetricKind::Gauge,
            samples: vec![
                Sample {
                    labels: vec![],
                    timestamp_ms: None,
                    value: SampleValue::Gauge(f64::INFINITY),
                },
                Sample {
                    labels: vec![],
                    timestamp_ms: None,
                    value: SampleValue::Gauge(f64::NEG_INFINITY),
                },
                Sample {
                    labels: vec![],
                    timestamp_ms: None,
                    value: SampleValue::Gauge(f64::NAN),
                },
            ],
        };

        let text = render_family(&family).unwrap();
        assert_eq!(text, "# TYPE m gauge\nm +Inf\nm -Inf\nm NaN\n");
    }
}
