//! Conversions between wire messages and the shared data model.

use std::collections::hash_map::Entry;

use common::{FamilyBatch, HistogramBucket, LabelPair, Quantile, Sample, SampleValue};

use crate::proto;

pub fn batch_from_proto(families: proto::MetricFamilies) -> FamilyBatch {
    let mut batch = FamilyBatch::new();
    for family in families.families {
        let converted = family_from_proto(family);
        match batch.entry(converted.name.clone()) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().samples.extend(converted.samples);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(converted);
            }
        }
    }
    batch
}

pub fn batch_to_proto(batch: FamilyBatch) -> proto::MetricFamilies {
    proto::MetricFamilies {
        families: batch.into_values().map(family_to_proto).collect(),
    }
}

pub fn family_from_proto(family: proto::MetricFamily) -> common::MetricFamily {
    common::MetricFamily {
        kind: kind_from_proto(family.kind),
        name: family.name,
        help: family.help,
        // A metric with no payload carries no observation and is skipped.
        samples: family.metric.into_iter().filter_map(sample_from_proto).collect(),
    }
}

pub fn family_to_proto(family: common::MetricFamily) -> proto::MetricFamily {
    proto::MetricFamily {
        name: family.name,
        help: family.help,
        kind: kind_to_proto(family.kind) as i32,
        metric: family.samples.into_iter().map(sample_to_proto).collect(),
    }
}

pub fn kind_from_proto(kind: i32) -> common::MetricKind {
    match proto::MetricKind::try_from(kind) {
        Ok(proto::MetricKind::Counter) => common::MetricKind::Counter,
        Ok(proto::MetricKind::Gauge) => common::MetricKind::Gauge,
        Ok(proto::MetricKind::Summary) => common::MetricKind::Summary,
        Ok(proto::MetricKind::Histogram) => common::MetricKind::Histogram,
        Ok(proto::MetricKind::Untyped) | Err(_) => common::MetricKind::Untyped,
    }
}

pub fn kind_to_proto(kind: common::MetricKind) -> proto::MetricKind {
    match kind {
        common::MetricKind::Counter => proto::MetricKind::Counter,
        common::MetricKind::Gauge => proto::MetricKind::Gauge,
        common::MetricKind::Summary => proto::MetricKind::Summary,
        common::MetricKind::Histogram => proto::MetricKind::Histogram,
        common::MetricKind::Untyped => proto::MetricKind::Untyped,
    }
}

fn sample_from_proto(metric: proto::Metric) -> Option<Sample> {
    let labels = metric
        .label
        .into_iter()
        .map(|label| LabelPair::new(label.name, label.value))
        .collect();

    let value = if let Some(counter) = metric.counter {
        SampleValue::Counter(counter.value)
    } else if let Some(gauge) = metric.gauge {
        SampleValue::Gauge(gauge.value)
    } else if let Some(untyped) = metric.untyped {
        SampleValue::Untyped(untyped.value)
    } else if let Some(histogram) = metric.histogram {
        SampleValue::Histogram {
            sample_count: histogram.sample_count,
            sample_sum: histogram.sample_sum,
            buckets: histogram
                .bucket
                .into_iter()
                .map(|bucket| HistogramBucket {
                    upper_bound: bucket.upper_bound,
                    cumulative_count: bucket.cumulative_count,
                })
                .collect(),
        }
    } else if let Some(summary) = metric.summary {
        SampleValue::Summary {
            sample_count: summary.sample_count,
            sample_sum: summary.sample_sum,
            quantiles: summary
                .quantile
                .into_iter()
                .map(|quantile| Quantile {
                    quantile: quantile.quantile,
                    value: quantile.value,
                })
                .collect(),
        }
    } else {
        return None;
    };

    Some(Sample {
        labels,
        timestamp_ms: metric.timestamp_ms,
        value,
    })
}

fn sample_to_proto(sample: Sample) -> proto::Metric {
    let mut metric = proto::Metric {
        label: sample
            .labels
            .into_iter()
            .map(|label| proto::LabelPair {
                name: label.name,
                value: label.value,
            })
            .collect(),
        timestamp_ms: sample.timestamp_ms,
        ..Default::default()
    };

    match sample.value {
        SampleValue::Counter(value) => metric.counter = Some(proto::Counter { value }),
        SampleValue::Gauge(value) => metric.gauge = Some(proto::Gauge { value }),
        SampleValue::Untyped(value) => metric.untyped = Some(proto::Untyped { value }),
        SampleValue::Histogram {
            sample_count,
            sample_sum,
            buckets,
        } => {
            metric.histogram = Some(proto::Histogram {
                sample_count,
                sample_sum,
                bucket: buckets
                    .into_iter()
                    .map(|bucket| proto::Bucket {
                        cumulative_count: bucket.cumulative_count,
                        upper_bound: bucket.upper_bound,
                    })
                    .collect(),
            });
        }
        SampleValue::Summary {
            sample_count,
            sample_sum,
            quantiles,
        } => {
            metric.summary = Some(proto::Summary {
                sample_count,
                sample_sum,
                quantile: quantiles
                    .into_iter()
                    .map(|quantile| proto::Quantile {
                        quantile: quantile.quantile,
                        value: quantile.value,
                    })
                    .collect(),
            });
        }
    }

    metric
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_counter_family_from_proto() {
        // given
        let families = proto::MetricFamilies {
            families: vec![proto::MetricFamily {
                name: "requests".to_string(),
                help: "Requests.".to_string(),
                kind: proto::MetricKind::Counter as i32,
                metric: vec![proto::Metric {
                    label: vec![proto::LabelPair {
                        name: "code".to_string(),
                        value: "200".to_string(),
                    }],
                    counter: Some(proto::Counter { value: 3.0 }),
                    timestamp_ms: Some(42),
                    ..Default::default()
                }],
            }],
        };

        // when
        let batch = batch_from_proto(families);

        // then
        let family = &batch["requests"];
        assert_eq!(family.kind, common::MetricKind::Counter);
        assert_eq!(family.samples.len(), 1);
        assert_eq!(family.samples[0].timestamp_ms, Some(42));
        assert_eq!(family.samples[0].value, SampleValue::Counter(3.0));
    }

    #[test]
    fn should_merge_repeated_family_names_into_one_batch_entry() {
        // given
        let family = |value: f64| proto::MetricFamily {
            name: "m".to_string(),
            help: String::new(),
            kind: proto::MetricKind::Gauge as i32,
            metric: vec![proto::Metric {
                gauge: Some(proto::Gauge { value }),
                ..Default::default()
            }],
        };

        // when
        let batch = batch_from_proto(proto::MetricFamilies {
            families: vec![family(1.0), family(2.0)],
        });

        // then
        assert_eq!(batch.len(), 1);
        assert_eq!(batch["m"].samples.len(), 2);
    }

    #[test]
    fn should_skip_metric_without_payload() {
        let families = proto::MetricFamilies {
            families: vec![proto::MetricFamily {
                name: "m".to_string(),
                help: String::new(),
                kind: proto::MetricKind::Gauge as i32,
                metric: vec![proto::Metric::default()],
            }],
        };

        let batch = batch_from_proto(families);
        assert!(batch["m"].samples.is_empty());
    }

    #[test]
    fn should_round_trip_histogram_payload() {
        // given
        let original = common::MetricFamily {
            name: "latency".to_string(),
            help: String::new(),
            kind: common::MetricKind::Histogram,
            samples: vec![Sample {
                labels: vec![LabelPair::new("path", "/a")],
                timestamp_ms: Some(7),
                value: SampleValue::Histogram {
                    sample_count: 4,
                    sample_sum: 2.5,
                    buckets: vec![HistogramBucket {
                        upper_bound: f64::INFINITY,
                        cumulative_count: 4,
                    }],
                },
            }],
        };

        // when
        let converted = family_from_proto(family_to_proto(original.clone()));

        // then
        assert_eq!(converted, original);
    }
}
