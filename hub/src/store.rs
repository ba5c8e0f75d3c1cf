//! Family-and-series store.
//!
//! Buffers pushed samples partitioned by family and canonical series
//! name. Each series queue is kept in non-decreasing timestamp order:
//! in-order samples append in O(1), out-of-order samples binary-search
//! their insertion point.

use std::collections::HashMap;

use common::{labeled_name, FamilyBatch, MetricFamily, MetricKind, Sample};

/// One family's buffered state: metadata fixed at first insertion plus
/// per-series sample queues.
#[derive(Debug, Clone)]
struct FamilyEntry {
    name: String,
    help: String,
    kind: MetricKind,
    series: HashMap<String, Vec<Sample>>,
}

/// Counts over a store snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreCounts {
    pub families: usize,
    pub series: usize,
    pub samples: usize,
}

/// In-memory store mapping family names to per-series sample queues.
#[derive(Debug, Clone, Default)]
pub struct Store {
    families: HashMap<String, FamilyEntry>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a batch of parsed families, returning the number of samples
    /// merged. Family kind and help are set on first insertion and are
    /// not mutated for the lifetime of the family.
    pub fn merge(&mut self, batch: FamilyBatch) -> usize {
        let mut merged = 0;

        for (name, family) in batch {
            merged += family.samples.len();

            let entry = self.families.entry(name).or_insert_with(|| FamilyEntry {
                name: family.name,
                help: family.help,
                kind: family.kind,
                series: HashMap::new(),
            });

            for mut sample in family.samples {
                sample.canonicalize_labels();
                let series_name = labeled_name(&entry.name, &sample.labels);
                let queue = entry.series.entry(series_name).or_default();

                let in_order = queue
                    .last()
                    .map_or(true, |last| sample.order_key() >= last.order_key());
                if in_order {
                    queue.push(sample);
                } else {
                    // First index whose timestamp is strictly greater.
                    let idx = queue.partition_point(|queued| {
                        queued.order_key() <= sample.order_key()
                    });
                    queue.insert(idx, sample);
                }
            }
        }

        merged
    }

    /// Atomically replaces the store with an empty one and returns the
    /// prior contents.
    pub fn drain(&mut self) -> Store {
        Store {
            families: std::mem::take(&mut self.families),
        }
    }

    /// Pure counting pass over the store.
    pub fn count(&self) -> StoreCounts {
        let mut counts = StoreCounts {
            families: self.families.len(),
            ..Default::default()
        };
        for family in self.families.values() {
            counts.series += family.series.len();
            for queue in family.series.values() {
                counts.samples += queue.len();
            }
        }
        counts
    }

    pub fn num_families(&self) -> usize {
        self.families.len()
    }

    /// Flattens each family's queues into one renderable family,
    /// preserving per-series sample order. Series order within a family
    /// is unspecified.
    pub fn flatten(self) -> Vec<MetricFamily> {
        self.families
            .into_values()
            .map(|entry| MetricFamily {
                name: entry.name,
                help: entry.help,
                kind: entry.kind,
                samples: entry.series.into_values().flatten().collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use common::{LabelPair, SampleValue};

    use super::*;

    fn counter_batch(name: &str, samples: Vec<Sample>) -> FamilyBatch {
        let mut batch = FamilyBatch::new();
        batch.insert(
            name.to_string(),
            MetricFamily {
                name: name.to_string(),
                help: String::new(),
                kind: MetricKind::Counter,
                samples,
            },
        );
        batch
    }

    fn sample(timestamp_ms: i64, value: f64) -> Sample {
        Sample {
            labels: vec![],
            timestamp_ms: Some(timestamp_ms),
            value: SampleValue::Counter(value),
        }
    }

    fn labelled(labels: Vec<LabelPair>, timestamp_ms: i64) -> Sample {
        Sample {
            labels,
            timestamp_ms: Some(timestamp_ms),
            value: SampleValue::Counter(1.0),
        }
    }

    fn queue_timestamps(store: Store) -> Vec<i64> {
        let families = store.flatten();
        families[0]
            .samples
            .iter()
            .map(|s| s.timestamp_ms.unwrap())
            .collect()
    }

    #[test]
    fn should_sort_out_of_order_samples() {
        // given samples pushed in the order 3, 1, 2
        let mut store = Store::new();

        // when
        let merged = store.merge(counter_batch(
            "mf1",
            vec![sample(3, 456.0), sample(1, 123.0), sample(2, 234.0)],
        ));

        // then
        assert_eq!(merged, 3);
        assert_eq!(queue_timestamps(store), vec![1, 2, 3]);
    }

    #[test]
    fn should_sorted_insert_into_previously_appended_series() {
        // given an in-order series built across two pushes
        let mut store = Store::new();
        store.merge(counter_batch("mf1", vec![sample(1, 1.0), sample(3, 3.0)]));

        // when a third push lands between the queued timestamps
        store.merge(counter_batch("mf1", vec![sample(2, 2.0)]));

        // then the re-sorted queue is what drains
        assert_eq!(queue_timestamps(store), vec![1, 2, 3]);
    }

    #[test]
    fn should_append_equal_timestamps_after_existing_samples() {
        let mut store = Store::new();
        store.merge(counter_batch("mf1", vec![sample(1, 1.0)]));
        store.merge(counter_batch("mf1", vec![sample(1, 2.0)]));

        let families = store.flatten();
        let values: Vec<f64> = families[0]
            .samples
            .iter()
            .map(|s| match s.value {
                SampleValue::Counter(v) => v,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(values, vec![1.0, 2.0]);
    }

    #[test]
    fn should_collapse_permuted_labels_into_one_series() {
        // given two pushes with the same labels in different orders
        let mut store = Store::new();
        store.merge(counter_batch(
            "m",
            vec![labelled(
                vec![LabelPair::new("a", "1"), LabelPair::new("b", "2")],
                1,
            )],
        ));
        store.merge(counter_batch(
            "m",
            vec![labelled(
                vec![LabelPair::new("b", "2"), LabelPair::new("a", "1")],
                2,
            )],
        ));

        // then
        let counts = store.count();
        assert_eq!(counts.series, 1);
        assert_eq!(counts.samples, 2);
    }

    #[test]
    fn should_keep_family_metadata_from_first_insertion() {
        // given
        let mut store = Store::new();
        let mut first = FamilyBatch::new();
        first.insert(
            "m".to_string(),
            MetricFamily {
                name: "m".to_string(),
                help: "Original help.".to_string(),
                kind: MetricKind::Counter,
                samples: vec![sample(1, 1.0)],
            },
        );
        store.merge(first);

        // when a later push disagrees about the metadata
        let mut second = FamilyBatch::new();
        second.insert(
            "m".to_string(),
            MetricFamily {
                name: "m".to_string(),
                help: "Different help.".to_string(),
                kind: MetricKind::Gauge,
                samples: vec![sample(2, 2.0)],
            },
        );
        store.merge(second);

        // then
        let families = store.flatten();
        assert_eq!(families[0].help, "Original help.");
        assert_eq!(families[0].kind, MetricKind::Counter);
        assert_eq!(families[0].samples.len(), 2);
    }

    #[test]
    fn should_count_families_series_and_samples() {
        let mut store = Store::new();
        store.merge(counter_batch("a", vec![sample(1, 1.0), sample(2, 2.0)]));
        store.merge(counter_batch(
            "b",
            vec![
                labelled(vec![LabelPair::new("host", "A")], 1),
                labelled(vec![LabelPair::new("host", "B")], 1),
            ],
        ));

        assert_eq!(
            store.count(),
            StoreCounts {
                families: 2,
                series: 3,
                samples: 4,
            }
        );
    }

    #[test]
    fn should_leave_store_empty_after_drain() {
        // given
        let mut store = Store::new();
        store.merge(counter_batch("a", vec![sample(1, 1.0)]));

        // when
        let snapshot = store.drain();

        // then
        assert_eq!(snapshot.count().samples, 1);
        assert_eq!(store.count(), StoreCounts::default());
    }
}
