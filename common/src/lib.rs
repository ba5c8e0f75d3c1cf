pub mod clock;
pub mod model;

pub use clock::{Clock, SystemClock};
pub use model::{
    labeled_name, FamilyBatch, HistogramBucket, LabelPair, MetricFamily, MetricKind, Quantile,
    Sample, SampleValue,
};
