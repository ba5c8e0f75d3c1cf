//! Prometheus text format parser.
//!
//! Produces a [`FamilyBatch`] from a pushed payload. `# HELP` and `# TYPE`
//! comments set family metadata; histogram and summary families are
//! reassembled from their `_bucket`/`_sum`/`_count` and quantile lines so
//! each label-set yields one composite sample.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use common::{
    labeled_name, FamilyBatch, HistogramBucket, LabelPair, MetricFamily, MetricKind, Quantile,
    Sample, SampleValue,
};

use crate::error::ParseError;

/// Parses a text exposition payload into a batch of metric families.
pub fn parse(input: &[u8]) -> Result<FamilyBatch, ParseError> {
    let text = std::str::from_utf8(input).map_err(|_| ParseError::InvalidUtf8)?;

    let mut parser = Parser::default();
    for (idx, raw) in text.lines().enumerate() {
        parser.line(idx + 1, raw)?;
    }
    Ok(parser.families)
}

#[derive(Default)]
struct Parser {
    families: FamilyBatch,
    /// Families whose kind/help came from an explicit directive. Later
    /// directives for the same family are ignored (first writer wins).
    kind_set: HashSet<String>,
    help_set: HashSet<String>,
    /// (family name, series fingerprint) -> index of the composite sample
    /// being assembled for a histogram or summary series.
    composites: HashMap<(String, String), usize>,
}

enum Suffix {
    None,
    Bucket,
    Sum,
    Count,
}

impl Parser {
    fn line(&mut self, lineno: usize, raw: &str) -> Result<(), ParseError> {
        let line = raw.trim();
        if line.is_empty() {
            return Ok(());
        }
        if let Some(rest) = line.strip_prefix('#') {
            return self.directive(lineno, rest.trim_start());
        }
        self.sample_line(lineno, line)
    }

    fn directive(&mut self, lineno: usize, rest: &str) -> Result<(), ParseError> {
        if let Some(body) = rest.strip_prefix("HELP ") {
            let (name, help) = split_token(body.trim_start());
            if name.is_empty() {
                return Err(syntax(lineno, "expected metric name after HELP"));
            }
            let help = unescape_help(help.trim_start());
            let is_first = self.help_set.insert(name.to_string());
            let family = self.family_entry(name);
            if is_first {
                family.help = help;
            }
            return Ok(());
        }
        if let Some(body) = rest.strip_prefix("TYPE ") {
            let (name, kind) = split_token(body.trim_start());
            if name.is_empty() {
                return Err(syntax(lineno, "expected metric name after TYPE"));
            }
            let kind = MetricKind::parse(kind.trim()).ok_or_else(|| {
                syntax(lineno, &format!("unknown metric type {:?}", kind.trim()))
            })?;
            let is_first = self.kind_set.insert(name.to_string());
            let family = self.family_entry(name);
            if is_first {
                family.kind = kind;
            }
            return Ok(());
        }
        // Any other comment line is skipped.
        Ok(())
    }

    fn family_entry(&mut self, name: &str) -> &mut MetricFamily {
        self.families
            .entry(name.to_string())
            .or_insert_with(|| MetricFamily {
                name: name.to_string(),
                help: String::new(),
                kind: MetricKind::Untyped,
                samples: Vec::new(),
            })
    }

    fn sample_line(&mut self, lineno: usize, line: &str) -> Result<(), ParseError> {
        let (name, rest) = scan_name(line);
        if name.is_empty() {
            return Err(syntax(lineno, "expected metric name"));
        }

        let (labels, rest) = if rest.starts_with('{') {
            scan_labels(lineno, rest)?
        } else {
            (Vec::new(), rest)
        };

        let rest = rest.trim_start();
        let (value_token, rest) = split_token(rest);
        if value_token.is_empty() {
            return Err(syntax(lineno, "expected value"));
        }
        let value: f64 = value_token.parse().map_err(|_| ParseError::InvalidValue {
            line: lineno,
            token: value_token.to_string(),
        })?;

        let timestamp = match rest.trim() {
            "" => None,
            token => Some(token.parse::<i64>().map_err(|_| {
                ParseError::InvalidTimestamp {
                    line: lineno,
                    token: token.to_string(),
                }
            })?),
        };

        self.ingest(lineno, name, labels, value, timestamp)
    }

    fn ingest(
        &mut self,
        lineno: usize,
        metric_name: &str,
        labels: Vec<LabelPair>,
        value: f64,
        timestamp: Option<i64>,
    ) -> Result<(), ParseError> {
        let (family_name, suffix) = self.owning_family(metric_name);
        let kind = self.families[&family_name].kind;

        match kind {
            MetricKind::Counter | MetricKind::Gauge | MetricKind::Untyped => {
                let sample_value = match kind {
                    MetricKind::Counter => SampleValue::Counter(value),
                    MetricKind::Gauge => SampleValue::Gauge(value),
                    _ => SampleValue::Untyped(value),
                };
                let family = self.families.get_mut(&family_name).expect("family exists");
                family.samples.push(Sample {
                    labels,
                    timestamp_ms: timestamp,
                    value: sample_value,
                });
                Ok(())
            }
            MetricKind::Histogram => {
                let (mut labels, le) = extract_label(labels, "le");
                let idx = match suffix {
                    Suffix::Bucket => {
                        let le = le.ok_or_else(|| {
                            syntax(lineno, "expected \"le\" label on histogram bucket")
                        })?;
                        let upper_bound: f64 = le.parse().map_err(|_| {
                            syntax(lineno, &format!("invalid bucket bound {:?}", le))
                        })?;
                        let idx = self.composite_index(&family_name, &mut labels, kind);
                        if let SampleValue::Histogram { buckets, .. } =
                            &mut self.composite_mut(&family_name, idx).value
                        {
                            buckets.push(HistogramBucket {
                                upper_bound,
                                cumulative_count: value as u64,
                            });
                        }
                        idx
                    }
                    Suffix::Sum => {
                        let idx = self.composite_index(&family_name, &mut labels, kind);
                        if let SampleValue::Histogram { sample_sum, .. } =
                            &mut self.composite_mut(&family_name, idx).value
                        {
                            *sample_sum = value;
                        }
                        idx
                    }
                    Suffix::Count => {
                        let idx = self.composite_index(&family_name, &mut labels, kind);
                        if let SampleValue::Histogram { sample_count, .. } =
                            &mut self.composite_mut(&family_name, idx).value
                        {
                            *sample_count = value as u64;
                        }
                        idx
                    }
                    Suffix::None => {
                        return Err(syntax(
                            lineno,
                            &format!(
                                "expected _bucket, _sum or _count line for histogram {:?}",
                                family_name
                            ),
                        ));
                    }
                };
                if timestamp.is_some() {
                    self.composite_mut(&family_name, idx).timestamp_ms = timestamp;
                }
                Ok(())
            }
            MetricKind::Summary => {
                let (mut labels, quantile) = extract_label(labels, "quantile");
                let idx = match suffix {
                    Suffix::None => {
                        let quantile = quantile.ok_or_else(|| {
                            syntax(lineno, "expected \"quantile\" label on summary sample")
                        })?;
                        let quantile: f64 = quantile.parse().map_err(|_| {
                            syntax(lineno, &format!("invalid quantile {:?}", quantile))
                        })?;
                        let idx = self.composite_index(&family_name, &mut labels, kind);
                        if let SampleValue::Summary { quantiles, .. } =
                            &mut self.composite_mut(&family_name, idx).value
                        {
                            quantiles.push(Quantile { quantile, value });
                        }
                        idx
                    }
                    Suffix::Sum => {
                        let idx = self.composite_index(&family_name, &mut labels, kind);
                        if let SampleValue::Summary { sample_sum, .. } =
                            &mut self.composite_mut(&family_name, idx).value
                        {
                            *sample_sum = value;
                        }
                        idx
                    }
                    Suffix::Count => {
                        let idx = self.composite_index(&family_name, &mut labels, kind);
                        if let SampleValue::Summary { sample_count, .. } =
                            &mut self.composite_mut(&family_name, idx).value
                        {
                            *sample_count = value as u64;
                        }
                        idx
                    }
                    Suffix::Bucket => {
                        return Err(syntax(
                            lineno,
                            &format!("unexpected _bucket line for summary {:?}", family_name),
                        ));
                    }
                };
                if timestamp.is_some() {
                    self.composite_mut(&family_name, idx).timestamp_ms = timestamp;
                }
                Ok(())
            }
        }
    }

    /// Resolves the family a metric name belongs to, creating an untyped
    /// family when the name matches nothing known.
    fn owning_family(&mut self, metric_name: &str) -> (String, Suffix) {
        if self.families.contains_key(metric_name) {
            return (metric_name.to_string(), Suffix::None);
        }
        if let Some(base) = metric_name.strip_suffix("_bucket") {
            if self.kind_of(base) == Some(MetricKind::Histogram) {
                return (base.to_string(), Suffix::Bucket);
            }
        }
        if let Some(base) = metric_name.strip_suffix("_sum") {
            if matches!(
                self.kind_of(base),
                Some(MetricKind::Histogram) | Some(MetricKind::Summary)
            ) {
                return (base.to_string(), Suffix::Sum);
            }
        }
        if let Some(base) = metric_name.strip_suffix("_count") {
            if matches!(
                self.kind_of(base),
                Some(MetricKind::Histogram) | Some(MetricKind::Summary)
            ) {
                return (base.to_string(), Suffix::Count);
            }
        }
        self.family_entry(metric_name);
        (metric_name.to_string(), Suffix::None)
    }

    fn kind_of(&self, family: &str) -> Option<MetricKind> {
        self.families.get(family).map(|f| f.kind)
    }

    fn composite_mut(&mut self, family_name: &str, idx: usize) -> &mut Sample {
        &mut self
            .families
            .get_mut(family_name)
            .expect("family exists")
            .samples[idx]
    }

    /// Index of the composite sample for this label-set, created on first
    /// sight with an empty histogram/summary payload.
    fn composite_index(
        &mut self,
        family_name: &str,
        labels: &mut Vec<LabelPair>,
        kind: MetricKind,
    ) -> usize {
        let fingerprint = labeled_name(family_name, labels);
        let family = self.families.get_mut(family_name).expect("family exists");
        match self
            .composites
            .entry((family_name.to_string(), fingerprint))
        {
            Entry::Occupied(occupied) => *occupied.get(),
            Entry::Vacant(vacant) => {
                let value = match kind {
                    MetricKind::Histogram => SampleValue::Histogram {
                        sample_count: 0,
                        sample_sum: 0.0,
                        buckets: Vec::new(),
                    },
                    _ => SampleValue::Summary {
                        sample_count: 0,
                        sample_sum: 0.0,
                        quantiles: Vec::new(),
                    },
                };
                let idx = family.samples.len();
                family.samples.push(Sample {
                    labels: std::mem::take(labels),
                    timestamp_ms: None,
                    value,
                });
                vacant.insert(idx);
                idx
            }
        }
    }
}

fn syntax(line: usize, message: &str) -> ParseError {
    ParseError::Syntax {
        line,
        message: message.to_string(),
    }
}

/// Splits off the leading whitespace-delimited token.
fn split_token(s: &str) -> (&str, &str) {
    match s.find(|c: char| c.is_ascii_whitespace()) {
        Some(idx) => (&s[..idx], &s[idx..]),
        None => (s, ""),
    }
}

/// Scans a metric name prefix, returning it and the remainder.
fn scan_name(s: &str) -> (&str, &str) {
    let mut end = 0;
    for (idx, c) in s.char_indices() {
        let valid = if idx == 0 {
            c.is_ascii_alphabetic() || c == '_' || c == ':'
        } else {
            c.is_ascii_alphanumeric() || c == '_' || c == ':'
        };
        if !valid {
            break;
        }
        end = idx + c.len_utf8();
    }
    s.split_at(end)
}

/// Scans a `{name="value",...}` block. `s` starts at the opening brace.
fn scan_labels(lineno: usize, s: &str) -> Result<(Vec<LabelPair>, &str), ParseError> {
    let mut labels = Vec::new();
    let mut rest = s[1..].trim_start();

    loop {
        if let Some(after) = rest.strip_prefix('}') {
            return Ok((labels, after));
        }

        let (name, after_name) = scan_name(rest);
        if name.is_empty() {
            return Err(syntax(lineno, "expected label name"));
        }
        rest = after_name.trim_start();

        rest = rest
            .strip_prefix('=')
            .ok_or_else(|| syntax(lineno, &format!("expected '=' after label {:?}", name)))?
            .trim_start();

        let (value, after_value) = scan_quoted(lineno, rest)?;
        labels.push(LabelPair::new(name, value));
        rest = after_value.trim_start();

        if let Some(after) = rest.strip_prefix(',') {
            rest = after.trim_start();
        } else if !rest.starts_with('}') {
            return Err(syntax(lineno, "expected ',' or '}' in label block"));
        }
    }
}

/// Scans a quoted, escaped label value. `s` starts at the opening quote.
fn scan_quoted(lineno: usize, s: &str) -> Result<(String, &str), ParseError> {
    let inner = s
        .strip_prefix('"')
        .ok_or_else(|| syntax(lineno, "expected '\"' before label value"))?;

    let mut value = String::new();
    let mut chars = inner.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            '"' => return Ok((value, &inner[idx + 1..])),
            '\\' => match chars.next() {
                Some((_, '\\')) => value.push('\\'),
                Some((_, '"')) => value.push('"'),
                Some((_, 'n')) => value.push('\n'),
                Some((_, other)) => {
                    return Err(syntax(
                        lineno,
                        &format!("invalid escape sequence '\\{}'", other),
                    ));
                }
                None => return Err(syntax(lineno, "unterminated escape sequence")),
            },
            other => value.push(other),
        }
    }
    Err(syntax(lineno, "unterminated label value"))
}

/// Removes the named label from the set, returning its value when present.
fn extract_label(labels: Vec<LabelPair>, name: &str) -> (Vec<LabelPair>, Option<String>) {
    let mut found = None;
    let mut kept = Vec::with_capacity(labels.len());
    for label in labels {
        if label.name == name && found.is_none() {
            found = Some(label.value);
        } else {
            kept.push(label);
        }
    }
    (kept, found)
}

fn unescape_help(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('\\') => out.push('\\'),
                Some('n') => out.push('\n'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUSH: &str = r#"# HELP http_requests_total The total number of HTTP requests.
# TYPE http_requests_total counter
http_requests_total{method="post",code="200"} 1027 1395066363410
http_requests_total{method="post",code="400"}    3 1395066363021
http_requests_total{method="post",code="400"}    3 1395066363010
# HELP cpu_usage The total CPU usage.
# TYPE cpu_usage gauge
cpu_usage{host="A"} 1027 1395066363000
cpu_usage{host="B"}    3 1395066363100
"#;

    #[test]
    fn should_parse_counter_and_gauge_families() {
        // when
        let batch = parse(PUSH.as_bytes()).unwrap();

        // then
        assert_eq!(batch.len(), 2);

        let requests = &batch["http_requests_total"];
        assert_eq!(requests.kind, MetricKind::Counter);
        assert_eq!(requests.help, "The total number of HTTP requests.");
        assert_eq!(requests.samples.len(), 3);
        assert_eq!(requests.samples[0].timestamp_ms, Some(1395066363410));
        assert_eq!(requests.samples[0].value, SampleValue::Counter(1027.0));

        let cpu = &batch["cpu_usage"];
        assert_eq!(cpu.kind, MetricKind::Gauge);
        assert_eq!(cpu.samples.len(), 2);
        assert_eq!(cpu.samples[1].labels, vec![LabelPair::new("host", "B")]);
    }

    #[test]
    fn should_reject_malformed_input() {
        // when
        let err = parse(b"bad metric string").unwrap_err();

        // then
        assert!(matches!(err, ParseError::InvalidValue { line: 1, .. }));
    }

    #[test]
    fn should_reject_invalid_value_with_line_number() {
        let err = parse(b"ok_metric 1\nbroken_metric abc\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidValue {
                line: 2,
                token: "abc".to_string()
            }
        );
    }

    #[test]
    fn should_parse_sample_without_timestamp() {
        let batch = parse(b"requests_total 7\n").unwrap();
        let sample = &batch["requests_total"].samples[0];
        assert_eq!(sample.timestamp_ms, None);
        assert_eq!(sample.value, SampleValue::Untyped(7.0));
    }

    #[test]
    fn should_parse_special_float_values() {
        let text = "a +Inf\nb -Inf\nc NaN\n";
        let batch = parse(text.as_bytes()).unwrap();

        assert_eq!(batch["a"].samples[0].value, SampleValue::Untyped(f64::INFINITY));
        assert_eq!(
            batch["b"].samples[0].value,
            SampleValue::Untyped(f64::NEG_INFINITY)
        );
        match batch["c"].samples[0].value {
            SampleValue::Untyped(v) => assert!(v.is_nan()),
            ref other => panic!("unexpected value {:?}", other),
        }
    }

    #[test]
    fn should_unescape_label_values() {
        let text = "m{msg=\"a\\\\b\\\"c\\nd\"} 1\n";
        let batch = parse(text.as_bytes()).unwrap();
        assert_eq!(batch["m"].samples[0].labels[0].value, "a\\b\"c\nd");
    }

    #[test]
    fn should_reassemble_histogram_lines_into_one_sample() {
        // given
        let text = r#"# TYPE request_duration histogram
request_duration_bucket{le="0.1"} 1 1700000000000
request_duration_bucket{le="0.5"} 3 1700000000000
request_duration_bucket{le="+Inf"} 4 1700000000000
request_duration_sum 2.5 1700000000000
request_duration_count 4 1700000000000
"#;

        // when
        let batch = parse(text.as_bytes()).unwrap();

        // then
        let family = &batch["request_duration"];
        assert_eq!(family.kind, MetricKind::Histogram);
        assert_eq!(family.samples.len(), 1);

        let sample = &family.samples[0];
        assert_eq!(sample.timestamp_ms, Some(1700000000000));
        match &sample.value {
            SampleValue::Histogram {
                sample_count,
                sample_sum,
                buckets,
            } => {
                assert_eq!(*sample_count, 4);
                assert_eq!(*sample_sum, 2.5);
                assert_eq!(buckets.len(), 3);
                assert_eq!(buckets[2].upper_bound, f64::INFINITY);
                assert_eq!(buckets[2].cumulative_count, 4);
            }
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[test]
    fn should_split_histogram_label_sets_into_separate_samples() {
        let text = r#"# TYPE latency histogram
latency_bucket{path="/a",le="+Inf"} 2
latency_bucket{path="/b",le="+Inf"} 5
latency_count{path="/a"} 2
latency_count{path="/b"} 5
"#;
        let batch = parse(text.as_bytes()).unwrap();
        assert_eq!(batch["latency"].samples.len(), 2);
    }

    #[test]
    fn should_reassemble_summary_lines_into_one_sample() {
        // given
        let text = r#"# TYPE rpc_duration summary
rpc_duration{quantile="0.5"} 4.2
rpc_duration{quantile="0.99"} 8.1
rpc_duration_sum 101.5
rpc_duration_count 20
"#;

        // when
        let batch = parse(text.as_bytes()).unwrap();

        // then
        let family = &batch["rpc_duration"];
        assert_eq!(family.samples.len(), 1);
        match &family.samples[0].value {
            SampleValue::Summary {
                sample_count,
                sample_sum,
                quantiles,
            } => {
                assert_eq!(*sample_count, 20);
                assert_eq!(*sample_sum, 101.5);
                assert_eq!(quantiles.len(), 2);
                assert_eq!(quantiles[1].quantile, 0.99);
            }
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[test]
    fn should_ignore_unknown_comments_and_blank_lines() {
        let text = "\n# just a comment\nm 1\n\n";
        let batch = parse(text.as_bytes()).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch["m"].samples.len(), 1);
    }

    #[test]
    fn should_keep_first_type_directive() {
        let text = "# TYPE m counter\nm 1\n# TYPE m gauge\nm 2\n";
        let batch = parse(text.as_bytes()).unwrap();
        assert_eq!(batch["m"].kind, MetricKind::Counter);
        assert_eq!(batch["m"].samples.len(), 2);
    }

    #[test]
    fn should_reject_summary_sample_without_quantile() {
        let text = "# TYPE s summary\ns 1.5\n";
        let err = parse(text.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::Syntax { line: 2, .. }));
    }
}
