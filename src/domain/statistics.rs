// Running statistics over every valid point of a stream
use super::point::Measurement;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Inclusive min/max pair. Empty until the first observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min: f64,
    pub max: f64,
}

impl Extent {
    fn empty() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn observe(&mut self, v: f64) {
        self.min = self.min.min(v);
        self.max = self.max.max(v);
    }

    fn merge(&mut self, other: &Extent) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// `[min, max]`, or `[0, 0]` when nothing was observed
    pub fn as_pair(&self) -> [f64; 2] {
        if self.min > self.max {
            [0.0, 0.0]
        } else {
            [self.min, self.max]
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningStatistics {
    pub count: u64,
    pub sum: f64,
    pub value: Extent,
    pub latitude: Extent,
    pub longitude: Extent,
    pub types: BTreeSet<String>,
    pub invalid: u64,
}

impl Default for RunningStatistics {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            value: Extent::empty(),
            latitude: Extent::empty(),
            longitude: Extent::empty(),
            types: BTreeSet::new(),
            invalid: 0,
        }
    }
}

impl RunningStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, m: &Measurement, type_tag: Option<&str>) {
        self.count += 1;
        self.sum += m.value;
        self.value.observe(m.value);
        self.latitude.observe(m.latitude);
        self.longitude.observe(m.longitude);
        if let Some(tag) = type_tag {
            if !self.types.contains(tag) {
                self.types.insert(tag.to_string());
            }
        }
    }

    pub fn record_invalid(&mut self) {
        self.invalid += 1;
    }

    /// Combine two partial aggregates. count/sum/min/max are associative so
    /// the result does not depend on how the stream was split.
    pub fn merge(&mut self, other: &RunningStatistics) {
        self.count += other.count;
        self.sum += other.sum;
        self.value.merge(&other.value);
        self.latitude.merge(&other.latitude);
        self.longitude.merge(&other.longitude);
        self.types.extend(other.types.iter().cloned());
        self.invalid += other.invalid;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn min_value(&self) -> f64 {
        self.value.as_pair()[0]
    }

    pub fn max_value(&self) -> f64 {
        self.value.as_pair()[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(lng: f64, lat: f64, value: f64) -> Measurement {
        Measurement {
            longitude: lng,
            latitude: lat,
            value,
        }
    }

    #[test]
    fn test_observe_tracks_value_and_spatial_extents() {
        let mut stats = RunningStatistics::new();
        stats.observe(&m(10.0, -5.0, 3.0), Some("temperature"));
        stats.observe(&m(-20.0, 40.0, -1.5), Some("temperature"));
        stats.observe(&m(0.0, 0.0, 9.0), None);

        assert_eq!(stats.count, 3);
        assert_eq!(stats.sum, 10.5);
        assert_eq!(stats.mean(), 3.5);
        assert_eq!(stats.value.as_pair(), [-1.5, 9.0]);
        assert_eq!(stats.longitude.as_pair(), [-20.0, 10.0]);
        assert_eq!(stats.latitude.as_pair(), [-5.0, 40.0]);
        assert_eq!(stats.types.len(), 1);
    }

    #[test]
    fn test_empty_statistics_report_zeroes() {
        let stats = RunningStatistics::new();
        assert_eq!(stats.mean(), 0.0);
        assert_eq!(stats.min_value(), 0.0);
        assert_eq!(stats.max_value(), 0.0);
    }

    #[test]
    fn test_merge_is_independent_of_split_point() {
        let points: Vec<Measurement> = (0..50)
            .map(|i| m(i as f64 * 0.5, -(i as f64), ((i * 7) % 13) as f64 - 6.0))
            .collect();
        let tag = |i: usize| ["a", "b", "c"][i % 3];

        let mut whole = RunningStatistics::new();
        for (i, p) in points.iter().enumerate() {
            whole.observe(p, Some(tag(i)));
        }

        for split in [0, 1, 17, 49, 50] {
            let mut left = RunningStatistics::new();
            let mut right = RunningStatistics::new();
            for (i, p) in points.iter().enumerate() {
                let side = if i < split { &mut left } else { &mut right };
                side.observe(p, Some(tag(i)));
            }
            left.merge(&right);
            assert_eq!(left.count, whole.count);
            assert_eq!(left.sum, whole.sum);
            assert_eq!(left.value, whole.value);
            assert_eq!(left.types, whole.types);
        }
    }
}
