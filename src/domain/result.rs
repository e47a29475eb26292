// Finalized session result and paginated sample views
use super::sampler::SamplePoint;
use super::statistics::RunningStatistics;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub total_processed: u64,
    pub invalid_points: u64,
    pub avg_value: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub types: Vec<String>,
    pub processing_time_sec: f64,
    pub points_per_second: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lng: [f64; 2],
    pub lat: [f64; 2],
    pub value: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleMeta {
    pub total_points: u64,
    pub sample_size: u64,
    pub sampling_ratio: f64,
    pub bounds: Bounds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSet {
    pub kind: String,
    pub points: Vec<SamplePoint>,
    pub meta: SampleMeta,
}

/// Immutable snapshot produced once per completed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub stats: StatsSummary,
    pub sample: SampleSet,
}

impl ProcessingResult {
    /// Bounds come from the full-stream statistics, never from the sample,
    /// so extremes that were not sampled are still reported.
    pub fn build(stats: &RunningStatistics, points: Vec<SamplePoint>, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        let points_per_second = if secs > 0.0 {
            (stats.count as f64 / secs) as u64
        } else {
            0
        };
        let sample_size = points.len() as u64;
        let sampling_ratio = if stats.count == 0 {
            0.0
        } else {
            sample_size as f64 / stats.count as f64
        };

        Self {
            stats: StatsSummary {
                total_processed: stats.count,
                invalid_points: stats.invalid,
                avg_value: stats.mean(),
                min_value: stats.min_value(),
                max_value: stats.max_value(),
                types: stats.types.iter().cloned().collect(),
                processing_time_sec: secs,
                points_per_second,
            },
            sample: SampleSet {
                kind: "scatter".to_string(),
                points,
                meta: SampleMeta {
                    total_points: stats.count,
                    sample_size,
                    sampling_ratio,
                    bounds: Bounds {
                        lng: stats.longitude.as_pair(),
                        lat: stats.latitude.as_pair(),
                        value: stats.value.as_pair(),
                    },
                },
            },
        }
    }

    pub fn summary(&self) -> ResultSummary {
        ResultSummary {
            stats: self.stats.clone(),
            kind: self.sample.kind.clone(),
            meta: self.sample.meta.clone(),
        }
    }

    /// Slice the sample. `next_offset` is 0 once the last page is served.
    pub fn page(&self, offset: usize, chunk_size: usize) -> Page {
        let total = self.sample.points.len();
        let start = offset.min(total);
        let end = start.saturating_add(chunk_size).min(total);
        let is_complete = end >= total;
        Page {
            chunk: self.sample.points[start..end].to_vec(),
            next_offset: if is_complete { 0 } else { end as u64 },
            is_complete,
            error: None,
        }
    }
}

/// Result without the sample points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub stats: StatsSummary,
    pub kind: String,
    pub meta: SampleMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub chunk: Vec<SamplePoint>,
    pub next_offset: u64,
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Page {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            chunk: Vec::new(),
            next_offset: 0,
            is_complete: true,
            error: Some(message.into()),
        }
    }
}
