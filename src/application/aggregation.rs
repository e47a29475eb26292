// Per-session aggregation context: statistics plus sampler, one pass per chunk
use crate::application::errors::TransportError;
use crate::domain::point::Chunk;
use crate::domain::result::ProcessingResult;
use crate::domain::sampler::{Sampler, SamplingPlan};
use crate::domain::statistics::RunningStatistics;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Everything an execution unit needs to start a session, fixed up front
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPlan {
    pub request_id: String,
    pub sample_cap: usize,
    pub total_expected_points: Option<u64>,
    pub sampling: SamplingPlan,
}

impl SessionPlan {
    pub fn new(
        request_id: impl Into<String>,
        sample_cap: usize,
        total_expected_points: Option<u64>,
        reservoir_seed: u64,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            sample_cap,
            total_expected_points,
            sampling: SamplingPlan::for_total(total_expected_points, sample_cap, reservoir_seed),
        }
    }
}

/// Outcome of applying one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkReport {
    pub sequence: u32,
    pub total_chunks: u32,
    pub accepted: u64,
    pub invalid: u64,
    /// Valid points seen so far in the whole stream
    pub processed: u64,
}

pub struct Aggregator {
    plan: SessionPlan,
    stats: RunningStatistics,
    sampler: Sampler,
    next_index: u64,
    started: Instant,
}

impl Aggregator {
    pub fn new(plan: SessionPlan) -> Self {
        let sampler = Sampler::new(plan.sampling, plan.sample_cap);
        Self {
            plan,
            stats: RunningStatistics::new(),
            sampler,
            next_index: 0,
            started: Instant::now(),
        }
    }

    pub fn plan(&self) -> &SessionPlan {
        &self.plan
    }

    pub fn stats(&self) -> &RunningStatistics {
        &self.stats
    }

    pub fn sample_len(&self) -> usize {
        self.sampler.len()
    }

    /// Fold a chunk into the session. Malformed points are counted and
    /// skipped; a non-empty chunk with no valid point is rejected whole and
    /// leaves the state untouched.
    pub fn apply_chunk(&mut self, chunk: &Chunk) -> Result<ChunkReport, TransportError> {
        let measurements: Vec<_> = chunk.points.iter().map(|p| p.measurement()).collect();
        let accepted = measurements.iter().filter(|m| m.is_some()).count();
        let invalid = measurements.len() - accepted;

        if accepted == 0 && invalid > 0 {
            return Err(TransportError::AllPointsMalformed {
                sequence: chunk.sequence,
                invalid,
            });
        }

        for (point, measurement) in chunk.points.iter().zip(measurements) {
            let Some(m) = measurement else {
                self.stats.record_invalid();
                continue;
            };
            self.stats.observe(&m, point.type_tag());
            // index runs across chunk boundaries, over valid points only
            self.sampler
                .offer(self.next_index, [m.longitude, m.latitude, m.value]);
            self.next_index += 1;
        }

        Ok(ChunkReport {
            sequence: chunk.sequence,
            total_chunks: chunk.total_chunks,
            accepted: accepted as u64,
            invalid: invalid as u64,
            processed: self.stats.count,
        })
    }

    /// Freeze statistics and sample into the session result
    pub fn finalize(self) -> ProcessingResult {
        let elapsed = self.started.elapsed();
        ProcessingResult::build(&self.stats, self.sampler.finish(), elapsed)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::point::{DataPoint, Location};

    pub(crate) fn make_points(n: usize, offset: usize) -> Vec<DataPoint> {
        (offset..offset + n)
            .map(|i| {
                let tag = ["elevation", "pressure", "noise"][i % 3];
                DataPoint::new(
                    format!("p{i}"),
                    Location::new((i % 90) as f64, (i % 180) as f64 - 90.0),
                    ((i * 37) % 1000) as f64 / 10.0,
                )
                .with_type(tag)
            })
            .collect()
    }

    pub(crate) fn make_chunks(sizes: &[usize]) -> Vec<Chunk> {
        let total = sizes.len() as u32;
        let mut offset = 0;
        sizes
            .iter()
            .enumerate()
            .map(|(i, &n)| {
                let chunk = Chunk::new(make_points(n, offset), i as u32 + 1, total);
                offset += n;
                chunk
            })
            .collect()
    }

    fn run(plan: SessionPlan, chunks: &[Chunk]) -> ProcessingResult {
        let mut agg = Aggregator::new(plan);
        for chunk in chunks {
            agg.apply_chunk(chunk).unwrap();
        }
        agg.finalize()
    }

    #[test]
    fn test_three_chunks_of_500_with_cap_300() {
        let plan = SessionPlan::new("s", 300, Some(1500), 0);
        assert_eq!(plan.sampling, SamplingPlan::Stride { stride: 5 });
        let result = run(plan, &make_chunks(&[500, 500, 500]));
        assert_eq!(result.stats.total_processed, 1500);
        assert_eq!(result.sample.points.len(), 300);
        assert_eq!(result.stats.types.len(), 3);
    }

    #[test]
    fn test_below_cap_keeps_every_point() {
        for sizes in [&[10usize, 20, 5][..], &[35][..], &[1; 35][..]] {
            let plan = SessionPlan::new("s", 100, Some(35), 0);
            let result = run(plan, &make_chunks(sizes));
            assert_eq!(result.sample.points.len(), 35);
            assert_eq!(result.stats.total_processed, 35);
        }
    }

    #[test]
    fn test_partitioning_does_not_change_outcome() {
        let plan = SessionPlan::new("s", 64, Some(1000), 0);
        let whole = run(plan.clone(), &make_chunks(&[1000]));
        for sizes in [&[1usize, 999][..], &[333, 333, 334][..], &[250; 4][..], &[999, 1][..]] {
            let split = run(plan.clone(), &make_chunks(sizes));
            assert_eq!(split.stats.total_processed, whole.stats.total_processed);
            assert_eq!(split.stats.avg_value, whole.stats.avg_value);
            assert_eq!(split.stats.min_value, whole.stats.min_value);
            assert_eq!(split.stats.max_value, whole.stats.max_value);
            assert_eq!(split.stats.types, whole.stats.types);
            assert_eq!(split.sample.points, whole.sample.points);
        }
    }

    #[test]
    fn test_zero_total_disables_sampling() {
        let result = run(SessionPlan::new("s", 100, Some(0), 0), &make_chunks(&[50]));
        assert!(result.sample.points.is_empty());
        assert_eq!(result.stats.total_processed, 50);
    }

    #[test]
    fn test_malformed_points_are_skipped() {
        let mut chunk = make_chunks(&[10]).remove(0);
        chunk.points[3].location = None;
        chunk.points[7].value = Some(f64::INFINITY);

        let mut agg = Aggregator::new(SessionPlan::new("s", 100, Some(10), 0));
        let report = agg.apply_chunk(&chunk).unwrap();
        assert_eq!(report.accepted, 8);
        assert_eq!(report.invalid, 2);
        assert_eq!(report.processed, 8);
        assert_eq!(agg.sample_len(), 8);
        assert_eq!(agg.finalize().stats.invalid_points, 2);
    }

    #[test]
    fn test_all_malformed_chunk_is_rejected_without_side_effects() {
        let mut agg = Aggregator::new(SessionPlan::new("s", 100, Some(10), 0));
        let mut chunk = make_chunks(&[4]).remove(0);
        for p in &mut chunk.points {
            p.value = None;
        }
        let err = agg.apply_chunk(&chunk).unwrap_err();
        assert!(matches!(
            err,
            TransportError::AllPointsMalformed { invalid: 4, .. }
        ));
        assert_eq!(agg.stats().count, 0);
        assert_eq!(agg.stats().invalid, 0);
    }
}
