// Bounded single-pass samplers feeding the visualization buffer
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// `[longitude, latitude, value]`
pub type SamplePoint = [f64; 3];

/// How a session picks its sample. Fixed once at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "mode")]
pub enum SamplingPlan {
    /// Total declared as zero, or a zero cap: statistics only
    Disabled,
    /// Keep every `stride`-th point until the cap is reached
    Stride { stride: u64 },
    /// Total unknown: Algorithm R over the whole stream
    Reservoir { seed: u64 },
}

impl SamplingPlan {
    pub fn for_total(total_expected_points: Option<u64>, sample_cap: usize, seed: u64) -> Self {
        if sample_cap == 0 {
            return SamplingPlan::Disabled;
        }
        match total_expected_points {
            Some(0) => SamplingPlan::Disabled,
            Some(total) => SamplingPlan::Stride {
                stride: (total / sample_cap as u64).max(1),
            },
            None => SamplingPlan::Reservoir { seed },
        }
    }
}

enum Strategy {
    Disabled,
    Stride { stride: u64 },
    Reservoir {
        rng: StdRng,
        // stream index kept so the final sample comes out in arrival order
        slots: Vec<(u64, SamplePoint)>,
    },
}

pub struct Sampler {
    cap: usize,
    strategy: Strategy,
    buffer: Vec<SamplePoint>,
}

impl Sampler {
    pub fn new(plan: SamplingPlan, cap: usize) -> Self {
        let strategy = match plan {
            SamplingPlan::Disabled => Strategy::Disabled,
            SamplingPlan::Stride { stride } => Strategy::Stride {
                stride: stride.max(1),
            },
            SamplingPlan::Reservoir { seed } => Strategy::Reservoir {
                rng: StdRng::seed_from_u64(seed),
                slots: Vec::with_capacity(cap.min(1 << 16)),
            },
        };
        Self {
            cap,
            strategy,
            buffer: Vec::new(),
        }
    }

    /// Offer the point at 0-based stream position `index`. Indices must be
    /// offered in increasing order.
    pub fn offer(&mut self, index: u64, point: SamplePoint) {
        match &mut self.strategy {
            Strategy::Disabled => {}
            Strategy::Stride { stride } => {
                if index % *stride == 0 && self.buffer.len() < self.cap {
                    self.buffer.push(point);
                }
            }
            Strategy::Reservoir { rng, slots } => {
                if slots.len() < self.cap {
                    slots.push((index, point));
                } else {
                    let j = rng.gen_range(0..=index);
                    if (j as usize) < self.cap {
                        slots[j as usize] = (index, point);
                    }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        match &self.strategy {
            Strategy::Reservoir { slots, .. } => slots.len(),
            _ => self.buffer.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Freeze the sample in stream order
    pub fn finish(self) -> Vec<SamplePoint> {
        match self.strategy {
            Strategy::Reservoir { mut slots, .. } => {
                slots.sort_by_key(|(index, _)| *index);
                slots.into_iter().map(|(_, p)| p).collect()
            }
            _ => self.buffer,
        }
    }
}
