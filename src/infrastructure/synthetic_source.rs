// Synthetic grid producer used to drive sessions without an upstream feed
use crate::application::transport::ChunkSource;
use crate::domain::point::{Chunk, DataPoint, Location};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const DEFAULT_MAX_POINTS: u64 = 1000;
const DEFAULT_RESOLUTION: u64 = 20;
const DEFAULT_CHUNK_SIZE: u64 = 25_000;
/// Above this many points the per-point metadata is trimmed
const DETAILED_METADATA_LIMIT: u64 = 50_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
}

impl Default for GridBounds {
    fn default() -> Self {
        Self {
            lat_min: -90.0,
            lat_max: 90.0,
            lng_min: -180.0,
            lng_max: 180.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    #[default]
    Elevation,
    Temperature,
    Pressure,
    Noise,
    SineWave,
}

impl DataType {
    /// Unknown names fall back to elevation
    pub fn parse(name: &str) -> Self {
        match name {
            "temperature" => DataType::Temperature,
            "pressure" => DataType::Pressure,
            "noise" => DataType::Noise,
            "sine_wave" => DataType::SineWave,
            _ => DataType::Elevation,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Elevation => "elevation",
            DataType::Temperature => "temperature",
            DataType::Pressure => "pressure",
            DataType::Noise => "noise",
            DataType::SineWave => "sine_wave",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyntheticRequest {
    pub bounds: GridBounds,
    /// Only the first entry drives generation
    pub data_types: Vec<String>,
    pub max_points: u64,
    pub resolution: u64,
    pub chunk_size: u64,
    pub seed: Option<u64>,
}

/// Streams a `resolution x resolution` lat/lng grid (row-major over
/// longitude), truncated to `max_points`, in fixed-size chunks.
pub struct SyntheticSource {
    bounds: GridBounds,
    data_type: DataType,
    total: u64,
    resolution: u64,
    chunk_size: u64,
    total_chunks: u32,
    next_index: u64,
    next_sequence: u32,
    // time-of-day term for temperature, fixed for the whole stream
    daily_phase: f64,
    rng: StdRng,
}

impl SyntheticSource {
    pub fn new(request: &SyntheticRequest) -> Self {
        let total = if request.max_points == 0 {
            DEFAULT_MAX_POINTS
        } else {
            request.max_points
        };
        let base = if request.resolution == 0 {
            DEFAULT_RESOLUTION
        } else {
            request.resolution
        };
        let resolution = if total <= base * base {
            base
        } else {
            base.max((total as f64).sqrt().floor() as u64 + 1)
        };
        let chunk_size = if request.chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            request.chunk_size
        };
        let total_chunks = total.div_ceil(chunk_size).max(1) as u32;
        let data_type = request
            .data_types
            .first()
            .map(|name| DataType::parse(name))
            .unwrap_or_default();
        let rng = match request.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let seconds_of_day = chrono::Utc::now().timestamp().rem_euclid(86_400) as f64;

        tracing::debug!(
            data_type = data_type.as_str(),
            total,
            resolution,
            total_chunks,
            "Synthetic source prepared"
        );
        Self {
            bounds: request.bounds,
            data_type,
            total,
            resolution,
            chunk_size,
            total_chunks,
            next_index: 0,
            next_sequence: 1,
            daily_phase: seconds_of_day / 86_400.0 * 2.0 * PI,
            rng,
        }
    }

    pub fn resolution(&self) -> u64 {
        self.resolution
    }

    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    fn point(&mut self, index: u64, timestamp_ms: i64) -> DataPoint {
        let i = index / self.resolution;
        let j = index % self.resolution;
        let lng = linspace(self.bounds.lng_min, self.bounds.lng_max, self.resolution, i);
        let lat = linspace(self.bounds.lat_min, self.bounds.lat_max, self.resolution, j);
        let lat_norm = normalize(lat, self.bounds.lat_min, self.bounds.lat_max);
        let lng_norm = normalize(lng, self.bounds.lng_min, self.bounds.lng_max);
        let value = self.value(lat_norm, lng_norm);

        let tag = self.data_type.as_str();
        let mut point = DataPoint::new(index.to_string(), Location::new(lat, lng), value)
            .with_type(tag);
        point.unit = tag.to_string();
        point.timestamp_ms = timestamp_ms;
        point
            .metadata
            .insert("generation_method".to_string(), tag.to_string());
        if self.total <= DETAILED_METADATA_LIMIT {
            point
                .metadata
                .insert("grid_position".to_string(), format!("{i},{j}"));
        }
        point
    }

    fn value(&mut self, lat: f64, lng: f64) -> f64 {
        match self.data_type {
            DataType::Elevation => {
                let terrain = 500.0 * (lat * 2.0 * PI).sin() * (lng * 2.0 * PI).cos()
                    + 200.0 * (lat * 4.0 * PI).sin()
                    + 150.0 * (lng * 3.0 * PI).cos()
                    + self.gaussian(50.0);
                terrain.max(0.0) + 100.0
            }
            DataType::Temperature => {
                25.0 - lat * 30.0 + 5.0 * self.daily_phase.sin() + self.gaussian(3.0)
            }
            DataType::Pressure => {
                1013.25 + 10.0 * (lat * 3.0 * PI).sin() * (lng * 2.0 * PI).cos()
                    + self.gaussian(5.0)
            }
            DataType::Noise => self.rng.gen_range(0.0..100.0),
            DataType::SineWave => 50.0 + 30.0 * (lat * 4.0 * PI).sin() * (lng * 4.0 * PI).sin(),
        }
    }

    /// Zero-mean normal sample (Box-Muller)
    fn gaussian(&mut self, std_dev: f64) -> f64 {
        let u1: f64 = self.rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = self.rng.gen_range(0.0..1.0);
        std_dev * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }
}

#[async_trait]
impl ChunkSource for SyntheticSource {
    fn total_points(&self) -> Option<u64> {
        Some(self.total)
    }

    async fn next_chunk(&mut self) -> anyhow::Result<Option<Chunk>> {
        if self.next_sequence > self.total_chunks {
            return Ok(None);
        }
        let end = (self.next_index + self.chunk_size).min(self.total);
        let timestamp_ms = chrono::Utc::now().timestamp_millis();
        let points = (self.next_index..end)
            .map(|index| self.point(index, timestamp_ms))
            .collect();
        let chunk = Chunk::new(points, self.next_sequence, self.total_chunks);
        self.next_index = end;
        self.next_sequence += 1;
        Ok(Some(chunk))
    }
}

fn linspace(start: f64, end: f64, steps: u64, index: u64) -> f64 {
    if steps <= 1 {
        return start;
    }
    start + (end - start) * index as f64 / (steps - 1) as f64
}

fn normalize(v: f64, min: f64, max: f64) -> f64 {
    let range = max - min;
    if range == 0.0 { 0.0 } else { (v - min) / range }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(max_points: u64, chunk_size: u64, data_type: &str) -> SyntheticRequest {
        SyntheticRequest {
            bounds: GridBounds {
                lat_min: 10.0,
                lat_max: 20.0,
                lng_min: 30.0,
                lng_max: 40.0,
            },
            data_types: vec![data_type.to_string()],
            max_points,
            resolution: 20,
            chunk_size,
            seed: Some(7),
        }
    }

    async fn collect(source: &mut SyntheticSource) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        while let Some(chunk) = source.next_chunk().await.unwrap() {
            chunks.push(chunk);
        }
        chunks
    }

    #[test]
    fn test_resolution_grows_with_point_count() {
        assert_eq!(SyntheticSource::new(&request(400, 0, "noise")).resolution(), 20);
        assert_eq!(SyntheticSource::new(&request(401, 0, "noise")).resolution(), 21);
        assert_eq!(SyntheticSource::new(&request(10_000, 0, "noise")).resolution(), 101);
    }

    #[test]
    fn test_defaults_apply_to_zero_fields() {
        let source = SyntheticSource::new(&SyntheticRequest::default());
        assert_eq!(source.total_points(), Some(1000));
        assert_eq!(source.total_chunks(), 1);
        assert_eq!(source.data_type, DataType::Elevation);
    }

    #[test]
    fn test_unknown_data_type_falls_back_to_elevation() {
        assert_eq!(DataType::parse("humidity"), DataType::Elevation);
        assert_eq!(DataType::parse("sine_wave"), DataType::SineWave);
    }

    #[tokio::test]
    async fn test_chunks_cover_requested_points_in_order() {
        let mut source = SyntheticSource::new(&request(1050, 500, "temperature"));
        let chunks = collect(&mut source).await;

        let sizes: Vec<_> = chunks.iter().map(|c| c.points.len()).collect();
        assert_eq!(sizes, vec![500, 500, 50]);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence, i as u32 + 1);
            assert_eq!(chunk.total_chunks, 3);
            assert_eq!(chunk.points_in_chunk as usize, chunk.points.len());
            assert_eq!(chunk.is_final, i == 2);
        }
        let ids: Vec<_> = chunks
            .iter()
            .flat_map(|c| c.points.iter().map(|p| p.id.parse::<u64>().unwrap()))
            .collect();
        assert_eq!(ids, (0..1050).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_points_stay_within_bounds_and_are_tagged() {
        let mut source = SyntheticSource::new(&request(400, 0, "sine_wave"));
        let chunk = source.next_chunk().await.unwrap().unwrap();
        assert!(source.next_chunk().await.unwrap().is_none());

        for point in &chunk.points {
            let m = point.measurement().unwrap();
            assert!((10.0..=20.0).contains(&m.latitude));
            assert!((30.0..=40.0).contains(&m.longitude));
            assert!((20.0..=80.0).contains(&m.value));
            assert_eq!(point.type_tag(), Some("sine_wave"));
            assert_eq!(point.metadata["generation_method"], "sine_wave");
        }
        // outer axis is longitude
        assert_eq!(chunk.points[0].metadata["grid_position"], "0,0");
        let second_row = &chunk.points[20];
        assert_eq!(second_row.metadata["grid_position"], "1,0");
        assert_eq!(second_row.location.unwrap().latitude, 10.0);
    }

    #[tokio::test]
    async fn test_seeded_noise_is_reproducible() {
        let mut a = SyntheticSource::new(&request(50, 0, "noise"));
        let mut b = SyntheticSource::new(&request(50, 0, "noise"));
        let values = |c: Chunk| c.points.iter().map(|p| p.value.unwrap()).collect::<Vec<_>>();
        let va = values(a.next_chunk().await.unwrap().unwrap());
        let vb = values(b.next_chunk().await.unwrap().unwrap());
        assert_eq!(va, vb);
        assert!(va.iter().all(|v| (0.0..100.0).contains(v)));
    }

    #[test]
    fn test_elevation_stays_above_sea_level() {
        let mut source = SyntheticSource::new(&request(100, 0, "elevation"));
        for index in 0..100 {
            assert!(source.point(index, 0).value.unwrap() >= 100.0);
        }
    }
}
