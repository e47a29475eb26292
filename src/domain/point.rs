// Inbound point and chunk models
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata key carrying a point's type tag
pub const TYPE_TAG_KEY: &str = "type";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
        }
    }

    fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

/// A single geo-tagged measurement. `location` and `value` are optional on
/// the wire so that malformed points can be counted instead of rejected by
/// the deserializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    pub id: String,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub timestamp_ms: i64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// The parts of a point the aggregator needs, present only for valid points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub longitude: f64,
    pub latitude: f64,
    pub value: f64,
}

impl DataPoint {
    pub fn new(id: impl Into<String>, location: Location, value: f64) -> Self {
        Self {
            id: id.into(),
            location: Some(location),
            value: Some(value),
            unit: String::new(),
            timestamp_ms: 0,
            metadata: HashMap::new(),
        }
    }

    pub fn with_type(mut self, tag: impl Into<String>) -> Self {
        self.metadata.insert(TYPE_TAG_KEY.to_string(), tag.into());
        self
    }

    /// Returns `None` when the location is missing or any coordinate/value
    /// is not finite.
    pub fn measurement(&self) -> Option<Measurement> {
        let location = self.location.filter(Location::is_finite)?;
        let value = self.value.filter(|v| v.is_finite())?;
        Some(Measurement {
            longitude: location.longitude,
            latitude: location.latitude,
            value,
        })
    }

    pub fn type_tag(&self) -> Option<&str> {
        self.metadata.get(TYPE_TAG_KEY).map(String::as_str)
    }
}

/// One ordered batch of the stream. `sequence` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    #[serde(default)]
    pub points: Vec<DataPoint>,
    pub sequence: u32,
    pub total_chunks: u32,
    pub points_in_chunk: u32,
    #[serde(default)]
    pub is_final: bool,
}

impl Chunk {
    pub fn new(points: Vec<DataPoint>, sequence: u32, total_chunks: u32) -> Self {
        let points_in_chunk = points.len() as u32;
        Self {
            points,
            sequence,
            total_chunks,
            points_in_chunk,
            is_final: sequence == total_chunks,
        }
    }
}
