// Domain layer - Plain data types for the aggregation pipeline
pub mod point;
pub mod progress;
pub mod result;
pub mod sampler;
pub mod session;
pub mod statistics;
