// Application layer - Session orchestration and aggregation use cases
pub mod aggregation;
pub mod errors;
pub mod execution;
pub mod progress;
pub mod session_manager;
pub mod transport;
