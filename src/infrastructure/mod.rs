// Infrastructure layer - configuration, process plumbing and HTTP encoding
pub mod chunked_frames;
pub mod config;
pub mod framing;
pub mod http_response;
pub mod logging;
pub mod process_unit;
pub mod synthetic_source;
pub mod worker;
