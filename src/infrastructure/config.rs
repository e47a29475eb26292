use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionModel {
    #[default]
    ThreadPool,
    Process,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_sample_cap")]
    pub sample_cap: usize,
    /// Used for sessions that do not declare a total. Absent means reservoir sampling.
    #[serde(default)]
    pub total_expected_points: Option<u64>,
    #[serde(default = "default_progress_throttle_ms")]
    pub progress_throttle_ms: u64,
    #[serde(default)]
    pub execution_model: ExecutionModel,
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
    #[serde(default = "default_chunk_queue_depth")]
    pub chunk_queue_depth: usize,
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
    #[serde(default)]
    pub worker_binary: Option<PathBuf>,
    #[serde(default = "default_reservoir_seed")]
    pub reservoir_seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_cap: default_sample_cap(),
            total_expected_points: None,
            progress_throttle_ms: default_progress_throttle_ms(),
            execution_model: ExecutionModel::default(),
            worker_pool_size: default_worker_pool_size(),
            chunk_queue_depth: default_chunk_queue_depth(),
            temp_dir: None,
            worker_binary: None,
            reservoir_seed: default_reservoir_seed(),
        }
    }
}

impl PipelineConfig {
    pub fn progress_throttle(&self) -> Duration {
        Duration::from_millis(self.progress_throttle_ms)
    }

    pub fn resolved_temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Worker executable for the process model, defaulting to this binary
    pub fn resolved_worker_binary(&self) -> std::io::Result<PathBuf> {
        match &self.worker_binary {
            Some(path) => Ok(path.clone()),
            None => std::env::current_exe(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_sample_cap() -> usize {
    10_000
}

fn default_progress_throttle_ms() -> u64 {
    200
}

fn default_worker_pool_size() -> usize {
    4
}

fn default_chunk_queue_depth() -> usize {
    16
}

fn default_reservoir_seed() -> u64 {
    0x5eed
}

/// Optional `config/geo_stream.toml`, overridden by `GEO_STREAM__SECTION__KEY` variables
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/geo_stream").required(false))
        .add_source(
            config::Environment::with_prefix("GEO_STREAM")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}
