use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Estimator timing and bounds (`[estimator]` section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Sampler period in milliseconds.
    pub tick_interval_ms: u64,
    /// Hard ceiling on a job's lifetime, measured from its creation.
    pub hard_ceiling_secs: u64,
    /// Persisted records older than this are discarded instead of resumed.
    pub resume_window_secs: u64,
    /// Largest `target_count` accepted by `start()`.
    pub max_target_count: u64,
    /// Number of human-readable tick events kept per job.
    pub event_log_capacity: usize,
    /// Number of throughput points kept per job (one per tick).
    pub history_capacity: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            hard_ceiling_secs: 120,
            resume_window_secs: 120,
            max_target_count: 100_000,
            event_log_capacity: 200,
            history_capacity: 60,
        }
    }
}

impl EstimatorConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn hard_ceiling(&self) -> Duration {
        Duration::from_secs(self.hard_ceiling_secs)
    }

    pub fn hard_ceiling_ms(&self) -> i64 {
        self.hard_ceiling_secs.saturating_mul(1_000) as i64
    }

    pub fn resume_window_ms(&self) -> i64 {
        self.resume_window_secs.saturating_mul(1_000) as i64
    }
}

/// Campaign REST API endpoints (`[api]` section in config.toml).
///
/// Paths contain an `{id}` placeholder that is replaced with the resource id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// GET endpoint returning the resource's realtime status.
    pub status_path: String,
    /// POST endpoint that asks the server to start draining the resource.
    pub submit_path: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            status_path: "/api/campaigns/{id}/status".to_string(),
            submit_path: "/api/admin/batch/simulate/{id}".to_string(),
            connect_timeout_secs: 5,
            request_timeout_secs: 10,
        }
    }
}

impl ApiConfig {
    /// Full status URL for a resource.
    pub fn status_url(&self, resource_id: &str) -> String {
        self.join(&self.status_path, resource_id)
    }

    /// Full submit URL for a resource.
    pub fn submit_url(&self, resource_id: &str) -> String {
        self.join(&self.submit_path, resource_id)
    }

    fn join(&self, path: &str, resource_id: &str) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            path.replace("{id}", resource_id)
        )
    }
}

/// Global configuration loaded from `~/.config/drainwatch/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrainwatchConfig {
    #[serde(default)]
    pub estimator: EstimatorConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("drainwatch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<DrainwatchConfig> {
    load_or_init_at(&config_path()?)
}

/// Same as [`load_or_init`] but at an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<DrainwatchConfig> {
    if !path.exists() {
        let default_cfg = DrainwatchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create dir: {}", parent.display()))?;
        }
        fs::write(path, toml).with_context(|| format!("write config: {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data =
        fs::read_to_string(path).with_context(|| format!("read config: {}", path.display()))?;
    let cfg: DrainwatchConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}
