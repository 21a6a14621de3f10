use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PosebusConfig {
    #[serde(default = "defaults::shm_dir")]
    pub shm_dir: String,
    #[serde(default = "defaults::segment_name")]
    pub segment_name: String,
    #[serde(default = "defaults::lock_name")]
    pub lock_name: String,
    /// 0 waits for the lock forever.
    #[serde(default = "defaults::lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    #[serde(default = "defaults::poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PublisherConfig {
    #[serde(default = "defaults::publish_interval_ms")]
    pub publish_interval_ms: u64,
    /// Upper bound on synthetic persons per frame. Values above the channel
    /// capacity exercise truncation.
    #[serde(default = "defaults::max_persons")]
    pub max_persons: u32,
    #[serde(default = "defaults::fps")]
    pub fps: u32,
    #[serde(default = "defaults::frame_width")]
    pub frame_width: u32,
    #[serde(default = "defaults::frame_height")]
    pub frame_height: u32,
    #[serde(default)]
    pub thumbnails: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),
}

mod defaults {
    pub fn shm_dir() -> String {
        "/dev/shm".into()
    }

    pub fn segment_name() -> String {
        "pose_detection_shm".into()
    }

    pub fn lock_name() -> String {
        "/pose_detection_sem".into()
    }

    pub fn lock_timeout_ms() -> u64 {
        5_000
    }

    pub fn log_level() -> String {
        "info".into()
    }

    pub fn poll_interval_ms() -> u64 {
        100
    }

    pub fn publish_interval_ms() -> u64 {
        33
    }

    pub fn max_persons() -> u32 {
        4
    }

    pub fn fps() -> u32 {
        30
    }

    pub fn frame_width() -> u32 {
        1920
    }

    pub fn frame_height() -> u32 {
        1080
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::poll_interval_ms(),
        }
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            publish_interval_ms: defaults::publish_interval_ms(),
            max_persons: defaults::max_persons(),
            fps: defaults::fps(),
            frame_width: defaults::frame_width(),
            frame_height: defaults::frame_height(),
            thumbnails: false,
        }
    }
}

impl Default for PosebusConfig {
    fn default() -> Self {
        Self {
            shm_dir: defaults::shm_dir(),
            segment_name: defaults::segment_name(),
            lock_name: defaults::lock_name(),
            lock_timeout_ms: defaults::lock_timeout_ms(),
            log_level: defaults::log_level(),
            monitor: MonitorConfig::default(),
            publisher: PublisherConfig::default(),
        }
    }
}

impl PosebusConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let toml_to_str = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&toml_to_str)
    }

    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Loads `path` when given, otherwise the built-in defaults.
    pub fn load_or_default(path: Option<String>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        (self.lock_timeout_ms > 0).then(|| Duration::from_millis(self.lock_timeout_ms))
    }
}
