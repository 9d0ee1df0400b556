use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

fn default_web_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_max_file_size() -> u64 {
    2 * 1024 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    ["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm", "m4v"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default)]
    pub prometheus_bind: Option<SocketAddr>,
    #[serde(default = "default_web_bind")]
    pub web_bind: SocketAddr,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Upper bound in bytes for a single uploaded video.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Lower-case extensions (without the dot) accepted on upload.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    // empty means any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// Directory served for any path not matched by the API, e.g. a browser UI.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prometheus_bind: None,
            web_bind: default_web_bind(),
            upload_dir: default_upload_dir(),
            max_file_size: default_max_file_size(),
            allowed_extensions: default_allowed_extensions(),
            allowed_origins: vec![],
            static_dir: None,
        }
    }
}

impl Config {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(raw).context("failed to parse config file")?;
        for extension in &mut config.allowed_extensions {
            *extension = extension.trim_start_matches('.').to_lowercase();
        }
        Ok(config)
    }

    /// Loads the config file at `path`. A missing file yields the defaults when `required` is false.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        if !required && !path.exists() {
            return Ok(Config::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        Self::parse(&raw)
    }
}
