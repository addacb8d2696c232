use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub host: HostConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory for the search snapshot file.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_refresh_interval_hours")]
    pub refresh_interval_hours: i64,
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("camppics")
}

fn default_refresh_interval_hours() -> i64 {
    24
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            refresh_interval_hours: default_refresh_interval_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Base URL of the media host's JSON API.
    #[serde(default = "default_host_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub api_secret: String,

    /// Host-side folder all photos are uploaded into.
    #[serde(default = "default_host_folder")]
    pub folder: String,

    #[serde(default = "default_watermark_text")]
    pub watermark_text: String,

    /// Uploads are resized so neither dimension exceeds this.
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
}

fn default_host_endpoint() -> String {
    "https://api.cloudinary.com/v1_1/camppics".to_string()
}

fn default_host_folder() -> String {
    "camp-parks".to_string()
}

fn default_watermark_text() -> String {
    "CampPics.ca".to_string()
}

fn default_max_dimension() -> u32 {
    1500
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            endpoint: default_host_endpoint(),
            api_key: String::new(),
            api_secret: String::new(),
            folder: default_host_folder(),
            watermark_text: default_watermark_text(),
            max_dimension: default_max_dimension(),
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("camppics")
        .join("camppics.db")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache: CacheConfig::default(),
            host: HostConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("camppics")
            .join("config.toml")
    }
}
