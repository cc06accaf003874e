use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::{ProjectDirs, UserDirs};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::filter::ResolutionFilter;

pub const DEFAULT_SOURCE: &str = "wallpapers";
/// Request budget of one cycle, split across sources.
pub const DEFAULT_TOTAL_LIMIT: usize = 50;
pub const MIN_PER_SOURCE_LIMIT: usize = 10;
pub const MAX_ITEMS: usize = 18;
pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

/// User preferences persisted across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub wallpaper_dir: PathBuf,
    pub default_sources: Vec<String>,
    pub theme: Theme,
    pub resolution: Option<ResolutionFilter>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            wallpaper_dir: default_wallpaper_dir(),
            default_sources: vec![DEFAULT_SOURCE.to_string()],
            theme: Theme::default(),
            resolution: None,
        }
    }
}

fn default_wallpaper_dir() -> PathBuf {
    if let Some(user_dirs) = UserDirs::new() {
        if let Some(pictures) = user_dirs.picture_dir() {
            return pictures.join("redwall");
        }
        return user_dirs.home_dir().join("Pictures").join("redwall");
    }
    ProjectDirs::from("com", "redwall", "redwall")
        .map(|dirs| dirs.config_dir().join("wallpapers"))
        .unwrap_or_else(|| PathBuf::from("redwall-wallpapers"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    /// Extra attempts after the first one.
    pub retries: u32,
    pub backoff_millis: u64,
}

impl NetworkSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_millis)
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
            retries: 2,
            backoff_millis: 500,
        }
    }
}

/// Which cursor the next cycle starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorPolicy {
    /// Every source continues from the cursor of the last source that
    /// returned posts. Other feeds may still have unread pages.
    #[default]
    LastSource,
    /// Each source keeps the cursor its own feed returned.
    PerSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorSettings {
    pub total_limit: usize,
    pub max_items: usize,
    pub workers: usize,
    pub cursor_policy: CursorPolicy,
    /// Fixed shuffle seed, for reproducible ordering.
    pub shuffle_seed: Option<u64>,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            total_limit: DEFAULT_TOTAL_LIMIT,
            max_items: MAX_ITEMS,
            workers: DEFAULT_WORKERS,
            cursor_policy: CursorPolicy::default(),
            shuffle_seed: None,
        }
    }
}

#[derive(Debug)]
pub struct Config {
    pub config_dir: PathBuf,
    pub preferences_file: PathBuf,
    pub preferences: Preferences,
    pub network: NetworkSettings,
    pub aggregator: AggregatorSettings,
}

impl Config {
    pub fn new() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("com", "redwall", "redwall")
            .ok_or_else(|| Error::Config("failed to get project directories".to_string()))?;
        Self::load_from(proj_dirs.config_dir())
    }

    /// Loads `preferences.json` from `config_dir`, falling back to defaults
    /// when the file does not exist yet.
    pub fn load_from(config_dir: &Path) -> Result<Self> {
        fs::create_dir_all(config_dir)?;
        let preferences_file = config_dir.join("preferences.json");

        let preferences = if preferences_file.exists() {
            let content = fs::read_to_string(&preferences_file)?;
            serde_json::from_str(&content).map_err(|e| {
                Error::Config(format!("{}: {e}", preferences_file.display()))
            })?
        } else {
            debug!("No preferences at {}, using defaults", preferences_file.display());
            Preferences::default()
        };

        Ok(Self {
            config_dir: config_dir.to_path_buf(),
            preferences_file,
            preferences,
            network: NetworkSettings::default(),
            aggregator: AggregatorSettings::default(),
        })
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.preferences)
            .map_err(|e| Error::Config(e.to_string()))?;
        fs::write(&self.preferences_file, content + "\n")?;
        info!("Saved preferences to {}", self.preferences_file.display());
        Ok(())
    }

    pub fn wallpaper_dir(&self) -> &Path {
        &self.preferences.wallpaper_dir
    }

    /// Where explicit downloads land unless the caller picks a directory.
    pub fn download_dir(&self) -> PathBuf {
        UserDirs::new()
            .and_then(|dirs| {
                dirs.download_dir()
                    .map(Path::to_path_buf)
                    .or_else(|| Some(dirs.home_dir().join("Downloads")))
            })
            .unwrap_or_else(|| self.preferences.wallpaper_dir.clone())
    }
}
