use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::interaction::SelectionSettings;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "Notewall";
const APP_NAME: &str = "notewall";

pub const DEFAULT_BASE_URL: &str = "http://localhost:5032/api";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load(&self.paths)?;
            self.write_default_config(&default_cfg)?;
            tracing::info!(path = %self.paths.config_file.display(), "wrote default config");
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load(&self.paths)?;
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var("NOTEWALL_CONFIG").ok().map(PathBuf::from);
        let override_data = env::var("NOTEWALL_DATA").ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_root = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        let state_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_root.join("state"));

        Ok(Self::rooted(config_dir, config_file, data_root, state_dir))
    }

    /// Lays out every path under explicit roots.
    pub fn rooted(
        config_dir: PathBuf,
        config_file: PathBuf,
        data_dir: PathBuf,
        state_dir: PathBuf,
    ) -> Self {
        Self {
            config_dir,
            config_file,
            database_path: data_dir.join("notes.db"),
            data_dir,
            log_dir: state_dir.join("logs"),
            state_dir,
        }
    }

    /// Points the data directory (and the database inside it) elsewhere.
    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        self.database_path = data_dir.join("notes.db");
        self.data_dir = data_dir;
        self
    }

    pub fn with_config_file(mut self, config_file: PathBuf) -> Self {
        if let Some(parent) = config_file.parent() {
            self.config_dir = parent.to_path_buf();
        }
        self.config_file = config_file;
        self
    }

    pub fn session_file(&self) -> PathBuf {
        self.state_dir.join("session.token")
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join("notewall.log")
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.log_dir,
            &self.state_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub interaction: InteractionConfig,
    pub storage: StorageOptions,
    pub sync: SyncConfig,
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) -> Result<()> {
        self.storage
            .resolve(paths)
            .context("resolving storage paths")?;
        if self.backend.page_size == 0 {
            tracing::warn!("backend.page_size of 0 is unusable, falling back to 10");
            self.backend.page_size = BackendConfig::default().page_size;
        }
        if self.interaction.tick_ms == 0 {
            self.interaction.tick_ms = InteractionConfig::default().tick_ms;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    #[default]
    Local,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub base_url: String,
    pub page_size: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Local,
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Press-and-hold duration before selection mode starts.
    pub hold_ms: u64,
    /// Pointer travel, in cells, that separates a click from a drag.
    pub drag_threshold: u16,
    pub tick_ms: u64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            hold_ms: 200,
            drag_threshold: 5,
            tick_ms: 50,
        }
    }
}

impl InteractionConfig {
    pub fn selection_settings(&self) -> SelectionSettings {
        SelectionSettings {
            hold: Duration::from_millis(self.hold_ms),
            drag_threshold: self.drag_threshold,
        }
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    #[serde(skip)]
    pub database_path: PathBuf,
    pub wal_autocheckpoint: u32,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            database_path: PathBuf::new(),
            wal_autocheckpoint: 1000,
        }
    }
}

impl StorageOptions {
    fn resolve(&mut self, paths: &ConfigPaths) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            self.database_path = paths.database_path.clone();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Reload the board from the backend after every successful write.
    pub refresh_after_write: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refresh_after_write: true,
        }
    }
}
