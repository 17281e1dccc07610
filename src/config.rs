use crate::error::{Result, ValidatorError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ORIGIN: &str = "http://localhost:8000";
/// 大きなファイルのアップロードに合わせて5分
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 300;
pub const DEFAULT_MAX_ERRORS: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `/api` を付けて既定のベースURLにする
    pub origin: String,
    /// 明示的なAPIのURL
    pub api_url: Option<String>,
    /// 開発モードでも `api_url` を使う
    pub force_api_url: bool,
    pub dev_mode: bool,
    pub timeout_seconds: u64,
    pub default_max_errors: u32,
    pub storage_dir: Option<PathBuf>,
    pub download_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.into(),
            api_url: None,
            force_api_url: false,
            dev_mode: false,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            default_max_errors: DEFAULT_MAX_ERRORS,
            storage_dir: None,
            download_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &std::path::Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &std::path::Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ValidatorError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("layout-validator").join("config.json"))
    }

    /// 環境変数で上書き
    pub fn apply_env(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    pub fn apply_env_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("VALIDADOR_API_URL").filter(|u| !u.trim().is_empty()) {
            self.api_url = Some(url);
        }
        // 'true' のときだけ有効
        if let Some(force) = lookup("VALIDADOR_FORCE_API_URL") {
            self.force_api_url = force == "true";
        }
        if let Some(dev) = lookup("VALIDADOR_DEV") {
            self.dev_mode = dev == "true" || dev == "1";
        }
        if let Some(dir) = lookup("VALIDADOR_STORAGE_DIR").filter(|d| !d.is_empty()) {
            self.storage_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = lookup("VALIDADOR_DOWNLOAD_DIR").filter(|d| !d.is_empty()) {
            self.download_dir = Some(PathBuf::from(dir));
        }
        self
    }

    /// APIのベースURLを解決
    ///
    /// - 既定: `<origin>/api`
    /// - 通常モード: `api_url` があればそれを使う
    /// - 開発モード: `force_api_url` が true のときだけ `api_url` を使う
    pub fn base_url(&self) -> String {
        let relative = format!("{}/api", self.origin.trim_end_matches('/'));
        let explicit = self
            .api_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty());

        match explicit {
            Some(url) if !self.dev_mode || self.force_api_url => {
                url.trim_end_matches('/').to_string()
            }
            _ => relative,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn storage_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.storage_dir {
            return Ok(dir.clone());
        }
        let base = dirs::data_dir()
            .ok_or_else(|| ValidatorError::Config("データディレクトリが見つかりません".into()))?;
        Ok(base.join("layout-validator"))
    }

    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
