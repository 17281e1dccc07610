//! ローカルキャッシュ
//!
//! ブラウザの localStorage に相当する保存先。名前空間ごとに1つのJSONファイル
//! （`validador_validations.json` 等）を持ち、中身は
//! タイムスタンプ → データ（+ `savedAt`）のマップ。
//!
//! 書き込みは単一プロセスを前提とし、排他制御はしない。

mod download;

pub use download::DownloadedFile;

use crate::config::Config;
use crate::error::{Result, ValidatorError};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub use layout_validator_common::SAVED_AT_FIELD;
pub const DEFAULT_MAX_DAYS: i64 = 30;

/// 名前空間ごとのマップ
pub type NamespaceMap = Map<String, Value>;

/// キャッシュの名前空間
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Namespace {
    Validations,
    Comparisons,
    Layouts,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [
        Namespace::Validations,
        Namespace::Comparisons,
        Namespace::Layouts,
    ];

    pub fn storage_key(&self) -> &'static str {
        match self {
            Namespace::Validations => "validador_validations",
            Namespace::Comparisons => "validador_comparisons",
            Namespace::Layouts => "validador_layouts",
        }
    }
}

impl std::str::FromStr for Namespace {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "validations" | "validacoes" => Ok(Namespace::Validations),
            "comparisons" | "comparacoes" => Ok(Namespace::Comparisons),
            "layouts" => Ok(Namespace::Layouts),
            _ => Err(format!(
                "Unknown namespace: {}. Use validations, comparisons, or layouts",
                s
            )),
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Namespace::Validations => write!(f, "validations"),
            Namespace::Comparisons => write!(f, "comparisons"),
            Namespace::Layouts => write!(f, "layouts"),
        }
    }
}

/// 件数の集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    pub validations: usize,
    pub comparisons: usize,
    pub layouts: usize,
    pub total: usize,
}

/// ローカルキャッシュ
///
/// 起動時に1つ作り、`Arc` で共有する。
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    download_dir: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            download_dir: download_dir.into(),
        }
    }

    pub fn open(config: &Config) -> Result<Self> {
        Ok(Self::new(config.storage_dir()?, config.download_dir()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn blob_path(&self, namespace: Namespace) -> PathBuf {
        self.root.join(format!("{}.json", namespace.storage_key()))
    }

    /// 名前空間のマップを読み込む（無い・壊れている場合は空）
    fn read_blob(&self, namespace: Namespace) -> NamespaceMap {
        let path = self.blob_path(namespace);
        if !path.exists() {
            return NamespaceMap::new();
        }

        let file = match File::open(&path) {
            Ok(f) => f,
            Err(_) => return NamespaceMap::new(),
        };

        match serde_json::from_reader::<_, Value>(BufReader::new(file)) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!("キャッシュが壊れているため空として扱います: {}", path.display());
                NamespaceMap::new()
            }
        }
    }

    /// 書き込み途中のファイル（同じディレクトリに置き、rename で差し替える）
    pub fn temp_blob_path(&self, namespace: Namespace) -> PathBuf {
        self.root.join(format!(".{}.json.tmp", namespace.storage_key()))
    }

    fn write_blob(&self, namespace: Namespace, map: &NamespaceMap) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        let tmp = self.temp_blob_path(namespace);

        let written = write_json_synced(&tmp, map)
            .and_then(|()| std::fs::rename(&tmp, self.blob_path(namespace)).map_err(Into::into));
        if written.is_err() && tmp.is_file() {
            let _ = std::fs::remove_file(&tmp);
        }
        written
    }

    /// `savedAt` を付けて保存（同じキーは上書き）
    pub fn save(&self, namespace: Namespace, key: &str, data: Value) -> Result<()> {
        self.save_at(namespace, key, data, Utc::now())
    }

    /// `savedAt` を指定して保存
    pub fn save_at(
        &self,
        namespace: Namespace,
        key: &str,
        data: Value,
        saved_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut entry = match data {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        entry.insert(
            SAVED_AT_FIELD.to_string(),
            Value::String(saved_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );

        let mut map = self.read_blob(namespace);
        map.insert(key.to_string(), Value::Object(entry));
        self.write_blob(namespace, &map)?;

        info!("{} に保存しました: {}", namespace, key);
        Ok(())
    }

    pub fn get_all(&self, namespace: Namespace) -> NamespaceMap {
        self.read_blob(namespace)
    }

    pub fn get(&self, namespace: Namespace, key: &str) -> Option<Value> {
        self.read_blob(namespace).remove(key)
    }

    /// エントリを削除。存在した場合は true
    pub fn remove(&self, namespace: Namespace, key: &str) -> Result<bool> {
        let mut map = self.read_blob(namespace);
        let removed = map.remove(key).is_some();
        self.write_blob(namespace, &map)?;

        if removed {
            info!("{} から削除しました: {}", namespace, key);
        }
        Ok(removed)
    }

    pub fn storage_stats(&self) -> StorageStats {
        let validations = self.read_blob(Namespace::Validations).len();
        let comparisons = self.read_blob(Namespace::Comparisons).len();
        let layouts = self.read_blob(Namespace::Layouts).len();

        StorageStats {
            validations,
            comparisons,
            layouts,
            total: validations + comparisons + layouts,
        }
    }

    /// `max_days` 日より古いエントリを削除（validations/comparisonsのみ）
    pub fn clean_old_data(&self, max_days: i64) -> Result<usize> {
        self.clean_old_data_at(max_days, Utc::now())
    }

    /// 基準時刻を指定して古いエントリを削除
    ///
    /// `savedAt` が読めないエントリは残す。戻り値は削除件数。
    pub fn clean_old_data_at(&self, max_days: i64, now: DateTime<Utc>) -> Result<usize> {
        if max_days < 0 {
            return Err(ValidatorError::Config(format!(
                "保持日数は0以上を指定してください: {}",
                max_days
            )));
        }

        // 表現できない過去は「全て期限内」
        let cutoff = match Duration::try_days(max_days).and_then(|d| now.checked_sub_signed(d)) {
            Some(t) => t,
            None => {
                info!("保持日数が大きすぎるため削除しません: {}", max_days);
                return Ok(0);
            }
        };
        let mut removed = 0;

        for namespace in [Namespace::Validations, Namespace::Comparisons] {
            let mut map = self.read_blob(namespace);
            let before = map.len();
            map.retain(|_, entry| match saved_at(entry) {
                Some(t) => t >= cutoff,
                None => true,
            });
            removed += before - map.len();
            self.write_blob(namespace, &map)?;
        }

        info!("{}日より古いデータを削除しました ({}件)", max_days, removed);
        Ok(removed)
    }

    /// 全名前空間を削除
    pub fn clear_all(&self) -> Result<()> {
        for namespace in Namespace::ALL {
            let path = self.blob_path(namespace);
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        info!("ローカルキャッシュを全て削除しました");
        Ok(())
    }
}

fn write_json_synced(path: &Path, map: &NamespaceMap) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, map)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

fn saved_at(entry: &Value) -> Option<DateTime<Utc>> {
    let raw = entry.get(SAVED_AT_FIELD)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
