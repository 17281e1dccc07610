//! 一時セッションストア
//!
//! ワークフローの2ステップ間でレイアウトを受け渡すための保持領域。
//! 永続化はしない。

use crate::upload::UploadFile;
use serde_json::Value;

/// 保持中のレイアウトの元
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutSource {
    File(UploadFile),
    Filename(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingLayout {
    pub source: LayoutSource,
    /// 解析済みプレビュー
    pub data: Option<Value>,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    pending: Option<PendingLayout>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// ファイルで置き換える（ファイル名のみの保持は破棄）
    pub fn set_layout(&mut self, file: UploadFile, data: Option<Value>) {
        self.pending = Some(PendingLayout {
            source: LayoutSource::File(file),
            data,
        });
    }

    /// ファイル名で置き換える（ファイルの保持は破棄）
    pub fn set_layout_from_filename(&mut self, filename: impl Into<String>, data: Option<Value>) {
        self.pending = Some(PendingLayout {
            source: LayoutSource::Filename(filename.into()),
            data,
        });
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }

    pub fn pending(&self) -> Option<&PendingLayout> {
        self.pending.as_ref()
    }

    pub fn layout_file(&self) -> Option<&UploadFile> {
        match &self.pending.as_ref()?.source {
            LayoutSource::File(file) => Some(file),
            LayoutSource::Filename(_) => None,
        }
    }

    /// ファイル名のみで保持している場合の名前
    pub fn layout_filename(&self) -> Option<&str> {
        match &self.pending.as_ref()?.source {
            LayoutSource::Filename(name) => Some(name),
            LayoutSource::File(_) => None,
        }
    }

    /// どちらの形でも表示用の名前を返す
    pub fn display_name(&self) -> Option<&str> {
        match &self.pending.as_ref()?.source {
            LayoutSource::File(file) => Some(&file.name),
            LayoutSource::Filename(name) => Some(name),
        }
    }

    pub fn layout_data(&self) -> Option<&Value> {
        self.pending.as_ref()?.data.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }
}
