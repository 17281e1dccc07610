//! アップロード用ファイル
//!
//! ブラウザの `File` に相当する、ファイル名と中身のペア。

use crate::error::{Result, ValidatorError};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ValidatorError::FileNotFound(path.display().to_string()));
        }

        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(Self { name, bytes })
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
