//! クライアント側ダウンロード
//!
//! ブラウザのBlob + aタグによる保存の代わりに、ダウンロード先ディレクトリへ
//! ファイルを書き出す。失敗時は原因をログに出し、汎用メッセージで返す。

use super::LocalStore;
use crate::error::{Result, ValidatorError};
use base64::Engine;
use layout_validator_common::report::{MIME_CSV, MIME_EXCEL, MIME_TEXT};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// 書き出したファイル
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub mime_type: String,
    pub size: u64,
}

/// Data URL (`data:...;base64,XXXX`) ならデータ部分だけ取り出す
fn strip_data_url(data: &str) -> &str {
    match data.split_once("base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => data,
    }
}

fn decode_base64(data: &str) -> std::result::Result<Vec<u8>, String> {
    let cleaned: String = strip_data_url(data)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    base64::engine::general_purpose::STANDARD
        .decode(cleaned)
        .map_err(|e| format!("Base64デコードエラー: {}", e))
}

impl LocalStore {
    /// Base64のExcelを保存
    pub fn download_excel(&self, base64_data: &str, filename: &str) -> Result<DownloadedFile> {
        let bytes = decode_base64(base64_data).map_err(|cause| {
            error!("Excelダウンロードエラー: {}", cause);
            ValidatorError::DownloadFailure("Falha ao baixar arquivo Excel".into())
        })?;
        self.write_download(&bytes, filename, MIME_EXCEL, "Falha ao baixar arquivo Excel")
    }

    pub fn download_text(&self, content: &str, filename: &str) -> Result<DownloadedFile> {
        self.write_download(
            content.as_bytes(),
            filename,
            MIME_TEXT,
            "Falha ao baixar arquivo de texto",
        )
    }

    pub fn download_csv(&self, content: &str, filename: &str) -> Result<DownloadedFile> {
        self.write_download(content.as_bytes(), filename, MIME_CSV, "Falha ao baixar arquivo CSV")
    }

    /// 任意のバイト列を保存（サーバーから取得したレポート等）
    pub fn download_bytes(
        &self,
        bytes: &[u8],
        filename: &str,
        mime_type: &str,
    ) -> Result<DownloadedFile> {
        self.write_download(bytes, filename, mime_type, "Falha ao baixar arquivo")
    }

    fn write_download(
        &self,
        bytes: &[u8],
        filename: &str,
        mime_type: &str,
        failure_message: &str,
    ) -> Result<DownloadedFile> {
        let fail = |cause: String| {
            error!("ダウンロードエラー ({}): {}", filename, cause);
            ValidatorError::DownloadFailure(failure_message.to_string())
        };

        // パス区切りを含む名前はファイル名部分だけ使う
        let name = Path::new(filename)
            .file_name()
            .ok_or_else(|| fail(format!("不正なファイル名: {:?}", filename)))?;

        std::fs::create_dir_all(&self.download_dir)
            .map_err(|e| fail(format!("ディレクトリ作成エラー: {}", e)))?;

        let path = self.download_dir.join(name);
        std::fs::write(&path, bytes).map_err(|e| fail(format!("書き込みエラー: {}", e)))?;

        info!("ダウンロード完了: {} ({})", path.display(), mime_type);
        Ok(DownloadedFile {
            path,
            mime_type: mime_type.to_string(),
            size: bytes.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_data_url() {
        assert_eq!(strip_data_url("data:application/octet-stream;base64,QUJD"), "QUJD");
        assert_eq!(strip_data_url("QUJD"), "QUJD");
    }

    #[test]
    fn test_decode_base64_ignores_whitespace() {
        assert_eq!(decode_base64("QU\nJD ").unwrap(), b"ABC");
        assert!(decode_base64("!!!").is_err());
    }
}
