//! エラーケーステスト
//!
//! 各種エラー条件でのエラーハンドリングとメッセージを検証

use layout_validator::error::{
    rewrite_status_message, ValidatorError, MSG_FILE_TOO_LARGE, MSG_INVALID_DATA,
    MSG_SERVER_ERROR, MSG_VALIDATION_NOT_FOUND,
};
use layout_validator::upload::UploadFile;
use std::path::Path;
use tempfile::tempdir;

fn server(status: u16, detail: Option<&str>) -> ValidatorError {
    ValidatorError::Server {
        status,
        message: rewrite_status_message(status)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Request failed with status code {}", status)),
        detail: detail.map(str::to_string),
    }
}

/// 存在しないファイルを読み込んだ場合
#[tokio::test]
async fn test_upload_nonexistent_file() {
    let result = UploadFile::from_path(Path::new("/nonexistent/path/layout.xlsx")).await;
    assert!(matches!(result, Err(ValidatorError::FileNotFound(_))));
}

/// ディレクトリを指定した場合
#[tokio::test]
async fn test_upload_directory() {
    let dir = tempdir().expect("Failed to create temp dir");
    let result = UploadFile::from_path(dir.path()).await;
    assert!(matches!(result, Err(ValidatorError::FileNotFound(_))));
}

/// 書き換え対象のステータス
#[test]
fn test_rewrite_status_message() {
    assert_eq!(rewrite_status_message(413), Some(MSG_FILE_TOO_LARGE));
    assert_eq!(rewrite_status_message(422), Some(MSG_INVALID_DATA));
    assert_eq!(rewrite_status_message(500), Some(MSG_SERVER_ERROR));
    assert_eq!(rewrite_status_message(504), Some(MSG_SERVER_ERROR));
    assert_eq!(rewrite_status_message(400), None);
    assert_eq!(rewrite_status_message(404), None);
}

/// 書き換えメッセージはサーバーの detail より優先
#[test]
fn test_user_message_priority() {
    let err = server(422, Some("campo obrigatório"));
    assert_eq!(err.user_message("fallback"), MSG_INVALID_DATA);

    let err = server(400, Some("Layout inválido"));
    assert_eq!(err.user_message("fallback"), "Layout inválido");

    let err = server(404, None);
    assert_eq!(err.user_message("Erro ao validar layout"), "Erro ao validar layout");

    let err = server(400, Some(""));
    assert_eq!(err.user_message("fallback"), "fallback");

    let err = ValidatorError::Transport("connection refused".to_string());
    assert_eq!(err.user_message("Erro durante a validação"), "Erro durante a validação");
}

/// ValidatorErrorのDisplay実装確認
#[test]
fn test_error_display() {
    let errors = vec![
        ValidatorError::Config("テスト設定エラー".to_string()),
        ValidatorError::FileNotFound("layout.xlsx".to_string()),
        ValidatorError::Transport("timeout".to_string()),
        server(413, None),
        ValidatorError::DownloadFailure("Falha ao baixar arquivo CSV".to_string()),
    ];

    for err in errors {
        assert!(!err.to_string().is_empty());
    }

    assert_eq!(ValidatorError::ValidationNotFound.to_string(), MSG_VALIDATION_NOT_FOUND);
    assert!(server(413, None).to_string().contains("413"));
}

/// 変換
#[test]
fn test_error_from_conversions() {
    let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
    assert!(matches!(ValidatorError::from(io_error), ValidatorError::Io(_)));

    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    assert!(matches!(ValidatorError::from(json_error), ValidatorError::JsonParse(_)));
}
