use thiserror::Error;

pub const MSG_FILE_TOO_LARGE: &str = "Arquivo muito grande. Tente com um arquivo menor.";
pub const MSG_INVALID_DATA: &str = "Dados inválidos. Verifique os arquivos enviados.";
pub const MSG_SERVER_ERROR: &str = "Erro interno do servidor. Tente novamente mais tarde.";
pub const MSG_VALIDATION_NOT_FOUND: &str = "Dados da validação não encontrados";

#[derive(Error, Debug)]
pub enum ValidatorError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    /// 接続失敗・タイムアウト
    #[error("通信エラー: {0}")]
    Transport(String),

    /// 4xx/5xx。`message` は413/422/5xxで書き換え済み
    #[error("サーバーエラー ({status}): {message}")]
    Server {
        status: u16,
        message: String,
        detail: Option<String>,
    },

    #[error("{}", MSG_VALIDATION_NOT_FOUND)]
    ValidationNotFound,

    #[error("ダウンロード失敗: {0}")]
    DownloadFailure(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

impl ValidatorError {
    /// 書き換え対象のステータスか
    pub fn is_rewritten_status(&self) -> bool {
        matches!(self, ValidatorError::Server { status, .. } if rewrite_status_message(*status).is_some())
    }

    /// ワークフローの `error` に格納するメッセージ
    ///
    /// 413/422/5xxは書き換え済みメッセージ、それ以外はサーバーの `detail`、
    /// どちらも無ければ `fallback`。
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ValidatorError::Server { message, .. } if self.is_rewritten_status() => message.clone(),
            ValidatorError::Server { detail: Some(detail), .. } if !detail.is_empty() => {
                detail.clone()
            }
            _ => fallback.to_string(),
        }
    }
}

/// ステータスコード別のメッセージ書き換え
pub fn rewrite_status_message(status: u16) -> Option<&'static str> {
    match status {
        413 => Some(MSG_FILE_TOO_LARGE),
        422 => Some(MSG_INVALID_DATA),
        s if s >= 500 => Some(MSG_SERVER_ERROR),
        _ => None,
    }
}

impl From<reqwest::Error> for ValidatorError {
    fn from(e: reqwest::Error) -> Self {
        ValidatorError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ValidatorError>;
