//! 検証APIのHTTPクライアント
//!
//! - ベースURLは起動時に1回だけ解決（`Config::base_url`）
//! - タイムアウトは既定5分
//! - 413/422/5xxはメッセージを書き換え、それ以外はそのまま返す
//! - リトライはしない

use crate::config::Config;
use crate::error::{rewrite_status_message, Result, ValidatorError};
use crate::upload::UploadFile;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// アップロード進捗 (送信済みバイト, 合計バイト)
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// multipartのフィールド
#[derive(Debug, Clone)]
enum FormField {
    Text { name: String, value: String },
    File { name: String, file: UploadFile },
}

/// multipartフォーム
///
/// 送信直前に `reqwest::multipart::Form` へ変換する。
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    fields: Vec<FormField>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(FormField::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(mut self, name: impl Into<String>, file: &UploadFile) -> Self {
        self.fields.push(FormField::File {
            name: name.into(),
            file: file.clone(),
        });
        self
    }

    /// ファイル部分の合計サイズ
    pub fn upload_size(&self) -> u64 {
        self.fields
            .iter()
            .map(|f| match f {
                FormField::File { file, .. } => file.len(),
                FormField::Text { .. } => 0,
            })
            .sum()
    }

    /// テキストフィールドの値
    pub fn text_value(&self, name: &str) -> Option<&str> {
        self.fields.iter().find_map(|f| match f {
            FormField::Text { name: n, value } if n == name => Some(value.as_str()),
            _ => None,
        })
    }

    fn into_form(self, on_progress: Option<ProgressFn>) -> Result<Form> {
        let total = self.upload_size();
        let sent = Arc::new(AtomicU64::new(0));
        let mut form = Form::new();

        for field in self.fields {
            form = match field {
                FormField::Text { name, value } => form.text(name, value),
                FormField::File { name, file } => {
                    let part = match &on_progress {
                        Some(cb) => progress_part(file, cb.clone(), sent.clone(), total),
                        None => Part::bytes(file.bytes).file_name(file.name),
                    };
                    form.part(name, part.mime_str("application/octet-stream")?)
                }
            };
        }

        Ok(form)
    }
}

/// 送信量を通知しながら流すファイルパート
fn progress_part(file: UploadFile, on_progress: ProgressFn, sent: Arc<AtomicU64>, total: u64) -> Part {
    let length = file.len();
    let chunks: Vec<Bytes> = file
        .bytes
        .chunks(UPLOAD_CHUNK_SIZE)
        .map(Bytes::copy_from_slice)
        .collect();

    let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
        let done = sent.fetch_add(chunk.len() as u64, Ordering::Relaxed) + chunk.len() as u64;
        trace!("upload progress: {}/{}", done, total);
        on_progress(done, total);
        Ok::<Bytes, std::io::Error>(chunk)
    }));

    Part::stream_with_length(Body::wrap_stream(stream), length).file_name(file.name)
}

/// リクエストボディ
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(MultipartForm),
}

/// リクエストオプション
#[derive(Clone, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    /// クライアント既定のタイムアウトを上書き
    pub timeout: Option<Duration>,
    pub on_upload_progress: Option<ProgressFn>,
}

impl RequestOptions {
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_progress(mut self, on_progress: Option<ProgressFn>) -> Self {
        self.on_upload_progress = on_progress;
        self
    }
}

/// レスポンス
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub bytes: Bytes,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.bytes)?)
    }
}

/// 検証APIクライアント
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.base_url(), config.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// 1回だけリクエストを送る
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        let url = self.url_for(path);
        debug!("{} {}", method, url);

        let mut builder = self.http.request(method, &url);
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(form) => {
                debug!("multipart upload: {} bytes", form.upload_size());
                builder.multipart(form.into_form(options.on_upload_progress.clone())?)
            }
        };

        let response = builder.send().await.map_err(|e| transport_error(e, &url))?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| transport_error(e, &url))?;

        if !status.is_success() {
            return Err(server_error(status.as_u16(), &bytes));
        }

        Ok(ApiResponse {
            status: status.as_u16(),
            bytes,
        })
    }

    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: MultipartForm,
        options: RequestOptions,
    ) -> Result<T> {
        self.request(Method::POST, path, RequestBody::Multipart(form), options)
            .await?
            .json()
    }

    pub async fn get_bytes(&self, path: &str, options: RequestOptions) -> Result<Bytes> {
        Ok(self
            .request(Method::GET, path, RequestBody::Empty, options)
            .await?
            .bytes)
    }
}

fn transport_error(e: reqwest::Error, url: &str) -> ValidatorError {
    warn!("request to {} failed: {}", url, e);
    if e.is_timeout() {
        ValidatorError::Transport(format!("timeout exceeded: {}", url))
    } else {
        ValidatorError::Transport(e.to_string())
    }
}

/// エラーレスポンスから `ValidatorError::Server` を組み立てる
fn server_error(status: u16, body: &[u8]) -> ValidatorError {
    let detail = extract_detail(body);
    let message = match rewrite_status_message(status) {
        Some(rewritten) => rewritten.to_string(),
        None => format!("Request failed with status code {}", status),
    };
    debug!("server error {}: {:?}", status, detail);

    ValidatorError::Server {
        status,
        message,
        detail,
    }
}

/// FastAPI形式の `{"detail": ...}` を取り出す
fn extract_detail(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    match value.get("detail")? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
