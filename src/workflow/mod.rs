//! 検証ワークフローストア
//!
//! シート一覧 → レイアウト検証 → ファイル検証 → レポート出力 の流れを管理する。
//!
//! 状態遷移: Idle → Loading → (Success | Failed) → Idle
//! `is_loading` はどの経路でも最後に false に戻る（`Loading` のDrop）。
//! 状態の変化は `subscribe` で購読できる。

pub mod history;

use crate::api::{endpoints, ApiClient, MultipartForm, ProgressFn, RequestOptions};
use crate::config::DEFAULT_MAX_ERRORS;
use crate::error::{Result, ValidatorError, MSG_VALIDATION_NOT_FOUND};
use crate::storage::{DownloadedFile, LocalStore, Namespace};
use crate::upload::UploadFile;
use chrono::{SecondsFormat, Utc};
use history::{HistoryQueue, IdGenerator, HISTORY_LIMIT};
use layout_validator_common::report::MIME_EXCEL;
use layout_validator_common::{
    build_csv, build_excel, build_text, remote_report_file_name, report_file_name, HistoryEntry,
    ReportData, ReportFormat, ValidationResult,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

const MSG_LIST_SHEETS_FAILED: &str = "Erro ao listar abas do Excel";
const MSG_VALIDATE_LAYOUT_FAILED: &str = "Erro ao validar layout";
const MSG_VALIDATE_FILE_FAILED: &str = "Erro durante a validação";
const MSG_DOWNLOAD_FAILED: &str = "Erro ao fazer download do relatório";

/// ワークフローの状態
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowState {
    pub current_validation: Option<ValidationResult>,
    pub is_loading: bool,
    pub error: Option<String>,
    /// `current_validation` とは独立に管理する
    pub has_validation: bool,
}

/// 実行中フラグ
///
/// 開始時に `is_loading = true`、Drop時に false に戻して通知する。
struct Loading<'a> {
    state: &'a mut WorkflowState,
    watcher: &'a watch::Sender<WorkflowState>,
}

impl<'a> Loading<'a> {
    fn start(state: &'a mut WorkflowState, watcher: &'a watch::Sender<WorkflowState>) -> Self {
        state.is_loading = true;
        state.error = None;
        watcher.send_replace(state.clone());
        Self { state, watcher }
    }

    fn state(&mut self) -> &mut WorkflowState {
        self.state
    }
}

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        self.state.is_loading = false;
        self.watcher.send_replace(self.state.clone());
    }
}

fn record_failure<T>(state: &mut WorkflowState, outcome: &Result<T>, fallback: &str) {
    if let Err(e) = outcome {
        warn!("{}: {}", fallback, e);
        state.error = Some(e.user_message(fallback));
    }
}

/// 検証ワークフローストア
pub struct ValidationStore {
    api: ApiClient,
    cache: Arc<LocalStore>,
    state: WorkflowState,
    watcher: watch::Sender<WorkflowState>,
    history: HistoryQueue,
    ids: IdGenerator,
    default_max_errors: u32,
    on_upload_progress: Option<ProgressFn>,
}

impl ValidationStore {
    /// tokioランタイム内で呼ぶこと（履歴ワーカーを起動する）
    pub fn new(api: ApiClient, cache: Arc<LocalStore>) -> Self {
        let (watcher, _) = watch::channel(WorkflowState::default());
        Self {
            api,
            cache,
            state: WorkflowState::default(),
            watcher,
            history: HistoryQueue::spawn(HISTORY_LIMIT),
            ids: IdGenerator::default(),
            default_max_errors: DEFAULT_MAX_ERRORS,
            on_upload_progress: None,
        }
    }

    /// `max_errors` 未指定時の値（0は無視）
    pub fn with_default_max_errors(mut self, max_errors: u32) -> Self {
        if max_errors > 0 {
            self.default_max_errors = max_errors;
        }
        self
    }

    /// `validate_file` のアップロード進捗
    pub fn with_upload_progress(mut self, on_progress: ProgressFn) -> Self {
        self.on_upload_progress = Some(on_progress);
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.watcher.subscribe()
    }

    fn publish(&self) {
        self.watcher.send_replace(self.state.clone());
    }

    // ===== 状態 =====

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn current_validation(&self) -> Option<&ValidationResult> {
        self.state.current_validation.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.state.error.as_deref()
    }

    pub fn has_validation(&self) -> bool {
        self.state.has_validation
    }

    // ===== 派生値（毎回計算） =====

    pub fn has_errors(&self) -> bool {
        self.current_validation().is_some_and(|v| v.has_errors())
    }

    pub fn success_rate(&self) -> f64 {
        self.current_validation().map_or(0.0, |v| v.success_rate())
    }

    pub fn total_errors(&self) -> usize {
        self.current_validation().map_or(0, |v| v.total_errors())
    }

    pub fn errors_by_type(&self) -> BTreeMap<String, u64> {
        self.current_validation()
            .map(|v| v.errors_by_type().clone())
            .unwrap_or_default()
    }

    pub fn errors_by_field(&self) -> BTreeMap<String, u64> {
        self.current_validation()
            .map(|v| v.errors_by_field().clone())
            .unwrap_or_default()
    }

    // ===== 履歴 =====

    /// 新しい順
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.snapshot()
    }

    /// 積まれている履歴追加がすべて反映されるまで待つ
    pub async fn flush_history(&self) {
        self.history.flush().await;
    }

    pub fn get_validation_by_id(&self, id: u64) -> Option<HistoryEntry> {
        self.history.find(id)
    }

    // ===== API呼び出し =====

    /// Excelのシート一覧
    pub async fn list_excel_sheets(&mut self, layout: &UploadFile) -> Result<Value> {
        let form = MultipartForm::new().file("layout_file", layout);

        let mut loading = Loading::start(&mut self.state, &self.watcher);
        let outcome = self
            .api
            .post_multipart::<Value>(endpoints::LIST_SHEETS, form, RequestOptions::default())
            .await;
        record_failure(loading.state(), &outcome, MSG_LIST_SHEETS_FAILED);
        outcome
    }

    /// レイアウト定義のみを検証
    pub async fn validate_layout(
        &mut self,
        layout: &UploadFile,
        sheet_name: Option<&str>,
    ) -> Result<Value> {
        let mut form = MultipartForm::new().file("layout_file", layout);
        if let Some(sheet) = sheet_name {
            form = form.text("sheet_name", sheet.to_string());
        }

        let mut loading = Loading::start(&mut self.state, &self.watcher);
        let outcome = self
            .api
            .post_multipart::<Value>(endpoints::VALIDATE_LAYOUT, form, RequestOptions::default())
            .await;
        record_failure(loading.state(), &outcome, MSG_VALIDATE_LAYOUT_FAILED);
        outcome
    }

    /// データファイルをレイアウトで検証
    ///
    /// `max_errors` が未指定または0のときは既定値（100）を送る。
    pub async fn validate_file(
        &mut self,
        layout: &UploadFile,
        data: &UploadFile,
        max_errors: Option<u32>,
        sheet_name: Option<&str>,
    ) -> Result<ValidationResult> {
        let max_errors = match max_errors {
            Some(n) if n > 0 => n,
            _ => self.default_max_errors,
        };

        let mut form = MultipartForm::new()
            .file("layout_file", layout)
            .file("data_file", data)
            .text("max_erros", max_errors.to_string());
        if let Some(sheet) = sheet_name {
            form = form.text("sheet_name", sheet.to_string());
        }

        // タイムアウトはクライアントの設定値
        let options = RequestOptions::default().with_progress(self.on_upload_progress.clone());

        let mut loading = Loading::start(&mut self.state, &self.watcher);
        let outcome = self
            .api
            .post_multipart::<ValidationResult>(endpoints::VALIDATE_FILE, form, options)
            .await;
        record_failure(loading.state(), &outcome, MSG_VALIDATE_FILE_FAILED);
        let response = outcome?;

        let state = loading.state();
        state.current_validation = Some(response.clone());
        state.has_validation = true;
        info!(
            "検証完了: {} (エラー {}件)",
            response.timestamp,
            response.total_errors()
        );

        if let Some(report) = &response.dados_relatorio {
            // キャッシュ失敗は検証結果を無効にしない
            let saved = self
                .cache
                .save(Namespace::Validations, &response.timestamp, report.clone());
            if let Err(e) = saved {
                warn!("レポートデータのキャッシュに失敗: {}", e);
            }
        }

        self.history.enqueue(HistoryEntry {
            validation: response.clone(),
            id: self.ids.next_id(),
            layout_file_name: layout.name.clone(),
            data_file_name: data.name.clone(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });

        Ok(response)
    }

    // ===== レポート =====

    /// キャッシュまたは現在の検証結果からレポートを出力
    pub fn download_report(
        &mut self,
        timestamp: &str,
        format: ReportFormat,
    ) -> Result<DownloadedFile> {
        let outcome = self.build_report(timestamp, format);
        if let Err(e) = &outcome {
            warn!("レポート出力失敗 ({}): {}", timestamp, e);
            self.state.error = Some(match e {
                ValidatorError::ValidationNotFound => MSG_VALIDATION_NOT_FOUND.to_string(),
                other => other.user_message(MSG_DOWNLOAD_FAILED),
            });
            self.publish();
        }
        outcome
    }

    /// `dados_relatorio` をキャッシュ優先で探す
    fn resolve_report(&self, timestamp: &str) -> Option<ReportData> {
        let current = self
            .current_validation()
            .filter(|v| v.timestamp == timestamp);

        let cached = self
            .cache
            .get(Namespace::Validations, timestamp)
            .and_then(|value| match ReportData::from_cached(value) {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!("キャッシュのレポートデータを読めません ({}): {}", timestamp, e);
                    None
                }
            });

        let mut report = cached.or_else(|| {
            current.and_then(|v| v.report_data()).and_then(|decoded| match decoded {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!("dados_relatorio を読めません ({}): {}", timestamp, e);
                    None
                }
            })
        })?;

        // エラー一覧を持たないレポートは現在の結果で補う
        if report.erros.is_empty() {
            if let Some(v) = current {
                report.erros = v.resultado.erros.clone();
            }
        }
        if report.nome_layout.is_none() {
            report.nome_layout = current.and_then(|v| v.layout_name()).map(str::to_string);
        }

        Some(report)
    }

    fn build_report(&self, timestamp: &str, format: ReportFormat) -> Result<DownloadedFile> {
        let report = self
            .resolve_report(timestamp)
            .ok_or(ValidatorError::ValidationNotFound)?;
        let filename = report_file_name(&report, timestamp, format);

        match format {
            ReportFormat::Texto => self
                .cache
                .download_text(&build_text(&report, timestamp), &filename),
            ReportFormat::Csv => self.cache.download_csv(&build_csv(&report.erros), &filename),
            ReportFormat::Excel => match &report.excel_base64 {
                Some(encoded) => self.cache.download_excel(encoded, &filename),
                None => {
                    let buffer = build_excel(&report, timestamp).map_err(|cause| {
                        error!("Excel生成エラー: {}", cause);
                        ValidatorError::DownloadFailure("Falha ao baixar arquivo Excel".into())
                    })?;
                    self.cache.download_bytes(&buffer, &filename, MIME_EXCEL)
                }
            },
        }
    }

    /// サーバーで生成済みのレポートを取得して保存
    pub async fn fetch_report(
        &mut self,
        timestamp: &str,
        format: ReportFormat,
    ) -> Result<DownloadedFile> {
        let options = RequestOptions::default().query("formato", format.as_query());
        let outcome = match self
            .api
            .get_bytes(&endpoints::download_report(timestamp), options)
            .await
        {
            Ok(bytes) => self.cache.download_bytes(
                &bytes,
                &remote_report_file_name(timestamp, format),
                format.mime_type(),
            ),
            Err(e) => Err(e),
        };

        if let Err(e) = &outcome {
            warn!("レポート取得失敗 ({}): {}", timestamp, e);
            self.state.error = Some(MSG_DOWNLOAD_FAILED.to_string());
            self.publish();
        }
        outcome
    }

    // ===== 状態操作 =====

    pub fn clear_validation(&mut self) {
        self.state.current_validation = None;
        self.state.has_validation = false;
        self.state.error = None;
        self.publish();
    }

    pub fn clear_error(&mut self) {
        self.state.error = None;
        self.publish();
    }

    /// 履歴の結果を現在の結果として表示する（通信なし）
    pub fn set_current_validation(&mut self, validation: Option<ValidationResult>) {
        self.state.current_validation = validation;
        self.publish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layout_validator_common::ErrorRecord;
    use std::time::Duration;

    fn store_in(dir: &std::path::Path) -> ValidationStore {
        let api = ApiClient::new("http://127.0.0.1:9/api", Duration::from_secs(1)).unwrap();
        let cache = Arc::new(LocalStore::new(dir.join("storage"), dir.join("downloads")));
        ValidationStore::new(api, cache)
    }

    fn validation(timestamp: &str, errors: usize) -> ValidationResult {
        let mut v = ValidationResult {
            timestamp: timestamp.to_string(),
            ..Default::default()
        };
        v.resultado.taxa_sucesso = 75.5;
        for i in 0..errors {
            v.resultado.erros.push(ErrorRecord {
                linha: i as u64 + 1,
                campo: "CPF".to_string(),
                ..Default::default()
            });
        }
        v.estatisticas.tipos_erro.insert("FORMATO".to_string(), errors as u64);
        v
    }

    #[tokio::test]
    async fn test_derived_views_default_without_validation() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = store_in(dir.path());

        assert!(!store.has_errors());
        assert_eq!(store.success_rate(), 0.0);
        assert_eq!(store.total_errors(), 0);
        assert!(store.errors_by_type().is_empty());
        assert!(store.errors_by_field().is_empty());
    }

    #[tokio::test]
    async fn test_derived_views_follow_current_validation() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut store = store_in(dir.path());
        store.set_current_validation(Some(validation("t1", 3)));

        assert!(store.has_errors());
        assert_eq!(store.total_errors(), 3);
        assert_eq!(store.success_rate(), 75.5);
        assert_eq!(store.errors_by_type().get("FORMATO"), Some(&3));
        // set_current_validation は has_validation を変えない
        assert!(!store.has_validation());
    }

    #[tokio::test]
    async fn test_clear_error_keeps_validation() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut store = store_in(dir.path());
        store.set_current_validation(Some(validation("t1", 0)));
        store.state.has_validation = true;
        store.state.error = Some("falha".to_string());

        store.clear_error();

        assert!(store.error().is_none());
        assert!(store.has_validation());
        assert_eq!(store.current_validation().map(|v| v.timestamp.as_str()), Some("t1"));
    }

    #[tokio::test]
    async fn test_clear_validation_resets_everything() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut store = store_in(dir.path());
        store.set_current_validation(Some(validation("t1", 1)));
        store.state.has_validation = true;
        store.state.error = Some("falha".to_string());

        store.clear_validation();

        assert!(store.current_validation().is_none());
        assert!(!store.has_validation());
        assert!(store.error().is_none());
    }

    #[tokio::test]
    async fn test_download_report_not_found_sets_error() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut store = store_in(dir.path());

        let result = store.download_report("inexistente", ReportFormat::Csv);
        assert!(matches!(result, Err(ValidatorError::ValidationNotFound)));
        assert_eq!(store.error(), Some(MSG_VALIDATION_NOT_FOUND));
    }

    #[tokio::test]
    async fn test_download_report_ignores_mismatched_timestamp() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut store = store_in(dir.path());
        let mut v = validation("t1", 0);
        v.dados_relatorio = Some(serde_json::json!({}));
        store.set_current_validation(Some(v));

        assert!(store.download_report("t2", ReportFormat::Texto).is_err());
        assert!(store.download_report("t1", ReportFormat::Texto).is_ok());
    }

    #[tokio::test]
    async fn test_subscribe_sees_state_changes() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut store = store_in(dir.path());
        let rx = store.subscribe();

        store.set_current_validation(Some(validation("t9", 0)));
        assert_eq!(
            rx.borrow().current_validation.as_ref().map(|v| v.timestamp.clone()),
            Some("t9".to_string())
        );
    }
}
