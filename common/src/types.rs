//! 検証APIの型定義
//!
//! CLIとキャッシュで共有される型:
//! - ValidationResult: `/validar-arquivo` のレスポンス
//! - ErrorRecord: 行単位のエラー
//! - ReportData: レポート再構築用データ（`dados_relatorio`）
//! - HistoryEntry: 履歴に積むValidationResult + ローカル情報
//!
//! サーバーが返す未知のフィールドは `extra` に保持し、
//! 再シリアライズしても失われないようにする。
//! `null` は未指定と同じく既定値として扱う。
//! `dados_relatorio` は形が決まっていないため生のJSONのまま持ち、
//! レポート出力時に `ReportData` へ変換する。

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// エラー種別を受け取ったキー名
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorTypeKey {
    #[default]
    TipoErro,
    /// バックエンドの `erro_tipo`
    ErroTipo,
}

/// 行単位の検証エラー
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ErrorRecordWire", into = "ErrorRecordWire")]
pub struct ErrorRecord {
    pub linha: u64,
    pub campo: String,
    pub tipo_erro: String,
    pub valor_encontrado: String,
    pub descricao: String,
    pub valor_esperado: Option<String>,
    /// 再シリアライズ時に使うキー名
    pub tipo_erro_key: ErrorTypeKey,
    pub extra: Map<String, Value>,
}

/// `ErrorRecord` のJSON表現
#[derive(Default, Serialize, Deserialize)]
#[serde(default)]
struct ErrorRecordWire {
    #[serde(deserialize_with = "null_as_default")]
    linha: u64,
    #[serde(deserialize_with = "null_as_default")]
    campo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tipo_erro: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    erro_tipo: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    valor_encontrado: String,
    #[serde(deserialize_with = "null_as_default")]
    descricao: String,
    #[serde(
        deserialize_with = "optional_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    valor_esperado: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<ErrorRecordWire> for ErrorRecord {
    fn from(wire: ErrorRecordWire) -> Self {
        let (tipo_erro, tipo_erro_key) = match (wire.tipo_erro, wire.erro_tipo) {
            (Some(tipo), _) => (tipo, ErrorTypeKey::TipoErro),
            (None, Some(tipo)) => (tipo, ErrorTypeKey::ErroTipo),
            (None, None) => (String::new(), ErrorTypeKey::TipoErro),
        };
        Self {
            linha: wire.linha,
            campo: wire.campo,
            tipo_erro,
            valor_encontrado: wire.valor_encontrado,
            descricao: wire.descricao,
            valor_esperado: wire.valor_esperado,
            tipo_erro_key,
            extra: wire.extra,
        }
    }
}

impl From<ErrorRecord> for ErrorRecordWire {
    fn from(record: ErrorRecord) -> Self {
        let (tipo_erro, erro_tipo) = match record.tipo_erro_key {
            ErrorTypeKey::TipoErro => (Some(record.tipo_erro), None),
            ErrorTypeKey::ErroTipo => (None, Some(record.tipo_erro)),
        };
        Self {
            linha: record.linha,
            campo: record.campo,
            tipo_erro,
            erro_tipo,
            valor_encontrado: record.valor_encontrado,
            descricao: record.descricao,
            valor_esperado: record.valor_esperado,
            extra: record.extra,
        }
    }
}

/// レイアウト概要（`layout`）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSummary {
    #[serde(deserialize_with = "null_as_default")]
    pub nome: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 検証結果本体（`resultado`）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOutcome {
    #[serde(deserialize_with = "null_as_default")]
    pub total_linhas: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub linhas_validas: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub linhas_com_erro: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub erros: Vec<ErrorRecord>,
    #[serde(deserialize_with = "null_as_default")]
    pub taxa_sucesso: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 集計（`estatisticas`）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationStats {
    #[serde(deserialize_with = "null_as_default")]
    pub total_erros: u64,
    /// エラー種別 → 件数
    #[serde(deserialize_with = "null_as_default")]
    pub tipos_erro: BTreeMap<String, u64>,
    /// フィールド名 → 件数
    #[serde(deserialize_with = "null_as_default")]
    pub campos_com_erro: BTreeMap<String, u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// レポート再構築用データ（`dados_relatorio`）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportData {
    #[serde(alias = "layout_nome", skip_serializing_if = "Option::is_none")]
    pub nome_layout: Option<String>,
    /// テキスト形式のサマリ
    #[serde(deserialize_with = "null_as_default")]
    pub relatorio_texto: String,
    #[serde(deserialize_with = "null_as_default")]
    pub erros: Vec<ErrorRecord>,
    /// サーバー側で生成済みのExcel（Base64）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excel_base64: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// キャッシュ保存時に付与される時刻フィールド
pub const SAVED_AT_FIELD: &str = "savedAt";

impl ReportData {
    /// `dados_relatorio` の生のJSONから変換
    pub fn from_value(value: Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// キャッシュのエントリから復元（`savedAt` は取り除く）
    pub fn from_cached(value: Value) -> crate::Result<Self> {
        let mut report = Self::from_value(value)?;
        report.extra.remove(SAVED_AT_FIELD);
        Ok(report)
    }
}

/// `/validar-arquivo` のレスポンス
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutSummary>,
    #[serde(deserialize_with = "null_as_default")]
    pub resultado: ValidationOutcome,
    #[serde(deserialize_with = "null_as_default")]
    pub estatisticas: ValidationStats,
    #[serde(deserialize_with = "string_or_number")]
    pub timestamp: String,
    /// 生のJSON。`report_data` で変換する
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dados_relatorio: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        !self.resultado.erros.is_empty()
    }

    pub fn total_errors(&self) -> usize {
        self.resultado.erros.len()
    }

    pub fn success_rate(&self) -> f64 {
        self.resultado.taxa_sucesso
    }

    pub fn errors_by_type(&self) -> &BTreeMap<String, u64> {
        &self.estatisticas.tipos_erro
    }

    pub fn errors_by_field(&self) -> &BTreeMap<String, u64> {
        &self.estatisticas.campos_com_erro
    }

    pub fn layout_name(&self) -> Option<&str> {
        self.layout
            .as_ref()
            .map(|l| l.nome.as_str())
            .filter(|n| !n.is_empty())
    }

    /// `dados_relatorio` を `ReportData` として読む
    pub fn report_data(&self) -> Option<crate::Result<ReportData>> {
        self.dados_relatorio
            .as_ref()
            .map(|raw| ReportData::from_value(raw.clone()))
    }
}

/// 履歴エントリ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub validation: ValidationResult,
    /// ローカル採番ID
    pub id: u64,
    pub layout_file_name: String,
    pub data_file_name: String,
    /// ISO-8601
    pub created_at: String,
}

/// `null` を既定値として読む
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn scalar_to_string<E: serde::de::Error>(value: Value) -> Result<Option<String>, E> {
    match value {
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(E::custom(format!("文字列または数値が必要です: {}", other))),
    }
}

/// 文字列・数値どちらでも受け付けて文字列化する
///
/// タイムスタンプや `valor_encontrado` は数値で返ってくることがある。
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_to_string(Value::deserialize(deserializer)?)?.unwrap_or_default())
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    scalar_to_string(Value::deserialize(deserializer)?)
}
