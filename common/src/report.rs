//! レポート生成（CSV/テキスト/ファイル名）
//!
//! キャッシュ済みの `dados_relatorio` からダウンロード用の内容を組み立てる。

use crate::types::{ErrorRecord, ReportData};

pub const CSV_HEADER: &str = "Linha,Campo,Tipo_Erro,Valor_Encontrado,Descricao";
pub const CSV_NO_ERRORS_ROW: &str = "Nenhum erro encontrado,,,,";

pub const MIME_EXCEL: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MIME_TEXT: &str = "text/plain;charset=utf-8";
pub const MIME_CSV: &str = "text/csv;charset=utf-8";

/// レポート形式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Excel,
    Texto,
    Csv,
}

impl ReportFormat {
    /// APIの `formato` クエリ値
    pub fn as_query(&self) -> &'static str {
        match self {
            ReportFormat::Excel => "excel",
            ReportFormat::Texto => "texto",
            ReportFormat::Csv => "csv",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Excel => "xlsx",
            ReportFormat::Texto => "txt",
            ReportFormat::Csv => "csv",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ReportFormat::Excel => MIME_EXCEL,
            ReportFormat::Texto => MIME_TEXT,
            ReportFormat::Csv => MIME_CSV,
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "excel" | "xlsx" => Ok(ReportFormat::Excel),
            "texto" | "text" | "txt" => Ok(ReportFormat::Texto),
            "csv" => Ok(ReportFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use excel, texto, or csv", s)),
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_query())
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// エラー一覧からCSVを生成
///
/// 行番号以外の4列はダブルクォートで囲む。エラーが無い場合は
/// `Nenhum erro encontrado,,,,` の1行のみ。
pub fn build_csv(errors: &[ErrorRecord]) -> String {
    let mut lines = Vec::with_capacity(errors.len() + 1);
    lines.push(CSV_HEADER.to_string());

    if errors.is_empty() {
        lines.push(CSV_NO_ERRORS_ROW.to_string());
    } else {
        for e in errors {
            lines.push(format!(
                "{},{},{},{},{}",
                e.linha,
                quote(&e.campo),
                quote(&e.tipo_erro),
                quote(&e.valor_encontrado),
                quote(&e.descricao),
            ));
        }
    }

    lines.join("\n")
}

/// テキストサマリを取得
///
/// 保存済みの `relatorio_texto` を優先し、空ならエラー一覧から組み立てる。
pub fn build_text(report: &ReportData, timestamp: &str) -> String {
    if !report.relatorio_texto.is_empty() {
        return report.relatorio_texto.clone();
    }

    let mut out = String::new();
    out.push_str("RELATÓRIO DE VALIDAÇÃO\n");
    out.push_str(&format!("Layout: {}\n", layout_label(report)));
    out.push_str(&format!("Timestamp: {}\n", timestamp));
    out.push_str(&format!("Total de erros: {}\n", report.erros.len()));

    if report.erros.is_empty() {
        out.push_str("\nNenhum erro encontrado\n");
    } else {
        out.push('\n');
        for e in &report.erros {
            out.push_str(&format!(
                "Linha {} | {} | {} | '{}' | {}\n",
                e.linha, e.campo, e.tipo_erro, e.valor_encontrado, e.descricao
            ));
        }
    }

    out
}

fn layout_label(report: &ReportData) -> &str {
    report
        .nome_layout
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or("layout")
}

/// ファイル名に使えない文字を `_` に置換
fn sanitize(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

/// ローカル再構築レポートのファイル名
pub fn report_file_name(report: &ReportData, timestamp: &str, format: ReportFormat) -> String {
    format!(
        "relatorio_validacao_{}_{}.{}",
        sanitize(layout_label(report)),
        sanitize(timestamp),
        format.extension()
    )
}

/// サーバーから取得したレポートのファイル名
pub fn remote_report_file_name(timestamp: &str, format: ReportFormat) -> String {
    format!("relatorio_validacao_{}.{}", sanitize(timestamp), format.extension())
}

/// Excelレポートを生成
///
/// Resumoシートには `build_text` のサマリを入れる。
#[cfg(feature = "excel")]
pub fn build_excel(report: &ReportData, timestamp: &str) -> crate::Result<Vec<u8>> {
    let summary = build_text(report, timestamp);
    crate::export::excel_core::generate_report_buffer(report, timestamp, &summary)
        .map_err(crate::Error::Report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(linha: u64, campo: &str, tipo: &str, valor: &str, descricao: &str) -> ErrorRecord {
        ErrorRecord {
            linha,
            campo: campo.to_string(),
            tipo_erro: tipo.to_string(),
            valor_encontrado: valor.to_string(),
            descricao: descricao.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_csv_without_errors() {
        let csv = build_csv(&[]);
        assert_eq!(csv, format!("{}\n{}", CSV_HEADER, CSV_NO_ERRORS_ROW));
    }

    #[test]
    fn test_csv_with_errors() {
        let csv = build_csv(&[record(1, "A", "X", "9", "bad")]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "Linha,Campo,Tipo_Erro,Valor_Encontrado,Descricao");
        assert_eq!(lines[1], r#"1,"A","X","9","bad""#);
    }

    #[test]
    fn test_csv_escapes_quotes() {
        let csv = build_csv(&[record(2, "NOME", "TAM", "a\"b", "valor \"longo\"")]);
        assert!(csv.ends_with(r#"2,"NOME","TAM","a""b","valor ""longo""""#));
    }

    #[test]
    fn test_text_prefers_stored_summary() {
        let report = ReportData {
            relatorio_texto: "resumo salvo".to_string(),
            erros: vec![record(1, "A", "X", "9", "bad")],
            ..Default::default()
        };
        assert_eq!(build_text(&report, "ts"), "resumo salvo");
    }

    #[test]
    fn test_text_fallback_lists_errors() {
        let report = ReportData {
            nome_layout: Some("LAYOUT_A".to_string()),
            erros: vec![record(4, "CEP", "NUMERICO", "ABC", "Esperado número")],
            ..Default::default()
        };
        let text = build_text(&report, "20250101_000000");
        assert!(text.contains("Layout: LAYOUT_A"));
        assert!(text.contains("Total de erros: 1"));
        assert!(text.contains("Linha 4 | CEP | NUMERICO | 'ABC' | Esperado número"));
    }

    #[test]
    fn test_report_file_names() {
        let report = ReportData {
            nome_layout: Some("Layout Claro/v2".to_string()),
            ..Default::default()
        };
        assert_eq!(
            report_file_name(&report, "20250101_120000", ReportFormat::Csv),
            "relatorio_validacao_Layout_Claro_v2_20250101_120000.csv"
        );
        assert_eq!(
            report_file_name(&ReportData::default(), "1", ReportFormat::Texto),
            "relatorio_validacao_layout_1.txt"
        );
        assert_eq!(
            remote_report_file_name("20250101_120000", ReportFormat::Excel),
            "relatorio_validacao_20250101_120000.xlsx"
        );
    }

    #[test]
    fn test_report_format_from_str() {
        assert_eq!("excel".parse::<ReportFormat>(), Ok(ReportFormat::Excel));
        assert_eq!("TXT".parse::<ReportFormat>(), Ok(ReportFormat::Texto));
        assert_eq!("csv".parse::<ReportFormat>(), Ok(ReportFormat::Csv));
        assert!("pdf".parse::<ReportFormat>().is_err());
        assert_eq!(ReportFormat::Texto.to_string(), "texto");
        assert_eq!(ReportFormat::Csv.mime_type(), MIME_CSV);
    }

    #[cfg(feature = "excel")]
    #[test]
    fn test_build_excel_produces_xlsx() {
        let report = ReportData {
            nome_layout: Some("Clientes".to_string()),
            erros: vec![record(1, "A", "X", "9", "bad")],
            ..Default::default()
        };
        let bytes = build_excel(&report, "20250101_120000").expect("Excel生成失敗");
        assert!(bytes.starts_with(b"PK"));
    }
}
