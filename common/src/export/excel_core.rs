//! Excel生成（共通ライブラリ）
//!
//! `dados_relatorio` から「Resumo」「Erros」の2シート構成のブックを生成する。

use crate::types::ReportData;
use rust_xlsxwriter::*;

const ERROR_HEADERS: [&str; 5] = ["Linha", "Campo", "Tipo_Erro", "Valor_Encontrado", "Descricao"];
const ERROR_COL_WIDTHS: [f64; 5] = [8.0, 24.0, 22.0, 28.0, 60.0];

/// 検証レポートのExcelをバッファに生成
///
/// # Arguments
/// * `report` - キャッシュ済みレポートデータ
/// * `timestamp` - 検証のタイムスタンプ
/// * `summary` - Resumoシートに出力するテキスト
pub fn generate_report_buffer(
    report: &ReportData,
    timestamp: &str,
    summary: &str,
) -> Result<Vec<u8>, String> {
    let mut workbook = Workbook::new();

    let header_format = Format::new()
        .set_bold()
        .set_font_color(Color::RGB(0x333333))
        .set_background_color(Color::RGB(0xF5F5F5))
        .set_border(FormatBorder::Thin)
        .set_border_color(Color::RGB(0xAAAAAA));

    let title_format = Format::new().set_bold().set_font_size(14.0);

    {
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name("Resumo")
            .map_err(|e| format!("シート名設定エラー: {}", e))?;
        worksheet
            .set_column_width(0, 100.0)
            .map_err(|e| format!("列幅設定エラー: {}", e))?;

        worksheet
            .write_string_with_format(0, 0, "Relatório de Validação", &title_format)
            .map_err(|e| format!("書き込みエラー: {}", e))?;
        let layout = report.nome_layout.as_deref().unwrap_or("-");
        worksheet
            .write_string(1, 0, format!("Layout: {}", layout))
            .map_err(|e| format!("書き込みエラー: {}", e))?;
        worksheet
            .write_string(2, 0, format!("Timestamp: {}", timestamp))
            .map_err(|e| format!("書き込みエラー: {}", e))?;
        worksheet
            .write_string(3, 0, format!("Total de erros: {}", report.erros.len()))
            .map_err(|e| format!("書き込みエラー: {}", e))?;

        // サマリは1行ずつセルへ
        for (i, line) in summary.lines().enumerate() {
            worksheet
                .write_string(5 + i as u32, 0, line)
                .map_err(|e| format!("書き込みエラー: {}", e))?;
        }
    }

    {
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name("Erros")
            .map_err(|e| format!("シート名設定エラー: {}", e))?;

        for (col, (header, width)) in ERROR_HEADERS.iter().zip(ERROR_COL_WIDTHS).enumerate() {
            let col = col as u16;
            worksheet
                .write_string_with_format(0, col, *header, &header_format)
                .map_err(|e| format!("書き込みエラー: {}", e))?;
            worksheet
                .set_column_width(col, width)
                .map_err(|e| format!("列幅設定エラー: {}", e))?;
        }

        if report.erros.is_empty() {
            worksheet
                .write_string(1, 0, "Nenhum erro encontrado")
                .map_err(|e| format!("書き込みエラー: {}", e))?;
        }

        for (i, rec) in report.erros.iter().enumerate() {
            let row = 1 + i as u32;
            worksheet
                .write_number(row, 0, rec.linha as f64)
                .map_err(|e| format!("書き込みエラー: {}", e))?;
            worksheet
                .write_string(row, 1, rec.campo.as_str())
                .map_err(|e| format!("書き込みエラー: {}", e))?;
            worksheet
                .write_string(row, 2, rec.tipo_erro.as_str())
                .map_err(|e| format!("書き込みエラー: {}", e))?;
            worksheet
                .write_string(row, 3, rec.valor_encontrado.as_str())
                .map_err(|e| format!("書き込みエラー: {}", e))?;
            worksheet
                .write_string(row, 4, rec.descricao.as_str())
                .map_err(|e| format!("書き込みエラー: {}", e))?;
        }
    }

    workbook
        .save_to_buffer()
        .map_err(|e| format!("Excel保存エラー: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorRecord;

    #[test]
    fn test_generate_report_buffer_is_zip() {
        let report = ReportData {
            nome_layout: Some("LAYOUT_A".to_string()),
            erros: vec![ErrorRecord {
                linha: 1,
                campo: "A".to_string(),
                tipo_erro: "X".to_string(),
                valor_encontrado: "9".to_string(),
                descricao: "bad".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let buffer = generate_report_buffer(&report, "20250101_120000", "linha 1\nlinha 2")
            .expect("Excel生成失敗");
        // xlsxはZIPコンテナ
        assert!(buffer.starts_with(b"PK"));
    }

    #[test]
    fn test_generate_report_buffer_without_errors() {
        let buffer = generate_report_buffer(&ReportData::default(), "ts", "")
            .expect("Excel生成失敗");
        assert!(!buffer.is_empty());
    }
}
