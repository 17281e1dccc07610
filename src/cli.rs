use clap::{Parser, Subcommand};
use crate::storage::Namespace;
use layout_validator_common::ReportFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "validador")]
#[command(about = "レイアウト/データファイル検証・レポート出力ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// APIのURL（設定ファイルより優先）
    #[arg(long, global = true)]
    pub api_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Excelレイアウトのシート一覧を表示
    Sheets {
        /// レイアウトファイル (.xlsx/.xls)
        #[arg(required = true)]
        layout: PathBuf,
    },

    /// レイアウト定義のみを検証
    ValidateLayout {
        /// レイアウトファイル
        #[arg(required = true)]
        layout: PathBuf,

        /// シート名
        #[arg(short, long)]
        sheet: Option<String>,
    },

    /// データファイルをレイアウトで検証
    Validate {
        /// レイアウトファイル
        #[arg(required = true)]
        layout: PathBuf,

        /// データファイル
        #[arg(required = true)]
        data: PathBuf,

        /// 最大エラー数（0または省略時は設定値）
        #[arg(short, long)]
        max_errors: Option<u32>,

        /// シート名
        #[arg(short, long)]
        sheet: Option<String>,

        /// 検証後にレポートを出力 (excel/texto/csv)
        #[arg(short, long)]
        report: Option<ReportFormat>,
    },

    /// キャッシュ済みの検証からレポートを出力
    Report {
        /// 検証のタイムスタンプ
        #[arg(required = true)]
        timestamp: String,

        /// 出力形式 (excel/texto/csv)
        #[arg(short, long, default_value = "excel")]
        format: ReportFormat,
    },

    /// サーバーで生成されたレポートを取得
    FetchReport {
        /// 検証のタイムスタンプ
        #[arg(required = true)]
        timestamp: String,

        /// 出力形式 (excel/texto/csv)
        #[arg(short, long, default_value = "excel")]
        format: ReportFormat,
    },

    /// ローカルキャッシュ管理
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// 設定を表示/編集
    Config {
        /// 設定を表示
        #[arg(long)]
        show: bool,

        /// APIのURLを設定（空文字で解除）
        #[arg(long)]
        set_api_url: Option<String>,

        /// 開発モードでもAPIのURLを使う (true/false)
        #[arg(long)]
        force_api_url: Option<bool>,

        /// 既定のオリジンを設定
        #[arg(long)]
        set_origin: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// 名前空間ごとの件数
    Stats,

    /// キーの一覧
    List {
        /// validations/comparisons/layouts
        #[arg(default_value = "validations")]
        namespace: Namespace,
    },

    /// エントリを表示
    Show {
        #[arg(required = true)]
        namespace: Namespace,

        #[arg(required = true)]
        key: String,
    },

    /// エントリを削除
    Remove {
        #[arg(required = true)]
        namespace: Namespace,

        #[arg(required = true)]
        key: String,
    },

    /// 古いデータを削除
    Clean {
        /// 保持日数
        #[arg(short, long, default_value = "30")]
        max_days: i64,
    },

    /// 全て削除
    Clear,
}
