use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use layout_validator::{api, cli, config, error, logging, storage, upload, workflow};
use api::{ApiClient, ProgressFn};
use cli::{CacheAction, Cli, Commands};
use config::Config;
use error::Result;
use std::sync::Arc;
use storage::{LocalStore, Namespace};
use upload::UploadFile;
use workflow::ValidationStore;

fn upload_progress() -> (ProgressBar, ProgressFn) {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template("{bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);

    let handle = bar.clone();
    let on_progress: ProgressFn = Arc::new(move |sent, total| {
        handle.set_length(total);
        handle.set_position(sent);
    });
    (bar, on_progress)
}

fn print_file(label: &str, file: &storage::DownloadedFile) {
    println!("✔ {}: {} ({} bytes)", label, file.path.display(), file.size);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut config = Config::load()?.apply_env();
    if let Some(url) = &cli.api_url {
        config.api_url = Some(url.clone());
        config.force_api_url = true;
    }

    let cache = Arc::new(LocalStore::open(&config)?);
    let api = ApiClient::from_config(&config)?;

    match cli.command {
        Commands::Sheets { layout } => {
            let layout = UploadFile::from_path(&layout).await?;
            let mut store = ValidationStore::new(api, cache);

            let sheets = store.list_excel_sheets(&layout).await?;
            println!("シート一覧 ({}):", layout.name);
            println!("{}", serde_json::to_string_pretty(&sheets)?);
        }

        Commands::ValidateLayout { layout, sheet } => {
            let layout = UploadFile::from_path(&layout).await?;
            let mut store = ValidationStore::new(api, cache);

            println!("📐 レイアウト検証: {}\n", layout.name);
            let result = store.validate_layout(&layout, sheet.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Commands::Validate { layout, data, max_errors, sheet, report } => {
            println!("🔎 validador - ファイル検証\n");

            println!("[1/2] ファイルを読み込み中...");
            let layout = UploadFile::from_path(&layout).await?;
            let data = UploadFile::from_path(&data).await?;
            println!("✔ {} / {}\n", layout.name, data.name);

            println!("[2/2] 検証中...");
            let (bar, on_progress) = upload_progress();
            let mut store = ValidationStore::new(api, cache)
                .with_default_max_errors(config.default_max_errors)
                .with_upload_progress(on_progress);

            let outcome = store
                .validate_file(&layout, &data, max_errors, sheet.as_deref())
                .await;
            bar.finish_and_clear();
            let result = outcome?;

            println!("✔ 検証完了\n");
            println!("結果:");
            println!("  タイムスタンプ: {}", result.timestamp);
            if let Some(name) = result.layout_name() {
                println!("  レイアウト: {}", name);
            }
            println!("  総行数: {}", result.resultado.total_linhas);
            println!("  正常行: {}", result.resultado.linhas_validas);
            println!("  エラー行: {}", result.resultado.linhas_com_erro);
            println!("  成功率: {:.2}%", store.success_rate());
            println!("  エラー件数: {}", store.total_errors());
            for (kind, count) in store.errors_by_type() {
                println!("    {}: {}", kind, count);
            }

            if let Some(format) = report {
                let file = store.download_report(&result.timestamp, format)?;
                print_file("レポート出力", &file);
            }

            store.flush_history().await;
            println!("\n✅ 完了");
        }

        Commands::Report { timestamp, format } => {
            let mut store = ValidationStore::new(api, cache);
            let file = store.download_report(&timestamp, format)?;
            print_file("レポート出力", &file);
        }

        Commands::FetchReport { timestamp, format } => {
            let mut store = ValidationStore::new(api, cache);
            let file = store.fetch_report(&timestamp, format).await?;
            print_file("レポート取得", &file);
        }

        Commands::Cache { action } => match action {
            CacheAction::Stats => {
                let stats = cache.storage_stats();
                println!("キャッシュ情報:");
                println!("  パス: {}", cache.root().display());
                println!("  validations: {}", stats.validations);
                println!("  comparisons: {}", stats.comparisons);
                println!("  layouts: {}", stats.layouts);
                println!("  合計: {}", stats.total);
            }
            CacheAction::List { namespace } => {
                let entries = cache.get_all(namespace);
                if entries.is_empty() {
                    println!("{} は空です", namespace);
                }
                for (key, value) in &entries {
                    let saved_at = value
                        .get(storage::SAVED_AT_FIELD)
                        .and_then(|v| v.as_str())
                        .unwrap_or("-");
                    println!("  {}  ({})", key, saved_at);
                }
            }
            CacheAction::Show { namespace, key } => match cache.get(namespace, &key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => println!("エントリが存在しません: {} / {}", namespace, key),
            },
            CacheAction::Remove { namespace, key } => {
                if cache.remove(namespace, &key)? {
                    println!("✔ 削除しました: {} / {}", namespace, key);
                } else {
                    println!("エントリが存在しません: {} / {}", namespace, key);
                }
            }
            CacheAction::Clean { max_days } => {
                let removed = cache.clean_old_data(max_days)?;
                println!("✔ {}日より古いデータを{}件削除しました", max_days, removed);
            }
            CacheAction::Clear => {
                cache.clear_all()?;
                println!("✔ キャッシュを削除しました ({})", Namespace::ALL.len());
            }
        },

        Commands::Config { show, set_api_url, force_api_url, set_origin } => {
            // 環境変数を含めず、ファイルの内容だけを書き換える
            let mut stored = Config::load()?;
            let mut changed = false;

            if let Some(url) = set_api_url {
                stored.api_url = Some(url).filter(|u| !u.trim().is_empty());
                changed = true;
            }
            if let Some(force) = force_api_url {
                stored.force_api_url = force;
                changed = true;
            }
            if let Some(origin) = set_origin {
                stored.origin = origin;
                changed = true;
            }
            if changed {
                stored.save()?;
                println!("✔ 設定を保存しました: {}", Config::config_path()?.display());
                config = stored.apply_env();
            }

            if show || !changed {
                println!("設定:");
                println!("  APIのURL: {}", config.base_url());
                println!("  開発モード: {}", config.dev_mode);
                println!("  タイムアウト: {}秒", config.timeout_seconds);
                println!("  最大エラー数: {}", config.default_max_errors);
                println!("  キャッシュ: {}", cache.root().display());
                println!("  ダウンロード先: {}", config.download_dir().display());
            }
        }
    }

    Ok(())
}
