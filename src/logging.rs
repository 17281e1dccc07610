use tracing_subscriber::EnvFilter;

/// tracingの初期化
///
/// `RUST_LOG` があればそれを優先し、無ければ `verbose` で warn/debug を切り替える。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("layout_validator={}", default_level)));

    // 二重初期化（テスト等）は無視
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
