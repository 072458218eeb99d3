/// ログ基盤モジュール
///
/// CloudWatch向けのJSON構造化ログと、呼び出し単位のスパンを提供する。
/// スパンのフィールド（mode, function）は各ログ行の `span` に出力される。
use std::sync::{Once, OnceLock};

use tracing::Span;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Lambdaランタイムが設定する関数名
const FUNCTION_NAME_VAR: &str = "AWS_LAMBDA_FUNCTION_NAME";

/// Lambda環境向けのログサブスクライバーを初期化する
///
/// `RUST_LOG`（未設定時は `info`）でフィルタリングする。
/// 複数回呼び出しても最初の呼び出しのみ初期化を実行する。
pub fn init_logging() {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_line_number(true)
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false);

        // テストで既に別のサブスクライバーが登録されていても失敗させない
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init();
    });
}

/// ローカル実行時は `local`
fn function_name() -> &'static str {
    static NAME: OnceLock<String> = OnceLock::new();
    NAME.get_or_init(|| std::env::var(FUNCTION_NAME_VAR).unwrap_or_else(|_| "local".to_string()))
}

/// 1回の呼び出しを表すスパン
///
/// # 引数
/// * `mode` - 呼び出し経路（`http` / `trigger` / `invoke`）
pub fn invocation_span(mode: &'static str) -> Span {
    tracing::info_span!("invocation", mode = mode, function = function_name())
}

/// テスト用のログサブスクライバーを初期化する（人間が読みやすい形式）
#[cfg(test)]
pub fn init_test_logging() {
    static TEST_INIT: Once = Once::new();

    TEST_INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_test_writer()
            .compact();

        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init();
    });
}
