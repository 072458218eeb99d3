/// Cognito サインアップ前トリガー
///
/// ユーザー属性を検証し、自動確認・メール自動検証を無効にしたイベントを返す。
/// 検証失敗時はメッセージのみのエラーとしてサインアップを拒否する。
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use todo_backend::application::{pre_signup, run_gateway, TriggerMode};
use todo_backend::infrastructure::init_logging;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // 構造化ログを初期化
    init_logging();

    let func = service_fn(handler);
    lambda_runtime::run(func).await?;
    Ok(())
}

async fn handler(event: LambdaEvent<Value>) -> Result<Value, Error> {
    let (payload, _context) = event.into_parts();
    let result = run_gateway(&TriggerMode, payload, |event| async move { pre_signup(event) }).await?;
    Ok(result)
}
