/// DB操作ゲートウェイ Lambdaエントリポイント
///
/// CRUD関数・確認後トリガーから同期呼び出しされる `{ "payload": {...} }` と、
/// EventBridge経由のUserCreatedイベントを受け取り、ディスパッチャーに委譲する。
///
/// - 直接呼び出し: 失敗時もエラーエンベロープを戻り値として返す
/// - UserCreatedイベント: 失敗時は関数エラーとして返す（EventBridgeの再試行対象）
///
/// 環境変数: TODO_TABLE_NAME, USER_TABLE_NAME
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use todo_backend::application::{
    is_user_created_event, run_gateway, Dispatcher, HandlerOutput, InvokeMode,
    TableNameResolver, TriggerMode,
};
use todo_backend::infrastructure::{init_logging, load_aws_config, DynamoRecordStore, TableConfig};
use tokio::sync::OnceCell;

/// Lambda warm start時にDynamoDBクライアントを再利用するための静的インスタンス
static DISPATCHER: OnceCell<Dispatcher<DynamoRecordStore>> = OnceCell::const_new();

/// ディスパッチャーを取得（初期化されていなければ初期化）
///
/// テーブル名が未設定でも初期化は成功し、解決時に `CONFIGURATION_MISSING` となる。
async fn get_dispatcher() -> &'static Dispatcher<DynamoRecordStore> {
    DISPATCHER
        .get_or_init(|| async {
            let aws_config = load_aws_config().await;
            let store = DynamoRecordStore::new(aws_sdk_dynamodb::Client::new(&aws_config));
            Dispatcher::new(store, TableNameResolver::new(TableConfig::from_env()))
        })
        .await
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // 構造化ログを初期化
    init_logging();

    // Lambda関数を初期化して実行
    let func = service_fn(handler);
    lambda_runtime::run(func).await?;
    Ok(())
}

/// Lambda関数のメインハンドラー
///
/// # 処理フロー
/// 1. イベントの形からトリガー経路か直接呼び出しかを判定
/// 2. ディスパッチャーでペイロードを実行
/// 3. 経路に応じて結果・エラーを変換
async fn handler(event: LambdaEvent<Value>) -> Result<Value, Error> {
    let (payload, _context) = event.into_parts();

    if is_user_created_event(&payload) {
        let result = run_gateway(&TriggerMode, payload, |event| async move {
            let dispatcher = get_dispatcher().await;
            dispatcher.handle_event(event).await.map(HandlerOutput::Data)
        })
        .await?;
        return Ok(result);
    }

    let Ok(result) = run_gateway(&InvokeMode, payload, |event| async move {
        let dispatcher = get_dispatcher().await;
        dispatcher.handle_event(event).await.map(HandlerOutput::Data)
    })
    .await;
    Ok(result)
}
