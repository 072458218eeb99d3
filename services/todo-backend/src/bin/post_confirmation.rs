/// Cognito 確認後トリガー
///
/// ステータスを `PENDING` に設定し、メールドメインに応じたグループに追加したうえで
/// ユーザーレコードを作成する。
///
/// 環境変数:
/// - EVENT_BUS_NAME: 設定時はUserCreatedイベントを発行
/// - DB_LAMBDA_NAME: EVENT_BUS_NAME未設定時の書き込み先（必須）
/// - ADMIN_EMAIL_DOMAIN: `admin` グループに割り当てるメールドメイン
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use todo_backend::application::{run_gateway, PostConfirmationHandler, TriggerMode, UserSink};
use todo_backend::infrastructure::{
    init_logging, load_aws_config, CognitoIdentityOps, ConfigError, EventBridgePublisher,
    IdentityConfig, LambdaDbClient,
};
use tokio::sync::OnceCell;
use tracing::info;

type ConfirmationHandler =
    PostConfirmationHandler<CognitoIdentityOps, LambdaDbClient, EventBridgePublisher>;

static HANDLER: OnceCell<ConfirmationHandler> = OnceCell::const_new();

/// ハンドラーを取得（初期化されていなければ初期化）
///
/// # 戻り値
/// * `Ok(&'static ConfirmationHandler)` - 静的参照へのハンドラー
/// * `Err(ConfigError)` - 書き込み先の設定が不足
async fn get_handler() -> Result<&'static ConfirmationHandler, ConfigError> {
    HANDLER
        .get_or_try_init(|| async {
            let config = IdentityConfig::from_env();
            let aws_config = load_aws_config().await;

            let sink = match &config.event_bus_name {
                Some(bus) => {
                    info!(event_bus = %bus, "UserCreatedイベントを発行するモードで初期化");
                    UserSink::EventBus(EventBridgePublisher::new(
                        aws_sdk_eventbridge::Client::new(&aws_config),
                        bus.clone(),
                    ))
                }
                None => UserSink::Dispatcher(LambdaDbClient::from_env().await?),
            };
            let identity =
                CognitoIdentityOps::new(aws_sdk_cognitoidentityprovider::Client::new(&aws_config));

            Ok(PostConfirmationHandler::new(identity, sink, config))
        })
        .await
}

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
    let result = run_gateway(&TriggerMode, payload, |event| async move {
        get_handler().await?.handle(event).await
    })
    .await?;
    Ok(result)
}
