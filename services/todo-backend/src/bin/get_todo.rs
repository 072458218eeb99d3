/// GET /v0/todos/{id}
///
/// 存在しないIDは404を返却する。
use lambda_http::{run, service_fn, Body, Error, Request, Response};
use todo_backend::application::{serve_http, TodoHandlers};
use todo_backend::infrastructure::{init_logging, ConfigError, CorsConfig, LambdaDbClient};
use tokio::sync::OnceCell;

static HANDLERS: OnceCell<TodoHandlers<LambdaDbClient>> = OnceCell::const_new();

async fn get_handlers() -> Result<&'static TodoHandlers<LambdaDbClient>, ConfigError> {
    HANDLERS
        .get_or_try_init(|| async { Ok(TodoHandlers::new(LambdaDbClient::from_env().await?)) })
        .await
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // 構造化ログを初期化
    init_logging();

    run(service_fn(handler)).await
}

async fn handler(request: Request) -> Result<Response<Body>, Error> {
    let response = serve_http(CorsConfig::from_env(), request, |req| async move {
        get_handlers().await?.get(req).await
    })
    .await?;
    Ok(response)
}
