/// GET /v0/upload-url
///
/// `contentType` / `contentLength` クエリを検証し、
/// メディアバケットへの署名付きPUT URLを発行する。
///
/// 環境変数: MEDIA_BUCKET（必須）, ALLOWED_TYPES, MAX_SIZE, SIGNED_URL_EXPIRE_IN
use lambda_http::{run, service_fn, Body, Error, Request, Response};
use todo_backend::application::{serve_http, UploadUrlHandler};
use todo_backend::infrastructure::{
    init_logging, load_aws_config, ConfigError, CorsConfig, S3UploadSigner, UploadConfig,
};
use tokio::sync::OnceCell;

static HANDLER: OnceCell<UploadUrlHandler<S3UploadSigner>> = OnceCell::const_new();

async fn get_handler() -> Result<&'static UploadUrlHandler<S3UploadSigner>, ConfigError> {
    HANDLER
        .get_or_try_init(|| async {
            let config = UploadConfig::from_env()?;
            let aws_config = load_aws_config().await;
            let signer = S3UploadSigner::new(aws_sdk_s3::Client::new(&aws_config));
            Ok(UploadUrlHandler::new(signer, config))
        })
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
        get_handler().await?.handle(req).await
    })
    .await?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_http::http::Request as HttpRequest;
    use lambda_http::RequestExt;
    use serde_json::Value;
    use serial_test::serial;
    use std::collections::HashMap;

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    #[tokio::test]
    #[serial(handler_env)]
    async fn test_handler_without_bucket_returns_configuration_missing() {
        unsafe {
            remove_env("MEDIA_BUCKET");
            remove_env("ALLOWED_ORIGINS");
        }

        let request = HttpRequest::builder()
            .method("GET")
            .uri("/v0/upload-url?contentType=image/png&contentLength=1024")
            .body(Body::Empty)
            .unwrap()
            .with_query_string_parameters(HashMap::from([
                ("contentType".to_string(), "image/png".to_string()),
                ("contentLength".to_string(), "1024".to_string()),
            ]));

        let response = handler(request).await.unwrap();

        assert_eq!(response.status(), 500);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        let body: Value = match response.body() {
            Body::Text(text) => serde_json::from_str(text).unwrap(),
            _ => panic!("予期しないBody型"),
        };
        assert_eq!(body["code"], "CONFIGURATION_MISSING");
        assert_eq!(body["message"], "Missing environment variable: MEDIA_BUCKET");
    }
}
