// アプリケーション層モジュール
pub mod auth_triggers;
pub mod dispatcher;
pub mod gateway;
pub mod table_resolver;
pub mod todo_handlers;
pub mod upload_url_handler;
pub mod user_handlers;

// 再エクスポート
pub use auth_triggers::{pre_signup, PostConfirmationHandler, UserSink};
pub use dispatcher::{is_user_created_event, Dispatcher};
pub use gateway::{
    run_gateway, serve_http, ApiRequest, ApiResponse, GatewayMode, HandlerOutput, HttpMode,
    InvokeMode, TriggerFailure, TriggerMode,
};
pub use table_resolver::TableNameResolver;
pub use todo_handlers::TodoHandlers;
pub use upload_url_handler::UploadUrlHandler;
pub use user_handlers::UserHandlers;
