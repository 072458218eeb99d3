// Infrastructure layer modules
pub mod config;
pub mod db_client;
pub mod event_publisher;
pub mod identity_ops;
pub mod logging;
pub mod record_store;
pub mod upload_signer;

// Re-exports
pub use config::{
    load_aws_config, ConfigError, CorsConfig, DispatcherConfig, IdentityConfig, TableConfig,
    UploadConfig,
};
pub use db_client::{DbClient, DbClientError, LambdaDbClient};
pub use event_publisher::{
    EventBridgePublisher, PublishError, UserEventPublisher, USER_CREATED_DETAIL_TYPE,
    USER_EVENT_SOURCE,
};
pub use identity_ops::{CognitoIdentityOps, IdentityError, IdentityOps};
pub use logging::{init_logging, invocation_span};
#[cfg(test)]
pub use logging::init_test_logging;
pub use record_store::{DynamoRecordStore, InMemoryRecordStore, RecordStore, StoreError};
pub use upload_signer::{S3UploadSigner, SignerError, UploadSigner, UploadTarget};
