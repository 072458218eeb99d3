/// 論理テーブル名から物理テーブル名への解決
use crate::domain::{AppError, LogicalTable};
use crate::infrastructure::TableConfig;

#[derive(Debug, Clone)]
pub struct TableNameResolver {
    config: TableConfig,
}

impl TableNameResolver {
    pub fn new(config: TableConfig) -> Self {
        Self { config }
    }

    /// 論理テーブル名（`Todo` / `User`）を物理テーブル名に解決
    ///
    /// # エラー
    /// 未知の名前、または対応する設定が空・未設定の場合は `CONFIGURATION_MISSING`
    pub fn resolve(&self, logical_name: &str) -> Result<&str, AppError> {
        let table: LogicalTable = logical_name.parse()?;
        self.resolve_table(table)
    }

    pub fn resolve_table(&self, table: LogicalTable) -> Result<&str, AppError> {
        self.config.physical_name(table).ok_or_else(|| {
            AppError::configuration_missing(format!(
                "Database table name not configured for: {}",
                table
            ))
        })
    }
}
