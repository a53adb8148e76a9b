use crate::core::Result;
use crate::parser::ast::Command;
use crate::result::CommandOutcome;
use async_trait::async_trait;
use serde::Serialize;

/// Execution entry point of an opened database.
///
/// The transaction manager is the only caller of [`StorageEngine::execute`];
/// metadata reads may happen concurrently from any task.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, command: &Command) -> Result<CommandOutcome>;

    async fn tables(&self) -> Vec<TableMeta>;

    async fn table(&self, name: &str) -> Option<TableMeta> {
        self.tables().await.into_iter().find(|t| t.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableMeta {
    pub name: String,
    pub columns: Vec<ColumnMeta>,
    pub row_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ColumnMeta {
    pub name: String,
    #[serde(rename = "Type")]
    pub data_type: String,
    pub nullable: bool,
}
