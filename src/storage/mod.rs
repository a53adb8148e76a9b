pub mod database;
pub mod engine;
pub mod persistence;
pub mod table;

pub use database::Database;
pub use engine::{ColumnMeta, StorageEngine, TableMeta};
pub use persistence::{DatabaseFile, DatabaseImage, TableMap};
pub use table::{Table, TableSchema};
