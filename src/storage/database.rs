use crate::core::{DbError, Result};
use crate::evaluator::EvaluatorRegistry;
use crate::executor::{ExecutionContext, ExecutorPipeline};
use crate::parser::ast::Command;
use crate::result::CommandOutcome;
use crate::storage::engine::{ColumnMeta, StorageEngine, TableMeta};
use crate::storage::persistence::{DatabaseFile, DatabaseImage, TableMap};
use crate::storage::table::Table;
use async_trait::async_trait;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// An opened, named database backed by one file under the storage root.
pub struct Database {
    name: String,
    block_size: u32,
    file: DatabaseFile,
    tables: RwLock<TableMap>,
    dropped: AtomicBool,
    executors: ExecutorPipeline,
    evaluators: EvaluatorRegistry,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("block_size", &self.block_size)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Creates `root/name` as an empty database. Fails if the file exists.
    pub fn create(root: impl AsRef<Path>, name: &str, block_size: u32) -> Result<Self> {
        validate_name(name)?;
        let root = root.as_ref();
        let path = root.join(name);
        if path.exists() {
            return Err(DbError::Storage(format!(
                "Database file {} already exists",
                path.display()
            )));
        }

        fs::create_dir_all(root).map_err(|e| {
            DbError::Storage(format!("Failed to create {}: {}", root.display(), e))
        })?;

        let db = Self::from_parts(name.to_string(), block_size, DatabaseFile::new(&path), TableMap::new());
        db.file.create(&DatabaseImage {
            block_size,
            tables: TableMap::new(),
        })?;

        info!("Created database '{}' at {}", name, path.display());
        Ok(db)
    }

    /// Opens an existing database file; the file name is the database name.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DbError::Storage(format!("Invalid database path {}", path.display())))?
            .to_string();

        let file = DatabaseFile::new(path);
        let image = file.load()?;

        info!(
            "Loaded database '{}' ({} tables) from {}",
            name,
            image.tables.len(),
            path.display()
        );
        Ok(Self::from_parts(name, image.block_size, file, image.tables))
    }

    fn from_parts(name: String, block_size: u32, file: DatabaseFile, tables: TableMap) -> Self {
        Self {
            name,
            block_size,
            file,
            tables: RwLock::new(tables),
            dropped: AtomicBool::new(false),
            executors: ExecutorPipeline::default(),
            evaluators: EvaluatorRegistry::default(),
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Deletes the backing file. Commands still queued against this handle
    /// fail with `NotLoaded` instead of recreating it.
    pub async fn destroy(&self) -> Result<()> {
        let _tables = self.tables.write().await;
        self.file.delete()?;
        self.dropped.store(true, Ordering::SeqCst);
        info!("Deleted database file {}", self.file.path().display());
        Ok(())
    }

    fn run(&self, command: &Command, tables: &mut TableMap) -> Result<CommandOutcome> {
        let mut ctx = ExecutionContext::new(tables, &self.evaluators);
        self.executors.execute(command, &mut ctx)
    }
}

#[async_trait]
impl StorageEngine for Database {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, command: &Command) -> Result<CommandOutcome> {
        let mut tables = self.tables.write().await;
        if self.dropped.load(Ordering::SeqCst) {
            return Err(DbError::NotLoaded(self.name.clone()));
        }

        if !command.is_mutating() {
            return self.run(command, &mut tables);
        }

        // Stage on a copy so a failed command or failed write changes nothing
        let mut staged = tables.clone();
        let outcome = self.run(command, &mut staged)?;
        let image = DatabaseImage {
            block_size: self.block_size,
            tables: staged,
        };
        self.file.save(&image)?;
        *tables = image.tables;

        Ok(outcome)
    }

    async fn tables(&self) -> Vec<TableMeta> {
        let tables = self.tables.read().await;
        tables.values().map(table_meta).collect()
    }
}

fn table_meta(table: &Table) -> TableMeta {
    TableMeta {
        name: table.schema().name().to_string(),
        columns: table
            .schema()
            .schema()
            .columns()
            .iter()
            .map(|c| ColumnMeta {
                name: c.name.clone(),
                data_type: c.data_type.to_string(),
                nullable: c.nullable,
            })
            .collect(),
        row_count: table.row_count(),
    }
}

fn validate_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if invalid {
        return Err(DbError::Storage(format!("Invalid database name '{}'", name)));
    }
    Ok(())
}

/// Lists every regular, non-hidden file directly under `root`.
pub fn database_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        // Leftover temp files from interrupted writes start with '.'
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if entry.file_type()?.is_file() && !hidden {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
