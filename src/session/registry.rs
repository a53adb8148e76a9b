use super::SessionId;
use crate::core::{DbError, Result};
use crate::storage::database::database_files;
use crate::storage::{Database, StorageEngine, TableMeta};
use log::{debug, info};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared, non-owning reference to an opened database.
pub type DatabaseHandle = Arc<Database>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseMetadata {
    #[serde(rename = "DB_Name")]
    pub name: String,
    #[serde(rename = "Tables")]
    pub tables: Vec<TableMeta>,
}

/// Open databases by name, and which database each session is bound to.
///
/// Lock order is always `databases` before `pairs`.
pub struct SessionRegistry {
    databases: RwLock<HashMap<String, DatabaseHandle>>,
    pairs: RwLock<HashMap<SessionId, DatabaseHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            databases: RwLock::new(HashMap::new()),
            pairs: RwLock::new(HashMap::new()),
        }
    }

    /// Binds `session` to the open database `name`, replacing any earlier binding.
    pub async fn pair(&self, session: SessionId, name: &str) -> Result<DatabaseHandle> {
        let databases = self.databases.read().await;
        let handle = databases
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::NotLoaded(name.to_string()))?;

        self.pairs.write().await.insert(session, handle.clone());
        debug!("Session {} paired to '{}'", session, name);
        Ok(handle)
    }

    pub async fn unpair(&self, session: SessionId) -> Result<()> {
        match self.pairs.write().await.remove(&session) {
            Some(handle) => {
                debug!("Session {} unpaired from '{}'", session, handle.name());
                Ok(())
            }
            None => Err(DbError::NotFound(session)),
        }
    }

    /// Drops the session's binding if there is one.
    pub async fn evict(&self, session: SessionId) {
        self.pairs.write().await.remove(&session);
    }

    pub async fn get_pair(&self, session: SessionId) -> Result<DatabaseHandle> {
        self.pairs
            .read()
            .await
            .get(&session)
            .cloned()
            .ok_or(DbError::NoActiveDatabase)
    }

    /// Creates `root/name`, registers it and pairs `session` to it.
    pub async fn create_database(
        &self,
        session: SessionId,
        name: &str,
        root: &Path,
        block_size: u32,
    ) -> Result<DatabaseHandle> {
        if self.databases.read().await.contains_key(name) {
            return Err(DbError::DatabaseExists(name.to_string()));
        }

        // File I/O happens outside the lock; the name is checked again under it
        let handle = Arc::new(Database::create(root, name, block_size)?);

        let mut databases = self.databases.write().await;
        if databases.contains_key(name) {
            drop(databases);
            handle.destroy().await?;
            return Err(DbError::DatabaseExists(name.to_string()));
        }
        databases.insert(name.to_string(), handle.clone());
        self.pairs.write().await.insert(session, handle.clone());

        Ok(handle)
    }

    /// Opens every database file under `root`. Creates `root` if missing.
    pub async fn load_all_databases(&self, root: &Path) -> Result<usize> {
        fs::create_dir_all(root)?;

        let mut opened = Vec::new();
        for path in database_files(root)? {
            opened.push(Database::open(&path)?);
        }

        let mut databases = self.databases.write().await;
        let count = opened.len();
        for db in opened {
            databases.insert(db.name().to_string(), Arc::new(db));
        }

        info!("Loaded {} database(s) from {}", count, root.display());
        Ok(count)
    }

    /// Unregisters `name` and deletes its file. Refused while any session is paired to it.
    pub async fn drop_database(&self, name: &str) -> Result<()> {
        let mut databases = self.databases.write().await;
        if !databases.contains_key(name) {
            return Err(DbError::NotLoaded(name.to_string()));
        }

        let in_use = self
            .pairs
            .read()
            .await
            .values()
            .filter(|handle| handle.name() == name)
            .count();
        if in_use > 0 {
            return Err(DbError::DatabaseInUse(name.to_string(), in_use));
        }

        if let Some(handle) = databases.get(name) {
            handle.destroy().await?;
        }
        databases.remove(name);
        info!("Dropped database '{}'", name);
        Ok(())
    }

    /// Every open database with its tables, sorted by name.
    pub async fn get_metadata(&self) -> Vec<DatabaseMetadata> {
        let mut handles: Vec<DatabaseHandle> = self.databases.read().await.values().cloned().collect();
        handles.sort_by(|a, b| a.name().cmp(b.name()));

        let mut metadata = Vec::with_capacity(handles.len());
        for handle in handles {
            let mut tables = handle.tables().await;
            tables.sort_by(|a, b| a.name.cmp(&b.name));
            metadata.push(DatabaseMetadata {
                name: handle.name().to_string(),
                tables,
            });
        }
        metadata
    }

    pub async fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn paired_sessions(&self, name: &str) -> Vec<SessionId> {
        let mut sessions: Vec<SessionId> = self
            .pairs
            .read()
            .await
            .iter()
            .filter(|(_, handle)| handle.name() == name)
            .map(|(session, _)| *session)
            .collect();
        sessions.sort_unstable();
        sessions
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
