//! On-disk format for a single database file.
//!
//! Layout (little endian):
//!
//! ```text
//! magic "MDSQ" | version u16 | block_size u32 | payload_len u64 | payload | zero padding
//! ```
//!
//! The payload is the MessagePack encoding of the table map. The file is
//! padded to a whole number of blocks.

use crate::core::{DbError, Result};
use crate::storage::table::Table;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const MAGIC: &[u8; 4] = b"MDSQ";
pub const FORMAT_VERSION: u16 = 1;
const HEADER_LEN: usize = 4 + 2 + 4 + 8;

pub type TableMap = BTreeMap<String, Table>;

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseImage {
    pub block_size: u32,
    pub tables: TableMap,
}

/// Reads and atomically rewrites one database file.
pub struct DatabaseFile {
    path: PathBuf,
}

impl DatabaseFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Atomically replaces the file with `image`.
    pub fn save(&self, image: &DatabaseImage) -> Result<()> {
        self.stage(image)?
            .persist(&self.path)
            .map_err(|e| DbError::Storage(format!("Failed to persist database file: {}", e.error)))?;
        Ok(())
    }

    /// Writes `image` as a new file. Fails if the file already exists.
    pub fn create(&self, image: &DatabaseImage) -> Result<()> {
        self.stage(image)?.persist_noclobber(&self.path).map_err(|e| {
            DbError::Storage(format!("Database file {} already exists: {}", self.path.display(), e.error))
        })?;
        Ok(())
    }

    // Written and synced beside the target, ready to be renamed over it
    fn stage(&self, image: &DatabaseImage) -> Result<NamedTempFile> {
        let bytes = encode(image)?;
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut temp = NamedTempFile::new_in(dir)
            .map_err(|e| DbError::Storage(format!("Failed to create temp file: {}", e)))?;
        temp.write_all(&bytes)
            .map_err(|e| DbError::Storage(format!("Failed to write database file: {}", e)))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| DbError::Storage(format!("Failed to sync database file: {}", e)))?;
        Ok(temp)
    }

    pub fn load(&self) -> Result<DatabaseImage> {
        let data = fs::read(&self.path).map_err(|e| {
            DbError::Storage(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        decode(&data).map_err(|e| match e {
            DbError::Storage(msg) => DbError::Storage(format!("{}: {}", self.path.display(), msg)),
            other => other,
        })
    }

    pub fn delete(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                DbError::Storage(format!("Failed to delete {}: {}", self.path.display(), e))
            })?;
        }
        Ok(())
    }
}

fn encode(image: &DatabaseImage) -> Result<Vec<u8>> {
    let payload = rmp_serde::to_vec(&image.tables)
        .map_err(|e| DbError::Storage(format!("Failed to serialize tables: {}", e)))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&image.block_size.to_le_bytes());
    bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&payload);

    let block = image.block_size.max(1) as usize;
    let padded = bytes.len().div_ceil(block) * block;
    bytes.resize(padded, 0);
    Ok(bytes)
}

fn decode(data: &[u8]) -> Result<DatabaseImage> {
    if data.len() < HEADER_LEN {
        return Err(DbError::Storage("File too short for header".into()));
    }
    if &data[0..4] != MAGIC {
        return Err(DbError::Storage("Not a database file (bad magic)".into()));
    }

    let version = u16::from_le_bytes([data[4], data[5]]);
    if version != FORMAT_VERSION {
        return Err(DbError::Storage(format!("Unsupported format version {}", version)));
    }

    let block_size = u32::from_le_bytes([data[6], data[7], data[8], data[9]]);
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&data[10..18]);
    let payload_len = usize::try_from(u64::from_le_bytes(len_bytes))
        .map_err(|_| DbError::Storage("Payload length overflow".into()))?;

    let payload = data
        .get(HEADER_LEN..HEADER_LEN.saturating_add(payload_len))
        .ok_or_else(|| DbError::Storage("Truncated payload".into()))?;

    let tables: TableMap = rmp_serde::from_slice(payload)
        .map_err(|e| DbError::Storage(format!("Failed to deserialize tables: {}", e)))?;

    Ok(DatabaseImage { block_size, tables })
}
