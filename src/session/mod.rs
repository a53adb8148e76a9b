pub mod registry;

pub use registry::{DatabaseHandle, DatabaseMetadata, SessionRegistry};

/// Server-assigned identifier of one client connection.
pub type SessionId = u64;
