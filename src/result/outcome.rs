use super::QueryResult;

/// What a successfully executed command produced.
///
/// Continuations match on this instead of downcasting an untyped result.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// CREATE TABLE finished; carries the table name.
    TableCreated(String),
    /// INSERT / UPDATE / DELETE / DROP TABLE finished.
    RowsAffected(usize),
    /// SELECT finished.
    ResultSet(QueryResult),
    /// ALTER TABLE finished.
    Void,
}

impl CommandOutcome {
    pub fn rows_affected(&self) -> Option<usize> {
        match self {
            Self::RowsAffected(n) => Some(*n),
            _ => None,
        }
    }

    pub fn result_set(&self) -> Option<&QueryResult> {
        match self {
            Self::ResultSet(result) => Some(result),
            _ => None,
        }
    }
}
