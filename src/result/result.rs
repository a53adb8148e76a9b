use crate::core::Row;

/// Row set produced by a SELECT command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Serialized row set sent back to clients:
    /// `{"Columns":[...],"Rows":[[...],...]}` with natural JSON scalars.
    pub fn to_json(&self) -> serde_json::Value {
        let rows: Vec<serde_json::Value> = self
            .rows
            .iter()
            .map(|row| serde_json::Value::Array(row.iter().map(|v| v.to_json()).collect()))
            .collect();

        serde_json::json!({
            "Columns": self.columns,
            "Rows": rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;

    #[test]
    fn test_to_json_shape() {
        let result = QueryResult::new(
            vec!["id".into(), "name".into()],
            vec![vec![Value::Integer(1), Value::Text("Alice".into())]],
        );
        let json = result.to_json();
        assert_eq!(json["Columns"], serde_json::json!(["id", "name"]));
        assert_eq!(json["Rows"][0], serde_json::json!([1, "Alice"]));
        assert_eq!(result.row_count(), 1);
    }

    #[test]
    fn test_empty() {
        let result = QueryResult::empty();
        assert!(result.is_empty());
        assert_eq!(result.to_json()["Rows"], serde_json::json!([]));
    }
}
