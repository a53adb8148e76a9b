use super::{ExecutionContext, Executor};
use crate::core::{DbError, Result, Row, Schema, Value};
use crate::parser::ast::{Command, InsertCmd};
use crate::result::CommandOutcome;

pub struct InsertExecutor;

impl Executor for InsertExecutor {
    fn name(&self) -> &'static str {
        "INSERT"
    }

    fn can_handle(&self, command: &Command) -> bool {
        matches!(command, Command::Insert(_))
    }

    fn execute(&self, command: &Command, ctx: &mut ExecutionContext<'_>) -> Result<CommandOutcome> {
        let Command::Insert(insert) = command else {
            unreachable!();
        };

        let rows = self.build_rows(insert, ctx)?;
        let count = rows.len();

        let table = ctx.table_mut(&insert.table_name)?;
        for row in rows {
            table.insert(row)?;
        }
        Ok(CommandOutcome::RowsAffected(count))
    }
}

impl InsertExecutor {
    fn build_rows(&self, insert: &InsertCmd, ctx: &ExecutionContext<'_>) -> Result<Vec<Row>> {
        let table = ctx.table(&insert.table_name)?;
        let schema = table.schema().schema();

        // Position in the full row for each supplied value
        let targets: Vec<usize> = match &insert.columns {
            Some(names) => names
                .iter()
                .map(|name| table.column_index(name))
                .collect::<Result<Vec<_>>>()?,
            None => (0..schema.column_count()).collect(),
        };

        // VALUES cannot reference columns, so evaluate against an empty row
        let eval = ctx.evaluation(&insert.table_name);
        let empty_schema = Schema::default();
        let empty_row: Row = Vec::new();

        insert
            .values
            .iter()
            .map(|exprs| {
                if exprs.len() != targets.len() {
                    return Err(DbError::ExecutionError(format!(
                        "Expected {} values, got {}",
                        targets.len(),
                        exprs.len()
                    )));
                }

                let mut row = vec![Value::Null; schema.column_count()];
                for (expr, &idx) in exprs.iter().zip(&targets) {
                    row[idx] = eval.evaluate(expr, &empty_row, &empty_schema)?;
                }
                Ok(row)
            })
            .collect()
    }
}

pub struct UpdateExecutor;

impl Executor for UpdateExecutor {
    fn name(&self) -> &'static str {
        "UPDATE"
    }

    fn can_handle(&self, command: &Command) -> bool {
        matches!(command, Command::Update(_))
    }

    fn execute(&self, command: &Command, ctx: &mut ExecutionContext<'_>) -> Result<CommandOutcome> {
        let Command::Update(update) = command else {
            unreachable!();
        };

        let updates = {
            let table = ctx.table(&update.table_name)?;
            let schema = table.schema().schema();
            let eval = ctx.evaluation(&update.table_name);

            let assignments = update
                .assignments
                .iter()
                .map(|a| Ok((table.column_index(&a.column)?, &a.value)))
                .collect::<Result<Vec<_>>>()?;

            let mut updates = Vec::new();
            for (idx, row) in table.rows().iter().enumerate() {
                if !eval.matches(update.selection.as_ref(), row, schema)? {
                    continue;
                }
                // SET expressions all see the pre-update row
                let mut new_row = row.clone();
                for (col_idx, expr) in &assignments {
                    new_row[*col_idx] = eval.evaluate(expr, row, schema)?;
                }
                updates.push((idx, new_row));
            }
            updates
        };

        let count = ctx.table_mut(&update.table_name)?.update(updates)?;
        Ok(CommandOutcome::RowsAffected(count))
    }
}

pub struct DeleteExecutor;

impl Executor for DeleteExecutor {
    fn name(&self) -> &'static str {
        "DELETE"
    }

    fn can_handle(&self, command: &Command) -> bool {
        matches!(command, Command::Delete(_))
    }

    fn execute(&self, command: &Command, ctx: &mut ExecutionContext<'_>) -> Result<CommandOutcome> {
        let Command::Delete(delete) = command else {
            unreachable!();
        };

        let keep = {
            let table = ctx.table(&delete.table_name)?;
            let schema = table.schema().schema();
            let eval = ctx.evaluation(&delete.table_name);

            table
                .rows()
                .iter()
                .map(|row| Ok(!eval.matches(delete.selection.as_ref(), row, schema)?))
                .collect::<Result<Vec<bool>>>()?
        };

        let count = ctx.table_mut(&delete.table_name)?.retain_by_mask(&keep);
        Ok(CommandOutcome::RowsAffected(count))
    }
}

#[cfg(test)]
mod tests {
    use super::super::ExecutorPipeline;
    use super::*;
    use crate::evaluator::EvaluatorRegistry;
    use crate::parser::CommandCompiler;
    use crate::storage::persistence::TableMap;

    fn run(tables: &mut TableMap, sql: &str) -> Result<CommandOutcome> {
        let registry = EvaluatorRegistry::default();
        let pipeline = ExecutorPipeline::default();
        let mut ctx = ExecutionContext::new(tables, &registry);
        let mut outcome = Ok(CommandOutcome::Void);
        for command in CommandCompiler::new().compile(sql)? {
            outcome = pipeline.execute(&command, &mut ctx);
        }
        outcome
    }

    fn setup() -> TableMap {
        let mut tables = TableMap::new();
        run(&mut tables, "CREATE TABLE users (id INTEGER NOT NULL, name TEXT, age INTEGER)").unwrap();
        run(
            &mut tables,
            "INSERT INTO users VALUES (1, 'Alice', 30), (2, 'Bob', 25), (3, 'Carol', NULL)",
        )
        .unwrap();
        tables
    }

    #[test]
    fn test_insert_with_column_list() {
        let mut tables = setup();
        let outcome = run(&mut tables, "INSERT INTO users (name, id) VALUES ('Dave', 4)").unwrap();
        assert_eq!(outcome.rows_affected(), Some(1));
        assert_eq!(
            tables["users"].rows()[3],
            vec![Value::Integer(4), Value::from("Dave"), Value::Null]
        );
    }

    #[test]
    fn test_insert_errors() {
        let mut tables = setup();
        assert!(matches!(
            run(&mut tables, "INSERT INTO missing VALUES (1)"),
            Err(DbError::TableNotFound(_))
        ));
        assert!(matches!(
            run(&mut tables, "INSERT INTO users VALUES ('x', 'y', 1)"),
            Err(DbError::TypeMismatch(_))
        ));
        assert!(matches!(
            run(&mut tables, "INSERT INTO users (name) VALUES ('nobody')"),
            Err(DbError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn test_update_with_where() {
        let mut tables = setup();
        let outcome = run(&mut tables, "UPDATE users SET age = age + 1 WHERE age >= 25").unwrap();
        assert_eq!(outcome.rows_affected(), Some(2));
        assert_eq!(tables["users"].rows()[0][2], Value::Integer(31));
        assert_eq!(tables["users"].rows()[2][2], Value::Null);
    }

    #[test]
    fn test_delete_all_and_filtered() {
        let mut tables = setup();
        let outcome = run(&mut tables, "DELETE FROM users WHERE age IS NULL").unwrap();
        assert_eq!(outcome.rows_affected(), Some(1));

        let outcome = run(&mut tables, "DELETE FROM users").unwrap();
        assert_eq!(outcome.rows_affected(), Some(2));
        assert_eq!(tables["users"].row_count(), 0);
    }
}
