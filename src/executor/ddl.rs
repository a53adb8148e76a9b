use super::{ExecutionContext, Executor};
use crate::core::{Column, DbError, Result};
use crate::parser::ast::{AlterTableOperation, ColumnDef, Command};
use crate::result::CommandOutcome;
use crate::storage::table::{Table, TableSchema};

fn to_column(def: &ColumnDef) -> Column {
    Column {
        name: def.name.clone(),
        data_type: def.data_type.clone(),
        nullable: def.nullable,
    }
}

pub struct CreateTableExecutor;

impl Executor for CreateTableExecutor {
    fn name(&self) -> &'static str {
        "CREATE TABLE"
    }

    fn can_handle(&self, command: &Command) -> bool {
        matches!(command, Command::CreateTable(_))
    }

    fn execute(&self, command: &Command, ctx: &mut ExecutionContext<'_>) -> Result<CommandOutcome> {
        let Command::CreateTable(create) = command else {
            unreachable!();
        };

        if ctx.tables.contains_key(&create.table_name) {
            if create.if_not_exists {
                return Ok(CommandOutcome::TableCreated(create.table_name.clone()));
            }
            return Err(DbError::TableExists(create.table_name.clone()));
        }

        let mut columns: Vec<Column> = Vec::with_capacity(create.columns.len());
        for def in &create.columns {
            if columns.iter().any(|c| c.name == def.name) {
                return Err(DbError::ExecutionError(format!(
                    "Duplicate column '{}' in table '{}'",
                    def.name, create.table_name
                )));
            }
            columns.push(to_column(def));
        }

        let table = Table::new(TableSchema::new(create.table_name.clone(), columns));
        ctx.tables.insert(create.table_name.clone(), table);
        Ok(CommandOutcome::TableCreated(create.table_name.clone()))
    }
}

pub struct DropTableExecutor;

impl Executor for DropTableExecutor {
    fn name(&self) -> &'static str {
        "DROP TABLE"
    }

    fn can_handle(&self, command: &Command) -> bool {
        matches!(command, Command::DropTable(_))
    }

    fn execute(&self, command: &Command, ctx: &mut ExecutionContext<'_>) -> Result<CommandOutcome> {
        let Command::DropTable(drop) = command else {
            unreachable!();
        };

        match ctx.tables.remove(&drop.table_name) {
            Some(table) => Ok(CommandOutcome::RowsAffected(table.row_count())),
            None if drop.if_exists => Ok(CommandOutcome::RowsAffected(0)),
            None => Err(DbError::TableNotFound(drop.table_name.clone())),
        }
    }
}

pub struct AlterTableExecutor;

impl Executor for AlterTableExecutor {
    fn name(&self) -> &'static str {
        "ALTER TABLE"
    }

    fn can_handle(&self, command: &Command) -> bool {
        matches!(command, Command::AlterTable(_))
    }

    fn execute(&self, command: &Command, ctx: &mut ExecutionContext<'_>) -> Result<CommandOutcome> {
        let Command::AlterTable(alter) = command else {
            unreachable!();
        };

        let table = ctx.table_mut(&alter.table_name)?;
        match &alter.operation {
            AlterTableOperation::AddColumn(def) => table.add_column(to_column(def))?,
            AlterTableOperation::DropColumn(name) => table.drop_column(name)?,
            AlterTableOperation::RenameColumn { old_name, new_name } => {
                table.rename_column(old_name, new_name)?
            }
        }
        Ok(CommandOutcome::Void)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::EvaluatorRegistry;
    use crate::parser::CommandCompiler;
    use crate::storage::persistence::TableMap;

    fn run(tables: &mut TableMap, sql: &str) -> Result<CommandOutcome> {
        let registry = EvaluatorRegistry::default();
        let pipeline = super::super::ExecutorPipeline::default();
        let mut ctx = ExecutionContext::new(tables, &registry);
        let mut outcome = Ok(CommandOutcome::Void);
        for command in CommandCompiler::new().compile(sql)? {
            outcome = pipeline.execute(&command, &mut ctx);
        }
        outcome
    }

    #[test]
    fn test_create_and_drop() {
        let mut tables = TableMap::new();
        let outcome = run(&mut tables, "CREATE TABLE t (id INTEGER)").unwrap();
        assert_eq!(outcome, CommandOutcome::TableCreated("t".into()));

        assert!(matches!(run(&mut tables, "CREATE TABLE t (id INTEGER)"), Err(DbError::TableExists(_))));
        assert!(run(&mut tables, "CREATE TABLE IF NOT EXISTS t (id INTEGER)").is_ok());

        run(&mut tables, "DROP TABLE t").unwrap();
        assert!(tables.is_empty());
        assert!(matches!(run(&mut tables, "DROP TABLE t"), Err(DbError::TableNotFound(_))));
        assert!(run(&mut tables, "DROP TABLE IF EXISTS t").is_ok());
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let mut tables = TableMap::new();
        assert!(run(&mut tables, "CREATE TABLE t (id INTEGER, id TEXT)").is_err());
        assert!(tables.is_empty());
    }

    #[test]
    fn test_alter_table() {
        let mut tables = TableMap::new();
        run(&mut tables, "CREATE TABLE t (id INTEGER)").unwrap();
        run(&mut tables, "ALTER TABLE t ADD COLUMN name TEXT").unwrap();
        run(&mut tables, "ALTER TABLE t RENAME COLUMN name TO label").unwrap();

        let names = tables["t"].schema().schema().column_names();
        assert_eq!(names, vec!["id", "label"]);
    }
}
