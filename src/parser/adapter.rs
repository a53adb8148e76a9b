use sqlparser::ast as sql_ast;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use crate::core::{DataType, DbError, Result};
use crate::parser::ast::*;
use crate::plugins::ExpressionConverter;

/// Compiles raw query text into an ordered command sequence.
///
/// Compilation is all-or-nothing: one unsupported statement fails the whole
/// text with [`DbError::ParseError`] and no command is produced.
pub struct CommandCompiler {
    dialect: PostgreSqlDialect,
    expr_converter: ExpressionConverter,
}

impl CommandCompiler {
    pub fn new() -> Self {
        Self {
            dialect: PostgreSqlDialect {},
            expr_converter: ExpressionConverter::new(),
        }
    }

    pub fn compile(&self, sql: &str) -> Result<Vec<Command>> {
        let statements = Parser::parse_sql(&self.dialect, sql)
            .map_err(|e| DbError::ParseError(e.to_string()))?;

        if statements.is_empty() {
            return Err(DbError::ParseError("No statement found".into()));
        }

        statements
            .into_iter()
            .map(|stmt| self.convert_statement(stmt))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| match e {
                DbError::ParseError(msg) => DbError::ParseError(msg),
                other => DbError::ParseError(other.to_string()),
            })
    }

    fn convert_statement(&self, stmt: sql_ast::Statement) -> Result<Command> {
        match stmt {
            sql_ast::Statement::CreateTable(create) => {
                Ok(Command::CreateTable(self.convert_create_table(create)?))
            }
            sql_ast::Statement::AlterTable { name, operations, .. } => {
                let mut operations = operations.into_iter();
                match (operations.next(), operations.next()) {
                    (Some(operation), None) => {
                        Ok(Command::AlterTable(self.convert_alter_table(name, operation)?))
                    }
                    _ => Err(DbError::UnsupportedOperation(
                        "Only single ALTER TABLE operation supported".into(),
                    )),
                }
            }
            sql_ast::Statement::Drop { object_type, names, if_exists, .. } => {
                if let sql_ast::ObjectType::Table = object_type {
                    Ok(Command::DropTable(self.convert_drop_table(names, if_exists)?))
                } else {
                    Err(DbError::UnsupportedOperation(format!(
                        "Only DROP TABLE supported, got: {}",
                        object_type
                    )))
                }
            }
            sql_ast::Statement::Insert(insert) => {
                Ok(Command::Insert(self.convert_insert(insert)?))
            }
            sql_ast::Statement::Query(query) => {
                Ok(Command::Select(self.convert_query(*query)?))
            }
            sql_ast::Statement::Delete(delete) => {
                Ok(Command::Delete(self.convert_delete(delete)?))
            }
            sql_ast::Statement::Update { table, assignments, from, selection, returning, or, limit } => {
                reject_clauses("UPDATE", &[
                    ("OR", or.is_some()),
                    ("FROM", from.is_some()),
                    ("RETURNING", returning.is_some()),
                    ("LIMIT", limit.is_some()),
                ])?;
                Ok(Command::Update(self.convert_update(table, assignments, selection)?))
            }
            other => Err(DbError::UnsupportedOperation(format!(
                "Statement type not supported: {}",
                other
            ))),
        }
    }

    fn convert_create_table(&self, create: sql_ast::CreateTable) -> Result<CreateTableCmd> {
        let table_name = extract_table_name(&create.name)?;
        if create.columns.is_empty() {
            return Err(DbError::ParseError(format!(
                "Table '{}' must declare at least one column",
                table_name
            )));
        }
        reject_clauses("CREATE TABLE", &[
            ("table constraints", !create.constraints.is_empty()),
            ("AS SELECT", create.query.is_some()),
        ])?;

        let columns = create
            .columns
            .into_iter()
            .map(|col| self.convert_column_def(col))
            .collect::<Result<Vec<_>>>()?;

        Ok(CreateTableCmd {
            table_name,
            columns,
            if_not_exists: create.if_not_exists,
        })
    }

    fn convert_drop_table(&self, names: Vec<sql_ast::ObjectName>, if_exists: bool) -> Result<DropTableCmd> {
        let [name] = names.as_slice() else {
            return Err(DbError::UnsupportedOperation(
                "Only single table DROP supported".into(),
            ));
        };

        Ok(DropTableCmd {
            table_name: extract_table_name(name)?,
            if_exists,
        })
    }

    fn convert_alter_table(
        &self,
        name: sql_ast::ObjectName,
        operation: sql_ast::AlterTableOperation,
    ) -> Result<AlterTableCmd> {
        let table_name = extract_table_name(&name)?;
        let operation = match operation {
            sql_ast::AlterTableOperation::AddColumn { column_def, .. } => {
                AlterTableOperation::AddColumn(self.convert_column_def(column_def)?)
            }
            sql_ast::AlterTableOperation::DropColumn { column_names, .. } => {
                let [column] = column_names.as_slice() else {
                    return Err(DbError::UnsupportedOperation(
                        "Only single column drop supported".into(),
                    ));
                };
                AlterTableOperation::DropColumn(column.value.clone())
            }
            sql_ast::AlterTableOperation::RenameColumn { old_column_name, new_column_name } => {
                AlterTableOperation::RenameColumn {
                    old_name: old_column_name.value,
                    new_name: new_column_name.value,
                }
            }
            other => {
                return Err(DbError::UnsupportedOperation(format!(
                    "Unsupported ALTER TABLE operation: {}",
                    other
                )));
            }
        };

        Ok(AlterTableCmd {
            table_name,
            operation,
        })
    }

    fn convert_column_def(&self, col: sql_ast::ColumnDef) -> Result<ColumnDef> {
        let data_type = convert_data_type(&col.data_type)?;

        let mut nullable = true;
        for opt in &col.options {
            match &opt.option {
                sql_ast::ColumnOption::Null => {}
                sql_ast::ColumnOption::NotNull => nullable = false,
                other => {
                    return Err(DbError::UnsupportedOperation(format!(
                        "Column option not supported: {}",
                        other
                    )));
                }
            }
        }

        Ok(ColumnDef {
            name: col.name.value,
            data_type,
            nullable,
        })
    }

    fn convert_insert(&self, insert: sql_ast::Insert) -> Result<InsertCmd> {
        reject_clauses("INSERT", &[
            ("OR", insert.or.is_some()),
            ("IGNORE", insert.ignore),
            ("ON CONFLICT", insert.on.is_some()),
            ("RETURNING", insert.returning.is_some()),
        ])?;
        let table_name = insert.table.to_string();

        let columns = if insert.columns.is_empty() {
            None
        } else {
            Some(insert.columns.into_iter().map(|id| id.value).collect())
        };

        let Some(source) = insert.source else {
            return Err(DbError::ParseError("INSERT requires a VALUES clause".into()));
        };

        let sql_ast::SetExpr::Values(vals) = *source.body else {
            return Err(DbError::UnsupportedOperation(
                "Only VALUES clause supported".into(),
            ));
        };

        let values = vals
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|expr| self.expr_converter.convert(expr))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(InsertCmd {
            table_name,
            columns,
            values,
        })
    }

    fn convert_delete(&self, delete: sql_ast::Delete) -> Result<DeleteCmd> {
        reject_clauses("DELETE", &[
            ("multiple targets", !delete.tables.is_empty()),
            ("USING", delete.using.is_some()),
            ("RETURNING", delete.returning.is_some()),
            ("ORDER BY", !delete.order_by.is_empty()),
            ("LIMIT", delete.limit.is_some()),
        ])?;
        let tables = match delete.from {
            sql_ast::FromTable::WithFromKeyword(tables) => tables,
            sql_ast::FromTable::WithoutKeyword(tables) => tables,
        };
        let [table] = tables.as_slice() else {
            return Err(DbError::ParseError("DELETE requires exactly one table".into()));
        };
        let table_name = single_table_name(table)?;

        let selection = delete
            .selection
            .map(|expr| self.expr_converter.convert(expr))
            .transpose()?;

        Ok(DeleteCmd {
            table_name,
            selection,
        })
    }

    fn convert_update(
        &self,
        table: sql_ast::TableWithJoins,
        assignments: Vec<sql_ast::Assignment>,
        selection: Option<sql_ast::Expr>,
    ) -> Result<UpdateCmd> {
        let table_name = single_table_name(&table)?;

        let assignments = assignments
            .into_iter()
            .map(|assign| {
                let column = match assign.target {
                    sql_ast::AssignmentTarget::ColumnName(col_name) => extract_table_name(&col_name)?,
                    _ => {
                        return Err(DbError::UnsupportedOperation(
                            "Only simple column names supported in UPDATE".into(),
                        ));
                    }
                };
                let value = self.expr_converter.convert(assign.value)?;
                Ok(Assignment { column, value })
            })
            .collect::<Result<Vec<_>>>()?;

        let selection = selection
            .map(|expr| self.expr_converter.convert(expr))
            .transpose()?;

        Ok(UpdateCmd {
            table_name,
            assignments,
            selection,
        })
    }

    fn convert_query(&self, query: sql_ast::Query) -> Result<SelectCmd> {
        reject_clauses("SELECT", &[
            ("WITH", query.with.is_some()),
            ("FETCH", query.fetch.is_some()),
            ("locking clause", !query.locks.is_empty()),
        ])?;
        let order_by = self.convert_order_by(query.order_by)?;
        let limit = self.convert_limit_clause(&query.limit_clause)?;

        let sql_ast::SetExpr::Select(select) = *query.body else {
            return Err(DbError::UnsupportedOperation(
                "Only SELECT queries supported".into(),
            ));
        };
        let select = *select;

        let grouped = !matches!(
            &select.group_by,
            sql_ast::GroupByExpr::Expressions(exprs, modifiers) if exprs.is_empty() && modifiers.is_empty()
        );
        reject_clauses("SELECT", &[
            ("DISTINCT", select.distinct.is_some()),
            ("TOP", select.top.is_some()),
            ("INTO", select.into.is_some()),
            ("GROUP BY", grouped),
            ("HAVING", select.having.is_some()),
            ("QUALIFY", select.qualify.is_some()),
            ("WINDOW", !select.named_window.is_empty()),
        ])?;

        let [table] = select.from.as_slice() else {
            return Err(DbError::UnsupportedOperation(
                "SELECT must read from exactly one table".into(),
            ));
        };
        let table_name = single_table_name(table)?;

        let projection = select
            .projection
            .into_iter()
            .map(|item| self.convert_select_item(item))
            .collect::<Result<Vec<_>>>()?;

        let selection = select
            .selection
            .map(|expr| self.expr_converter.convert(expr))
            .transpose()?;

        Ok(SelectCmd {
            table_name,
            projection,
            selection,
            order_by,
            limit,
        })
    }

    fn convert_select_item(&self, item: sql_ast::SelectItem) -> Result<SelectItem> {
        match item {
            sql_ast::SelectItem::Wildcard(_) => Ok(SelectItem::Wildcard),
            sql_ast::SelectItem::UnnamedExpr(expr) => Ok(SelectItem::Expr {
                expr: self.expr_converter.convert(expr)?,
                alias: None,
            }),
            sql_ast::SelectItem::ExprWithAlias { expr, alias } => Ok(SelectItem::Expr {
                expr: self.expr_converter.convert(expr)?,
                alias: Some(alias.value),
            }),
            other => Err(DbError::UnsupportedOperation(format!(
                "Unsupported select item: {}",
                other
            ))),
        }
    }

    fn convert_order_by(&self, order_by: Option<sql_ast::OrderBy>) -> Result<Vec<OrderByExpr>> {
        let Some(order_by) = order_by else {
            return Ok(Vec::new());
        };

        match order_by.kind {
            sql_ast::OrderByKind::Expressions(exprs) => exprs
                .into_iter()
                .map(|order| {
                    Ok(OrderByExpr {
                        expr: self.expr_converter.convert(order.expr)?,
                        // ASC unless DESC is explicit
                        descending: order.options.asc.map(|asc| !asc).unwrap_or(false),
                    })
                })
                .collect(),
            sql_ast::OrderByKind::All(_) => Err(DbError::UnsupportedOperation(
                "ORDER BY ALL not supported".into(),
            )),
        }
    }

    fn convert_limit_clause(&self, limit_clause: &Option<sql_ast::LimitClause>) -> Result<Option<usize>> {
        let Some(clause) = limit_clause else {
            return Ok(None);
        };

        let limit = match clause {
            sql_ast::LimitClause::LimitOffset { limit, offset: None, limit_by } if limit_by.is_empty() => {
                limit.as_ref()
            }
            _ => {
                return Err(DbError::UnsupportedOperation(format!(
                    "{} is not supported, only a plain LIMIT is",
                    clause
                )));
            }
        };

        match limit {
            None => Ok(None),
            Some(sql_ast::Expr::Value(value_with_span)) => match &value_with_span.value {
                sql_ast::Value::Number(n, _) => n
                    .parse::<usize>()
                    .map(Some)
                    .map_err(|_| DbError::ParseError(format!("Invalid LIMIT value: {}", n))),
                other => Err(DbError::ParseError(format!("Invalid LIMIT value: {}", other))),
            },
            Some(_) => Err(DbError::UnsupportedOperation(
                "Only numeric LIMIT supported".into(),
            )),
        }
    }
}

impl Default for CommandCompiler {
    fn default() -> Self {
        Self::new()
    }
}

fn convert_data_type(dt: &sql_ast::DataType) -> Result<DataType> {
    match dt {
        sql_ast::DataType::Int(_)
        | sql_ast::DataType::Integer(_)
        | sql_ast::DataType::BigInt(_) => Ok(DataType::Integer),

        sql_ast::DataType::Float(_)
        | sql_ast::DataType::Double(_)
        | sql_ast::DataType::Real => Ok(DataType::Float),

        sql_ast::DataType::Text
        | sql_ast::DataType::Varchar(_)
        | sql_ast::DataType::Char(_)
        | sql_ast::DataType::String(_) => Ok(DataType::Text),

        sql_ast::DataType::Boolean
        | sql_ast::DataType::Bool => Ok(DataType::Boolean),

        _ => Err(DbError::TypeMismatch(format!("Unsupported data type: {}", dt))),
    }
}

/// Fails on the first clause present that the engine does not execute.
fn reject_clauses(statement: &str, clauses: &[(&str, bool)]) -> Result<()> {
    match clauses.iter().find(|(_, present)| *present) {
        Some((clause, _)) => Err(DbError::UnsupportedOperation(format!(
            "{} with {} is not supported",
            statement, clause
        ))),
        None => Ok(()),
    }
}

fn single_table_name(table: &sql_ast::TableWithJoins) -> Result<String> {
    if !table.joins.is_empty() {
        return Err(DbError::UnsupportedOperation("JOIN is not supported".into()));
    }
    match &table.relation {
        sql_ast::TableFactor::Table { name, .. } => extract_table_name(name),
        _ => Err(DbError::UnsupportedOperation(
            "Complex table references not supported".into(),
        )),
    }
}

fn extract_table_name(name: &sql_ast::ObjectName) -> Result<String> {
    name.0
        .last()
        .map(|ident| ident.to_string())
        .ok_or_else(|| DbError::ParseError("Invalid table name".into()))
}
