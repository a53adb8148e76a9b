use super::{ExecutionContext, Executor};
use crate::core::{Result, Row, Schema};
use crate::evaluator::EvaluationContext;
use crate::parser::ast::{Command, OrderByExpr, SelectCmd, SelectItem};
use crate::result::{CommandOutcome, QueryResult};
use std::cmp::Ordering;

/// Single-table SELECT: filter, sort, limit, then project.
pub struct QueryExecutor;

impl Executor for QueryExecutor {
    fn name(&self) -> &'static str {
        "SELECT"
    }

    fn can_handle(&self, command: &Command) -> bool {
        matches!(command, Command::Select(_))
    }

    fn execute(&self, command: &Command, ctx: &mut ExecutionContext<'_>) -> Result<CommandOutcome> {
        let Command::Select(select) = command else {
            unreachable!();
        };

        let table = ctx.table(&select.table_name)?;
        let schema = table.schema().schema();
        let eval = ctx.evaluation(&select.table_name);

        let mut rows = Vec::new();
        for row in table.rows() {
            if eval.matches(select.selection.as_ref(), row, schema)? {
                rows.push(row);
            }
        }

        if !select.order_by.is_empty() {
            rows = self.sort(rows, &select.order_by, &eval, schema)?;
        }
        if let Some(limit) = select.limit {
            rows.truncate(limit);
        }

        let columns = self.output_columns(select, schema);
        let projected = rows
            .into_iter()
            .map(|row| self.project_row(select, row, schema, &eval))
            .collect::<Result<Vec<_>>>()?;

        Ok(CommandOutcome::ResultSet(QueryResult::new(columns, projected)))
    }
}

impl QueryExecutor {
    fn sort<'r>(
        &self,
        rows: Vec<&'r Row>,
        order_by: &[OrderByExpr],
        eval: &EvaluationContext<'_>,
        schema: &Schema,
    ) -> Result<Vec<&'r Row>> {
        // Evaluate keys up front so comparison errors surface before sorting
        let mut keyed = rows
            .into_iter()
            .map(|row| {
                let keys = order_by
                    .iter()
                    .map(|o| eval.evaluate(&o.expr, row, schema))
                    .collect::<Result<Vec<_>>>()?;
                Ok((keys, row))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut error = None;
        keyed.sort_by(|(a, _), (b, _)| {
            for ((left, right), spec) in a.iter().zip(b).zip(order_by) {
                let ordering = match left.compare(right) {
                    Ok(ordering) => ordering,
                    Err(e) => {
                        error.get_or_insert(e);
                        Ordering::Equal
                    }
                };
                let ordering = if spec.descending { ordering.reverse() } else { ordering };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        match error {
            Some(e) => Err(e),
            None => Ok(keyed.into_iter().map(|(_, row)| row).collect()),
        }
    }

    fn output_columns(&self, select: &SelectCmd, schema: &Schema) -> Vec<String> {
        select
            .projection
            .iter()
            .flat_map(|item| match item {
                SelectItem::Wildcard => schema.column_names(),
                SelectItem::Expr { alias: Some(alias), .. } => vec![alias.clone()],
                SelectItem::Expr { expr, alias: None } => vec![expr.display_name()],
            })
            .collect()
    }

    fn project_row(
        &self,
        select: &SelectCmd,
        row: &Row,
        schema: &Schema,
        eval: &EvaluationContext<'_>,
    ) -> Result<Row> {
        let mut projected = Vec::new();
        for item in &select.projection {
            match item {
                SelectItem::Wildcard => projected.extend(row.iter().cloned()),
                SelectItem::Expr { expr, .. } => projected.push(eval.evaluate(expr, row, schema)?),
            }
        }
        Ok(projected)
    }
}
