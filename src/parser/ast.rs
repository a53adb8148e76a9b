use crate::core::{DataType, Value};
use std::fmt;

/// A compiled, immutable unit of work against one bound database.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateTable(CreateTableCmd),
    AlterTable(AlterTableCmd),
    DropTable(DropTableCmd),
    Insert(InsertCmd),
    Delete(DeleteCmd),
    Update(UpdateCmd),
    Select(SelectCmd),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    CreateTable,
    AlterTable,
    DropTable,
    Insert,
    Delete,
    Update,
    Select,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::CreateTable(_) => CommandKind::CreateTable,
            Command::AlterTable(_) => CommandKind::AlterTable,
            Command::DropTable(_) => CommandKind::DropTable,
            Command::Insert(_) => CommandKind::Insert,
            Command::Delete(_) => CommandKind::Delete,
            Command::Update(_) => CommandKind::Update,
            Command::Select(_) => CommandKind::Select,
        }
    }

    pub fn table_name(&self) -> &str {
        match self {
            Command::CreateTable(c) => &c.table_name,
            Command::AlterTable(c) => &c.table_name,
            Command::DropTable(c) => &c.table_name,
            Command::Insert(c) => &c.table_name,
            Command::Delete(c) => &c.table_name,
            Command::Update(c) => &c.table_name,
            Command::Select(c) => &c.table_name,
        }
    }

    pub fn is_mutating(&self) -> bool {
        !matches!(self, Command::Select(_))
    }

    /// Short human-readable label, e.g. `INSERT users`.
    pub fn summary(&self) -> String {
        format!("{} {}", self.kind(), self.table_name())
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CommandKind::CreateTable => "CREATE TABLE",
            CommandKind::AlterTable => "ALTER TABLE",
            CommandKind::DropTable => "DROP TABLE",
            CommandKind::Insert => "INSERT",
            CommandKind::Delete => "DELETE",
            CommandKind::Update => "UPDATE",
            CommandKind::Select => "SELECT",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableCmd {
    pub table_name: String,
    pub columns: Vec<ColumnDef>,
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterTableCmd {
    pub table_name: String,
    pub operation: AlterTableOperation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlterTableOperation {
    AddColumn(ColumnDef),
    DropColumn(String),
    RenameColumn { old_name: String, new_name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropTableCmd {
    pub table_name: String,
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertCmd {
    pub table_name: String,
    pub columns: Option<Vec<String>>, // None = all columns
    pub values: Vec<Vec<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteCmd {
    pub table_name: String,
    pub selection: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCmd {
    pub table_name: String,
    pub assignments: Vec<Assignment>,
    pub selection: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectCmd {
    pub table_name: String,
    pub projection: Vec<SelectItem>,
    pub selection: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Wildcard,
    Expr { expr: Expr, alias: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(String),
    Literal(Value),
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Not {
        expr: Box<Expr>,
    },
    Negate {
        expr: Box<Expr>,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
}

impl Expr {
    /// Column header used when a projection has no alias.
    pub fn display_name(&self) -> String {
        match self {
            Expr::Column(name) => name.clone(),
            Expr::Literal(value) => value.to_string(),
            Expr::BinaryOp { left, op, right } => {
                format!("{} {} {}", left.display_name(), op, right.display_name())
            }
            Expr::Not { expr } => format!("NOT {}", expr.display_name()),
            Expr::Negate { expr } => format!("-{}", expr.display_name()),
            Expr::IsNull { expr, negated } => {
                let suffix = if *negated { "IS NOT NULL" } else { "IS NULL" };
                format!("{} {}", expr.display_name(), suffix)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo
        )
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        };
        f.write_str(symbol)
    }
}
