// SQL Parser
// Converts SQL text into structured queries with the sqlparser crate.
// Parsing happens in two steps so that a statement can be prepared once:
// `parse_statement` checks the grammar, `bind` fills in placeholders.

use crate::driver::Params;
use crate::storage::{Column, DataType, Schema, Value};
use anyhow::{anyhow, Result};
use sqlparser::ast::{
    BinaryOperator, DataType as SqlDataType, Expr, FromTable, ObjectName, Select, SelectItem,
    SetExpr, Statement, TableFactor, TableWithJoins, UnaryOperator, Value as SqlValue,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// The statements the engine understands
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// CREATE TABLE tablename (col1 TYPE, col2 TYPE, ...)
    CreateTable { name: String, schema: Schema },
    /// INSERT INTO tablename [(col, ...)] VALUES (val, ...), ...
    Insert {
        table_name: String,
        columns: Option<Vec<String>>,
        rows: Vec<Vec<Value>>,
    },
    /// SELECT * | col [AS alias], ... FROM tablename [WHERE column = value] [LIMIT n]
    Select {
        table_name: String,
        projection: Projection,
        where_clause: Option<WhereClause>,
        limit: Option<usize>,
    },
    /// SELECT value [AS alias], ... without a FROM clause
    Values { columns: Vec<String>, values: Vec<Value> },
    /// UPDATE tablename SET column = value WHERE column = value
    Update {
        table_name: String,
        set_column: String,
        set_value: Value,
        where_clause: WhereClause,
    },
    /// DELETE FROM tablename WHERE column = value
    Delete {
        table_name: String,
        where_clause: WhereClause,
    },
    /// CREATE INDEX [name] ON tablename (column)
    CreateIndex {
        table_name: String,
        column_name: String,
    },
}

/// Columns returned by a SELECT
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    Columns(Vec<SelectColumn>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectColumn {
    pub name: String,
    pub alias: Option<String>,
}

impl SelectColumn {
    /// Name the column is reported under
    pub fn label(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// A single equality condition
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub column: String,
    pub value: Value,
}

/// Resolves placeholders against bound parameters
///
/// Without parameters every placeholder resolves to NULL, which lets a
/// statement be validated at prepare time.
struct Binder<'a> {
    params: Option<&'a Params>,
    next: usize,
    expected: usize,
}

impl<'a> Binder<'a> {
    fn probe() -> Self {
        Self {
            params: None,
            next: 0,
            expected: 0,
        }
    }

    fn new(params: &'a Params) -> Self {
        Self {
            params: Some(params),
            next: 0,
            expected: 0,
        }
    }

    fn resolve(&mut self, placeholder: &str) -> Result<Value> {
        if !placeholder.is_char_boundary(1) {
            return Err(anyhow!("Unsupported parameter placeholder: {}", placeholder));
        }

        let index = match placeholder.split_at(1) {
            ("?", "") => {
                self.next += 1;
                self.next - 1
            }
            ("$", number) if number.bytes().all(|b| b.is_ascii_digit()) => {
                match number.parse::<usize>() {
                    Ok(n) if n > 0 => n - 1,
                    _ => return Err(anyhow!("Invalid parameter placeholder: {}", placeholder)),
                }
            }
            ("$" | ":", name) if !name.is_empty() => return self.resolve_named(placeholder, name),
            _ => return Err(anyhow!("Unsupported parameter placeholder: {}", placeholder)),
        };
        self.expected = self.expected.max(index + 1);

        match self.params {
            None => Ok(Value::Null),
            Some(Params::Positional(values)) => values
                .get(index)
                .cloned()
                .ok_or_else(|| anyhow!("No value bound for parameter {}", index + 1)),
            Some(Params::Named(_)) => Err(anyhow!(
                "Positional parameter '{}' requires positional parameters",
                placeholder
            )),
        }
    }

    fn resolve_named(&self, placeholder: &str, name: &str) -> Result<Value> {
        match self.params {
            None => Ok(Value::Null),
            Some(Params::Named(values)) => values
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow!("No value bound for parameter '{}'", placeholder)),
            Some(Params::Positional(_)) => Err(anyhow!(
                "Named parameter '{}' requires named parameters",
                placeholder
            )),
        }
    }

    /// Reject positional parameters that no placeholder consumed
    fn finish(self) -> Result<()> {
        match self.params {
            Some(Params::Positional(values)) if values.len() != self.expected => Err(anyhow!(
                "Expected {} parameters, got {}",
                self.expected,
                values.len()
            )),
            _ => Ok(()),
        }
    }
}

pub struct QueryParser;

impl QueryParser {
    /// Parse a SQL string without parameters
    pub fn parse(sql: &str) -> Result<Query> {
        let statement = Self::parse_statement(sql)?;
        Self::bind(&statement, &Params::default())
    }

    /// Parse and validate a single statement, leaving placeholders unbound
    pub fn parse_statement(sql: &str) -> Result<Statement> {
        let dialect = GenericDialect {};
        let mut ast =
            Parser::parse_sql(&dialect, sql).map_err(|e| anyhow!("SQL parsing error: {}", e))?;

        match ast.len() {
            0 => return Err(anyhow!("Empty SQL statement")),
            1 => {}
            _ => return Err(anyhow!("Only single statements are supported")),
        }
        let statement = ast.remove(0);

        Self::convert(&statement, &mut Binder::probe())?;
        Ok(statement)
    }

    /// Turn a parsed statement into a query, binding `params` to its placeholders
    pub fn bind(statement: &Statement, params: &Params) -> Result<Query> {
        let mut binder = Binder::new(params);
        let query = Self::convert(statement, &mut binder)?;
        binder.finish()?;
        Ok(query)
    }

    fn convert(statement: &Statement, binder: &mut Binder<'_>) -> Result<Query> {
        match statement {
            Statement::CreateTable(create_table) => Self::parse_create_table(create_table),
            Statement::Insert(insert) => Self::parse_insert(insert, binder),
            Statement::Query(query) => Self::parse_select(query, binder),
            Statement::Update {
                table,
                assignments,
                selection,
                ..
            } => Self::parse_update(table, assignments, selection, binder),
            Statement::Delete(delete) => Self::parse_delete(delete, binder),
            Statement::CreateIndex(create_index) => Self::parse_create_index(create_index),
            _ => Err(anyhow!("Unsupported SQL statement")),
        }
    }

    fn parse_create_table(create_table: &sqlparser::ast::CreateTable) -> Result<Query> {
        let mut columns = Vec::new();

        for column_def in &create_table.columns {
            let primary_key = column_def.options.iter().any(|opt| {
                matches!(
                    opt.option,
                    sqlparser::ast::ColumnOption::Unique {
                        is_primary: true,
                        ..
                    }
                )
            });
            let nullable = !column_def
                .options
                .iter()
                .any(|opt| matches!(opt.option, sqlparser::ast::ColumnOption::NotNull));

            columns.push(Column {
                name: column_def.name.value.clone(),
                data_type: Self::parse_data_type(&column_def.data_type)?,
                primary_key,
                nullable,
            });
        }

        if columns.iter().filter(|c| c.primary_key).count() > 1 {
            return Err(anyhow!("Only one PRIMARY KEY column is supported"));
        }

        Ok(Query::CreateTable {
            name: Self::object_name(&create_table.name),
            schema: Schema::new(columns),
        })
    }

    fn parse_insert(insert: &sqlparser::ast::Insert, binder: &mut Binder<'_>) -> Result<Query> {
        let table_name = Self::object_name(&insert.table_name);

        let columns = if insert.columns.is_empty() {
            None
        } else {
            Some(insert.columns.iter().map(|c| c.value.clone()).collect())
        };

        let rows = match &insert.source {
            Some(source) => match source.body.as_ref() {
                SetExpr::Values(values) if !values.rows.is_empty() => values
                    .rows
                    .iter()
                    .map(|row| Self::parse_values(row, binder))
                    .collect::<Result<Vec<_>>>()?,
                SetExpr::Values(_) => return Err(anyhow!("No values provided")),
                _ => return Err(anyhow!("Unsupported INSERT format")),
            },
            None => return Err(anyhow!("No values provided")),
        };

        Ok(Query::Insert {
            table_name,
            columns,
            rows,
        })
    }

    fn parse_select(query: &sqlparser::ast::Query, binder: &mut Binder<'_>) -> Result<Query> {
        let select = match query.body.as_ref() {
            SetExpr::Select(select) => select,
            _ => return Err(anyhow!("Unsupported SELECT format")),
        };

        if select.from.is_empty() {
            return Self::parse_values_select(select, binder);
        }

        let table_name = Self::extract_table_name(select)?;
        let projection = Self::parse_projection(&select.projection)?;

        let where_clause = match &select.selection {
            Some(selection) => Some(Self::parse_where_clause(selection, binder)?),
            None => None,
        };

        let limit = match &query.limit {
            Some(expr) => match Self::parse_value(expr, binder)? {
                Value::Integer(n) if n >= 0 => Some(n as usize),
                // unbound while preparing
                Value::Null => None,
                other => return Err(anyhow!("Invalid LIMIT value: {}", other)),
            },
            None => None,
        };

        Ok(Query::Select {
            table_name,
            projection,
            where_clause,
            limit,
        })
    }

    /// SELECT without FROM: every projected item must be a value
    fn parse_values_select(select: &Select, binder: &mut Binder<'_>) -> Result<Query> {
        let mut columns = Vec::new();
        let mut values = Vec::new();

        for item in &select.projection {
            let (expr, label) = match item {
                SelectItem::UnnamedExpr(expr) => (expr, expr.to_string()),
                SelectItem::ExprWithAlias { expr, alias } => (expr, alias.value.clone()),
                _ => return Err(anyhow!("No table specified in SELECT")),
            };
            values.push(Self::parse_value(expr, binder)?);
            columns.push(label);
        }

        Ok(Query::Values { columns, values })
    }

    fn parse_projection(items: &[SelectItem]) -> Result<Projection> {
        if let [SelectItem::Wildcard(_)] = items {
            return Ok(Projection::All);
        }

        items
            .iter()
            .map(|item| match item {
                SelectItem::UnnamedExpr(expr) => Ok(SelectColumn {
                    name: Self::column_name(expr)?,
                    alias: None,
                }),
                SelectItem::ExprWithAlias { expr, alias } => Ok(SelectColumn {
                    name: Self::column_name(expr)?,
                    alias: Some(alias.value.clone()),
                }),
                _ => Err(anyhow!("Wildcards cannot be combined with other columns")),
            })
            .collect::<Result<Vec<_>>>()
            .map(Projection::Columns)
    }

    fn parse_update(
        table: &TableWithJoins,
        assignments: &[sqlparser::ast::Assignment],
        selection: &Option<Expr>,
        binder: &mut Binder<'_>,
    ) -> Result<Query> {
        let table_name = Self::table_name(table)?;

        if assignments.len() != 1 {
            return Err(anyhow!("Only single column updates are supported"));
        }

        let assignment = &assignments[0];
        let set_column = match &assignment.target {
            sqlparser::ast::AssignmentTarget::ColumnName(name) => Self::object_name(name),
            _ => return Err(anyhow!("Unsupported assignment target")),
        };
        let set_value = Self::parse_value(&assignment.value, binder)?;

        let where_clause = match selection {
            Some(expr) => Self::parse_where_clause(expr, binder)?,
            None => return Err(anyhow!("UPDATE requires WHERE clause")),
        };

        Ok(Query::Update {
            table_name,
            set_column,
            set_value,
            where_clause,
        })
    }

    fn parse_delete(delete: &sqlparser::ast::Delete, binder: &mut Binder<'_>) -> Result<Query> {
        let tables = match &delete.from {
            FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
        };
        let table_name = match tables.as_slice() {
            [table] => Self::table_name(table)?,
            [] => return Err(anyhow!("No table specified")),
            _ => return Err(anyhow!("Only single table deletes are supported")),
        };

        let where_clause = match &delete.selection {
            Some(expr) => Self::parse_where_clause(expr, binder)?,
            None => return Err(anyhow!("DELETE requires WHERE clause")),
        };

        Ok(Query::Delete {
            table_name,
            where_clause,
        })
    }

    fn parse_create_index(create_index: &sqlparser::ast::CreateIndex) -> Result<Query> {
        if create_index.columns.len() != 1 {
            return Err(anyhow!("Only single column indexes are supported"));
        }

        Ok(Query::CreateIndex {
            table_name: Self::object_name(&create_index.table_name),
            column_name: Self::column_name(&create_index.columns[0].expr)?,
        })
    }

    fn parse_data_type(sql_type: &SqlDataType) -> Result<DataType> {
        match sql_type {
            SqlDataType::Int(_) | SqlDataType::Integer(_) | SqlDataType::BigInt(_) => {
                Ok(DataType::Integer)
            }
            SqlDataType::Float(_) | SqlDataType::Double | SqlDataType::Real => Ok(DataType::Float),
            SqlDataType::Text | SqlDataType::Varchar(_) | SqlDataType::String(_) => {
                Ok(DataType::Text)
            }
            SqlDataType::Boolean => Ok(DataType::Boolean),
            _ => Err(anyhow!("Unsupported data type: {:?}", sql_type)),
        }
    }

    fn parse_values(exprs: &[Expr], binder: &mut Binder<'_>) -> Result<Vec<Value>> {
        exprs
            .iter()
            .map(|expr| Self::parse_value(expr, binder))
            .collect()
    }

    fn parse_value(expr: &Expr, binder: &mut Binder<'_>) -> Result<Value> {
        match expr {
            Expr::Value(SqlValue::Number(n, _)) => {
                if n.contains(|c| matches!(c, '.' | 'e' | 'E')) {
                    Ok(Value::float(n.parse()?))
                } else {
                    Ok(Value::Integer(n.parse()?))
                }
            }
            Expr::Value(SqlValue::SingleQuotedString(s))
            | Expr::Value(SqlValue::DoubleQuotedString(s)) => Ok(Value::Text(s.clone())),
            Expr::Value(SqlValue::Boolean(b)) => Ok(Value::Boolean(*b)),
            Expr::Value(SqlValue::Null) => Ok(Value::Null),
            Expr::Value(SqlValue::Placeholder(p)) => binder.resolve(p),
            Expr::Nested(inner) => Self::parse_value(inner, binder),
            Expr::UnaryOp {
                op: UnaryOperator::Minus,
                expr,
            } => match Self::parse_value(expr, binder)? {
                Value::Integer(i) => i
                    .checked_neg()
                    .map(Value::Integer)
                    .ok_or_else(|| anyhow!("Integer overflow negating {}", i)),
                Value::Float(f) => f
                    .checked_neg()
                    .map(Value::Float)
                    .ok_or_else(|| anyhow!("Float overflow negating {}", Value::Float(f))),
                Value::Null => Ok(Value::Null),
                other => Err(anyhow!("Cannot negate {}", other)),
            },
            _ => Err(anyhow!("Unsupported value expression: {}", expr)),
        }
    }

    fn extract_table_name(select: &Select) -> Result<String> {
        match select.from.as_slice() {
            [table] if table.joins.is_empty() => Self::table_name(table),
            [_] => Err(anyhow!("Joins are not supported")),
            _ => Err(anyhow!("Only single table queries are supported")),
        }
    }

    fn table_name(table: &TableWithJoins) -> Result<String> {
        match &table.relation {
            TableFactor::Table { name, .. } => Ok(Self::object_name(name)),
            _ => Err(anyhow!("Unsupported table reference")),
        }
    }

    fn object_name(name: &ObjectName) -> String {
        name.0
            .iter()
            .map(|i| i.value.clone())
            .collect::<Vec<_>>()
            .join(".")
    }

    fn column_name(expr: &Expr) -> Result<String> {
        match expr {
            Expr::Identifier(ident) => Ok(ident.value.clone()),
            Expr::CompoundIdentifier(idents) => idents
                .last()
                .map(|i| i.value.clone())
                .ok_or_else(|| anyhow!("Expected column name")),
            _ => Err(anyhow!("Expected column name, got {}", expr)),
        }
    }

    /// Only `column = value` is supported
    fn parse_where_clause(expr: &Expr, binder: &mut Binder<'_>) -> Result<WhereClause> {
        match expr {
            Expr::Nested(inner) => Self::parse_where_clause(inner, binder),
            Expr::BinaryOp { left, op, right } => {
                if !matches!(op, BinaryOperator::Eq) {
                    return Err(anyhow!("Only = operator is supported in WHERE clause"));
                }

                let column = Self::column_name(left)?;
                let value = Self::parse_value(right, binder)?;

                Ok(WhereClause { column, value })
            }
            _ => Err(anyhow!("Unsupported WHERE clause format")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_select_with_projection() {
        let query = QueryParser::parse("SELECT name AS who, id FROM users WHERE id = 1").unwrap();

        assert_eq!(
            query,
            Query::Select {
                table_name: "users".to_string(),
                projection: Projection::Columns(vec![
                    SelectColumn {
                        name: "name".to_string(),
                        alias: Some("who".to_string()),
                    },
                    SelectColumn {
                        name: "id".to_string(),
                        alias: None,
                    },
                ]),
                where_clause: Some(WhereClause {
                    column: "id".to_string(),
                    value: Value::Integer(1),
                }),
                limit: None,
            }
        );
    }

    #[test]
    fn test_parse_select_without_table() {
        let query = QueryParser::parse("SELECT 1").unwrap();
        assert_eq!(
            query,
            Query::Values {
                columns: vec!["1".to_string()],
                values: vec![Value::Integer(1)],
            }
        );
    }

    #[test]
    fn test_parse_delete_uses_from_clause() {
        let query = QueryParser::parse("DELETE FROM users WHERE id = 3").unwrap();
        assert!(matches!(query, Query::Delete { ref table_name, .. } if table_name == "users"));
    }

    #[test]
    fn test_bind_positional_placeholders() {
        let statement =
            QueryParser::parse_statement("INSERT INTO users VALUES (?, ?), ($1, 'x')").unwrap();
        let query = QueryParser::bind(
            &statement,
            &Params::positional([Value::Integer(7), Value::from("bob")]),
        )
        .unwrap();

        assert_eq!(
            query,
            Query::Insert {
                table_name: "users".to_string(),
                columns: None,
                rows: vec![
                    vec![Value::Integer(7), Value::from("bob")],
                    vec![Value::Integer(7), Value::from("x")],
                ],
            }
        );
    }

    #[test]
    fn test_bind_named_placeholders() {
        let statement = QueryParser::parse_statement("SELECT * FROM users WHERE id = $id").unwrap();
        let query =
            QueryParser::bind(&statement, &Params::named([("id", Value::Integer(2))])).unwrap();

        assert!(matches!(
            query,
            Query::Select { where_clause: Some(WhereClause { ref value, .. }), .. }
                if *value == Value::Integer(2)
        ));
    }

    #[test]
    fn test_bind_rejects_parameter_count_mismatch() {
        let statement = QueryParser::parse_statement("SELECT * FROM users WHERE id = ?").unwrap();

        let err = QueryParser::bind(&statement, &Params::default()).unwrap_err();
        assert!(err.to_string().contains("No value bound for parameter 1"));

        let err = QueryParser::bind(
            &statement,
            &Params::positional([Value::Integer(1), Value::Integer(2)]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Expected 1 parameters, got 2"));
    }

    #[test]
    fn test_negation_overflow_is_an_error() {
        let statement = QueryParser::parse_statement("SELECT -?").unwrap();

        let err = QueryParser::bind(&statement, &Params::positional([Value::Integer(i64::MIN)]))
            .unwrap_err();
        assert!(err.to_string().contains("Integer overflow"));

        let err = QueryParser::bind(&statement, &Params::positional([Value::Float(i64::MIN)]))
            .unwrap_err();
        assert!(err.to_string().contains("Float overflow"));

        let query =
            QueryParser::bind(&statement, &Params::positional([Value::Integer(i64::MAX)])).unwrap();
        assert!(matches!(
            query,
            Query::Values { ref values, .. } if values == &[Value::Integer(-i64::MAX)]
        ));
    }

    #[test]
    fn test_parse_statement_rejects_garbage() {
        assert!(QueryParser::parse_statement("garbage").is_err());
        assert!(QueryParser::parse_statement("").is_err());
        assert!(QueryParser::parse_statement("SELECT 1; SELECT 2").is_err());
        assert!(QueryParser::parse_statement("DROP TABLE users").is_err());
    }
}
