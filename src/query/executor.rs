// Query Executor
// Runs parsed queries against the tables of one in-memory database

use super::parser::{Projection, Query, WhereClause};
use crate::storage::{
    table::{Table, DEFAULT_ROWS_PER_PAGE},
    Row, Value,
};
use anyhow::{anyhow, Result};
use std::collections::HashMap;

/// Owns every table of a database and executes queries against them
pub struct QueryExecutor {
    tables: HashMap<String, Table>,
    rows_per_page: usize,
}

impl QueryExecutor {
    /// Create an empty database
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_ROWS_PER_PAGE)
    }

    /// Create an empty database whose tables hold `rows_per_page` rows per page
    pub fn with_page_size(rows_per_page: usize) -> Self {
        Self {
            tables: HashMap::new(),
            rows_per_page,
        }
    }

    pub fn execute(&mut self, query: Query) -> Result<QueryResult> {
        match query {
            Query::CreateTable { name, schema } => {
                if self.tables.contains_key(&name) {
                    return Err(anyhow!("Table '{}' already exists", name));
                }

                let table = Table::new(name.clone(), schema, self.rows_per_page);
                self.tables.insert(name.clone(), table);

                Ok(QueryResult::affected(0, format!("Table '{}' created", name)))
            }

            Query::Insert {
                table_name,
                columns,
                rows,
            } => {
                let table = self.table_mut(&table_name)?;

                // Column lists are resolved before any row is written
                let rows = match columns {
                    Some(columns) => {
                        let positions = columns
                            .iter()
                            .map(|name| {
                                table
                                    .get_schema()
                                    .get_column_index(name)
                                    .ok_or_else(|| anyhow!("Column not found: {}", name))
                            })
                            .collect::<Result<Vec<_>>>()?;
                        let width = table.get_schema().columns.len();

                        rows.into_iter()
                            .map(|values| {
                                if values.len() != positions.len() {
                                    return Err(anyhow!(
                                        "Expected {} values, got {}",
                                        positions.len(),
                                        values.len()
                                    ));
                                }
                                let mut full = vec![Value::Null; width];
                                for (position, value) in positions.iter().zip(values) {
                                    full[*position] = value;
                                }
                                Ok(full)
                            })
                            .collect::<Result<Vec<_>>>()?
                    }
                    None => rows,
                };

                let count = rows.len();
                for values in rows {
                    table.insert(values)?;
                }

                Ok(QueryResult::affected(
                    count,
                    format!("{} row(s) inserted into '{}'", count, table_name),
                ))
            }

            Query::Select {
                table_name,
                projection,
                where_clause,
                limit,
            } => {
                let table = self.table(&table_name)?;
                let schema = table.get_schema();

                let mut rows = match &where_clause {
                    Some(WhereClause { column, value }) => {
                        table.select(Some((column.as_str(), value)))?
                    }
                    None => table.select(None)?,
                };
                if let Some(limit) = limit {
                    rows.truncate(limit);
                }

                match projection {
                    Projection::All => Ok(QueryResult::Rows {
                        column_names: schema.column_names(),
                        rows,
                    }),
                    Projection::Columns(columns) => {
                        let positions = columns
                            .iter()
                            .map(|column| {
                                schema
                                    .get_column_index(&column.name)
                                    .ok_or_else(|| anyhow!("Column not found: {}", column.name))
                            })
                            .collect::<Result<Vec<_>>>()?;

                        Ok(QueryResult::Rows {
                            column_names: columns.iter().map(|c| c.label().to_string()).collect(),
                            rows: rows
                                .into_iter()
                                .map(|row| {
                                    Row::new(
                                        positions.iter().map(|&i| row.values[i].clone()).collect(),
                                    )
                                })
                                .collect(),
                        })
                    }
                }
            }

            Query::Values { columns, values } => Ok(QueryResult::Rows {
                column_names: columns,
                rows: vec![Row::new(values)],
            }),

            Query::Update {
                table_name,
                set_column,
                set_value,
                where_clause,
            } => {
                let count = self.table_mut(&table_name)?.update(
                    (where_clause.column.as_str(), &where_clause.value),
                    &set_column,
                    set_value,
                )?;

                Ok(QueryResult::affected(
                    count,
                    format!("{} row(s) updated in '{}'", count, table_name),
                ))
            }

            Query::Delete {
                table_name,
                where_clause,
            } => {
                let count = self
                    .table_mut(&table_name)?
                    .delete((where_clause.column.as_str(), &where_clause.value))?;

                Ok(QueryResult::affected(
                    count,
                    format!("{} row(s) deleted from '{}'", count, table_name),
                ))
            }

            Query::CreateIndex {
                table_name,
                column_name,
            } => {
                self.table_mut(&table_name)?.create_index(&column_name)?;

                Ok(QueryResult::affected(
                    0,
                    format!("Index created on '{}.{}'", table_name, column_name),
                ))
            }
        }
    }

    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Names of every table, sorted
    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| anyhow!("Table '{}' not found", name))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| anyhow!("Table '{}' not found", name))
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of executing one query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Rows produced by a SELECT
    Rows {
        column_names: Vec<String>,
        rows: Vec<Row>,
    },
    /// Rows touched by a write or DDL statement
    Affected { count: usize, message: String },
}

impl QueryResult {
    fn affected(count: usize, message: String) -> Self {
        QueryResult::Affected { count, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryParser;

    fn run(executor: &mut QueryExecutor, sql: &str) -> QueryResult {
        executor.execute(QueryParser::parse(sql).unwrap()).unwrap()
    }

    fn seeded() -> QueryExecutor {
        let mut executor = QueryExecutor::new();
        run(
            &mut executor,
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER)",
        );
        run(
            &mut executor,
            "INSERT INTO users VALUES (1, 'Alice', 30), (2, 'Bob', 25)",
        );
        executor
    }

    #[test]
    fn test_insert_with_column_list_fills_nulls() {
        let mut executor = seeded();
        run(&mut executor, "INSERT INTO users (name, id) VALUES ('Carol', 3)");

        let result = run(&mut executor, "SELECT age FROM users WHERE id = 3");
        assert_eq!(
            result,
            QueryResult::Rows {
                column_names: vec!["age".to_string()],
                rows: vec![Row::new(vec![Value::Null])],
            }
        );
    }

    #[test]
    fn test_insert_is_rejected_for_missing_required_column() {
        let mut executor = seeded();
        let err = executor
            .execute(QueryParser::parse("INSERT INTO users (id) VALUES (9)").unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("cannot be NULL"));
    }

    #[test]
    fn test_select_limit_and_alias() {
        let mut executor = seeded();
        let result = run(&mut executor, "SELECT name AS who FROM users LIMIT 1");

        assert_eq!(
            result,
            QueryResult::Rows {
                column_names: vec!["who".to_string()],
                rows: vec![Row::new(vec!["Alice".into()])],
            }
        );
    }

    #[test]
    fn test_update_and_delete_report_counts() {
        let mut executor = seeded();

        let updated = run(&mut executor, "UPDATE users SET age = 31 WHERE id = 1");
        assert!(matches!(updated, QueryResult::Affected { count: 1, .. }));

        let deleted = run(&mut executor, "DELETE FROM users WHERE name = 'Bob'");
        assert!(matches!(deleted, QueryResult::Affected { count: 1, .. }));

        assert_eq!(executor.get_table("users").unwrap().row_count(), 1);
    }

    #[test]
    fn test_missing_table_is_an_error() {
        let mut executor = QueryExecutor::new();
        let err = executor
            .execute(QueryParser::parse("SELECT * FROM nope").unwrap())
            .unwrap_err();
        assert_eq!(err.to_string(), "Table 'nope' not found");
    }
}
