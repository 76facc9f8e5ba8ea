// In-memory driver
// Serves `memory:` connection strings from the bundled SQL engine

use super::{ConnectOptions, Connection, Driver, Params, PreparedStatement, Statement};
use crate::query::{QueryExecutor, QueryParser, QueryResult};
use crate::storage::table::DEFAULT_ROWS_PER_PAGE;
use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

const SCHEME: &str = "memory";

type SharedExecutor = Arc<Mutex<QueryExecutor>>;

/// A named database and the credentials it was first opened with
struct NamedDatabase {
    executor: SharedExecutor,
    username: Option<String>,
    password: Option<String>,
}

/// Driver for in-memory databases
///
/// `memory:` opens a private database. `memory:<name>` opens a database
/// shared by every connection this driver opens under the same name.
#[derive(Default)]
pub struct MemoryDriver {
    databases: Mutex<HashMap<String, NamedDatabase>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the shared databases opened so far
    pub fn databases(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn rows_per_page(options: &ConnectOptions) -> Result<usize> {
        let mut rows_per_page = DEFAULT_ROWS_PER_PAGE;

        for (key, value) in &options.options {
            match key.as_str() {
                "rows_per_page" => {
                    rows_per_page = value
                        .parse()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| anyhow!("Invalid rows_per_page: {}", value))?;
                }
                _ => return Err(anyhow!("Unsupported option: {}", key)),
            }
        }

        Ok(rows_per_page)
    }
}

impl Driver for MemoryDriver {
    fn connect(&self, dsn: &str, options: &ConnectOptions) -> Result<Box<dyn Connection>> {
        let name = match dsn.split_once(':') {
            Some((SCHEME, name)) => name,
            Some((scheme, _)) => return Err(anyhow!("Unsupported DSN scheme: {}", scheme)),
            None => return Err(anyhow!("Invalid DSN: {}", dsn)),
        };
        let rows_per_page = Self::rows_per_page(options)?;

        if name.is_empty() {
            return Ok(Box::new(MemoryConnection {
                executor: Arc::new(Mutex::new(QueryExecutor::with_page_size(rows_per_page))),
            }));
        }

        let mut databases = self.databases.lock();
        let database = databases
            .entry(name.to_string())
            .or_insert_with(|| NamedDatabase {
                executor: Arc::new(Mutex::new(QueryExecutor::with_page_size(rows_per_page))),
                username: options.username.clone(),
                password: options.password.clone(),
            });

        if database.username != options.username || database.password != options.password {
            return Err(anyhow!("Access denied to database '{}'", name));
        }

        tracing::debug!(database = name, "opened shared memory database");
        Ok(Box::new(MemoryConnection {
            executor: Arc::clone(&database.executor),
        }))
    }
}

struct MemoryConnection {
    executor: SharedExecutor,
}

impl Connection for MemoryConnection {
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn PreparedStatement>> {
        let statement = QueryParser::parse_statement(sql)?;

        Ok(Box::new(MemoryStatement {
            sql: sql.to_string(),
            statement,
            executor: Arc::clone(&self.executor),
        }))
    }
}

struct MemoryStatement {
    sql: String,
    statement: sqlparser::ast::Statement,
    executor: SharedExecutor,
}

impl PreparedStatement for MemoryStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn execute(self: Box<Self>, params: &Params) -> Result<Statement> {
        let query = QueryParser::bind(&self.statement, params)?;
        let result = self.executor.lock().execute(query)?;

        Ok(match result {
            QueryResult::Rows { column_names, rows } => {
                Statement::new(self.sql, params.clone(), column_names, rows, 0)
            }
            QueryResult::Affected { count, .. } => {
                Statement::new(self.sql, params.clone(), Vec::new(), Vec::new(), count)
            }
        })
    }
}
