// Error types returned by `Database`
// Driver failures are tagged with the step of the query they happened in;
// errors raised by hook listeners pass through untouched

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The driver could not open a connection
    #[error("connection to '{dsn}' failed: {message}")]
    Connection { dsn: String, message: String },

    /// The driver rejected the SQL text
    #[error("failed to prepare '{sql}': {message}")]
    Prepare { sql: String, message: String },

    /// Binding or running the prepared statement failed
    #[error("failed to execute '{sql}': {message}")]
    Execution { sql: String, message: String },

    /// A hook listener failed
    #[error(transparent)]
    Hook(anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn connection(dsn: &str, source: anyhow::Error) -> Self {
        Error::Connection {
            dsn: dsn.to_string(),
            message: format!("{:#}", source),
        }
    }

    pub(crate) fn prepare(sql: &str, source: anyhow::Error) -> Self {
        Error::Prepare {
            sql: sql.to_string(),
            message: format!("{:#}", source),
        }
    }

    pub(crate) fn execution(sql: &str, source: anyhow::Error) -> Self {
        Error::Execution {
            sql: sql.to_string(),
            message: format!("{:#}", source),
        }
    }

    /// The driver's or listener's message without the SQL context
    pub fn message(&self) -> String {
        match self {
            Error::Connection { message, .. }
            | Error::Prepare { message, .. }
            | Error::Execution { message, .. } => message.clone(),
            Error::Hook(source) => source.to_string(),
        }
    }
}
