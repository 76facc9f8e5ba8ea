// Query module - SQL parsing, parameter binding and execution
pub mod executor;
pub mod parser;

pub use executor::{QueryExecutor, QueryResult};
pub use parser::{Query, QueryParser};
