// hookdb - SQL connections with pre/post query hooks
// This is the library root that exposes the public API

pub mod audit;
pub mod database;
pub mod driver;
pub mod error;
pub mod format;
pub mod hooks;
pub mod query;
pub mod registry;
pub mod storage;

pub use audit::AUDIT_EVENT;
pub use database::Database;
pub use driver::{ConnectOptions, Driver, MemoryDriver, Params, Statement};
pub use error::{Error, Result};
pub use hooks::{Hook, Override, Phase, PostHook, PreHook};
pub use registry::{Registry, SharedDatabase, DEFAULT_CONNECTION};
pub use storage::{Row, Value};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
