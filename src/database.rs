// Evented database handle
// A `Database` owns one driver connection and a hook table. Queries issued
// under an event name run the event's listeners around the statement,
// strictly in the order pre hook, prepare, execute, post hook.

use crate::driver::{ConnectOptions, Connection, Driver, Params, Statement};
use crate::error::{Error, Result};
use crate::hooks::{Hook, HookTable, Override, Phase};
use crate::storage::Row;

pub struct Database {
    connection: Box<dyn Connection>,
    hooks: HookTable,
}

impl Database {
    /// Wrap an already open connection
    pub fn new(connection: Box<dyn Connection>) -> Self {
        Self {
            connection,
            hooks: HookTable::new(),
        }
    }

    /// Open a connection through `driver`
    pub fn connect(driver: &dyn Driver, dsn: &str, options: &ConnectOptions) -> Result<Self> {
        driver
            .connect(dsn, options)
            .map(Self::new)
            .map_err(|e| Error::connection(dsn, e))
    }

    /// Register a listener for `event`, replacing any listener already
    /// registered for the same event and phase
    pub fn register_hook(&mut self, event: impl Into<String>, hook: Hook) {
        let event = event.into();
        tracing::trace!(event = %event, phase = %hook.phase(), "registering hook");
        self.hooks.register(event, hook);
    }

    /// Register a pre listener for `event`
    pub fn on_pre<F>(&mut self, event: impl Into<String>, listener: F)
    where
        F: Fn(&str, &Params) -> anyhow::Result<Option<Override>> + Send + Sync + 'static,
    {
        self.register_hook(event, Hook::pre(listener));
    }

    /// Register a post listener for `event`
    pub fn on_post<F>(&mut self, event: impl Into<String>, listener: F)
    where
        F: Fn(&Statement) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register_hook(event, Hook::post(listener));
    }

    pub fn has_hook(&self, event: &str, phase: Phase) -> bool {
        self.hooks.contains(event, phase)
    }

    pub fn remove_hook(&mut self, event: &str, phase: Phase) -> Option<Hook> {
        self.hooks.remove(event, phase)
    }

    /// Run `sql` with `params`, firing the listeners of `event` if given
    ///
    /// The pre listener may replace the SQL and/or the parameters. The post
    /// listener sees the executed statement before it is handed back.
    /// Errors from listeners abort the query and are returned as
    /// [`Error::Hook`].
    pub fn query(&mut self, sql: &str, params: Params, event: Option<&str>) -> Result<Statement> {
        let mut sql = sql.to_string();
        let mut params = params;

        if let Some((event, listener)) = event.and_then(|e| Some((e, self.hooks.pre(e)?))) {
            tracing::debug!(event, phase = %Phase::Pre, "running hook");
            if let Some(replacement) = listener.before(&sql, &params).map_err(Error::Hook)? {
                tracing::trace!(
                    event,
                    sql = replacement.sql.is_some(),
                    params = replacement.params.is_some(),
                    "applying override"
                );
                replacement.apply(&mut sql, &mut params);
            }
        }

        let prepared = self
            .connection
            .prepare(&sql)
            .map_err(|e| Error::prepare(&sql, e))?;
        tracing::trace!(sql = prepared.sql(), "prepared statement");
        let statement = prepared
            .execute(&params)
            .map_err(|e| Error::execution(&sql, e))?;

        tracing::debug!(
            rows = statement.row_count(),
            affected = statement.rows_affected(),
            "executed statement"
        );

        if let Some((event, listener)) = event.and_then(|e| Some((e, self.hooks.post(e)?))) {
            tracing::debug!(event, phase = %Phase::Post, "running hook");
            listener.after(&statement).map_err(Error::Hook)?;
        }

        Ok(statement)
    }

    /// Run a query and collect every row; no rows yields an empty vector
    pub fn fetch_all(&mut self, sql: &str, params: Params, event: Option<&str>) -> Result<Vec<Row>> {
        Ok(self.query(sql, params, event)?.fetch_all())
    }

    /// Run a query and return its first row, `None` when there is none
    pub fn fetch_one(&mut self, sql: &str, params: Params, event: Option<&str>) -> Result<Option<Row>> {
        Ok(self.query(sql, params, event)?.fetch())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
