// Query hooks
// A query issued under an event name runs that event's `pre` listener
// before the statement is prepared and its `post` listener after it was
// executed. Each (event, phase) pair holds at most one listener.

use crate::driver::{Params, Statement};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// When a listener runs relative to statement execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Pre,
    Post,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Pre => write!(f, "pre"),
            Phase::Post => write!(f, "post"),
        }
    }
}

/// Replacement SQL and/or parameters returned by a pre listener
///
/// Fields left `None` keep the caller's original value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Override {
    pub sql: Option<String>,
    pub params: Option<Params>,
}

impl Override {
    /// Replace the SQL text only
    pub fn sql(sql: impl Into<String>) -> Self {
        Self {
            sql: Some(sql.into()),
            params: None,
        }
    }

    /// Replace the parameters only
    pub fn params(params: impl Into<Params>) -> Self {
        Self {
            sql: None,
            params: Some(params.into()),
        }
    }

    pub fn with_params(mut self, params: impl Into<Params>) -> Self {
        self.params = Some(params.into());
        self
    }

    /// Apply the override field by field
    pub fn apply(self, sql: &mut String, params: &mut Params) {
        if let Some(replacement) = self.sql {
            *sql = replacement;
        }
        if let Some(replacement) = self.params {
            *params = replacement;
        }
    }
}

/// Listener run before a statement is prepared
pub trait PreHook: Send + Sync {
    fn before(&self, sql: &str, params: &Params) -> anyhow::Result<Option<Override>>;
}

impl<F> PreHook for F
where
    F: Fn(&str, &Params) -> anyhow::Result<Option<Override>> + Send + Sync,
{
    fn before(&self, sql: &str, params: &Params) -> anyhow::Result<Option<Override>> {
        self(sql, params)
    }
}

/// Listener run after a statement was executed
pub trait PostHook: Send + Sync {
    fn after(&self, statement: &Statement) -> anyhow::Result<()>;
}

impl<F> PostHook for F
where
    F: Fn(&Statement) -> anyhow::Result<()> + Send + Sync,
{
    fn after(&self, statement: &Statement) -> anyhow::Result<()> {
        self(statement)
    }
}

/// A listener together with the phase it runs in
#[derive(Clone)]
pub enum Hook {
    Pre(Arc<dyn PreHook>),
    Post(Arc<dyn PostHook>),
}

impl Hook {
    /// Wrap a closure as a pre listener
    ///
    /// Types implementing `PreHook` directly go through `Hook::Pre`.
    pub fn pre<F>(listener: F) -> Self
    where
        F: Fn(&str, &Params) -> anyhow::Result<Option<Override>> + Send + Sync + 'static,
    {
        Hook::Pre(Arc::new(listener))
    }

    /// Wrap a closure as a post listener
    pub fn post<F>(listener: F) -> Self
    where
        F: Fn(&Statement) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Hook::Post(Arc::new(listener))
    }

    pub fn phase(&self) -> Phase {
        match self {
            Hook::Pre(_) => Phase::Pre,
            Hook::Post(_) => Phase::Post,
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hook::{:?}", self.phase())
    }
}

#[derive(Default, Clone)]
struct EventHooks {
    pre: Option<Arc<dyn PreHook>>,
    post: Option<Arc<dyn PostHook>>,
}

/// Listeners keyed by event name and phase, last registration wins
#[derive(Default, Clone)]
pub struct HookTable {
    events: HashMap<String, EventHooks>,
}

impl HookTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `hook` for `event`, returning the listener it replaced
    pub fn register(&mut self, event: impl Into<String>, hook: Hook) -> Option<Hook> {
        let hooks = self.events.entry(event.into()).or_default();
        match hook {
            Hook::Pre(listener) => hooks.pre.replace(listener).map(Hook::Pre),
            Hook::Post(listener) => hooks.post.replace(listener).map(Hook::Post),
        }
    }

    /// Remove the listener of `event` for `phase`
    pub fn remove(&mut self, event: &str, phase: Phase) -> Option<Hook> {
        let hooks = self.events.get_mut(event)?;
        let removed = match phase {
            Phase::Pre => hooks.pre.take().map(Hook::Pre),
            Phase::Post => hooks.post.take().map(Hook::Post),
        };

        if hooks.pre.is_none() && hooks.post.is_none() {
            self.events.remove(event);
        }
        removed
    }

    pub fn pre(&self, event: &str) -> Option<Arc<dyn PreHook>> {
        self.events.get(event)?.pre.clone()
    }

    pub fn post(&self, event: &str) -> Option<Arc<dyn PostHook>> {
        self.events.get(event)?.post.clone()
    }

    pub fn contains(&self, event: &str, phase: Phase) -> bool {
        match phase {
            Phase::Pre => self.pre(event).is_some(),
            Phase::Post => self.post(event).is_some(),
        }
    }

    /// Event names with at least one listener, sorted
    pub fn events(&self) -> Vec<String> {
        let mut names: Vec<String> = self.events.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for HookTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookTable")
            .field("events", &self.events())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Value;

    #[test]
    fn test_register_replaces_same_phase_only() {
        let mut table = HookTable::new();

        let first = table.register("load", Hook::pre(|_, _| Ok(None)));
        assert!(first.is_none());
        table.register("load", Hook::post(|_| Ok(())));

        let replaced = table.register("load", Hook::pre(|_, _| Ok(None)));
        assert_eq!(replaced.map(|h| h.phase()), Some(Phase::Pre));
        assert!(table.contains("load", Phase::Post));
    }

    #[test]
    fn test_events_do_not_clobber_each_other() {
        let mut table = HookTable::new();
        table.register("a", Hook::pre(|_, _| Ok(Some(Override::sql("A")))));
        table.register("b", Hook::pre(|_, _| Ok(Some(Override::sql("B")))));

        let a = table.pre("a").unwrap().before("x", &Params::default()).unwrap();
        let b = table.pre("b").unwrap().before("x", &Params::default()).unwrap();
        assert_eq!(a, Some(Override::sql("A")));
        assert_eq!(b, Some(Override::sql("B")));
        assert_eq!(table.events(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_remove_drops_empty_events() {
        let mut table = HookTable::new();
        table.register("a", Hook::post(|_| Ok(())));

        assert!(table.remove("a", Phase::Pre).is_none());
        assert!(table.remove("a", Phase::Post).is_some());
        assert!(table.events().is_empty());
    }

    #[test]
    fn test_override_applies_field_by_field() {
        let mut sql = "SELECT * FROM t WHERE id = ?".to_string();
        let mut params = Params::positional([1]);

        Override::params(vec![Value::Integer(2)]).apply(&mut sql, &mut params);
        assert_eq!(sql, "SELECT * FROM t WHERE id = ?");
        assert_eq!(params, Params::positional([2]));

        Override::sql("SELECT 1").apply(&mut sql, &mut params);
        assert_eq!(sql, "SELECT 1");
        assert_eq!(params, Params::positional([2]));
    }
}
