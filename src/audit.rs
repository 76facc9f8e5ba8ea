// Audit hooks
// Logs every statement run under the `audit` event and the size of its result

use crate::database::Database;

/// Event under which the audit hooks are registered
pub const AUDIT_EVENT: &str = "audit";

/// Register the audit pre and post hooks on `database`
pub fn install(database: &mut Database) {
    database.on_pre(AUDIT_EVENT, |sql, params| {
        tracing::info!(sql, params = params.len(), "audit: executing");
        Ok(None)
    });
    database.on_post(AUDIT_EVENT, |statement| {
        tracing::info!(
            sql = statement.sql(),
            rows = statement.row_count(),
            affected = statement.rows_affected(),
            "audit: executed"
        );
        Ok(())
    });
}
