use diesel::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::models::NewAuditLog;
use crate::schema::audit_logs;

/// Appends an audit row for a mutation. A failed write is logged and never
/// fails the request.
pub fn record(
    conn: &mut PgConnection,
    actor: Option<&CurrentUser>,
    action: &str,
    resource_type: &str,
    resource_id: Option<Uuid>,
) {
    let entry = NewAuditLog {
        user_id: actor.map(|a| a.user_id),
        action,
        resource_type: Some(resource_type),
        resource_id,
        ip_address: actor.and_then(|a| a.ip.as_deref()),
    };

    if let Err(e) = diesel::insert_into(audit_logs::table).values(&entry).execute(conn) {
        tracing::warn!(error = %e, action, resource_type, "failed to write audit log");
    }
}
