use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::audit_logs;

#[derive(Debug, Insertable)]
#[diesel(table_name = audit_logs)]
pub struct NewAuditLog<'a> {
    pub user_id: Option<Uuid>,
    pub action: &'a str,
    pub resource_type: Option<&'a str>,
    pub resource_id: Option<Uuid>,
    pub ip_address: Option<&'a str>,
}
