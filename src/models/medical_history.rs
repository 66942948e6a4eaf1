use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::medical_history;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = medical_history)]
#[diesel(primary_key(history_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MedicalHistory {
    pub history_id: Uuid,
    pub patient_id: Option<Uuid>,
    pub entry_type: Option<String>,
    pub description: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub recorded_by: Option<Uuid>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = medical_history)]
pub struct NewMedicalHistory {
    pub history_id: Uuid,
    pub patient_id: Uuid,
    pub entry_type: String,
    pub description: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub recorded_by: Uuid,
}
