use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::text_enum;
use crate::schema::lab_results;

text_enum! {
    ResultStatus {
        Normal => "normal",
        Abnormal => "abnormal",
    }
}

/// A stored lab result. `result_data` holds the sealed payload and is never
/// serialized directly; handlers open it into a view.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = lab_results)]
#[diesel(primary_key(lab_result_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LabResult {
    pub lab_result_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub test_type: Option<String>,
    pub result_data: Option<Vec<u8>>,
    pub result_status: Option<ResultStatus>,
    pub result_date: Option<NaiveDate>,
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = lab_results)]
pub struct NewLabResult {
    pub lab_result_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub patient_id: Uuid,
    pub test_type: String,
    pub result_data: Option<Vec<u8>>,
    pub result_status: Option<ResultStatus>,
    pub result_date: Option<NaiveDate>,
    pub status: String,
}
