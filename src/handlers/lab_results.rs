use actix_web::{HttpResponse, web};
use chrono::{DateTime, NaiveDate, Utc};
use diesel::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::views::{self, PatientView};
use super::{created, ok};
use crate::access::{self, Scope};
use crate::auth::CurrentUser;
use crate::crypto::LabDataCipher;
use crate::db::{self, DbPool};
use crate::error::ApiError;
use crate::models::{LabResult, NewLabResult, ResultStatus, Role};
use crate::schema::{lab_results, patients};
use crate::validation::Validator;
use crate::{AppState, audit};

#[derive(Debug, Deserialize)]
pub struct CreateLabResultRequest {
    pub patient_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    #[serde(default)]
    pub test_type: String,
    pub result_date: Option<NaiveDate>,
    pub result_status: Option<ResultStatus>,
    pub result_data: Option<Value>,
}

/// A lab result with its payload opened.
#[derive(Debug, Serialize)]
pub struct LabResultView {
    pub lab_result_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub test_type: Option<String>,
    pub result_data: Option<Value>,
    pub result_status: Option<ResultStatus>,
    pub result_date: Option<NaiveDate>,
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub patient: Option<PatientView>,
}

/// Opens a sealed payload. A missing key or an unreadable payload yields
/// `None` so one bad row cannot fail a whole listing.
fn open_result_data(cipher: Option<&LabDataCipher>, lab_result_id: Uuid, sealed: Option<&[u8]>) -> Option<Value> {
    let sealed = sealed?;
    let Some(cipher) = cipher else {
        tracing::warn!(%lab_result_id, "LAB_DATA_KEY is not configured; result data withheld");
        return None;
    };
    match cipher.open(sealed).and_then(|plain| Ok(serde_json::from_slice::<Value>(&plain)?)) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(%lab_result_id, error = %e, "cannot open lab result data");
            None
        }
    }
}

fn lab_result_views(
    conn: &mut PgConnection,
    cipher: Option<&LabDataCipher>,
    rows: Vec<LabResult>,
) -> QueryResult<Vec<LabResultView>> {
    let patients = views::patients_by_id(conn, rows.iter().filter_map(|r| r.patient_id))?;
    Ok(rows
        .into_iter()
        .map(|row| LabResultView {
            result_data: open_result_data(cipher, row.lab_result_id, row.result_data.as_deref()),
            patient: row.patient_id.and_then(|id| patients.get(&id).cloned()),
            lab_result_id: row.lab_result_id,
            appointment_id: row.appointment_id,
            patient_id: row.patient_id,
            test_type: row.test_type,
            result_status: row.result_status,
            result_date: row.result_date,
            status: row.status,
            created_at: row.created_at,
        })
        .collect())
}

// Handler to list lab results, most recent result date first
pub async fn list_lab_results(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    user: CurrentUser,
) -> Result<HttpResponse, ApiError> {
    let cipher = state.config.lab_cipher.clone();
    let rows = db::run(&pool, move |conn| {
        let query = lab_results::table
            .select(LabResult::as_select())
            .order(lab_results::result_date.desc())
            .into_boxed();
        let rows = match Scope::resolve(conn, &user)? {
            Scope::All => query.load(conn)?,
            Scope::Doctor(doctor_id) => {
                let appointment_ids = access::appointment_ids_of(conn, doctor_id)?;
                if appointment_ids.is_empty() {
                    Vec::new()
                } else {
                    query.filter(lab_results::appointment_id.eq_any(appointment_ids)).load(conn)?
                }
            }
            Scope::Patient(id) => query.filter(lab_results::patient_id.eq(id)).load(conn)?,
            Scope::Empty => Vec::new(),
        };
        Ok(lab_result_views(conn, cipher.as_ref(), rows)?)
    })
    .await?;

    Ok(ok(rows))
}

// Handler to record a lab result; it starts out pending
pub async fn create_lab_result(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    user: CurrentUser,
    body: web::Json<CreateLabResultRequest>,
) -> Result<HttpResponse, ApiError> {
    user.require_role(&[Role::Doctor, Role::Admin])?;

    let body = body.into_inner();
    let mut v = Validator::new();
    v.check("patient_id", body.patient_id.is_some(), "Patient ID is required");
    let test_type = v.length("test_type", &body.test_type, 1, 100, "Test type is required (max 100 characters)");
    v.finish()?;

    let cipher = state.config.lab_cipher.clone();
    let result_data = match (&body.result_data, &cipher) {
        (None, _) => None,
        (Some(_), None) => {
            return Err(ApiError::Unavailable("Lab result data storage is not configured".to_string()));
        }
        (Some(value), Some(cipher)) => Some(cipher.seal(&serde_json::to_vec(value).map_err(anyhow::Error::from)?)?),
    };

    let patient_id = body.patient_id.unwrap_or_default();
    let view = db::run(&pool, move |conn| {
        let exists: bool = diesel::select(diesel::dsl::exists(patients::table.find(patient_id))).get_result(conn)?;
        if !exists {
            return Err(ApiError::BadRequest("Patient not found".to_string()));
        }
        let filer = if user.is(Role::Doctor) {
            let doctor_id = access::doctor_id_for_user(conn, user.user_id)?
                .ok_or_else(|| ApiError::BadRequest("Doctor profile not found".to_string()))?;
            Some(doctor_id)
        } else {
            None
        };
        access::ensure_linked_appointment(conn, body.appointment_id, patient_id, filer)?;

        let lab_result = diesel::insert_into(lab_results::table)
            .values(&NewLabResult {
                lab_result_id: Uuid::new_v4(),
                appointment_id: body.appointment_id,
                patient_id,
                test_type,
                result_data,
                result_status: body.result_status,
                result_date: body.result_date,
                status: "pending".to_string(),
            })
            .returning(LabResult::as_returning())
            .get_result(conn)?;

        audit::record(conn, Some(&user), "create", "lab_result", Some(lab_result.lab_result_id));
        let mut rows = lab_result_views(conn, cipher.as_ref(), vec![lab_result])?;
        rows.pop()
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("lab result view is empty")))
    })
    .await?;

    Ok(created(view))
}

// Handler to get a lab result by ID
pub async fn get_lab_result(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    user: CurrentUser,
    lab_result_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let lab_result_id = lab_result_id.into_inner();
    let cipher = state.config.lab_cipher.clone();

    let view = db::run(&pool, move |conn| {
        let lab_result = lab_results::table
            .find(lab_result_id)
            .select(LabResult::as_select())
            .first(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Lab result"))?;

        let scope = Scope::resolve(conn, &user)?;
        if !scope.permits_appointment_record(conn, lab_result.appointment_id, lab_result.patient_id)? {
            return Err(ApiError::not_found("Lab result"));
        }

        let mut rows = lab_result_views(conn, cipher.as_ref(), vec![lab_result])?;
        rows.pop()
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("lab result view is empty")))
    })
    .await?;

    Ok(ok(view))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn sealed_data_opens_with_the_key() {
        let cipher = LabDataCipher::new([7u8; 32]);
        let payload = json!({"hemoglobin": 13.5, "unit": "g/dL"});
        let sealed = cipher.seal(&serde_json::to_vec(&payload).unwrap()).unwrap();

        let opened = open_result_data(Some(&cipher), Uuid::new_v4(), Some(&sealed));
        assert_eq!(opened, Some(payload));
    }

    #[test]
    fn data_is_withheld_without_the_right_key() {
        let cipher = LabDataCipher::new([7u8; 32]);
        let sealed = cipher.seal(b"{}").unwrap();

        assert_eq!(open_result_data(None, Uuid::new_v4(), Some(&sealed)), None);
        let other = LabDataCipher::new([9u8; 32]);
        assert_eq!(open_result_data(Some(&other), Uuid::new_v4(), Some(&sealed)), None);
        assert_eq!(open_result_data(Some(&cipher), Uuid::new_v4(), None), None);
    }

    #[test]
    fn request_parses_result_status() {
        let body: CreateLabResultRequest = serde_json::from_str(
            r#"{"patient_id":"6f1c1f7e-2c1a-4c36-9d7c-1f5b2b1a9e01","test_type":"CBC","result_status":"abnormal"}"#,
        )
        .unwrap();
        assert_eq!(body.result_status, Some(ResultStatus::Abnormal));
        assert!(serde_json::from_str::<CreateLabResultRequest>(r#"{"result_status":"borderline"}"#).is_err());
    }
}
