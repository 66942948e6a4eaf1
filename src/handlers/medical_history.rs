use actix_web::{HttpResponse, web};
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use super::{created, non_blank, ok};
use crate::access::{self, Scope};
use crate::audit;
use crate::auth::CurrentUser;
use crate::db::{self, DbPool};
use crate::error::ApiError;
use crate::models::{MedicalHistory, NewMedicalHistory, Role};
use crate::schema::{medical_history, patients};
use crate::validation::Validator;

#[derive(Debug, Deserialize)]
pub struct CreateEntryRequest {
    pub patient_id: Option<Uuid>,
    #[serde(default)]
    pub entry_type: String,
    pub description: Option<String>,
}

// Handler to list medical history entries, newest first. Doctors see the
// history of patients they have appointments with.
pub async fn list_entries(pool: web::Data<DbPool>, user: CurrentUser) -> Result<HttpResponse, ApiError> {
    let rows = db::run(&pool, move |conn| {
        let query = medical_history::table
            .select(MedicalHistory::as_select())
            .order(medical_history::recorded_at.desc())
            .into_boxed();
        let rows: Vec<MedicalHistory> = match Scope::resolve(conn, &user)? {
            Scope::All => query.load(conn)?,
            Scope::Doctor(doctor_id) => {
                let ids = access::patient_ids_seen_by(conn, doctor_id)?;
                if ids.is_empty() {
                    Vec::new()
                } else {
                    query.filter(medical_history::patient_id.eq_any(ids)).load(conn)?
                }
            }
            Scope::Patient(id) => query.filter(medical_history::patient_id.eq(id)).load(conn)?,
            Scope::Empty => Vec::new(),
        };
        Ok(rows)
    })
    .await?;

    Ok(ok(rows))
}

// Handler to add a medical history entry, recorded by the caller
pub async fn create_entry(
    pool: web::Data<DbPool>,
    user: CurrentUser,
    body: web::Json<CreateEntryRequest>,
) -> Result<HttpResponse, ApiError> {
    user.require_role(&[Role::Doctor, Role::Admin])?;

    let body = body.into_inner();
    let mut v = Validator::new();
    v.check("patient_id", body.patient_id.is_some(), "Patient ID is required");
    let entry_type = v.length("entry_type", &body.entry_type, 1, 100, "Entry type is required (max 100 characters)");
    v.finish()?;

    let patient_id = body.patient_id.unwrap_or_default();
    let entry = db::run(&pool, move |conn| {
        let exists: bool = diesel::select(diesel::dsl::exists(patients::table.find(patient_id))).get_result(conn)?;
        if !exists {
            return Err(ApiError::BadRequest("Patient not found".to_string()));
        }

        let entry = diesel::insert_into(medical_history::table)
            .values(&NewMedicalHistory {
                history_id: Uuid::new_v4(),
                patient_id,
                entry_type,
                description: non_blank(body.description),
                recorded_at: Utc::now(),
                recorded_by: user.user_id,
            })
            .returning(MedicalHistory::as_returning())
            .get_result(conn)?;

        audit::record(conn, Some(&user), "create", "medical_history", Some(entry.history_id));
        Ok(entry)
    })
    .await?;

    Ok(created(entry))
}

// Handler to get a medical history entry by ID
pub async fn get_entry(
    pool: web::Data<DbPool>,
    user: CurrentUser,
    history_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let history_id = history_id.into_inner();
    let entry = db::run(&pool, move |conn| {
        let entry = medical_history::table
            .find(history_id)
            .select(MedicalHistory::as_select())
            .first(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Medical history entry"))?;

        let scope = Scope::resolve(conn, &user)?;
        if !scope.permits_patient_record(conn, entry.patient_id)? {
            return Err(ApiError::not_found("Medical history entry"));
        }
        Ok(entry)
    })
    .await?;

    Ok(ok(entry))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_type_defaults_to_blank_for_validation() {
        let body: CreateEntryRequest =
            serde_json::from_str(r#"{"patient_id":"6f1c1f7e-2c1a-4c36-9d7c-1f5b2b1a9e01"}"#).unwrap();
        assert_eq!(body.entry_type, "");
        assert!(body.description.is_none());

        let mut v = Validator::new();
        v.length("entry_type", &body.entry_type, 1, 100, "Entry type is required (max 100 characters)");
        assert!(v.finish().is_err());
    }
}
