use actix_web::{HttpResponse, web};
use chrono::Utc;
use diesel::PgConnection;
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use super::views;
use super::{created, non_blank, ok};
use crate::access::{self, Scope};
use crate::auth::CurrentUser;
use crate::db::{self, DbPool};
use crate::error::ApiError;
use crate::models::{Patient, PatientChanges, Role};
use crate::schema::{patients, users};
use crate::validation::Validator;
use crate::audit;

pub const GENDERS: [&str; 3] = ["male", "female", "other"];

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePatientRequest {
    #[serde(flatten)]
    pub changes: PatientChanges,
    /// Stored on the linked user row.
    pub phone: Option<String>,
}

fn load_patient(conn: &mut PgConnection, patient_id: Uuid) -> Result<Patient, ApiError> {
    patients::table
        .find(patient_id)
        .select(Patient::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Patient"))
}

// Handler to list patients. Doctors only see patients they have appointments with.
pub async fn list_patients(pool: web::Data<DbPool>, user: CurrentUser) -> Result<HttpResponse, ApiError> {
    user.require_role(&[Role::Doctor, Role::Admin])?;

    let rows = db::run(&pool, move |conn| {
        let query = patients::table.select(Patient::as_select()).order(patients::patient_id.asc());
        let rows = match Scope::resolve(conn, &user)? {
            Scope::All => query.load(conn)?,
            Scope::Doctor(doctor_id) => {
                let ids = access::patient_ids_seen_by(conn, doctor_id)?;
                if ids.is_empty() {
                    Vec::new()
                } else {
                    query.filter(patients::patient_id.eq_any(ids)).load(conn)?
                }
            }
            Scope::Patient(_) | Scope::Empty => Vec::new(),
        };
        Ok(views::patient_views(conn, rows)?)
    })
    .await?;

    Ok(ok(rows))
}

// Handler to create the caller's patient profile if it is missing
pub async fn ensure_patient(pool: web::Data<DbPool>, user: CurrentUser) -> Result<HttpResponse, ApiError> {
    let user_id = user.user_id;
    let (inserted, view) = db::run(&pool, move |conn| {
        let inserted = access::ensure_profile(conn, user_id, Role::Patient)?;
        let patient = patients::table
            .filter(patients::user_id.eq(user_id))
            .select(Patient::as_select())
            .first(conn)?;
        Ok((inserted, views::patient_view(conn, patient)?))
    })
    .await?;

    if inserted {
        tracing::info!(%user_id, patient_id = %view.patient.patient_id, "patient profile created");
        Ok(created(view))
    } else {
        Ok(ok(view))
    }
}

// Handler to get the caller's own patient profile
pub async fn current_patient(pool: web::Data<DbPool>, user: CurrentUser) -> Result<HttpResponse, ApiError> {
    let view = db::run(&pool, move |conn| {
        let patient = patients::table
            .filter(patients::user_id.eq(user.user_id))
            .select(Patient::as_select())
            .first(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Patient profile"))?;
        Ok(views::patient_view(conn, patient)?)
    })
    .await?;

    Ok(ok(view))
}

// Handler to get a patient by ID
pub async fn get_patient(
    pool: web::Data<DbPool>,
    user: CurrentUser,
    patient_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let patient_id = patient_id.into_inner();
    let view = db::run(&pool, move |conn| {
        let patient = load_patient(conn, patient_id)?;
        let scope = Scope::resolve(conn, &user)?;
        if !scope.permits_patient_record(conn, Some(patient.patient_id))? {
            return Err(ApiError::not_found("Patient"));
        }
        Ok(views::patient_view(conn, patient)?)
    })
    .await?;

    Ok(ok(view))
}

fn validate_patient_update(body: &UpdatePatientRequest) -> Result<(), ApiError> {
    let changes = &body.changes;
    let mut v = Validator::new();
    v.one_of("gender", changes.gender.as_deref(), &GENDERS, "Gender must be male, female, or other");
    v.not_in_future("dob", changes.dob, Utc::now().date_naive(), "Date of birth cannot be in the future");
    v.max_length("image_url", changes.image_url.as_deref(), 1024, "Image URL must be at most 1024 characters");
    v.max_length("address", changes.address.as_deref(), 500, "Address must be less than 500 characters");
    v.max_length("emergency_contact", changes.emergency_contact.as_deref(), 100, "Emergency contact must be less than 100 characters");
    v.max_length("phone", body.phone.as_deref(), 20, "Phone must be less than 20 characters");
    v.finish()
}

// Handler to update a patient profile (self or admin)
pub async fn update_patient(
    pool: web::Data<DbPool>,
    user: CurrentUser,
    patient_id: web::Path<Uuid>,
    body: web::Json<UpdatePatientRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validate_patient_update(&body)?;

    let patient_id = patient_id.into_inner();
    let phone = non_blank(body.phone);
    let changes = body.changes;

    let view = db::run(&pool, move |conn| {
        let patient = load_patient(conn, patient_id)?;
        if !user.is(Role::Admin) && patient.user_id != user.user_id {
            return Err(ApiError::Forbidden("Not authorized to update this patient".to_string()));
        }

        conn.transaction::<_, ApiError, _>(|conn| {
            if !changes.is_empty() {
                diesel::update(patients::table.find(patient_id))
                    .set(&changes)
                    .execute(conn)?;
            }
            if let Some(phone) = phone {
                diesel::update(users::table.find(patient.user_id))
                    .set(users::phone.eq(Some(phone)))
                    .execute(conn)?;
            }
            Ok(())
        })?;

        audit::record(conn, Some(&user), "update", "patient", Some(patient_id));
        let patient = load_patient(conn, patient_id)?;
        Ok(views::patient_view(conn, patient)?)
    })
    .await?;

    Ok(ok(view))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn update_body_splits_phone_from_profile_fields() {
        let body: UpdatePatientRequest =
            serde_json::from_str(r#"{"phone":"555-0100","address":"1 Main St","gender":"female"}"#).unwrap();
        assert_eq!(body.phone.as_deref(), Some("555-0100"));
        assert_eq!(body.changes.address.as_deref(), Some("1 Main St"));
        assert!(validate_patient_update(&body).is_ok());
    }

    #[test]
    fn update_rules_reject_bad_values() {
        let body = UpdatePatientRequest {
            changes: PatientChanges {
                gender: Some("unknown".into()),
                dob: Some(Utc::now().date_naive() + Duration::days(2)),
                address: Some("x".repeat(501)),
                image_url: Some(format!("https://cdn.example.com/{}", "p".repeat(1024))),
                ..Default::default()
            },
            phone: Some("0".repeat(21)),
        };
        match validate_patient_update(&body) {
            Err(ApiError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["gender", "dob", "image_url", "address", "phone"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
