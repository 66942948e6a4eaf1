use actix_web::{HttpResponse, web};
use diesel::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use super::ok;
use super::views;
use crate::audit;
use crate::auth::CurrentUser;
use crate::db::{self, DbPool};
use crate::error::ApiError;
use crate::models::{Doctor, DoctorChanges, Role};
use crate::schema::doctors;
use crate::validation::Validator;

pub(crate) fn load_doctor(conn: &mut PgConnection, doctor_id: Uuid) -> Result<Doctor, ApiError> {
    doctors::table
        .find(doctor_id)
        .select(Doctor::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Doctor"))
}

// Handler to list every doctor with their user summary
pub async fn list_doctors(pool: web::Data<DbPool>, _user: CurrentUser) -> Result<HttpResponse, ApiError> {
    let rows = db::run(&pool, |conn| {
        let rows = doctors::table
            .select(Doctor::as_select())
            .order(doctors::created_at.asc())
            .load(conn)?;
        Ok(views::doctor_views(conn, rows)?)
    })
    .await?;

    Ok(ok(rows))
}

// Handler to get the caller's own doctor profile
pub async fn current_doctor(pool: web::Data<DbPool>, user: CurrentUser) -> Result<HttpResponse, ApiError> {
    let view = db::run(&pool, move |conn| {
        let doctor = doctors::table
            .filter(doctors::user_id.eq(user.user_id))
            .select(Doctor::as_select())
            .first(conn)
            .optional()?
            .ok_or_else(|| ApiError::not_found("Doctor profile"))?;
        Ok(views::doctor_view(conn, doctor)?)
    })
    .await?;

    Ok(ok(view))
}

// Handler to get a doctor by ID
pub async fn get_doctor(
    pool: web::Data<DbPool>,
    _user: CurrentUser,
    doctor_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let doctor_id = doctor_id.into_inner();
    let view = db::run(&pool, move |conn| {
        let doctor = load_doctor(conn, doctor_id)?;
        Ok(views::doctor_view(conn, doctor)?)
    })
    .await?;

    Ok(ok(view))
}

fn validate_doctor_update(changes: &DoctorChanges) -> Result<(), ApiError> {
    let mut v = Validator::new();
    v.max_length("specialty", changes.specialty.as_deref(), 100, "Specialty must be less than 100 characters");
    v.max_length("license_no", changes.license_no.as_deref(), 100, "License number must be less than 100 characters");
    v.max_length("image_url", changes.image_url.as_deref(), 1024, "Image URL must be less than 1024 characters");
    v.finish()
}

// Handler to update a doctor profile (self or admin)
pub async fn update_doctor(
    pool: web::Data<DbPool>,
    user: CurrentUser,
    doctor_id: web::Path<Uuid>,
    body: web::Json<DoctorChanges>,
) -> Result<HttpResponse, ApiError> {
    let changes = body.into_inner();
    validate_doctor_update(&changes)?;

    let doctor_id = doctor_id.into_inner();
    let view = db::run(&pool, move |conn| {
        let doctor = load_doctor(conn, doctor_id)?;
        if !user.is(Role::Admin) && doctor.user_id != user.user_id {
            return Err(ApiError::Forbidden("Not authorized to update this doctor".to_string()));
        }

        let doctor = if changes.is_empty() {
            doctor
        } else {
            let updated = diesel::update(doctors::table.find(doctor_id))
                .set(&changes)
                .returning(Doctor::as_returning())
                .get_result(conn)?;
            audit::record(conn, Some(&user), "update", "doctor", Some(doctor_id));
            updated
        };
        Ok(views::doctor_view(conn, doctor)?)
    })
    .await?;

    Ok(ok(view))
}
