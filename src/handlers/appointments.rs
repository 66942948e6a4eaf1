use actix_web::{HttpResponse, web};
use chrono::{DateTime, Utc};
use diesel::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::Deserialize;
use uuid::Uuid;

use super::views::{self, AppointmentView};
use super::{created, message, non_blank, ok};
use crate::access::{self, Scope};
use crate::audit;
use crate::auth::CurrentUser;
use crate::db::{self, DbPool};
use crate::error::ApiError;
use crate::models::profile::weekday_label;
use crate::models::{Appointment, AppointmentChanges, AppointmentStatus, Doctor, NewAppointment, Role};
use crate::schema::{appointments, doctors};
use crate::validation::Validator;

const SLOT_TAKEN: &str = "Selected time slot is already booked";

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub doctor_id: Option<Uuid>,
    pub clinic_id: Option<Uuid>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

fn load_appointment(conn: &mut PgConnection, appointment_id: Uuid) -> Result<Appointment, ApiError> {
    appointments::table
        .find(appointment_id)
        .select(Appointment::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Appointment"))
}

fn appointment_view(conn: &mut PgConnection, appointment: Appointment) -> Result<AppointmentView, ApiError> {
    let mut rows = views::appointment_views(conn, vec![appointment])?;
    rows.pop()
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("appointment view is empty")))
}

/// Whether a non-cancelled appointment already holds the doctor's slot.
fn slot_taken(
    conn: &mut PgConnection,
    doctor_id: Uuid,
    start_time: DateTime<Utc>,
    ignore: Option<Uuid>,
) -> QueryResult<bool> {
    let mut query = appointments::table
        .filter(appointments::doctor_id.eq(doctor_id))
        .filter(appointments::start_time.eq(start_time))
        .filter(appointments::status.ne(AppointmentStatus::Cancelled))
        .into_boxed();
    if let Some(id) = ignore {
        query = query.filter(appointments::appointment_id.ne(id));
    }
    diesel::select(diesel::dsl::exists(query)).get_result(conn)
}

/// The partial unique index on `(doctor_id, start_time)` catches bookings
/// that race past `slot_taken`.
fn map_slot_violation(err: DieselError) -> ApiError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)
            if info.constraint_name() == Some("appointments_doctor_slot_key") =>
        {
            ApiError::Conflict(SLOT_TAKEN.to_string())
        }
        other => other.into(),
    }
}

fn ensure_available(doctor: &Doctor, start_time: DateTime<Utc>) -> Result<(), ApiError> {
    if doctor.is_available_on(start_time) {
        Ok(())
    } else {
        Err(ApiError::Conflict(format!(
            "Doctor not available on {}",
            weekday_label(start_time)
        )))
    }
}

// Handler to list the caller's appointments (all of them for admins)
pub async fn list_appointments(pool: web::Data<DbPool>, user: CurrentUser) -> Result<HttpResponse, ApiError> {
    let rows = db::run(&pool, move |conn| {
        let query = appointments::table
            .select(Appointment::as_select())
            .order(appointments::start_time.asc())
            .into_boxed();
        let rows = match Scope::resolve(conn, &user)? {
            Scope::All => query.load(conn)?,
            Scope::Doctor(id) => query.filter(appointments::doctor_id.eq(id)).load(conn)?,
            Scope::Patient(id) => query.filter(appointments::patient_id.eq(id)).load(conn)?,
            Scope::Empty => Vec::new(),
        };
        Ok(views::appointment_views(conn, rows)?)
    })
    .await?;

    Ok(ok(rows))
}

fn validate_create(body: &CreateAppointmentRequest, now: DateTime<Utc>) -> Result<(DateTime<Utc>, Uuid), ApiError> {
    let mut v = Validator::new();
    v.check("doctor_id", body.doctor_id.is_some(), "Doctor ID is required");
    v.check("start_time", body.start_time.is_some(), "Start time is required");
    if let Some(start) = body.start_time {
        v.not_in_past("start_time", start, now, "Appointment date cannot be in the past");
        v.ends_after("end_time", start, body.end_time, "End time must be after start time");
    }
    v.max_length("reason", body.reason.as_deref(), 500, "Reason must be less than 500 characters");
    v.finish()?;

    match (body.start_time, body.doctor_id) {
        (Some(start), Some(doctor_id)) => Ok((start, doctor_id)),
        _ => Err(ApiError::BadRequest("Doctor ID and start time are required".to_string())),
    }
}

// Handler to book an appointment as the calling patient
pub async fn create_appointment(
    pool: web::Data<DbPool>,
    user: CurrentUser,
    body: web::Json<CreateAppointmentRequest>,
) -> Result<HttpResponse, ApiError> {
    user.require_role(&[Role::Patient])?;

    let body = body.into_inner();
    let (start_time, doctor_id) = validate_create(&body, Utc::now())?;

    let view = db::run(&pool, move |conn| {
        let patient_id = access::patient_id_for_user(conn, user.user_id)?
            .ok_or_else(|| ApiError::BadRequest("Patient profile not found".to_string()))?;

        let doctor = doctors::table
            .find(doctor_id)
            .select(Doctor::as_select())
            .first(conn)
            .optional()?
            .ok_or_else(|| ApiError::BadRequest("Doctor not found".to_string()))?;

        ensure_available(&doctor, start_time)?;

        if slot_taken(conn, doctor_id, start_time, None)? {
            return Err(ApiError::Conflict(SLOT_TAKEN.to_string()));
        }

        let new_appointment = NewAppointment {
            appointment_id: Uuid::new_v4(),
            patient_id,
            doctor_id,
            clinic_id: body.clinic_id.or(doctor.clinic_id),
            start_time,
            end_time: body.end_time,
            status: AppointmentStatus::Scheduled,
            reason: non_blank(body.reason),
            created_by: user.user_id,
        };
        let appointment = diesel::insert_into(appointments::table)
            .values(&new_appointment)
            .returning(Appointment::as_returning())
            .get_result(conn)
            .map_err(map_slot_violation)?;

        audit::record(conn, Some(&user), "create", "appointment", Some(appointment.appointment_id));
        tracing::info!(appointment_id = %appointment.appointment_id, %doctor_id, "appointment booked");

        appointment_view(conn, appointment)
    })
    .await?;

    Ok(created(view))
}

/// Patients may only cancel.
fn check_patient_changes(changes: &AppointmentChanges) -> Result<(), ApiError> {
    let only_cancels = changes.status == Some(AppointmentStatus::Cancelled)
        && changes.start_time.is_none()
        && changes.end_time.is_none()
        && changes.reason.is_none();
    if only_cancels {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Patients can only cancel appointments".to_string()))
    }
}

fn validate_update(changes: &AppointmentChanges, current: &Appointment, now: DateTime<Utc>) -> Result<(), ApiError> {
    let mut v = Validator::new();
    if let Some(start) = changes.start_time {
        v.not_in_past("start_time", start, now, "Appointment date cannot be in the past");
    }
    let start = changes.start_time.unwrap_or(current.start_time);
    if changes.start_time.is_some() || changes.end_time.is_some() {
        v.ends_after("end_time", start, changes.end_time.or(current.end_time), "End time must be after start time");
    }
    v.max_length("reason", changes.reason.as_deref(), 500, "Reason must be less than 500 characters");
    v.finish()
}

// Handler to update an appointment (owning doctor, owning patient, or admin)
pub async fn update_appointment(
    pool: web::Data<DbPool>,
    user: CurrentUser,
    appointment_id: web::Path<Uuid>,
    body: web::Json<AppointmentChanges>,
) -> Result<HttpResponse, ApiError> {
    let appointment_id = appointment_id.into_inner();
    let changes = body.into_inner();

    let view = db::run(&pool, move |conn| {
        let current = load_appointment(conn, appointment_id)?;

        let scope = Scope::resolve(conn, &user)?;
        if !scope.permits(current.doctor_id, current.patient_id) {
            return Err(ApiError::Forbidden("Not authorized to update this appointment".to_string()));
        }
        if user.is(Role::Patient) {
            check_patient_changes(&changes)?;
        }
        validate_update(&changes, &current, Utc::now())?;

        if changes.is_empty() {
            return appointment_view(conn, current);
        }

        if let (Some(start_time), Some(doctor_id)) = (changes.start_time, current.doctor_id) {
            let doctor = doctors::table
                .find(doctor_id)
                .select(Doctor::as_select())
                .first(conn)
                .optional()?;
            if let Some(doctor) = doctor {
                ensure_available(&doctor, start_time)?;
            }
        }

        // Moving a live appointment, or reviving a cancelled one, needs a free slot.
        let status = changes.status.unwrap_or(current.status);
        let start_time = changes.start_time.unwrap_or(current.start_time);
        let needs_slot = status != AppointmentStatus::Cancelled
            && (start_time != current.start_time || current.status == AppointmentStatus::Cancelled);
        if let (true, Some(doctor_id)) = (needs_slot, current.doctor_id) {
            if slot_taken(conn, doctor_id, start_time, Some(appointment_id))? {
                return Err(ApiError::Conflict(SLOT_TAKEN.to_string()));
            }
        }

        let updated = diesel::update(appointments::table.find(appointment_id))
            .set(&changes)
            .returning(Appointment::as_returning())
            .get_result(conn)
            .map_err(map_slot_violation)?;

        audit::record(conn, Some(&user), "update", "appointment", Some(appointment_id));
        appointment_view(conn, updated)
    })
    .await?;

    Ok(ok(view))
}

// Handler to delete an appointment (admin or owning patient)
pub async fn delete_appointment(
    pool: web::Data<DbPool>,
    user: CurrentUser,
    appointment_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let appointment_id = appointment_id.into_inner();

    db::run(&pool, move |conn| {
        let appointment = load_appointment(conn, appointment_id)?;

        let allowed = match Scope::resolve(conn, &user)? {
            Scope::All => true,
            Scope::Patient(id) => appointment.patient_id == Some(id),
            Scope::Doctor(_) | Scope::Empty => false,
        };
        if !allowed {
            return Err(ApiError::Forbidden(
                "Only admin or the booking patient can delete appointments".to_string(),
            ));
        }

        diesel::delete(appointments::table.find(appointment_id)).execute(conn)?;
        audit::record(conn, Some(&user), "delete", "appointment", Some(appointment_id));
        Ok(())
    })
    .await?;

    Ok(message("Appointment deleted"))
}

#[cfg(test)]
mod tests {
    use bigdecimal::BigDecimal;
    use chrono::{Duration, TimeZone};

    use super::*;

    fn request(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            doctor_id: Some(Uuid::new_v4()),
            clinic_id: None,
            start_time: start,
            end_time: end,
            reason: None,
        }
    }

    fn doctor(days: &str) -> Doctor {
        Doctor {
            doctor_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            department_id: None,
            clinic_id: None,
            specialty: None,
            license_no: None,
            available_hours: None,
            available_days: Some(days.to_string()),
            image_url: None,
            bio: None,
            rating_cache: BigDecimal::from(0),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn booking_requires_a_future_start() {
        let now = Utc::now();
        assert!(matches!(validate_create(&request(None, None), now), Err(ApiError::Validation(_))));
        assert!(matches!(
            validate_create(&request(Some(now - Duration::hours(1)), None), now),
            Err(ApiError::Validation(_))
        ));
        assert!(validate_create(&request(Some(now + Duration::days(1)), None), now).is_ok());
    }

    #[test]
    fn booking_end_must_follow_start() {
        let now = Utc::now();
        let start = now + Duration::days(1);
        assert!(validate_create(&request(Some(start), Some(start)), now).is_err());
        assert!(validate_create(&request(Some(start), Some(start + Duration::minutes(30))), now).is_ok());
    }

    #[test]
    fn unavailable_weekday_names_the_day() {
        // 2030-01-08 is a Tuesday
        let tuesday = Utc.with_ymd_and_hms(2030, 1, 8, 10, 0, 0).unwrap();
        let err = ensure_available(&doctor("Mon,Wed,Fri"), tuesday).unwrap_err();
        assert!(matches!(&err, ApiError::Conflict(msg) if msg == "Doctor not available on Tue"));
        assert!(ensure_available(&doctor("Tue"), tuesday).is_ok());
    }

    fn booked(start_time: DateTime<Utc>) -> Appointment {
        Appointment {
            appointment_id: Uuid::new_v4(),
            patient_id: Some(Uuid::new_v4()),
            doctor_id: Some(Uuid::new_v4()),
            clinic_id: None,
            start_time,
            end_time: None,
            status: AppointmentStatus::Scheduled,
            reason: None,
            created_by: None,
            notified_at: None,
            created_at: start_time,
        }
    }

    #[test]
    fn rescheduling_into_the_past_is_rejected() {
        let now = Utc::now();
        let current = booked(now + Duration::days(3));

        let back = AppointmentChanges {
            start_time: Some(now - Duration::hours(2)),
            ..Default::default()
        };
        match validate_update(&back, &current, now) {
            Err(ApiError::Validation(errors)) => assert_eq!(errors[0].field, "start_time"),
            other => panic!("expected validation error, got {other:?}"),
        }

        let forward = AppointmentChanges {
            start_time: Some(now + Duration::days(5)),
            ..Default::default()
        };
        assert!(validate_update(&forward, &current, now).is_ok());

        // A status change on an appointment whose time has passed is fine.
        let past = booked(now - Duration::days(1));
        let complete = AppointmentChanges {
            status: Some(AppointmentStatus::Completed),
            ..Default::default()
        };
        assert!(validate_update(&complete, &past, now).is_ok());
    }

    #[test]
    fn patients_may_only_cancel() {
        let cancel = AppointmentChanges {
            status: Some(AppointmentStatus::Cancelled),
            ..Default::default()
        };
        assert!(check_patient_changes(&cancel).is_ok());

        let confirm = AppointmentChanges {
            status: Some(AppointmentStatus::Confirmed),
            ..Default::default()
        };
        assert!(matches!(check_patient_changes(&confirm), Err(ApiError::Forbidden(_))));

        let reschedule = AppointmentChanges {
            status: Some(AppointmentStatus::Cancelled),
            start_time: Some(Utc::now()),
            ..Default::default()
        };
        assert!(check_patient_changes(&reschedule).is_err());
    }
}
