use actix_web::{HttpResponse, web};
use diesel::PgConnection;
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use super::views::{self, PrescriptionView};
use super::{created, non_blank, ok};
use crate::access::{self, Scope};
use crate::auth::CurrentUser;
use crate::db::{self, DbPool};
use crate::documents::{self, PrescriptionDocument};
use crate::error::ApiError;
use crate::models::{
    Doctor, DoctorSnapshot, Medication, NewPrescription, Patient, PatientSnapshot, Prescription, Role, UserSummary,
};
use crate::schema::{doctors, patients, prescriptions, users};
use crate::validation::Validator;
use crate::{AppState, audit, mailer};

#[derive(Debug, Deserialize)]
pub struct CreatePrescriptionRequest {
    pub patient_id: Option<Uuid>,
    /// Only read for admins; doctors always prescribe as themselves.
    pub doctor_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    #[serde(default)]
    pub medications: Vec<Medication>,
    pub advice: Option<String>,
}

fn load_prescription(conn: &mut PgConnection, prescription_id: Uuid) -> Result<Prescription, ApiError> {
    prescriptions::table
        .find(prescription_id)
        .select(Prescription::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found("Prescription"))
}

fn prescription_view(conn: &mut PgConnection, prescription: Prescription) -> Result<PrescriptionView, ApiError> {
    views::prescription_views(conn, vec![prescription])?
        .pop()
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("prescription view is empty")))
}

fn summary_of(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<Option<UserSummary>> {
    users::table
        .find(user_id)
        .select(UserSummary::as_select())
        .first(conn)
        .optional()
}

fn doctor_snapshot(conn: &mut PgConnection, doctor_id: Uuid) -> Result<DoctorSnapshot, ApiError> {
    let doctor = doctors::table
        .find(doctor_id)
        .select(Doctor::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::BadRequest("Doctor not found".to_string()))?;
    let user = summary_of(conn, doctor.user_id)?;
    Ok(DoctorSnapshot {
        doctor_id: doctor.doctor_id,
        name: user.as_ref().and_then(|u| u.full_name.clone()),
        email: user.map(|u| u.email),
        specialty: doctor.specialty,
    })
}

fn patient_snapshot(conn: &mut PgConnection, patient_id: Uuid) -> Result<PatientSnapshot, ApiError> {
    let patient = patients::table
        .find(patient_id)
        .select(Patient::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::BadRequest("Patient not found".to_string()))?;
    let user = summary_of(conn, patient.user_id)?;
    Ok(PatientSnapshot {
        patient_id: patient.patient_id,
        name: user.as_ref().and_then(|u| u.full_name.clone()),
        email: user.map(|u| u.email),
        dob: patient.dob,
        gender: patient.gender,
    })
}

// Handler to list prescriptions, newest first
pub async fn list_prescriptions(pool: web::Data<DbPool>, user: CurrentUser) -> Result<HttpResponse, ApiError> {
    let rows = db::run(&pool, move |conn| {
        let query = prescriptions::table
            .select(Prescription::as_select())
            .order(prescriptions::issued_at.desc())
            .into_boxed();
        let rows = match Scope::resolve(conn, &user)? {
            Scope::All => query.load(conn)?,
            Scope::Doctor(id) => query.filter(prescriptions::doctor_id.eq(id)).load(conn)?,
            Scope::Patient(id) => query.filter(prescriptions::patient_id.eq(id)).load(conn)?,
            Scope::Empty => Vec::new(),
        };
        Ok(views::prescription_views(conn, rows)?)
    })
    .await?;

    Ok(ok(rows))
}

// Handler to issue a prescription, render its PDF and mail it to the patient
pub async fn create_prescription(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    user: CurrentUser,
    body: web::Json<CreatePrescriptionRequest>,
) -> Result<HttpResponse, ApiError> {
    user.require_role(&[Role::Doctor, Role::Admin])?;

    let body = body.into_inner();
    let mut v = Validator::new();
    v.check("patient_id", body.patient_id.is_some(), "Patient ID is required");
    if user.is(Role::Admin) {
        v.check("doctor_id", body.doctor_id.is_some(), "Doctor ID is required");
    }
    for (i, med) in body.medications.iter().enumerate() {
        v.required(&format!("medications[{i}].name"), &med.name, "Medication name is required");
    }
    v.finish()?;

    let patient_id = body.patient_id.unwrap_or_default();
    let caller = user.clone();
    let (prescription, doctor, patient, file_url) = db::run(&pool, move |conn| {
        let doctor_id = if caller.is(Role::Doctor) {
            access::doctor_id_for_user(conn, caller.user_id)?
                .ok_or_else(|| ApiError::BadRequest("Doctor profile not found".to_string()))?
        } else {
            body.doctor_id.unwrap_or_default()
        };

        let doctor = doctor_snapshot(conn, doctor_id)?;
        let patient = patient_snapshot(conn, patient_id)?;
        access::ensure_linked_appointment(conn, body.appointment_id, patient_id, Some(doctor_id))?;
        let new_prescription = NewPrescription::issue(
            &doctor,
            &patient,
            &body.medications,
            non_blank(body.advice),
            body.appointment_id,
        )
        .map_err(anyhow::Error::from)?;

        let prescription = diesel::insert_into(prescriptions::table)
            .values(&new_prescription)
            .returning(Prescription::as_returning())
            .get_result(conn)?;
        audit::record(conn, Some(&caller), "create", "prescription", Some(prescription.prescription_id));
        Ok((prescription, doctor, patient, new_prescription.file_url()))
    })
    .await?;

    let prescription_id = prescription.prescription_id;
    tracing::info!(%prescription_id, doctor_id = %doctor.doctor_id, "prescription issued");

    let medications: Vec<Medication> = serde_json::from_value(prescription.medications.clone()).unwrap_or_default();
    let advice = prescription.advice.clone();
    let issued_at = prescription.issued_at;
    let uploads_dir = state.config.uploads_dir.clone();
    let (pdf_doctor, pdf_patient) = (doctor.clone(), patient.clone());

    let rendered = web::block(move || -> anyhow::Result<Vec<u8>> {
        let pdf = documents::render_prescription(&PrescriptionDocument {
            prescription_id,
            doctor: &pdf_doctor,
            patient: &pdf_patient,
            medications: &medications,
            advice: advice.as_deref(),
            issued_at,
        })?;
        documents::write_prescription(&uploads_dir, prescription_id, &pdf)?;
        Ok(pdf)
    })
    .await;

    let pdf = match rendered {
        Ok(Ok(pdf)) => Some(pdf),
        Ok(Err(e)) => {
            tracing::warn!(%prescription_id, error = %e, "failed to generate prescription PDF");
            None
        }
        Err(e) => {
            tracing::warn!(%prescription_id, error = %e, "prescription PDF task failed");
            None
        }
    };

    let prescription = match pdf {
        Some(pdf) => {
            let prescription = db::run(&pool, move |conn| {
                Ok(diesel::update(prescriptions::table.find(prescription_id))
                    .set(prescriptions::file_url.eq(Some(file_url)))
                    .returning(Prescription::as_returning())
                    .get_result(conn)?)
            })
            .await?;

            if let (Some(smtp), Some(to)) = (state.config.smtp.clone(), patient.email.clone()) {
                let mail = mailer::prescription_mail(
                    to,
                    patient.name.as_deref(),
                    doctor.name.as_deref(),
                    doctor.email.as_deref(),
                    mailer::PdfAttachment {
                        filename: format!("{prescription_id}.pdf"),
                        bytes: pdf,
                    },
                );
                match web::block(move || mailer::send(&smtp, mail)).await {
                    Ok(Ok(())) => tracing::info!(%prescription_id, "prescription emailed"),
                    Ok(Err(e)) => tracing::warn!(%prescription_id, error = %e, "failed to send prescription email"),
                    Err(e) => tracing::warn!(%prescription_id, error = %e, "prescription email task failed"),
                }
            }
            prescription
        }
        None => prescription,
    };

    let view = db::run(&pool, move |conn| prescription_view(conn, prescription)).await?;
    Ok(created(view))
}

// Handler to get a prescription by ID
pub async fn get_prescription(
    pool: web::Data<DbPool>,
    user: CurrentUser,
    prescription_id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let prescription_id = prescription_id.into_inner();
    let view = db::run(&pool, move |conn| {
        let prescription = load_prescription(conn, prescription_id)?;
        let scope = Scope::resolve(conn, &user)?;
        if !scope.permits(prescription.doctor_id, prescription.patient_id) {
            return Err(ApiError::not_found("Prescription"));
        }
        prescription_view(conn, prescription)
    })
    .await?;

    Ok(ok(view))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_accepts_legacy_medication_names() {
        let body: CreatePrescriptionRequest = serde_json::from_str(
            r#"{
                "patient_id": "6f1c1f7e-2c1a-4c36-9d7c-1f5b2b1a9e01",
                "medications": [{"medication_name": "Metformin", "dosage": "500mg"}],
                "advice": "Take with meals"
            }"#,
        )
        .unwrap();
        assert_eq!(body.medications[0].name, "Metformin");
        assert!(body.doctor_id.is_none());
    }

    #[test]
    fn medications_default_to_empty() {
        let body: CreatePrescriptionRequest =
            serde_json::from_str(r#"{"patient_id":"6f1c1f7e-2c1a-4c36-9d7c-1f5b2b1a9e01"}"#).unwrap();
        assert!(body.medications.is_empty());
    }
}
