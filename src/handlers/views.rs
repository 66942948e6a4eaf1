//! Response shapes that embed related rows, loaded in batches with one
//! query per related table.

use std::collections::{HashMap, HashSet};

use diesel::PgConnection;
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Appointment, Doctor, Patient, Prescription, UserSummary};
use crate::schema::{doctors, patients, users};

#[derive(Debug, Clone, Serialize)]
pub struct PatientView {
    #[serde(flatten)]
    pub patient: Patient,
    pub user: Option<UserSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorView {
    #[serde(flatten)]
    pub doctor: Doctor,
    pub user: Option<UserSummary>,
}

#[derive(Debug, Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient: Option<PatientView>,
    pub doctor: Option<DoctorView>,
}

#[derive(Debug, Serialize)]
pub struct PrescriptionView {
    #[serde(flatten)]
    pub prescription: Prescription,
    pub patient: Option<PatientView>,
    pub doctor: Option<DoctorView>,
}

fn distinct(ids: impl IntoIterator<Item = Uuid>) -> Vec<Uuid> {
    ids.into_iter().collect::<HashSet<_>>().into_iter().collect()
}

pub fn users_by_id(
    conn: &mut PgConnection,
    ids: impl IntoIterator<Item = Uuid>,
) -> QueryResult<HashMap<Uuid, UserSummary>> {
    let ids = distinct(ids);
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<UserSummary> = users::table
        .filter(users::user_id.eq_any(ids))
        .select(UserSummary::as_select())
        .load(conn)?;
    Ok(rows.into_iter().map(|u| (u.user_id, u)).collect())
}

pub fn patient_views(conn: &mut PgConnection, rows: Vec<Patient>) -> QueryResult<Vec<PatientView>> {
    let mut users = users_by_id(conn, rows.iter().map(|p| p.user_id))?;
    Ok(rows
        .into_iter()
        .map(|patient| PatientView {
            user: users.remove(&patient.user_id),
            patient,
        })
        .collect())
}

pub fn doctor_views(conn: &mut PgConnection, rows: Vec<Doctor>) -> QueryResult<Vec<DoctorView>> {
    let mut users = users_by_id(conn, rows.iter().map(|d| d.user_id))?;
    Ok(rows
        .into_iter()
        .map(|doctor| DoctorView {
            user: users.remove(&doctor.user_id),
            doctor,
        })
        .collect())
}

pub fn patient_view(conn: &mut PgConnection, patient: Patient) -> QueryResult<PatientView> {
    let user = users::table
        .find(patient.user_id)
        .select(UserSummary::as_select())
        .first(conn)
        .optional()?;
    Ok(PatientView { patient, user })
}

pub fn doctor_view(conn: &mut PgConnection, doctor: Doctor) -> QueryResult<DoctorView> {
    let user = users::table
        .find(doctor.user_id)
        .select(UserSummary::as_select())
        .first(conn)
        .optional()?;
    Ok(DoctorView { doctor, user })
}

pub fn patients_by_id(
    conn: &mut PgConnection,
    ids: impl IntoIterator<Item = Uuid>,
) -> QueryResult<HashMap<Uuid, PatientView>> {
    let ids = distinct(ids);
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = patients::table
        .filter(patients::patient_id.eq_any(ids))
        .select(Patient::as_select())
        .load(conn)?;
    Ok(patient_views(conn, rows)?
        .into_iter()
        .map(|v| (v.patient.patient_id, v))
        .collect())
}

pub fn doctors_by_id(
    conn: &mut PgConnection,
    ids: impl IntoIterator<Item = Uuid>,
) -> QueryResult<HashMap<Uuid, DoctorView>> {
    let ids = distinct(ids);
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = doctors::table
        .filter(doctors::doctor_id.eq_any(ids))
        .select(Doctor::as_select())
        .load(conn)?;
    Ok(doctor_views(conn, rows)?
        .into_iter()
        .map(|v| (v.doctor.doctor_id, v))
        .collect())
}

pub fn appointment_views(conn: &mut PgConnection, rows: Vec<Appointment>) -> QueryResult<Vec<AppointmentView>> {
    let patients = patients_by_id(conn, rows.iter().filter_map(|a| a.patient_id))?;
    let doctors = doctors_by_id(conn, rows.iter().filter_map(|a| a.doctor_id))?;
    Ok(rows
        .into_iter()
        .map(|appointment| AppointmentView {
            patient: appointment.patient_id.and_then(|id| patients.get(&id).cloned()),
            doctor: appointment.doctor_id.and_then(|id| doctors.get(&id).cloned()),
            appointment,
        })
        .collect())
}

pub fn prescription_views(
    conn: &mut PgConnection,
    rows: Vec<Prescription>,
) -> QueryResult<Vec<PrescriptionView>> {
    let patients = patients_by_id(conn, rows.iter().filter_map(|p| p.patient_id))?;
    let doctors = doctors_by_id(conn, rows.iter().filter_map(|p| p.doctor_id))?;
    Ok(rows
        .into_iter()
        .map(|prescription| PrescriptionView {
            patient: prescription.patient_id.and_then(|id| patients.get(&id).cloned()),
            doctor: prescription.doctor_id.and_then(|id| doctors.get(&id).cloned()),
            prescription,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use bigdecimal::BigDecimal;
    use chrono::Utc;

    use super::*;

    #[test]
    fn views_flatten_the_row_beside_its_user() {
        let user_id = Uuid::new_v4();
        let view = DoctorView {
            doctor: Doctor {
                doctor_id: Uuid::new_v4(),
                user_id,
                department_id: None,
                clinic_id: None,
                specialty: Some("Pediatrics".into()),
                license_no: None,
                available_hours: None,
                available_days: Some("Mon,Tue".into()),
                image_url: None,
                bio: None,
                rating_cache: BigDecimal::from(0),
                created_at: Utc::now(),
            },
            user: Some(UserSummary {
                user_id,
                email: "peds@healthcare.com".into(),
                full_name: Some("Dr. Lisa Park".into()),
                phone: None,
            }),
        };

        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["specialty"], "Pediatrics");
        assert_eq!(value["user"]["full_name"], "Dr. Lisa Park");
    }

    #[test]
    fn distinct_ids_drop_duplicates() {
        let id = Uuid::new_v4();
        assert_eq!(distinct([id, id, id]), vec![id]);
    }
}
