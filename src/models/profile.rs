use bigdecimal::BigDecimal;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{admins, doctors, patients};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = patients)]
#[diesel(primary_key(patient_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Patient {
    pub patient_id: Uuid,
    pub user_id: Uuid,
    pub image_url: Option<String>,
    pub dob: Option<NaiveDate>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub insurance_info: Option<String>,
    pub encryption_key_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = patients)]
pub struct NewPatient {
    pub patient_id: Uuid,
    pub user_id: Uuid,
}

impl NewPatient {
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            patient_id: Uuid::new_v4(),
            user_id,
        }
    }
}

/// Fields a patient (or an admin) may change on a patient profile.
#[derive(Debug, Default, Deserialize, AsChangeset)]
#[diesel(table_name = patients)]
pub struct PatientChanges {
    pub image_url: Option<String>,
    pub dob: Option<NaiveDate>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
    pub insurance_info: Option<String>,
}

impl PatientChanges {
    pub fn is_empty(&self) -> bool {
        self.image_url.is_none()
            && self.dob.is_none()
            && self.gender.is_none()
            && self.address.is_none()
            && self.emergency_contact.is_none()
            && self.insurance_info.is_none()
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = doctors)]
#[diesel(primary_key(doctor_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Doctor {
    pub doctor_id: Uuid,
    pub user_id: Uuid,
    pub department_id: Option<Uuid>,
    pub clinic_id: Option<Uuid>,
    pub specialty: Option<String>,
    pub license_no: Option<String>,
    pub available_hours: Option<String>,
    pub available_days: Option<String>,
    pub image_url: Option<String>,
    pub bio: Option<String>,
    pub rating_cache: BigDecimal,
    pub created_at: DateTime<Utc>,
}

const WEEKDAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Three-letter label for the UTC weekday of `at`, as used in `available_days`.
pub fn weekday_label(at: DateTime<Utc>) -> &'static str {
    WEEKDAY_LABELS[at.weekday().num_days_from_sunday() as usize]
}

impl Doctor {
    /// Whether the doctor takes bookings on the weekday of `at`.
    ///
    /// `available_days` is a comma separated list such as `Mon,Wed,Fri`.
    /// A missing or empty list places no restriction.
    pub fn is_available_on(&self, at: DateTime<Utc>) -> bool {
        let Some(days) = self.available_days.as_deref() else {
            return true;
        };
        let allowed: Vec<&str> = days.split(',').map(str::trim).filter(|d| !d.is_empty()).collect();
        allowed.is_empty() || allowed.contains(&weekday_label(at))
    }
}

#[derive(Debug, Default, Insertable)]
#[diesel(table_name = doctors)]
pub struct NewDoctor {
    pub doctor_id: Uuid,
    pub user_id: Uuid,
    pub department_id: Option<Uuid>,
    pub clinic_id: Option<Uuid>,
    pub specialty: Option<String>,
    pub license_no: Option<String>,
    pub available_hours: Option<String>,
    pub available_days: Option<String>,
    pub bio: Option<String>,
    pub rating_cache: Option<BigDecimal>,
}

impl NewDoctor {
    /// A bare profile; columns left `None` take their database defaults.
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            doctor_id: Uuid::new_v4(),
            user_id,
            ..Default::default()
        }
    }
}

/// Fields a doctor (or an admin) may change on a doctor profile.
#[derive(Debug, Default, Deserialize, AsChangeset)]
#[diesel(table_name = doctors)]
pub struct DoctorChanges {
    pub department_id: Option<Uuid>,
    pub clinic_id: Option<Uuid>,
    pub specialty: Option<String>,
    pub license_no: Option<String>,
    pub available_hours: Option<String>,
    pub available_days: Option<String>,
    pub image_url: Option<String>,
    pub bio: Option<String>,
}

impl DoctorChanges {
    pub fn is_empty(&self) -> bool {
        self.department_id.is_none()
            && self.clinic_id.is_none()
            && self.specialty.is_none()
            && self.license_no.is_none()
            && self.available_hours.is_none()
            && self.available_days.is_none()
            && self.image_url.is_none()
            && self.bio.is_none()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = admins)]
pub struct NewAdmin {
    pub admin_id: Uuid,
    pub user_id: Uuid,
}

impl NewAdmin {
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            admin_id: Uuid::new_v4(),
            user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn doctor_with_days(days: Option<&str>) -> Doctor {
        Doctor {
            doctor_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            department_id: None,
            clinic_id: None,
            specialty: Some("Cardiology".into()),
            license_no: None,
            available_hours: None,
            available_days: days.map(str::to_string),
            image_url: None,
            bio: None,
            rating_cache: BigDecimal::from(0),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn weekday_labels_follow_utc() {
        // 2030-01-06 is a Sunday
        let sunday = Utc.with_ymd_and_hms(2030, 1, 6, 23, 30, 0).unwrap();
        assert_eq!(weekday_label(sunday), "Sun");
        assert_eq!(weekday_label(sunday + chrono::Duration::hours(1)), "Mon");
    }

    #[test]
    fn booking_days_are_enforced() {
        let doctor = doctor_with_days(Some("Mon, Wed ,Fri"));
        let monday = Utc.with_ymd_and_hms(2030, 1, 7, 9, 0, 0).unwrap();
        let tuesday = Utc.with_ymd_and_hms(2030, 1, 8, 9, 0, 0).unwrap();
        let wednesday = Utc.with_ymd_and_hms(2030, 1, 9, 9, 0, 0).unwrap();

        assert!(doctor.is_available_on(monday));
        assert!(!doctor.is_available_on(tuesday));
        assert!(doctor.is_available_on(wednesday));
    }

    #[test]
    fn missing_or_blank_days_allow_everything() {
        let saturday = Utc.with_ymd_and_hms(2030, 1, 12, 9, 0, 0).unwrap();
        assert!(doctor_with_days(None).is_available_on(saturday));
        assert!(doctor_with_days(Some(" , ")).is_available_on(saturday));
    }

    #[test]
    fn empty_changesets_are_detected() {
        assert!(PatientChanges::default().is_empty());
        assert!(DoctorChanges::default().is_empty());
        let changes = DoctorChanges {
            bio: Some("Joint replacement".into()),
            ..Default::default()
        };
        assert!(!changes.is_empty());
    }
}
