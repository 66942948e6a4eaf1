use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::text_enum;
use crate::schema::appointments;

text_enum! {
    AppointmentStatus {
        Scheduled => "scheduled",
        Confirmed => "confirmed",
        Completed => "completed",
        Cancelled => "cancelled",
        NoShow => "no_show",
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = appointments)]
#[diesel(primary_key(appointment_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Appointment {
    pub appointment_id: Uuid,
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub clinic_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub created_by: Option<Uuid>,
    pub notified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = appointments)]
pub struct NewAppointment {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub clinic_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub created_by: Uuid,
}

#[derive(Debug, Default, Deserialize, AsChangeset)]
#[diesel(table_name = appointments)]
pub struct AppointmentChanges {
    pub status: Option<AppointmentStatus>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

impl AppointmentChanges {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.reason.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_uses_snake_case_text() {
        assert_eq!(AppointmentStatus::NoShow.as_str(), "no_show");
        assert_eq!(
            serde_json::from_str::<AppointmentStatus>("\"no_show\"").unwrap(),
            AppointmentStatus::NoShow
        );
        assert!(serde_json::from_str::<AppointmentStatus>("\"pending\"").is_err());
    }

    #[test]
    fn empty_changes_are_detected() {
        assert!(AppointmentChanges::default().is_empty());
        let changes: AppointmentChanges = serde_json::from_str(r#"{"status":"cancelled"}"#).unwrap();
        assert!(!changes.is_empty());
    }
}
