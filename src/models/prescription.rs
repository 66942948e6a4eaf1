use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::schema::prescriptions;

/// One line of a prescription, stored inside the `medications` JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    #[serde(alias = "medication_name")]
    pub name: String,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// The prescribing doctor as they were when the prescription was issued.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoctorSnapshot {
    pub doctor_id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub specialty: Option<String>,
}

/// The patient as they were when the prescription was issued.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientSnapshot {
    pub patient_id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub dob: Option<NaiveDate>,
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = prescriptions)]
#[diesel(primary_key(prescription_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Prescription {
    pub prescription_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub medications: Value,
    pub advice: Option<String>,
    pub doctor_snapshot: Option<Value>,
    pub patient_snapshot: Option<Value>,
    pub file_url: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub downloadable_flag: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = prescriptions)]
pub struct NewPrescription {
    pub prescription_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub medications: Value,
    pub advice: String,
    pub doctor_snapshot: Value,
    pub patient_snapshot: Value,
    pub issued_at: DateTime<Utc>,
    pub downloadable_flag: bool,
}

impl NewPrescription {
    pub fn issue(
        doctor: &DoctorSnapshot,
        patient: &PatientSnapshot,
        medications: &[Medication],
        advice: Option<String>,
        appointment_id: Option<Uuid>,
    ) -> serde_json::Result<Self> {
        Ok(NewPrescription {
            prescription_id: Uuid::new_v4(),
            appointment_id,
            doctor_id: doctor.doctor_id,
            patient_id: patient.patient_id,
            medications: serde_json::to_value(medications)?,
            advice: advice.unwrap_or_default(),
            doctor_snapshot: serde_json::to_value(doctor)?,
            patient_snapshot: serde_json::to_value(patient)?,
            issued_at: Utc::now(),
            downloadable_flag: true,
        })
    }

    /// Public path of the rendered document, served under `/uploads`.
    pub fn file_url(&self) -> String {
        format!("/uploads/prescriptions/{}.pdf", self.prescription_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn medication_accepts_legacy_name_key() {
        let med: Medication =
            serde_json::from_str(r#"{"medication_name":"Amoxicillin","dosage":"500mg"}"#).unwrap();
        assert_eq!(med.name, "Amoxicillin");
        assert_eq!(med.dosage.as_deref(), Some("500mg"));
        assert!(med.frequency.is_none());
    }

    #[test]
    fn issue_embeds_snapshots() {
        let doctor = DoctorSnapshot {
            doctor_id: Uuid::new_v4(),
            name: Some("Dr. Sarah Chen".into()),
            email: Some("cardio@healthcare.com".into()),
            specialty: Some("Cardiology".into()),
        };
        let patient = PatientSnapshot {
            patient_id: Uuid::new_v4(),
            name: Some("Ann".into()),
            ..Default::default()
        };
        let meds = vec![Medication {
            name: "Atorvastatin".into(),
            dosage: Some("20mg".into()),
            frequency: Some("nightly".into()),
            notes: None,
        }];

        let issued = NewPrescription::issue(&doctor, &patient, &meds, None, None).unwrap();

        assert_eq!(issued.doctor_id, doctor.doctor_id);
        assert_eq!(issued.patient_id, patient.patient_id);
        assert_eq!(issued.advice, "");
        assert_eq!(issued.doctor_snapshot["specialty"], "Cardiology");
        assert_eq!(issued.medications[0]["name"], "Atorvastatin");
        assert_eq!(
            issued.file_url(),
            format!("/uploads/prescriptions/{}.pdf", issued.prescription_id)
        );
    }
}
