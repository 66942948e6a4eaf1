//! Role-scoped visibility, shared by every handler that reads clinical rows.
//!
//! A caller is resolved to a [`Scope`] once per request. List endpoints turn
//! the scope into a `WHERE` clause; by-id endpoints ask the scope whether a
//! loaded row is visible and answer 404 when it is not.

use diesel::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::models::{NewDoctor, NewPatient, Role};
use crate::schema::{appointments, doctors, patients};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Admins see every row.
    All,
    /// A doctor, by `doctor_id`.
    Doctor(Uuid),
    /// A patient, by `patient_id`.
    Patient(Uuid),
    /// A doctor or patient account with no profile row sees nothing.
    Empty,
}

impl Scope {
    pub fn resolve(conn: &mut PgConnection, user: &CurrentUser) -> QueryResult<Scope> {
        let scope = match user.role {
            Role::Admin => Scope::All,
            Role::Doctor => doctor_id_for_user(conn, user.user_id)?.map_or(Scope::Empty, Scope::Doctor),
            Role::Patient => patient_id_for_user(conn, user.user_id)?.map_or(Scope::Empty, Scope::Patient),
        };
        Ok(scope)
    }

    /// Visibility of a row owned directly by a doctor and/or a patient.
    pub fn permits(&self, doctor_id: Option<Uuid>, patient_id: Option<Uuid>) -> bool {
        match self {
            Scope::All => true,
            Scope::Doctor(id) => doctor_id == Some(*id),
            Scope::Patient(id) => patient_id == Some(*id),
            Scope::Empty => false,
        }
    }

    /// Visibility of a patient-owned row that a doctor reaches through
    /// their appointments with that patient (medical history, patient
    /// profiles).
    pub fn permits_patient_record(&self, conn: &mut PgConnection, patient_id: Option<Uuid>) -> QueryResult<bool> {
        match (self, patient_id) {
            (Scope::Doctor(doctor_id), Some(patient_id)) => has_seen_patient(conn, *doctor_id, patient_id),
            _ => Ok(self.permits(None, patient_id)),
        }
    }

    /// Visibility of a row tied to an appointment (lab results). Doctors see
    /// it through the appointment; patients through `patient_id`.
    pub fn permits_appointment_record(
        &self,
        conn: &mut PgConnection,
        appointment_id: Option<Uuid>,
        patient_id: Option<Uuid>,
    ) -> QueryResult<bool> {
        match (self, appointment_id) {
            (Scope::Doctor(doctor_id), Some(appointment_id)) => {
                let owner = appointments::table
                    .find(appointment_id)
                    .select(appointments::doctor_id)
                    .first::<Option<Uuid>>(conn)
                    .optional()?;
                Ok(owner.flatten() == Some(*doctor_id))
            }
            (Scope::Doctor(_), None) => Ok(false),
            _ => Ok(self.permits(None, patient_id)),
        }
    }
}

pub fn doctor_id_for_user(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<Option<Uuid>> {
    doctors::table
        .filter(doctors::user_id.eq(user_id))
        .select(doctors::doctor_id)
        .first(conn)
        .optional()
}

pub fn patient_id_for_user(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<Option<Uuid>> {
    patients::table
        .filter(patients::user_id.eq(user_id))
        .select(patients::patient_id)
        .first(conn)
        .optional()
}

/// Creates the role's profile row if the user has none. Returns whether a
/// row was inserted. Admins have no self-service profile.
pub fn ensure_profile(conn: &mut PgConnection, user_id: Uuid, role: Role) -> QueryResult<bool> {
    let inserted = match role {
        Role::Patient => diesel::insert_into(patients::table)
            .values(&NewPatient::for_user(user_id))
            .on_conflict(patients::user_id)
            .do_nothing()
            .execute(conn)?,
        Role::Doctor => diesel::insert_into(doctors::table)
            .values(&NewDoctor::for_user(user_id))
            .on_conflict(doctors::user_id)
            .do_nothing()
            .execute(conn)?,
        Role::Admin => 0,
    };
    Ok(inserted > 0)
}

/// Distinct patients with at least one appointment with the doctor.
pub fn patient_ids_seen_by(conn: &mut PgConnection, doctor_id: Uuid) -> QueryResult<Vec<Uuid>> {
    let ids: Vec<Option<Uuid>> = appointments::table
        .filter(appointments::doctor_id.eq(doctor_id))
        .select(appointments::patient_id)
        .distinct()
        .load(conn)?;
    Ok(ids.into_iter().flatten().collect())
}

pub fn appointment_ids_of(conn: &mut PgConnection, doctor_id: Uuid) -> QueryResult<Vec<Uuid>> {
    appointments::table
        .filter(appointments::doctor_id.eq(doctor_id))
        .select(appointments::appointment_id)
        .load(conn)
}

/// Whether an appointment with these parties can carry a record for
/// `patient_id`, filed by `doctor_id` when the filer is a doctor.
fn parties_match(parties: (Option<Uuid>, Option<Uuid>), patient_id: Uuid, doctor_id: Option<Uuid>) -> bool {
    let (appointment_doctor, appointment_patient) = parties;
    appointment_patient == Some(patient_id) && doctor_id.is_none_or(|id| appointment_doctor == Some(id))
}

/// Rejects a record that names an appointment of another patient or doctor.
pub fn ensure_linked_appointment(
    conn: &mut PgConnection,
    appointment_id: Option<Uuid>,
    patient_id: Uuid,
    doctor_id: Option<Uuid>,
) -> Result<(), ApiError> {
    let Some(appointment_id) = appointment_id else {
        return Ok(());
    };
    let parties = appointments::table
        .find(appointment_id)
        .select((appointments::doctor_id, appointments::patient_id))
        .first::<(Option<Uuid>, Option<Uuid>)>(conn)
        .optional()?
        .ok_or_else(|| ApiError::BadRequest("Appointment not found".to_string()))?;
    if parties_match(parties, patient_id, doctor_id) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(
            "Appointment does not belong to this patient and doctor".to_string(),
        ))
    }
}

fn has_seen_patient(conn: &mut PgConnection, doctor_id: Uuid, patient_id: Uuid) -> QueryResult<bool> {
    diesel::select(diesel::dsl::exists(
        appointments::table
            .filter(appointments::doctor_id.eq(doctor_id))
            .filter(appointments::patient_id.eq(patient_id)),
    ))
    .get_result(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_sees_everything() {
        assert!(Scope::All.permits(None, None));
        assert!(Scope::All.permits(Some(Uuid::new_v4()), Some(Uuid::new_v4())));
    }

    #[test]
    fn doctor_sees_only_own_rows() {
        let me = Uuid::new_v4();
        let scope = Scope::Doctor(me);
        assert!(scope.permits(Some(me), Some(Uuid::new_v4())));
        assert!(!scope.permits(Some(Uuid::new_v4()), Some(Uuid::new_v4())));
        assert!(!scope.permits(None, None));
    }

    #[test]
    fn patient_sees_only_own_rows() {
        let me = Uuid::new_v4();
        let scope = Scope::Patient(me);
        assert!(scope.permits(Some(Uuid::new_v4()), Some(me)));
        assert!(!scope.permits(Some(Uuid::new_v4()), Some(Uuid::new_v4())));
    }

    #[test]
    fn doctor_id_does_not_leak_into_patient_scope() {
        let id = Uuid::new_v4();
        assert!(!Scope::Patient(id).permits(Some(id), None));
        assert!(!Scope::Doctor(id).permits(None, Some(id)));
    }

    #[test]
    fn linked_appointment_must_share_patient_and_doctor() {
        let (doctor, patient) = (Uuid::new_v4(), Uuid::new_v4());
        let parties = (Some(doctor), Some(patient));
        assert!(parties_match(parties, patient, Some(doctor)));
        assert!(parties_match(parties, patient, None));
        assert!(!parties_match(parties, Uuid::new_v4(), Some(doctor)));
        assert!(!parties_match(parties, patient, Some(Uuid::new_v4())));
        assert!(!parties_match((Some(doctor), None), patient, None));
    }

    #[test]
    fn missing_profile_sees_nothing() {
        let id = Uuid::new_v4();
        assert!(!Scope::Empty.permits(Some(id), Some(id)));
    }
}
