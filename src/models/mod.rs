//! Row types for every table the API reads or writes, plus the text-backed
//! enums stored in CHECK-constrained columns.

pub mod appointment;
pub mod audit;
pub mod clinic;
pub mod lab_result;
pub mod medical_history;
pub mod prescription;
pub mod profile;
pub mod user;

pub use appointment::{Appointment, AppointmentChanges, AppointmentStatus, NewAppointment};
pub use audit::NewAuditLog;
pub use clinic::{Clinic, Department, NewClinic, NewDepartment};
pub use lab_result::{LabResult, NewLabResult, ResultStatus};
pub use medical_history::{MedicalHistory, NewMedicalHistory};
pub use prescription::{
    DoctorSnapshot, Medication, NewPrescription, PatientSnapshot, Prescription,
};
pub use profile::{
    Doctor, DoctorChanges, NewAdmin, NewDoctor, NewPatient, Patient, PatientChanges,
};
pub use user::{NewUser, Role, User, UserSummary};

/// Declares an enum persisted as one of a fixed set of strings in a `TEXT`
/// column, with Diesel and serde support.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            diesel::AsExpression,
            diesel::FromSqlRow,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[diesel(sql_type = diesel::sql_types::Text)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} value {:?}", stringify!($name), other)),
                }
            }
        }

        impl diesel::serialize::ToSql<diesel::sql_types::Text, diesel::pg::Pg> for $name {
            fn to_sql<'b>(
                &'b self,
                out: &mut diesel::serialize::Output<'b, '_, diesel::pg::Pg>,
            ) -> diesel::serialize::Result {
                use std::io::Write;
                out.write_all(self.as_str().as_bytes())?;
                Ok(diesel::serialize::IsNull::No)
            }
        }

        impl diesel::deserialize::FromSql<diesel::sql_types::Text, diesel::pg::Pg> for $name {
            fn from_sql(bytes: diesel::pg::PgValue<'_>) -> diesel::deserialize::Result<Self> {
                let text = std::str::from_utf8(bytes.as_bytes())?;
                text.parse::<$name>().map_err(Into::into)
            }
        }
    };
}

pub(crate) use text_enum;
