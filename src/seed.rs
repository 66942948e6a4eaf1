//! Bootstrap data for a fresh deployment: the default clinic, its
//! departments, an administrator and two doctors per department. Every step
//! is find-or-create, so running it twice changes nothing.

use std::str::FromStr;

use anyhow::Context;
use bigdecimal::BigDecimal;
use diesel::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use crate::auth::password;
use crate::models::{NewAdmin, NewClinic, NewDepartment, NewDoctor, NewUser, Role};
use crate::schema::{admins, clinics, departments, doctors, users};

pub const CLINIC_NAME: &str = "Central Hospital";
pub const ADMIN_EMAIL: &str = "admin@healthcare.com";
const ADMIN_PASSWORD: &str = "Admin@123456";
const SEED_RATING: &str = "4.50";

struct SeedDepartment {
    name: &'static str,
    description: &'static str,
}

const DEPARTMENTS: &[SeedDepartment] = &[
    SeedDepartment {
        name: "General Medicine",
        description: "General healthcare and preventive medicine",
    },
    SeedDepartment {
        name: "Cardiology",
        description: "Heart and cardiovascular diseases",
    },
    SeedDepartment {
        name: "Orthopedics",
        description: "Bones, joints, and musculoskeletal system",
    },
    SeedDepartment {
        name: "Pediatrics",
        description: "Healthcare for children",
    },
];

struct SeedDoctor {
    email: &'static str,
    name: &'static str,
    password: &'static str,
    department: &'static str,
    license: &'static str,
    bio: &'static str,
    hours: &'static str,
    days: &'static str,
}

const DOCTORS: &[SeedDoctor] = &[
    SeedDoctor {
        email: "doctor1@healthcare.com",
        name: "Dr. James Smith",
        password: "Doctor@123456",
        department: "General Medicine",
        license: "DOC-BD-2024-001",
        bio: "Experienced general physician with 10+ years of practice",
        hours: "09:00 - 17:00",
        days: "Mon,Tue,Wed,Thu,Fri",
    },
    SeedDoctor {
        email: "doctor2@healthcare.com",
        name: "Dr. Emily Johnson",
        password: "Doctor@123456",
        department: "General Medicine",
        license: "DOC-BD-2024-001A",
        bio: "Skilled physician specializing in preventive medicine",
        hours: "10:00 - 18:00",
        days: "Tue,Wed,Thu,Fri,Sat",
    },
    SeedDoctor {
        email: "cardio@healthcare.com",
        name: "Dr. Sarah Chen",
        password: "Cardio@123456",
        department: "Cardiology",
        license: "DOC-BD-2024-002",
        bio: "Specialist in cardiovascular diseases with 15+ years experience",
        hours: "10:00 - 16:00",
        days: "Mon,Wed,Thu,Fri",
    },
    SeedDoctor {
        email: "cardio2@healthcare.com",
        name: "Dr. Michael Brown",
        password: "Cardio@123456",
        department: "Cardiology",
        license: "DOC-BD-2024-002A",
        bio: "Expert in interventional cardiology and heart disease management",
        hours: "09:00 - 15:00",
        days: "Mon,Tue,Wed,Thu,Fri",
    },
    SeedDoctor {
        email: "ortho@healthcare.com",
        name: "Dr. Ahmed Khan",
        password: "Ortho@123456",
        department: "Orthopedics",
        license: "DOC-BD-2024-003",
        bio: "Expert orthopedic surgeon specializing in joint replacement",
        hours: "08:00 - 14:00",
        days: "Mon,Tue,Thu,Fri,Sat",
    },
    SeedDoctor {
        email: "ortho2@healthcare.com",
        name: "Dr. Lisa Anderson",
        password: "Ortho@123456",
        department: "Orthopedics",
        license: "DOC-BD-2024-003A",
        bio: "Specialist in sports medicine and orthopedic trauma",
        hours: "08:30 - 16:30",
        days: "Tue,Wed,Thu,Fri,Sat",
    },
    SeedDoctor {
        email: "pediatric@healthcare.com",
        name: "Dr. Maria Lopez",
        password: "Pediatric@123456",
        department: "Pediatrics",
        license: "DOC-BD-2024-004",
        bio: "Compassionate pediatrician caring for children's health",
        hours: "09:00 - 17:00",
        days: "Mon,Tue,Wed,Thu,Fri",
    },
    SeedDoctor {
        email: "pediatric2@healthcare.com",
        name: "Dr. Robert Davis",
        password: "Pediatric@123456",
        department: "Pediatrics",
        license: "DOC-BD-2024-004A",
        bio: "Experienced pediatrician with focus on child development",
        hours: "09:30 - 17:30",
        days: "Mon,Tue,Wed,Thu,Fri,Sat",
    },
];

/// What a seed run touched.
#[derive(Debug, Default)]
pub struct SeedReport {
    pub clinic_id: Uuid,
    pub departments: usize,
    pub accounts_created: usize,
}

fn find_or_create_clinic(conn: &mut PgConnection) -> QueryResult<Uuid> {
    diesel::insert_into(clinics::table)
        .values(&NewClinic {
            clinic_id: Uuid::new_v4(),
            name: CLINIC_NAME,
            address: Some("123 Main Street, Healthcare City"),
            contact: Some("+88012345678"),
        })
        .on_conflict(clinics::name)
        .do_nothing()
        .execute(conn)?;

    clinics::table
        .filter(clinics::name.eq(CLINIC_NAME))
        .select(clinics::clinic_id)
        .first(conn)
}

fn find_or_create_department(conn: &mut PgConnection, clinic_id: Uuid, seed: &SeedDepartment) -> QueryResult<Uuid> {
    diesel::insert_into(departments::table)
        .values(&NewDepartment {
            department_id: Uuid::new_v4(),
            clinic_id,
            name: seed.name,
            description: Some(seed.description),
        })
        .on_conflict((departments::clinic_id, departments::name))
        .do_nothing()
        .execute(conn)?;

    departments::table
        .filter(departments::clinic_id.eq(clinic_id))
        .filter(departments::name.eq(seed.name))
        .select(departments::department_id)
        .first(conn)
}

/// Returns the user's id and whether it was created now.
fn find_or_create_user(
    conn: &mut PgConnection,
    role: Role,
    email: &str,
    password: &str,
    full_name: &str,
    phone: &str,
    bcrypt_cost: u32,
) -> anyhow::Result<(Uuid, bool)> {
    let existing = users::table
        .filter(users::email.eq(email))
        .select(users::user_id)
        .first::<Uuid>(conn)
        .optional()?;
    if let Some(user_id) = existing {
        return Ok((user_id, false));
    }

    let hash = password::hash(password, bcrypt_cost).with_context(|| format!("hashing password for {email}"))?;
    let user = NewUser::with_role(
        role,
        email.to_string(),
        hash,
        Some(full_name.to_string()),
        Some(phone.to_string()),
    );
    diesel::insert_into(users::table).values(&user).execute(conn)?;
    Ok((user.user_id, true))
}

/// Seeds the bootstrap data inside one transaction.
pub fn run(conn: &mut PgConnection, bcrypt_cost: u32) -> anyhow::Result<SeedReport> {
    let rating = BigDecimal::from_str(SEED_RATING)?;

    conn.transaction::<_, anyhow::Error, _>(|conn| {
        let clinic_id = find_or_create_clinic(conn)?;
        tracing::info!(%clinic_id, clinic = CLINIC_NAME, "clinic ready");

        let mut report = SeedReport {
            clinic_id,
            ..Default::default()
        };

        let mut department_ids = Vec::with_capacity(DEPARTMENTS.len());
        for seed in DEPARTMENTS {
            let department_id = find_or_create_department(conn, clinic_id, seed)?;
            tracing::info!(%department_id, department = seed.name, "department ready");
            department_ids.push((seed.name, department_id));
        }
        report.departments = department_ids.len();

        let (admin_user, created) = find_or_create_user(
            conn,
            Role::Admin,
            ADMIN_EMAIL,
            ADMIN_PASSWORD,
            "System Administrator",
            "+88017XXXXXXXX",
            bcrypt_cost,
        )?;
        diesel::insert_into(admins::table)
            .values(&NewAdmin::for_user(admin_user))
            .on_conflict(admins::user_id)
            .do_nothing()
            .execute(conn)?;
        if created {
            report.accounts_created += 1;
            tracing::info!(email = ADMIN_EMAIL, "admin account created");
        }

        for seed in DOCTORS {
            let department_id = department_ids
                .iter()
                .find(|(name, _)| *name == seed.department)
                .map(|&(_, id)| id)
                .with_context(|| format!("unknown seed department {}", seed.department))?;

            let (user_id, created) = find_or_create_user(
                conn,
                Role::Doctor,
                seed.email,
                seed.password,
                seed.name,
                "+88018XXXXXXXX",
                bcrypt_cost,
            )?;
            diesel::insert_into(doctors::table)
                .values(&NewDoctor {
                    department_id: Some(department_id),
                    clinic_id: Some(clinic_id),
                    specialty: Some(seed.department.to_string()),
                    license_no: Some(seed.license.to_string()),
                    available_hours: Some(seed.hours.to_string()),
                    available_days: Some(seed.days.to_string()),
                    bio: Some(seed.bio.to_string()),
                    rating_cache: Some(rating.clone()),
                    ..NewDoctor::for_user(user_id)
                })
                .on_conflict(doctors::user_id)
                .do_nothing()
                .execute(conn)?;
            if created {
                report.accounts_created += 1;
                tracing::info!(email = seed.email, department = seed.department, "doctor account created");
            }
        }

        Ok(report)
    })
}
