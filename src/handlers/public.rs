//! Unauthenticated read-only endpoints for the landing page.

use std::collections::HashMap;

use actix_web::{HttpResponse, web};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use super::ok;
use super::views::{self, DoctorView};
use crate::db::{self, DbPool};
use crate::error::ApiError;
use crate::models::{Department, Doctor};
use crate::schema::{departments, doctors};

#[derive(Debug, Serialize)]
pub struct DepartmentWithDoctors {
    #[serde(flatten)]
    pub department: Department,
    pub doctors: Vec<DoctorView>,
}

// Handler to list departments by name, each with its doctors
pub async fn departments_with_doctors(pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
    let rows = db::run(&pool, |conn| {
        let departments = departments::table
            .select(Department::as_select())
            .order(departments::name.asc())
            .load(conn)?;
        let ids: Vec<Uuid> = departments.iter().map(|d| d.department_id).collect();

        let staff = doctors::table
            .filter(doctors::department_id.eq_any(ids))
            .select(Doctor::as_select())
            .order(doctors::created_at.asc())
            .load(conn)?;

        let mut by_department: HashMap<Uuid, Vec<DoctorView>> = HashMap::new();
        for view in views::doctor_views(conn, staff)? {
            if let Some(department_id) = view.doctor.department_id {
                by_department.entry(department_id).or_default().push(view);
            }
        }

        Ok(departments
            .into_iter()
            .map(|department| DepartmentWithDoctors {
                doctors: by_department.remove(&department.department_id).unwrap_or_default(),
                department,
            })
            .collect::<Vec<_>>())
    })
    .await?;

    Ok(ok(rows))
}

// Handler to get a doctor's public profile
pub async fn public_doctor(pool: web::Data<DbPool>, doctor_id: web::Path<Uuid>) -> Result<HttpResponse, ApiError> {
    let doctor_id = doctor_id.into_inner();
    let view = db::run(&pool, move |conn| {
        let doctor = super::doctors::load_doctor(conn, doctor_id)?;
        Ok(views::doctor_view(conn, doctor)?)
    })
    .await?;

    Ok(ok(view))
}
