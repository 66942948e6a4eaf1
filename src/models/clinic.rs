use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::{clinics, departments};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = clinics)]
#[diesel(primary_key(clinic_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Clinic {
    pub clinic_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub contact: Option<String>,
    pub timezone: Option<String>,
    pub config_flags: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = clinics)]
pub struct NewClinic<'a> {
    pub clinic_id: Uuid,
    pub name: &'a str,
    pub address: Option<&'a str>,
    pub contact: Option<&'a str>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = departments)]
#[diesel(primary_key(department_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Department {
    pub department_id: Uuid,
    pub clinic_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub floor_location: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = departments)]
pub struct NewDepartment<'a> {
    pub department_id: Uuid,
    pub clinic_id: Uuid,
    pub name: &'a str,
    pub description: Option<&'a str>,
}
