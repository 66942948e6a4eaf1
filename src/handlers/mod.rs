pub mod analytics;
pub mod appointments;
pub mod auth;
pub mod doctors;
pub mod lab_results;
pub mod medical_history;
pub mod patients;
pub mod prescriptions;
pub mod public;
pub mod views;

use actix_web::HttpResponse;
use serde::Serialize;
use serde_json::json;

/// `200 { "success": true, "data": ... }`
pub fn ok<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "data": data }))
}

/// `201 { "success": true, "data": ... }`
pub fn created<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Created().json(json!({ "success": true, "data": data }))
}

pub fn message(text: &str) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "message": text }))
}

/// Trims an optional string, treating blank input as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
