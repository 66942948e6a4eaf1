use actix_governor::governor::middleware::NoOpMiddleware;
use actix_governor::{Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor};
use actix_web::middleware::DefaultHeaders;
use actix_web::{HttpResponse, Scope, error, web};
use anyhow::anyhow;

use crate::error::ApiError;
use crate::handlers::{
    analytics, appointments, auth, doctors, lab_results, medical_history, patients, prescriptions, public,
};

/// Per-client-IP request quota shared by every worker.
pub type RateLimit = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>;

/// A token bucket holding `per_minute` requests that refills at the same rate.
pub fn rate_limit(per_minute: u32) -> anyhow::Result<RateLimit> {
    if per_minute == 0 {
        return Err(anyhow!("RATE_LIMIT_PER_MINUTE must be positive"));
    }
    GovernorConfigBuilder::default()
        .requests_per_minute(u64::from(per_minute))
        .burst_size(per_minute)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit of {per_minute} requests per minute"))
}

/// Response headers that keep browsers from sniffing, framing or leaking
/// referrers for API and upload responses.
pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("Referrer-Policy", "no-referrer"))
        .add(("Cross-Origin-Resource-Policy", "same-site"))
        .add(("X-DNS-Prefetch-Control", "off"))
}

/// Registers every `/api` route plus the body and path extractor settings,
/// without a request quota.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(path_config())
        .service(api_scope())
        .route("/", web::get().to(liveness));
}

/// Same as [`configure`] with `/api` held to `limit`. The liveness route
/// stays unlimited.
pub fn configure_limited(limit: RateLimit) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(json_config())
            .app_data(path_config())
            .service(api_scope().wrap(Governor::new(&limit)))
            .route("/", web::get().to(liveness));
    }
}

/// Literal segments such as `/me` are registered before `/{id}`.
fn api_scope() -> Scope {
    web::scope("/api")
        .service(
            web::scope("/auth")
                .route("/register", web::post().to(auth::register))
                .route("/login", web::post().to(auth::login))
                .route("/forgot-password", web::post().to(auth::forgot_password))
                .route("/reset-password", web::post().to(auth::reset_password)),
        )
        .service(
            web::scope("/patients")
                .route("", web::get().to(patients::list_patients))
                .route("/ensure", web::post().to(patients::ensure_patient))
                .route("/me", web::get().to(patients::current_patient))
                .route("/{id}", web::get().to(patients::get_patient))
                .route("/{id}", web::patch().to(patients::update_patient)),
        )
        .service(
            web::scope("/doctors")
                .route("", web::get().to(doctors::list_doctors))
                .route("/me", web::get().to(doctors::current_doctor))
                .route("/{id}", web::get().to(doctors::get_doctor))
                .route("/{id}", web::patch().to(doctors::update_doctor)),
        )
        .service(
            web::scope("/appointments")
                .route("", web::get().to(appointments::list_appointments))
                .route("", web::post().to(appointments::create_appointment))
                .route("/{id}", web::put().to(appointments::update_appointment))
                .route("/{id}", web::delete().to(appointments::delete_appointment)),
        )
        .service(
            web::scope("/prescriptions")
                .route("", web::get().to(prescriptions::list_prescriptions))
                .route("", web::post().to(prescriptions::create_prescription))
                .route("/{id}", web::get().to(prescriptions::get_prescription)),
        )
        .service(
            web::scope("/lab-results")
                .route("", web::get().to(lab_results::list_lab_results))
                .route("", web::post().to(lab_results::create_lab_result))
                .route("/{id}", web::get().to(lab_results::get_lab_result)),
        )
        .service(
            web::scope("/medical-history")
                .route("", web::get().to(medical_history::list_entries))
                .route("", web::post().to(medical_history::create_entry))
                .route("/{id}", web::get().to(medical_history::get_entry)),
        )
        .service(
            web::scope("/analytics")
                .route("/dashboard", web::get().to(analytics::dashboard))
                .route("/appointments/stats", web::get().to(analytics::appointment_stats_report))
                .route("/doctors/performance", web::get().to(analytics::doctor_performance))
                .route("/revenue", web::get().to(analytics::revenue))
                .route("/users/growth", web::get().to(analytics::user_growth))
                .route("/prescriptions/stats", web::get().to(analytics::prescription_stats))
                .route("/lab-results/stats", web::get().to(analytics::lab_result_stats))
                .route("/system/health", web::get().to(analytics::system_health)),
        )
        .service(
            web::scope("/public")
                .route("/departments", web::get().to(public::departments_with_doctors))
                .route("/doctors/{id}", web::get().to(public::public_doctor)),
        )
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = match &err {
            error::JsonPayloadError::ContentType => "Content-Type must be application/json".to_string(),
            other => format!("Invalid request body: {other}"),
        };
        ApiError::BadRequest(message).into()
    })
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|_err, _req| ApiError::BadRequest("Invalid ID format".to_string()).into())
}

async fn liveness() -> HttpResponse {
    HttpResponse::Ok().body("Backend is running!")
}
