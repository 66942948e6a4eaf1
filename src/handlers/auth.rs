use actix_web::{HttpRequest, HttpResponse, web};
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;

use super::{message, non_blank};
use crate::auth::token::RESET_TOKEN_TTL_SECS;
use crate::auth::{CurrentUser, TokenType, client_ip, password};
use crate::db::{self, DbPool};
use crate::error::ApiError;
use crate::models::user::bcrypt_salt;
use crate::models::{NewPatient, NewUser, User};
use crate::schema::{patients, users};
use crate::validation::Validator;
use crate::{AppState, access, audit, mailer};

const FORGOT_PASSWORD_REPLY: &str = "If email exists, reset link has been sent";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    pub mobile: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub new_password: String,
}

async fn hash_password(password: String, cost: u32) -> Result<String, ApiError> {
    web::block(move || password::hash(&password, cost)).await?
}

/// Returns the normalized email and trimmed name.
fn validate_registration(body: &RegisterRequest) -> Result<(String, String), ApiError> {
    let mut v = Validator::new();
    let email = v.email("email", &body.email);
    v.max_length("email", Some(&email), 100, "Email must be at most 100 characters");
    v.password("password", &body.password);
    let name = v.length("name", &body.name, 2, 100, "Name must be between 2 and 100 characters");
    v.max_length("mobile", body.mobile.as_deref(), 20, "Mobile must be at most 20 characters");
    v.finish()?;
    Ok((email, name))
}

// Handler to register a patient account. Any `role` in the body is ignored.
pub async fn register(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let (email, name) = validate_registration(&body)?;

    let password_hash = hash_password(body.password, state.config.bcrypt_cost).await?;
    let phone = non_blank(body.mobile);
    let ip = client_ip(&req);

    let user = db::run(&pool, move |conn| {
        let user = conn.transaction::<_, ApiError, _>(|conn| {
            let taken: bool = diesel::select(diesel::dsl::exists(users::table.filter(users::email.eq(&email))))
                .get_result(conn)?;
            if taken {
                return Err(ApiError::Conflict("Email already registered".to_string()));
            }

            let user = diesel::insert_into(users::table)
                .values(&NewUser::patient(email, password_hash, name, phone))
                .returning(User::as_returning())
                .get_result(conn)?;
            diesel::insert_into(patients::table)
                .values(&NewPatient::for_user(user.user_id))
                .execute(conn)?;
            Ok(user)
        })?;

        let actor = CurrentUser {
            user_id: user.user_id,
            role: user.role,
            ip,
        };
        audit::record(conn, Some(&actor), "register", "user", Some(user.user_id));
        Ok(user)
    })
    .await?;

    tracing::info!(user_id = %user.user_id, "patient registered");

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Patient account created successfully",
        "data": {
            "user_id": user.user_id,
            "email": user.email,
            "name": user.full_name,
            "role": user.role,
        },
    })))
}

// Handler to log in with email and password
pub async fn login(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();

    let mut v = Validator::new();
    let email = v.email("email", &body.email);
    v.required("password", &body.password, "Password is required");
    v.finish()?;

    let user = db::run(&pool, move |conn| {
        Ok(users::table
            .filter(users::email.eq(&email))
            .select(User::as_select())
            .first(conn)
            .optional()?)
    })
    .await?
    .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    let password = body.password;
    let hash = user.password_hash.clone();
    if !web::block(move || password::verify(&password, &hash)).await? {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }
    if !user.is_active {
        return Err(ApiError::Forbidden("Account is deactivated".to_string()));
    }

    let token = state.tokens.issue_access(user.user_id, user.role)?;

    let (user_id, role) = (user.user_id, user.role);
    db::run(&pool, move |conn| {
        if let Err(e) = access::ensure_profile(conn, user_id, role) {
            tracing::warn!(%user_id, error = %e, "profile ensure on login failed");
        }
        diesel::update(users::table.find(user_id))
            .set(users::last_login.eq(Some(Utc::now())))
            .execute(conn)?;
        Ok(())
    })
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "token": token,
        "user": {
            "user_id": user.user_id,
            "email": user.email,
            "full_name": user.full_name,
            "role": user.role,
        },
    })))
}

// Handler to start a password reset. The reply never reveals whether the
// email is registered.
pub async fn forgot_password(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    body: web::Json<ForgotPasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    let mut v = Validator::new();
    let email = v.email("email", &body.email);
    v.finish()?;

    let lookup = email.clone();
    let user = db::run(&pool, move |conn| {
        Ok(users::table
            .filter(users::email.eq(&lookup))
            .select(User::as_select())
            .first(conn)
            .optional()?)
    })
    .await?;

    let Some(user) = user else {
        return Ok(message(FORGOT_PASSWORD_REPLY));
    };

    let token = state.tokens.issue_reset(user.user_id)?;
    let expires: DateTime<Utc> = Utc::now() + Duration::seconds(RESET_TOKEN_TTL_SECS);

    let stored = token.clone();
    db::run(&pool, move |conn| {
        diesel::update(users::table.find(user.user_id))
            .set((users::reset_token.eq(Some(stored)), users::reset_token_expires.eq(Some(expires))))
            .execute(conn)?;
        Ok(())
    })
    .await?;

    tracing::info!(user_id = %user.user_id, "password reset token issued");

    if let Some(smtp) = state.config.smtp.clone() {
        let mail = mailer::password_reset_mail(email, &state.config.frontend_url, &token);
        match web::block(move || mailer::send(&smtp, mail)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "failed to send password reset email"),
            Err(e) => tracing::warn!(error = %e, "password reset email task failed"),
        }
    }

    let mut reply = json!({ "success": true, "message": FORGOT_PASSWORD_REPLY });
    if state.config.is_development() {
        reply["resetToken"] = json!(token);
    }
    Ok(HttpResponse::Ok().json(reply))
}

// Handler to set a new password with a stored reset token
pub async fn reset_password(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    body: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();

    let mut v = Validator::new();
    v.required("token", &body.token, "Reset token is required");
    v.password("newPassword", &body.new_password);
    v.finish()?;

    let claims = state
        .tokens
        .verify(&body.token, TokenType::PasswordReset)
        .map_err(|e| match e {
            ApiError::Unauthorized(msg) if msg == "Invalid token type" => ApiError::Unauthorized(msg),
            _ => ApiError::Unauthorized("Invalid or expired reset token".to_string()),
        })?;

    let user_id = claims.id;
    let user = db::run(&pool, move |conn| {
        Ok(users::table
            .find(user_id)
            .select(User::as_select())
            .first(conn)
            .optional()?)
    })
    .await?
    .ok_or_else(|| ApiError::Unauthorized("Invalid reset token".to_string()))?;

    password::check_stored_reset_token(
        user.reset_token.as_deref(),
        user.reset_token_expires,
        &body.token,
        Utc::now(),
    )?;

    let password_hash = hash_password(body.new_password, state.config.bcrypt_cost).await?;
    let token = body.token;
    let ip = client_ip(&req);

    db::run(&pool, move |conn| {
        let salt = bcrypt_salt(&password_hash);
        // Only the stored token can be consumed, and only once.
        let updated = diesel::update(
            users::table
                .find(user.user_id)
                .filter(users::reset_token.eq(&token)),
        )
        .set((
            users::password_hash.eq(&password_hash),
            users::salt.eq(&salt),
            users::reset_token.eq(None::<String>),
            users::reset_token_expires.eq(None::<DateTime<Utc>>),
        ))
        .execute(conn)?;
        if updated == 0 {
            return Err(ApiError::Unauthorized("Invalid reset token".to_string()));
        }

        let actor = CurrentUser {
            user_id: user.user_id,
            role: user.role,
            ip,
        };
        audit::record(conn, Some(&actor), "password_reset", "user", Some(user.user_id));
        Ok(())
    })
    .await?;

    Ok(message("Password reset successful"))
}
