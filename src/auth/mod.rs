//! Bearer-token authentication and role gating.
//!
//! `CurrentUser` is an actix extractor: any handler that takes one is
//! authenticated. Role restrictions are checked inside the handler with
//! [`CurrentUser::require_role`].

pub mod password;
pub mod token;

use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{FromRequest, HttpRequest, web};
use diesel::prelude::*;
use futures::future::LocalBoxFuture;
use uuid::Uuid;

use crate::AppState;
use crate::db::{self, DbPool};
use crate::error::ApiError;
use crate::models::{Role, User};
use crate::schema::users;

pub use token::{Claims, TokenSigner, TokenType};

/// The authenticated caller. The role always comes from the user row, not
/// from the token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub role: Role,
    pub ip: Option<String>,
}

impl CurrentUser {
    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }

    pub fn require_role(&self, allowed: &[Role]) -> Result<(), ApiError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Access denied".to_string()))
        }
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(value: Option<&str>) -> Result<&str, ApiError> {
    value
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Unauthorized".to_string()))
}

pub fn client_ip(req: &HttpRequest) -> Option<String> {
    req.peer_addr().map(|addr| addr.ip().to_string())
}

impl FromRequest for CurrentUser {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let header = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let pool = req.app_data::<web::Data<DbPool>>().cloned();
        let ip = client_ip(req);

        Box::pin(async move {
            let token = bearer_token(header.as_deref())?;
            let (Some(state), Some(pool)) = (state, pool) else {
                return Err(ApiError::Internal(anyhow::anyhow!("application state is not configured")));
            };

            let claims = state
                .tokens
                .verify(token, TokenType::Access)
                .map_err(|_| ApiError::Unauthorized("Invalid token".to_string()))?;

            let user = db::run(&pool, move |conn| {
                Ok(users::table
                    .find(claims.id)
                    .select(User::as_select())
                    .first(conn)
                    .optional()?)
            })
            .await?
            .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;

            CurrentUser::from_account(&user, ip)
        })
    }
}

impl CurrentUser {
    /// Tokens issued before an account was deactivated stop working too.
    fn from_account(user: &User, ip: Option<String>) -> Result<Self, ApiError> {
        if !user.is_active {
            return Err(ApiError::Forbidden("Account is deactivated".to_string()));
        }
        Ok(CurrentUser {
            user_id: user.user_id,
            role: user.role,
            ip,
        })
    }
}
