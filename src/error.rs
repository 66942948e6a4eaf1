use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError, error::BlockingError};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use serde::Serialize;
use serde_json::json;

/// A single failed validation rule.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Every failure a handler can surface. Each variant maps to exactly one
/// HTTP status and is rendered as `{ "success": false, "message": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] DieselError),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("blocking task failed")]
    Blocking(#[from] BlockingError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{what} not found"))
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::Database(DieselError::NotFound) => "Resource not found".to_string(),
            ApiError::Database(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                "Resource already exists".to_string()
            }
            ApiError::Database(DieselError::DatabaseError(
                DatabaseErrorKind::ForeignKeyViolation,
                _,
            )) => "Referenced resource does not exist".to_string(),
            ApiError::Database(_) | ApiError::Pool(_) | ApiError::Blocking(_) | ApiError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            JwtErrorKind::ExpiredSignature => ApiError::Unauthorized("Token has expired".to_string()),
            _ => ApiError::Unauthorized("Invalid or expired token".to_string()),
        }
    }
}

impl From<bcrypt::BcryptError> for ApiError {
    fn from(err: bcrypt::BcryptError) -> Self {
        ApiError::Internal(anyhow::anyhow!("password hashing failed: {err}"))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Database(DieselError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Database(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                StatusCode::CONFLICT
            }
            ApiError::Database(DieselError::DatabaseError(
                DatabaseErrorKind::ForeignKeyViolation,
                _,
            )) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) | ApiError::Pool(_) | ApiError::Blocking(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let mut body = json!({
            "success": false,
            "message": self.public_message(),
        });
        if let ApiError::Validation(errors) = self {
            body["errors"] = json!(errors);
        }
        if cfg!(debug_assertions) && status == StatusCode::INTERNAL_SERVER_ERROR {
            body["error"] = json!(self.to_string());
        }

        HttpResponse::build(status).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Violation;

    impl diesel::result::DatabaseErrorInformation for Violation {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }
        fn details(&self) -> Option<&str> {
            None
        }
        fn hint(&self) -> Option<&str> {
            None
        }
        fn table_name(&self) -> Option<&str> {
            Some("users")
        }
        fn column_name(&self) -> Option<&str> {
            Some("email")
        }
        fn constraint_name(&self) -> Option<&str> {
            Some("users_email_key")
        }
        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    #[test]
    fn client_errors_keep_their_status() {
        assert_eq!(ApiError::Validation(vec![]).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Unauthorized("Unauthorized".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::Forbidden("no".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("Doctor").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("taken".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Unavailable("down".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn diesel_errors_map_to_http_semantics() {
        assert_eq!(ApiError::from(DieselError::NotFound).status_code(), StatusCode::NOT_FOUND);

        let unique = DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, Box::new(Violation));
        let err = ApiError::from(unique);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.public_message(), "Resource already exists");

        let other = ApiError::from(DieselError::RollbackTransaction);
        assert_eq!(other.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(other.public_message(), "Internal server error");
    }

    #[test]
    fn expired_jwt_reports_expiry() {
        let err = ApiError::from(jsonwebtoken::errors::Error::from(JwtErrorKind::ExpiredSignature));
        assert_eq!(err.to_string(), "Token has expired");

        let err = ApiError::from(jsonwebtoken::errors::Error::from(JwtErrorKind::InvalidSignature));
        assert_eq!(err.to_string(), "Invalid or expired token");
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn not_found_names_the_resource() {
        assert_eq!(ApiError::not_found("Lab result").to_string(), "Lab result not found");
    }
}
