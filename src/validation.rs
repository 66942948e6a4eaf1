//! Request field rules. Each check appends to a list of [`FieldError`]s so a
//! response reports every failing field at once.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{ApiError, FieldError};

#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(&mut self, field: &str, message: &str) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Validates an email and returns it trimmed and lowercased.
    pub fn email(&mut self, field: &str, value: &str) -> String {
        let normalized = value.trim().to_lowercase();
        if !is_email(&normalized) {
            self.fail(field, "Invalid email format");
        }
        normalized
    }

    pub fn password(&mut self, field: &str, value: &str) {
        if value.chars().count() < 8 {
            self.fail(field, "Password must be at least 8 characters");
        } else if !(value.chars().any(|c| c.is_ascii_lowercase())
            && value.chars().any(|c| c.is_ascii_uppercase())
            && value.chars().any(|c| c.is_ascii_digit()))
        {
            self.fail(field, "Password must contain uppercase, lowercase, and number");
        }
    }

    pub fn required(&mut self, field: &str, value: &str, message: &str) {
        if value.trim().is_empty() {
            self.fail(field, message);
        }
    }

    /// Trims and checks a required string's length in characters.
    pub fn length(&mut self, field: &str, value: &str, min: usize, max: usize, message: &str) -> String {
        let trimmed = value.trim();
        let len = trimmed.chars().count();
        if len < min || len > max {
            self.fail(field, message);
        }
        trimmed.to_string()
    }

    pub fn max_length(&mut self, field: &str, value: Option<&str>, max: usize, message: &str) {
        if value.is_some_and(|v| v.trim().chars().count() > max) {
            self.fail(field, message);
        }
    }

    pub fn one_of(&mut self, field: &str, value: Option<&str>, allowed: &[&str], message: &str) {
        if value.is_some_and(|v| !allowed.contains(&v)) {
            self.fail(field, message);
        }
    }

    pub fn not_in_future(&mut self, field: &str, value: Option<NaiveDate>, today: NaiveDate, message: &str) {
        if value.is_some_and(|d| d > today) {
            self.fail(field, message);
        }
    }

    pub fn not_in_past(&mut self, field: &str, value: DateTime<Utc>, now: DateTime<Utc>, message: &str) {
        if value < now {
            self.fail(field, message);
        }
    }

    pub fn ends_after(&mut self, field: &str, start: DateTime<Utc>, end: Option<DateTime<Utc>>, message: &str) {
        if end.is_some_and(|end| end <= start) {
            self.fail(field, message);
        }
    }

    pub fn check(&mut self, field: &str, ok: bool, message: &str) {
        if !ok {
            self.fail(field, message);
        }
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn fields(result: Result<(), ApiError>) -> Vec<String> {
        match result {
            Err(ApiError::Validation(errors)) => errors.into_iter().map(|e| e.field).collect(),
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(()) => vec![],
        }
    }

    #[test]
    fn emails_are_normalized() {
        let mut v = Validator::new();
        assert_eq!(v.email("email", "  Ann.Lee@Example.COM "), "ann.lee@example.com");
        assert!(v.finish().is_ok());
    }

    #[test]
    fn malformed_emails_fail() {
        for bad in ["", "ann", "ann@", "@example.com", "ann@example", "ann@@example.com", "a nn@example.com", "ann@example..com"] {
            let mut v = Validator::new();
            v.email("email", bad);
            assert_eq!(fields(v.finish()), vec!["email"], "{bad:?} should be rejected");
        }
    }

    #[test]
    fn password_policy() {
        for (password, ok) in [
            ("Secret123", true),
            ("short1A", false),
            ("alllowercase1", false),
            ("ALLUPPERCASE1", false),
            ("NoDigitsHere", false),
        ] {
            let mut v = Validator::new();
            v.password("password", password);
            assert_eq!(v.finish().is_ok(), ok, "{password}");
        }
    }

    #[test]
    fn every_failure_is_reported() {
        let mut v = Validator::new();
        v.email("email", "nope");
        v.password("password", "weak");
        v.length("name", " A ", 2, 100, "Name must be 2-100 characters");
        assert_eq!(fields(v.finish()), vec!["email", "password", "name"]);
    }

    #[test]
    fn dates_are_bounded() {
        let now = Utc::now();
        let today = now.date_naive();
        let mut v = Validator::new();
        v.not_in_future("dob", Some(today + Duration::days(1)), today, "Date of birth cannot be in future");
        v.not_in_past("start_time", now - Duration::hours(1), now, "Appointment date cannot be in past");
        v.ends_after("end_time", now, Some(now - Duration::minutes(5)), "End time must be after start time");
        assert_eq!(fields(v.finish()), vec!["dob", "start_time", "end_time"]);

        let mut v = Validator::new();
        v.not_in_future("dob", Some(today), today, "Date of birth cannot be in future");
        v.ends_after("end_time", now, None, "End time must be after start time");
        assert!(v.finish().is_ok());
    }

    #[test]
    fn optional_fields_only_fail_when_present() {
        let mut v = Validator::new();
        v.one_of("gender", None, &["male", "female", "other"], "Invalid gender");
        v.max_length("address", None, 500, "Address must be less than 500 characters");
        assert!(v.finish().is_ok());

        let mut v = Validator::new();
        v.one_of("gender", Some("unknown"), &["male", "female", "other"], "Invalid gender");
        assert_eq!(fields(v.finish()), vec!["gender"]);
    }
}
