use std::collections::BTreeMap;

use serde_json::{json, Value};
use thiserror::Error as ThisError;
use validator::{ValidationError, ValidationErrors};
use warp::http::StatusCode;

/// Error returned by every action and handler. Carries the HTTP status and
/// the JSON body that is sent back to the caller.
#[derive(Debug, Clone, ThisError)]
#[error("{code}: {body}")]
pub struct Error {
    pub code: StatusCode,
    pub body: Value,
}

impl warp::reject::Reject for Error {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    InvalidRequest,
    Unauthorized,
    InvalidSession,
    Forbidden,
    NotFound,
    Internal,
}

impl ApiError {
    pub fn code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::InvalidSession => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn default_info(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest => "Invalid request.",
            ApiError::Unauthorized => "Authentication credentials were not provided.",
            ApiError::InvalidSession => "Invalid token.",
            ApiError::Forbidden => "You do not have permission to perform this action.",
            ApiError::NotFound => "Not found.",
            ApiError::Internal => "Internal server error.",
        }
    }

    /// `{"detail": info}`
    pub fn new(self, info: &str) -> Error {
        Error {
            code: self.code(),
            body: json!({ "detail": info }),
        }
    }

    pub fn default(self) -> Error {
        self.new(self.default_info())
    }

    /// `{"<field>": [info]}`
    pub fn field(self, field: &str, info: &str) -> Error {
        let mut errors = FieldErrors::default();
        errors.add(field, info);
        errors.into_error(self)
    }
}

/// Field keyed validation errors, rendered as `{"field": ["message", ...]}`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FieldErrors {
    inner: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn add(&mut self, field: &str, info: impl Into<String>) {
        self.inner
            .entry(field.to_string())
            .or_default()
            .push(info.into());
    }

    pub fn required(&mut self, field: &str) {
        self.add(field, "This field is required.");
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn into_error(self, kind: ApiError) -> Error {
        Error {
            code: kind.code(),
            body: json!(self.inner),
        }
    }

    /// `Ok(())` when nothing was collected, otherwise a 400.
    pub fn into_result(self) -> Result<(), Error> {
        if self.is_empty() {
            return Ok(());
        }
        Err(self.into_error(ApiError::InvalidRequest))
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(value: ValidationErrors) -> Self {
        let mut errors = FieldErrors::default();
        for (field, failures) in value.field_errors() {
            for failure in failures {
                errors.add(&field, describe(failure));
            }
        }
        errors
    }
}

/// Message for a failed field rule; explicit rule messages win.
fn describe(failure: &ValidationError) -> String {
    if let Some(message) = &failure.message {
        return message.to_string();
    }

    match failure.code.as_ref() {
        "required" => String::from("This field is required."),
        "email" => String::from("Enter a valid email address."),
        "length" => match (failure.params.get("value"), failure.params.get("max")) {
            (Some(Value::String(value)), _) if value.is_empty() => {
                String::from("This field may not be blank.")
            }
            (_, Some(max)) => format!("Ensure this field has no more than {max} characters."),
            _ => String::from("Ensure this field is not blank."),
        },
        code => format!("Invalid value ({code})."),
    }
}

#[derive(Debug)]
pub enum QueryError {
    NotFound,
    Conflict(String),
    Constraint(String),
    Internal(String),
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Database(e) if e.is_unique_violation() => {
                Self::Conflict(format!("{e}"))
            }
            sqlx::Error::Database(e)
                if e.is_foreign_key_violation() || e.is_check_violation() =>
            {
                Self::Constraint(format!("{e}"))
            }
            sqlx::Error::Database(e) => Self::Internal(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::Internal(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::Internal(String::from("Pool closed")),
            e => Self::Internal(format!("{e}")),
        }
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        match value {
            QueryError::NotFound => ApiError::NotFound.default(),
            QueryError::Conflict(info) => {
                log::warn!("Unique constraint violated: {info}");
                ApiError::InvalidRequest.field("errors", "Object already exists.")
            }
            QueryError::Constraint(info) => {
                log::warn!("Constraint violated: {info}");
                ApiError::InvalidRequest.field("errors", "Referenced object does not exist.")
            }
            QueryError::Internal(info) => {
                log::error!("Query failed: {info}");
                ApiError::Internal.default()
            }
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(value: sqlx::Error) -> Self {
        QueryError::from(value).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_collect_messages_per_field() {
        let mut errors = FieldErrors::default();
        errors.add("ingredients", "first");
        errors.add("ingredients", "second");
        errors.required("name");

        let error = errors.into_result().unwrap_err();
        assert_eq!(error.code, StatusCode::BAD_REQUEST);
        assert_eq!(
            error.body,
            json!({
                "ingredients": ["first", "second"],
                "name": ["This field is required."],
            })
        );
    }

    #[test]
    fn empty_field_errors_pass() {
        assert!(FieldErrors::default().into_result().is_ok());
    }

    #[test]
    fn detail_errors_carry_status() {
        let error = ApiError::Forbidden.default();
        assert_eq!(error.code, StatusCode::FORBIDDEN);
        assert_eq!(
            error.body["detail"],
            "You do not have permission to perform this action."
        );
    }

    #[test]
    fn validation_failures_become_field_errors() {
        let mut failures = ValidationErrors::new();
        failures.add("name", ValidationError::new("required"));
        failures.add(
            "slug",
            ValidationError::new("slug").with_message("Bad slug.".into()),
        );

        let errors: FieldErrors = failures.into();
        assert_eq!(
            errors.into_result().unwrap_err().body,
            json!({
                "name": ["This field is required."],
                "slug": ["Bad slug."],
            })
        );
    }

    #[test]
    fn missing_row_maps_to_not_found() {
        let error: Error = sqlx::Error::RowNotFound.into();
        assert_eq!(error.code, StatusCode::NOT_FOUND);
    }
}
