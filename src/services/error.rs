//! Error type shared by the service layer.

use thiserror::Error;

use crate::providers::email::ProviderError;
use crate::storage::DatabaseError;

/// Errors that can occur in service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The requested entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Input failed a field constraint.
    #[error("{0}")]
    Validation(String),

    /// The request conflicts with existing state or is not allowed.
    #[error("{0}")]
    Rejected(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] DatabaseError),

    /// Mail provider error.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Fails when a string field is longer than `max` characters.
pub fn ensure_max_len(field: &str, value: &str, max: usize) -> ServiceResult<()> {
    if value.chars().count() > max {
        return Err(ServiceError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

/// Same as [`ensure_max_len`] for optional fields.
pub fn ensure_opt_max_len(field: &str, value: Option<&str>, max: usize) -> ServiceResult<()> {
    match value {
        Some(value) => ensure_max_len(field, value, max),
        None => Ok(()),
    }
}

/// Fails when `value` is outside `min..=max`.
pub fn ensure_range(field: &str, value: i64, min: i64, max: i64) -> ServiceResult<()> {
    if !(min..=max).contains(&value) {
        return Err(ServiceError::Validation(format!(
            "{field} must be between {min} and {max}"
        )));
    }
    Ok(())
}

/// Fails when a required string field is blank.
pub fn ensure_not_blank(field: &str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_len_counts_chars() {
        assert!(ensure_max_len("name", "ééé", 3).is_ok());
        assert!(ensure_max_len("name", "éééé", 3).is_err());
        assert!(ensure_opt_max_len("name", None, 0).is_ok());
    }

    #[test]
    fn range_is_inclusive() {
        assert!(ensure_range("interval", 1, 1, 1440).is_ok());
        assert!(ensure_range("interval", 1440, 1, 1440).is_ok());
        let err = ensure_range("interval", 0, 1, 1440).unwrap_err();
        assert_eq!(err.to_string(), "interval must be between 1 and 1440");
    }

    #[test]
    fn blank_is_rejected() {
        assert!(ensure_not_blank("label_id", "  ").is_err());
        assert!(ensure_not_blank("label_id", "Label_1").is_ok());
    }
}
