//! Interaction checking errors.

use serde_json::{json, Value};
use thiserror::Error;

use crate::audit::AuditError;
use crate::db::DbError;
use crate::models::{Region, Regulator, SourceFailure};

/// Errors raised by the interaction services.
#[derive(Error, Debug)]
pub enum InteractionError {
    #[error("Validation failed ({code}): {message}")]
    Validation {
        code: &'static str,
        message: String,
        details: Value,
    },

    #[error("{regulator} ({region}) failed during {operation}: {message}")]
    RegionalService {
        region: Region,
        regulator: Regulator,
        operation: &'static str,
        message: String,
    },

    #[error("Every source failed during {operation}")]
    SourceUnavailable {
        operation: &'static str,
        failures: Vec<SourceFailure>,
    },

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type InteractionResult<T> = Result<T, InteractionError>;

impl InteractionError {
    pub fn validation(code: &'static str, message: impl Into<String>, details: Value) -> Self {
        InteractionError::Validation {
            code,
            message: message.into(),
            details,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            InteractionError::Validation { code, .. } => *code,
            InteractionError::RegionalService { .. } => "REGIONAL_SERVICE_ERROR",
            InteractionError::SourceUnavailable { .. } => "SOURCE_UNAVAILABLE",
            InteractionError::Database(_) => "DATABASE_ERROR",
            InteractionError::Serialization(_) => "SERIALIZATION_ERROR",
            InteractionError::Audit(_) => "AUDIT_ERROR",
            InteractionError::Config(_) => "CONFIG_ERROR",
            InteractionError::Lock(_) => "INTERNAL_ERROR",
        }
    }

    /// Structured context for callers and logs.
    pub fn details(&self) -> Value {
        match self {
            InteractionError::Validation { details, .. } => details.clone(),
            InteractionError::RegionalService {
                region,
                regulator,
                operation,
                message,
            } => json!({
                "region": region,
                "regulator": regulator,
                "operation": operation,
                "message": message,
            }),
            InteractionError::SourceUnavailable { operation, failures } => json!({
                "operation": operation,
                "failures": failures,
            }),
            other => json!({ "message": other.to_string() }),
        }
    }

    /// HTTP status a route handler should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            InteractionError::Validation { .. } => 400,
            InteractionError::RegionalService { .. } | InteractionError::SourceUnavailable { .. } => 502,
            _ => 500,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, InteractionError::Validation { .. })
    }
}

impl<T> From<std::sync::PoisonError<T>> for InteractionError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        InteractionError::Lock(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let validation = InteractionError::validation("INVALID_REGION", "bad", json!({"region": "X"}));
        assert_eq!(validation.status_code(), 400);
        assert_eq!(validation.code(), "INVALID_REGION");
        assert_eq!(validation.details()["region"], "X");

        let regional = InteractionError::RegionalService {
            region: Region::Wales,
            regulator: Regulator::Ciw,
            operation: "check_medication",
            message: "timeout".into(),
        };
        assert_eq!(regional.status_code(), 502);
        assert_eq!(regional.details()["regulator"], "CIW");

        let config = InteractionError::Config("missing".into());
        assert_eq!(config.status_code(), 500);
        assert_eq!(config.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_source_unavailable_details() {
        let err = InteractionError::SourceUnavailable {
            operation: "check_drug_pair",
            failures: vec![SourceFailure {
                source: "BNF".into(),
                operation: "check_drug_interaction".into(),
                message: "down".into(),
            }],
        };
        assert_eq!(err.details()["failures"][0]["source"], "BNF");
        assert!(!err.is_validation());
    }
}
