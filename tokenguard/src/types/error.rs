//! Error types for TokenGuard
//!
//! A single crate-wide error enum covering the failure taxonomy of the
//! engine. Business denials during validation are not errors: they are
//! reported through `ValidationOutcome::Denied` so a caller can branch on
//! the reason without unwinding. Everything here is either an integration
//! bug surfacing (`InvalidRequest`), a missing administrative role
//! (`Unauthorized`), or a lookup of an entity that must exist
//! (`NotFound`). All failures leave engine state unchanged.

use thiserror::Error;

/// Unified error type for all TokenGuard operations
#[derive(Debug, Error)]
pub enum GuardError {
    /// Integration or programmer error: duplicate attach, detach of an
    /// absent module, double registration, zero approval threshold,
    /// re-approval by the same approver, already-executed request.
    #[error("invalid request: {context}")]
    InvalidRequest {
        /// Description of the rejected request
        context: String,
    },

    /// Caller lacks the administrative role required by the operation
    #[error("unauthorized: {context}")]
    Unauthorized {
        /// Description of what was unauthorized
        context: String,
    },

    /// Lookup of an entity that must exist (policy to update, approval
    /// request by id)
    #[error("{entity} not found{}", .details.as_deref().map(|d| format!(": {}", d)).unwrap_or_default())]
    NotFound {
        /// The type of entity that was not found
        entity: String,
        /// Additional details about the lookup
        details: Option<String>,
    },
}

impl GuardError {
    /// Creates a new invalid-request error
    pub fn invalid_request(context: impl Into<String>) -> Self {
        GuardError::InvalidRequest {
            context: context.into(),
        }
    }

    /// Creates a new authorization error
    pub fn unauthorized(context: impl Into<String>) -> Self {
        GuardError::Unauthorized {
            context: context.into(),
        }
    }

    /// Creates a new not-found error
    pub fn not_found(entity: impl Into<String>, details: Option<impl Into<String>>) -> Self {
        GuardError::NotFound {
            entity: entity.into(),
            details: details.map(|d| d.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = GuardError::invalid_request("duplicate attach of module m1");
        assert_eq!(
            err.to_string(),
            "invalid request: duplicate attach of module m1"
        );

        let err = GuardError::unauthorized("caller lacks policy-admin role");
        assert_eq!(err.to_string(), "unauthorized: caller lacks policy-admin role");
    }

    #[test]
    fn test_not_found_with_and_without_details() {
        let err = GuardError::not_found("Policy", Some("subject=asset-1 class=transfer"));
        assert_eq!(
            err.to_string(),
            "Policy not found: subject=asset-1 class=transfer"
        );

        let err = GuardError::not_found("ApprovalRequest", None::<String>);
        assert_eq!(err.to_string(), "ApprovalRequest not found");
    }
}
