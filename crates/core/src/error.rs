//! Domain error model.

use thiserror::Error;

use crate::money::Money;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is a synchronous, locally detected, non-retryable condition.
/// Infrastructure failures live in the storage layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or business-rule-violating input.
    #[error("{0}")]
    Validation(String),

    /// A referenced resource does not exist. Carries the resource name.
    #[error("{0} not found")]
    NotFound(String),

    /// Total debits differ from total credits.
    #[error("Journal entry is unbalanced: debits ({debits}) != credits ({credits})")]
    Unbalanced { debits: Money, credits: Money },

    /// An identifier failed to parse.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    pub fn unbalanced(debits: Money, credits: Money) -> Self {
        Self::Unbalanced { debits, credits }
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// True for the two "bad input" kinds (plain validation and unbalanced).
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Unbalanced { .. } | Self::InvalidId(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_the_resource() {
        assert_eq!(
            DomainError::not_found("Journal entry").to_string(),
            "Journal entry not found"
        );
    }

    #[test]
    fn unbalanced_message_carries_both_totals() {
        let err = DomainError::unbalanced(Money::from_major(1000), Money::from_major(900));
        assert_eq!(
            err.to_string(),
            "Journal entry is unbalanced: debits (1000.0000) != credits (900.0000)"
        );
        assert!(err.is_validation());
    }
}
