use rust_decimal::Decimal;
use thiserror::Error;

use super::types::{CampaignId, CampaignStatus, Role};
use crate::store::StoreError;

/// Errors surfaced by lifecycle operations.
///
/// Every failure leaves the campaign and the escrow ledger unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("wrong actor role: {role} may not {action}")]
    Unauthorized { role: Role, action: &'static str },
    #[error("wrong current status: cannot {action} a campaign that is {status}")]
    InvalidTransition {
        status: CampaignStatus,
        action: &'static str,
    },
    #[error("invalid {field}: {reason}")]
    ValidationError { field: &'static str, reason: String },
    #[error("campaign {campaign_id} changed concurrently (expected {expected}, found {actual}); refresh and retry")]
    Conflict {
        campaign_id: CampaignId,
        expected: CampaignStatus,
        actual: CampaignStatus,
    },
    #[error("insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: Decimal, required: Decimal },
    #[error("storage failure: {0}")]
    Storage(String),
}

impl LifecycleError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        LifecycleError::ValidationError {
            field,
            reason: reason.into(),
        }
    }

    pub fn campaign_not_found(id: CampaignId) -> Self {
        LifecycleError::NotFound {
            entity: "campaign",
            id: id.to_string(),
        }
    }

    /// Stable short name used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleError::NotFound { .. } => "not_found",
            LifecycleError::Unauthorized { .. } => "unauthorized",
            LifecycleError::InvalidTransition { .. } => "invalid_transition",
            LifecycleError::ValidationError { .. } => "validation",
            LifecycleError::Conflict { .. } => "conflict",
            LifecycleError::InsufficientFunds { .. } => "insufficient_funds",
            LifecycleError::Storage(_) => "storage",
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { entity, id } => LifecycleError::NotFound { entity, id },
            StoreError::StatusMismatch {
                campaign_id,
                expected,
                actual,
            } => LifecycleError::Conflict {
                campaign_id,
                expected,
                actual,
            },
            StoreError::InsufficientFunds {
                available,
                required,
                ..
            } => LifecycleError::InsufficientFunds {
                available,
                required,
            },
            StoreError::IllegalTransition { from, .. } => LifecycleError::InvalidTransition {
                status: from,
                action: "apply this transition to",
            },
            other => LifecycleError::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_graph_violation_is_invalid_transition() {
        let error = LifecycleError::from(StoreError::IllegalTransition {
            campaign_id: CampaignId::new(),
            from: CampaignStatus::Pending,
            to: CampaignStatus::Completed,
        });
        assert_eq!(error.kind(), "invalid_transition");
        assert!(matches!(
            error,
            LifecycleError::InvalidTransition {
                status: CampaignStatus::Pending,
                ..
            }
        ));
    }

    #[test]
    fn test_stale_status_is_conflict() {
        let error = LifecycleError::from(StoreError::StatusMismatch {
            campaign_id: CampaignId::new(),
            expected: CampaignStatus::Pending,
            actual: CampaignStatus::Accepted,
        });
        assert_eq!(error.kind(), "conflict");
    }
}
