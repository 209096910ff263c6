//! Domain errors

use thiserror::Error;

/// Payload rejected before anything is stored or forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing {0} attribute")]
    MissingAttribute(&'static str),

    #[error("missing afAppId, trafficFilters or ethTrafficFilters")]
    MissingTrafficDescriptor,

    #[error("request selects neither a single UE nor a UE group")]
    NoTarget,

    #[error("missing PFD data")]
    MissingPfdData,

    #[error("PFD {0} has no flowDescriptions, urls or domainNames")]
    MissingPfdContent(String),

    #[error("PFD {0} sets more than one of flowDescriptions, urls and domainNames")]
    AmbiguousPfdContent(String),

    #[error("externalAppId {body} does not match application {path}")]
    AppIdMismatch { path: String, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("AF {0} already exists")]
    AfAlreadyExists(String),

    #[error("AF {0} not found")]
    AfNotFound(String),

    #[error("subscription {sub_id} of AF {af_id} not found")]
    SubscriptionNotFound { af_id: String, sub_id: String },

    #[error("AF {af_id} reached the maximum of {max} subscriptions")]
    MaxSubscriptionsExceeded { af_id: String, max: usize },

    #[error("maximum of {0} AFs reached")]
    MaxAfExceeded(usize),

    #[error("no subscription with correlation id {0}")]
    CorrelationNotFound(String),

    #[error("PFD transaction {trans_id} of AF {af_id} not found")]
    TransactionNotFound { af_id: String, trans_id: String },

    #[error("application {app_id} not found in PFD transaction {trans_id}")]
    ApplicationNotFound { trans_id: String, app_id: String },

    #[error("AF {af_id} reached the maximum of {max} PFD transactions")]
    MaxTransactionsExceeded { af_id: String, max: usize },

    #[error("application {0} is already provisioned by another PFD transaction")]
    AppIdDuplicated(String),
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RegistryError::AfNotFound(_)
                | RegistryError::SubscriptionNotFound { .. }
                | RegistryError::CorrelationNotFound(_)
                | RegistryError::TransactionNotFound { .. }
                | RegistryError::ApplicationNotFound { .. }
        )
    }

    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            RegistryError::MaxSubscriptionsExceeded { .. }
                | RegistryError::MaxAfExceeded(_)
                | RegistryError::MaxTransactionsExceeded { .. }
        )
    }
}
