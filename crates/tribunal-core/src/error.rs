use thiserror::Error;

/// Closed error taxonomy for the tribunal core.
///
/// Every failure path in the core resolves to one of these kinds; nothing
/// terminates the process. The HTTP layer maps kinds to status codes.
#[derive(Debug, Error)]
pub enum TribunalError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("payment of {required_minor} minor units required; pay to {pay_to}")]
    PaymentRequired { required_minor: u64, pay_to: String },

    #[error("invalid payment proof: {0}")]
    InvalidProof(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("event '{event}' is not legal from state '{from}'")]
    InvalidTransition { from: String, event: String },

    #[error("settlement for case {0} is not funded")]
    NotFunded(String),

    #[error("settlement for case {0} already distributed")]
    AlreadyDistributed(String),

    #[error("appeal for case {0} already decided")]
    AlreadyDecided(String),

    #[error("case {0} has no appeal on record")]
    NoAppeal(String),

    #[error("wallet ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("judging adapter failure: {0}")]
    AdapterFailure(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl TribunalError {
    /// Stable machine-readable kind string surfaced in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::PaymentRequired { .. } => "payment_required",
            Self::InvalidProof(_) => "invalid_proof",
            Self::NotFound(_) => "not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::NotFunded(_) => "not_funded",
            Self::AlreadyDistributed(_) => "already_distributed",
            Self::AlreadyDecided(_) => "already_decided",
            Self::NoAppeal(_) => "no_appeal",
            Self::LedgerUnavailable(_) => "ledger_unavailable",
            Self::AdapterFailure(_) => "adapter_failure",
            Self::Storage(_) => "storage_error",
            Self::Serialization(_) => "serialization_error",
        }
    }
}

impl From<serde_json::Error> for TribunalError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(
            TribunalError::Validation("x".to_string()).kind(),
            "validation_error"
        );
        assert_eq!(
            TribunalError::PaymentRequired {
                required_minor: 10,
                pay_to: "treasury".to_string()
            }
            .kind(),
            "payment_required"
        );
        assert_eq!(
            TribunalError::AlreadyDistributed("c-1".to_string()).kind(),
            "already_distributed"
        );
    }

    #[test]
    fn transition_error_names_state_and_event() {
        let err = TribunalError::InvalidTransition {
            from: "filed".to_string(),
            event: "funding_confirmed".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("filed"));
        assert!(rendered.contains("funding_confirmed"));
    }
}
