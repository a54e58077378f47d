use crate::error::TribunalError;
use crate::types::CaseStatus;
use serde::{Deserialize, Serialize};

/// Events that move a case through its main lifecycle.
///
/// Appeal and penalty progress are tracked on their own records; only the
/// primary settlement path flows through this machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseEvent {
    JudgmentAttached,
    SettlementOpened,
    Dismissed,
    FundingConfirmed,
    DistributionCompleted,
    SettlementExpired,
}

impl CaseEvent {
    pub fn name(self) -> &'static str {
        match self {
            Self::JudgmentAttached => "judgment_attached",
            Self::SettlementOpened => "settlement_opened",
            Self::Dismissed => "dismissed",
            Self::FundingConfirmed => "funding_confirmed",
            Self::DistributionCompleted => "distribution_completed",
            Self::SettlementExpired => "settlement_expired",
        }
    }
}

/// Apply an event to a case status, returning the successor state.
///
/// The legality table is explicit so accidental skips cannot happen silently.
/// Settlements never transition backward; superseding records are created
/// instead.
pub fn advance(current: CaseStatus, event: CaseEvent) -> Result<CaseStatus, TribunalError> {
    let next = match (current, event) {
        (CaseStatus::Filed, CaseEvent::JudgmentAttached) => CaseStatus::Judged,
        (CaseStatus::Judged, CaseEvent::SettlementOpened) => CaseStatus::SettlementPending,
        (CaseStatus::Judged, CaseEvent::Dismissed) => CaseStatus::Dismissed,
        (CaseStatus::SettlementPending, CaseEvent::FundingConfirmed) => CaseStatus::Funded,
        (CaseStatus::SettlementPending, CaseEvent::SettlementExpired) => CaseStatus::Expired,
        (CaseStatus::Funded, CaseEvent::DistributionCompleted) => CaseStatus::Distributed,
        (from, event) => {
            return Err(TribunalError::InvalidTransition {
                from: from.name().to_string(),
                event: event.name().to_string(),
            })
        }
    };

    Ok(next)
}
