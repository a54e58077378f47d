use crate::error::TribunalError;
use crate::judge::JudgmentDraft;
use crate::types::{
    Appeal, AppealDecision, AppealRuling, Case, RefundInstruction, RefundKind, Settlement,
    SettlementStatus, Verdict,
};
use chrono::{DateTime, Utc};

/// Minimum appeal reason length.
pub const MIN_REASON_LEN: usize = 10;

/// Validate and build a new appeal for a judged case.
pub fn build_appeal(case: &Case, reason: &str, now: DateTime<Utc>) -> Result<Appeal, TribunalError> {
    if case.judgments.is_empty() {
        return Err(TribunalError::Validation(
            "case has no judgment to appeal".to_string(),
        ));
    }
    if case.appeal.is_some() {
        return Err(TribunalError::Validation(
            "an appeal is already on record for this case".to_string(),
        ));
    }

    let reason = reason.trim();
    if reason.len() < MIN_REASON_LEN {
        return Err(TribunalError::Validation(format!(
            "appeal reason must be at least {MIN_REASON_LEN} characters"
        )));
    }

    Ok(Appeal {
        case_id: case.case_id.clone(),
        reason: reason.to_string(),
        filed_at: now,
        review_ready: true,
        decision: None,
    })
}

/// Administrative appeal outcome request.
#[derive(Debug, Clone)]
pub enum AppealRequest {
    Upheld,
    Overturned,
    Modified {
        new_verdict: Option<Verdict>,
        new_awarded_minor: Option<u64>,
    },
}

/// Everything the engine must apply after an appeal decision.
///
/// Transfers already executed are never rolled back; when the settlement has
/// distributed, refunds surface as compensating obligations instead.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub decision: AppealDecision,
    pub refund: Option<RefundInstruction>,
    /// Mark the existing settlement superseded (only when not yet distributed).
    pub supersede_settlement: bool,
    /// Shrink the settlement's required amount going forward.
    pub new_required_minor: Option<u64>,
    /// Replacement judgment to append to the case history.
    pub replacement: Option<JudgmentDraft>,
}

/// Reconcile an appeal decision against the case and its settlement.
pub fn reconcile(
    case: &Case,
    settlement: Option<&Settlement>,
    request: &AppealRequest,
    now: DateTime<Utc>,
) -> Result<Reconciliation, TribunalError> {
    let appeal = case
        .appeal
        .as_ref()
        .ok_or_else(|| TribunalError::NoAppeal(case.case_id.clone()))?;
    if appeal.decision.is_some() {
        return Err(TribunalError::AlreadyDecided(case.case_id.clone()));
    }

    let original = case.effective_judgment().ok_or_else(|| {
        TribunalError::Validation("case has no judgment to reconcile against".to_string())
    })?;
    let distributed = settlement
        .map(|s| s.status == SettlementStatus::Distributed)
        .unwrap_or(false);
    let supersedable = settlement
        .map(|s| {
            matches!(
                s.status,
                SettlementStatus::PendingPayment | SettlementStatus::Funded
            )
        })
        .unwrap_or(false);

    let reconciliation = match request {
        AppealRequest::Upheld => Reconciliation {
            decision: AppealDecision {
                ruling: AppealRuling::Upheld,
                new_verdict: None,
                new_awarded_minor: None,
                decided_at: now,
            },
            refund: None,
            supersede_settlement: false,
            new_required_minor: None,
            replacement: None,
        },
        AppealRequest::Overturned => {
            let refund = settlement.map(|_| RefundInstruction {
                kind: RefundKind::Full,
                recipient: case.respondent.clone(),
                amount_minor: original.awarded_minor,
                compensating: distributed,
                created_at: now,
            });

            Reconciliation {
                decision: AppealDecision {
                    ruling: AppealRuling::Overturned,
                    new_verdict: Some(Verdict::NotLiable),
                    new_awarded_minor: Some(0),
                    decided_at: now,
                },
                refund,
                supersede_settlement: supersedable,
                new_required_minor: None,
                replacement: Some(JudgmentDraft {
                    verdict: Verdict::NotLiable,
                    frivolous: original.frivolous,
                    awarded_minor: 0,
                    reasoning: "appellate review overturned the original verdict".to_string(),
                    citations: Vec::new(),
                }),
            }
        }
        AppealRequest::Modified {
            new_verdict,
            new_awarded_minor,
        } => {
            let verdict = new_verdict.unwrap_or(original.verdict);
            let awarded = new_awarded_minor
                .unwrap_or(original.awarded_minor)
                .min(case.requested_minor);
            let difference = original.awarded_minor.saturating_sub(awarded);

            let refund = if difference > 0 && settlement.is_some() {
                Some(RefundInstruction {
                    kind: RefundKind::Partial,
                    recipient: case.respondent.clone(),
                    amount_minor: difference,
                    compensating: distributed,
                    created_at: now,
                })
            } else {
                None
            };

            Reconciliation {
                decision: AppealDecision {
                    ruling: AppealRuling::Modified,
                    new_verdict: Some(verdict),
                    new_awarded_minor: Some(awarded),
                    decided_at: now,
                },
                refund,
                supersede_settlement: false,
                new_required_minor: if supersedable { Some(awarded) } else { None },
                replacement: Some(JudgmentDraft {
                    verdict,
                    frivolous: original.frivolous,
                    awarded_minor: awarded,
                    reasoning: "appellate review modified the original judgment".to_string(),
                    citations: Vec::new(),
                }),
            }
        }
    };

    Ok(reconciliation)
}
