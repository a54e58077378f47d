use crate::types::{Case, Penalty, PenaltyStatus, RecipientRole};
use crate::wallet::{placeholder_address, LedgerAccount};
use chrono::{DateTime, Duration, Utc};

/// Days a claimant has to pay a frivolous-claim penalty.
pub const PENALTY_WINDOW_DAYS: i64 = 7;

/// Penalty split; must sum to 100. The respondent share compensates the
/// party dragged into a frivolous claim.
pub const TREASURY_PCT: u64 = 70;
pub const RESPONDENT_PCT: u64 = 30;

/// Build a new penalty in `pending_payment` against a frivolous judgment.
///
/// The payer is the claimant, not the respondent, which is why this flow is
/// kept structurally separate from the settlement engine.
pub fn open_penalty(
    case: &Case,
    amount_minor: u64,
    account: Option<LedgerAccount>,
    now: DateTime<Utc>,
) -> Penalty {
    let degraded = account.is_none();
    let (account_id, payment_address) = match account {
        Some(account) => (Some(account.id), account.address),
        None => (None, placeholder_address("penalty", &case.case_id)),
    };

    Penalty {
        case_id: case.case_id.clone(),
        payer: case.claimant.clone(),
        amount_minor,
        account_id,
        payment_address,
        degraded,
        deposited_minor: 0,
        status: PenaltyStatus::PendingPayment,
        created_at: now,
        deadline: now + Duration::days(PENALTY_WINDOW_DAYS),
        paid_at: None,
        distributions: Vec::new(),
    }
}

/// Two-way penalty distribution plan; remainder folds into the treasury line.
pub fn penalty_plan(
    amount_minor: u64,
    treasury_address: &str,
    respondent_address: &str,
) -> Vec<(RecipientRole, String, u64)> {
    let respondent = (amount_minor as u128 * RESPONDENT_PCT as u128 / 100) as u64;
    let treasury = amount_minor - respondent;

    vec![
        (
            RecipientRole::Treasury,
            treasury_address.to_string(),
            treasury,
        ),
        (
            RecipientRole::Respondent,
            respondent_address.to_string(),
            respondent,
        ),
    ]
}
