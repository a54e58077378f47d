use crate::types::{
    format_amount, Case, Judgment, RecipientRole, Settlement, SettlementStatus,
};
use crate::wallet::{placeholder_address, LedgerAccount};
use chrono::{DateTime, Duration, Utc};

/// Days a respondent has to fund the escrow account.
pub const PAYMENT_WINDOW_DAYS: i64 = 7;

/// Fixed distribution weights; must sum to 100.
pub const CLAIMANT_PCT: u64 = 75;
pub const TREASURY_PCT: u64 = 15;
pub const JURY_POOL_PCT: u64 = 5;
pub const PRECEDENT_FUND_PCT: u64 = 5;

/// Stakeholder destination addresses for settlement fan-out.
#[derive(Debug, Clone)]
pub struct Stakeholders {
    pub treasury_address: String,
    pub jury_pool_address: String,
    pub precedent_fund_address: String,
}

/// Build a new settlement in `pending_payment` against a liable judgment.
///
/// When the ledger could not provide an account, a deterministic placeholder
/// address is used and the record is flagged degraded so downstream
/// consumers know funds cannot truly move.
pub fn open_settlement(
    case: &Case,
    judgment: &Judgment,
    account: Option<LedgerAccount>,
    now: DateTime<Utc>,
) -> Settlement {
    let required_minor = judgment.awarded_minor;
    let degraded = account.is_none();
    let (escrow_account_id, escrow_address) = match account {
        Some(account) => (Some(account.id), account.address),
        None => (None, placeholder_address("escrow", &case.case_id)),
    };

    let memo = format!(
        "Case {} settlement: deposit {} to {} within {} days",
        case.case_id,
        format_amount(required_minor),
        escrow_address,
        PAYMENT_WINDOW_DAYS
    );

    Settlement {
        case_id: case.case_id.clone(),
        escrow_account_id,
        escrow_address,
        degraded,
        required_minor,
        deposited_minor: 0,
        status: SettlementStatus::PendingPayment,
        created_at: now,
        deadline: now + Duration::days(PAYMENT_WINDOW_DAYS),
        funded_at: None,
        memo,
        distributions: Vec::new(),
        refunds: Vec::new(),
    }
}

/// Compute the four-way distribution plan for a settlement.
///
/// Integer division floors each share; the remainder is folded into the
/// claimant line so the planned total always equals the required amount.
pub fn distribution_plan(
    required_minor: u64,
    claimant_address: &str,
    stakeholders: &Stakeholders,
) -> Vec<(RecipientRole, String, u64)> {
    let share = |pct: u64| (required_minor as u128 * pct as u128 / 100) as u64;

    let treasury = share(TREASURY_PCT);
    let jury_pool = share(JURY_POOL_PCT);
    let precedent = share(PRECEDENT_FUND_PCT);
    let claimant = required_minor - treasury - jury_pool - precedent;

    vec![
        (
            RecipientRole::Claimant,
            claimant_address.to_string(),
            claimant,
        ),
        (
            RecipientRole::Treasury,
            stakeholders.treasury_address.clone(),
            treasury,
        ),
        (
            RecipientRole::JuryPool,
            stakeholders.jury_pool_address.clone(),
            jury_pool,
        ),
        (
            RecipientRole::PrecedentFund,
            stakeholders.precedent_fund_address.clone(),
            precedent,
        ),
    ]
}
