use crate::error::TribunalError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Minor units per whole currency unit (6 decimal places).
pub const MINOR_UNITS_PER_UNIT: u64 = 1_000_000;

/// Parse a decimal amount string ("1", "0.5", "12.375") into minor units.
///
/// At most six fractional digits are accepted; anything finer would silently
/// lose precision, so it is rejected instead.
pub fn parse_amount_minor(text: &str) -> Result<u64, TribunalError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(TribunalError::Validation("amount is empty".to_string()));
    }

    let (integral, fraction) = match trimmed.split_once('.') {
        Some((i, f)) => (i, f),
        None => (trimmed, ""),
    };

    if integral.is_empty() && fraction.is_empty() {
        return Err(TribunalError::Validation(format!(
            "'{trimmed}' is not a valid amount"
        )));
    }
    if !integral.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(TribunalError::Validation(format!(
            "'{trimmed}' is not a valid non-negative decimal amount"
        )));
    }
    if fraction.len() > 6 {
        return Err(TribunalError::Validation(format!(
            "'{trimmed}' has more than 6 fractional digits"
        )));
    }

    let whole: u64 = if integral.is_empty() {
        0
    } else {
        integral
            .parse()
            .map_err(|_| TribunalError::Validation(format!("'{trimmed}' is out of range")))?
    };

    let mut frac_minor: u64 = 0;
    if !fraction.is_empty() {
        frac_minor = fraction
            .parse()
            .map_err(|_| TribunalError::Validation(format!("'{trimmed}' is out of range")))?;
        for _ in 0..(6 - fraction.len()) {
            frac_minor *= 10;
        }
    }

    whole
        .checked_mul(MINOR_UNITS_PER_UNIT)
        .and_then(|scaled| scaled.checked_add(frac_minor))
        .ok_or_else(|| TribunalError::Validation(format!("'{trimmed}' is out of range")))
}

/// Parse an amount from a JSON value: decimal strings and plain numbers are
/// both accepted on the wire.
pub fn parse_amount_value(value: &Value) -> Result<u64, TribunalError> {
    match value {
        Value::String(text) => parse_amount_minor(text),
        Value::Number(number) => {
            if let Some(whole) = number.as_u64() {
                whole
                    .checked_mul(MINOR_UNITS_PER_UNIT)
                    .ok_or_else(|| TribunalError::Validation("amount is out of range".to_string()))
            } else if let Some(float) = number.as_f64() {
                if !float.is_finite() || float < 0.0 {
                    return Err(TribunalError::Validation(
                        "amount must be a finite non-negative number".to_string(),
                    ));
                }
                Ok((float * MINOR_UNITS_PER_UNIT as f64).round() as u64)
            } else {
                Err(TribunalError::Validation(
                    "amount must be non-negative".to_string(),
                ))
            }
        }
        other => Err(TribunalError::Validation(format!(
            "amount must be a string or number, got {other}"
        ))),
    }
}

/// Render minor units back into a human-readable decimal string for memos.
pub fn format_amount(minor: u64) -> String {
    let whole = minor / MINOR_UNITS_PER_UNIT;
    let frac = minor % MINOR_UNITS_PER_UNIT;
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{frac:06}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

/// Main case lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Filed,
    Judged,
    SettlementPending,
    Dismissed,
    Funded,
    Distributed,
    Expired,
}

impl CaseStatus {
    pub fn name(self) -> &'static str {
        match self {
            Self::Filed => "filed",
            Self::Judged => "judged",
            Self::SettlementPending => "settlement_pending",
            Self::Dismissed => "dismissed",
            Self::Funded => "funded",
            Self::Distributed => "distributed",
            Self::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Liable,
    NotLiable,
}

/// Where a judgment came from: the external adapter, the conservative
/// fallback applied when the adapter fails, or an appellate decision that
/// replaced the effective judgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgmentSource {
    Adapter,
    Fallback,
    Appellate,
}

/// Immutable verdict record. A new judgment (e.g. via appeal) is appended to
/// the case history; earlier judgments are retained for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Judgment {
    pub verdict: Verdict,
    /// Set by the judging service on claims it deems abusive; drives the
    /// penalty flow.
    pub frivolous: bool,
    pub awarded_minor: u64,
    pub reasoning: String,
    pub citations: Vec<String>,
    pub verdict_hash: String,
    pub source: JudgmentSource,
    pub issued_at: DateTime<Utc>,
}

/// Durable case record, owned exclusively by the repository. Never deleted,
/// only superseded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub case_id: String,
    pub claimant: String,
    pub respondent: String,
    pub category: String,
    pub evidence: Value,
    pub evidence_hash: String,
    pub requested_minor: u64,
    pub status: CaseStatus,
    pub filed_at: DateTime<Utc>,
    /// Newest last; the final entry is the effective judgment.
    pub judgments: Vec<Judgment>,
    pub appeal: Option<Appeal>,
}

impl Case {
    pub fn effective_judgment(&self) -> Option<&Judgment> {
        self.judgments.last()
    }

    /// The judgment the settlement was originally opened against.
    pub fn original_judgment(&self) -> Option<&Judgment> {
        self.judgments.first()
    }
}

/// Validated input for filing a new case.
#[derive(Debug, Clone)]
pub struct CaseFiling {
    pub respondent: String,
    pub category: String,
    pub evidence: Value,
    pub requested_minor: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    PendingPayment,
    Funded,
    Distributed,
    Superseded,
    Expired,
}

impl SettlementStatus {
    pub fn name(self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Funded => "funded",
            Self::Distributed => "distributed",
            Self::Superseded => "superseded",
            Self::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientRole {
    Claimant,
    Treasury,
    JuryPool,
    PrecedentFund,
    Respondent,
}

impl RecipientRole {
    pub fn name(self) -> &'static str {
        match self {
            Self::Claimant => "claimant",
            Self::Treasury => "treasury",
            Self::JuryPool => "jury_pool",
            Self::PrecedentFund => "precedent_fund",
            Self::Respondent => "respondent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Completed,
    Failed,
}

/// One recipient line item produced when a settlement or penalty executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Distribution {
    pub role: RecipientRole,
    pub destination: String,
    pub amount_minor: u64,
    pub status: TransferStatus,
    pub tx_ref: Option<String>,
    pub failure: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundKind {
    Full,
    Partial,
}

/// Refund owed to the respondent after an appeal shrinks or nulls a
/// settlement. When the original settlement already distributed, this is a
/// compensating obligation, never a rollback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundInstruction {
    pub kind: RefundKind,
    pub recipient: String,
    pub amount_minor: u64,
    pub compensating: bool,
    pub created_at: DateTime<Utc>,
}

/// Escrow-and-distribution record created after a liable verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub case_id: String,
    /// Absent in degraded mode: the ledger could not be reached and no real
    /// account backs the escrow address.
    pub escrow_account_id: Option<String>,
    pub escrow_address: String,
    pub degraded: bool,
    pub required_minor: u64,
    pub deposited_minor: u64,
    pub status: SettlementStatus,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub funded_at: Option<DateTime<Utc>>,
    pub memo: String,
    pub distributions: Vec<Distribution>,
    pub refunds: Vec<RefundInstruction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyStatus {
    PendingPayment,
    Paid,
    Expired,
}

impl PenaltyStatus {
    pub fn name(self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Paid => "paid",
            Self::Expired => "expired",
        }
    }
}

/// Compensating payment owed by a claimant whose case was judged frivolous.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Penalty {
    pub case_id: String,
    pub payer: String,
    pub amount_minor: u64,
    pub account_id: Option<String>,
    pub payment_address: String,
    pub degraded: bool,
    pub deposited_minor: u64,
    pub status: PenaltyStatus,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub distributions: Vec<Distribution>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealRuling {
    Upheld,
    Overturned,
    Modified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppealDecision {
    pub ruling: AppealRuling,
    pub new_verdict: Option<Verdict>,
    pub new_awarded_minor: Option<u64>,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appeal {
    pub case_id: String,
    pub reason: String,
    pub filed_at: DateTime<Utc>,
    /// True from filing until a decision is recorded.
    pub review_ready: bool,
    pub decision: Option<AppealDecision>,
}

/// Decoded payment proof presented with a priced request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentProof {
    pub from: String,
    pub amount: String,
    pub timestamp: DateTime<Utc>,
}

/// Normalized admission record attached to the request context and appended
/// to the audit trail; never persisted as a first-class entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub sender: String,
    pub amount_minor: u64,
    pub timestamp: DateTime<Utc>,
    pub endpoint: String,
}

/// Live funding snapshot for a settlement or penalty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingStatus {
    pub funded: bool,
    pub required_minor: u64,
    pub deposited_minor: u64,
    pub remaining_minor: u64,
    pub deadline_passed: bool,
    pub days_remaining: i64,
}

impl FundingStatus {
    /// Evaluate funding against an observed balance at `now`.
    ///
    /// Days remaining round up, so a freshly opened 7-day window reports 7;
    /// once the deadline passes it reports 0 with `deadline_passed` set.
    pub fn evaluate(
        required_minor: u64,
        balance_minor: u64,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        let funded = balance_minor >= required_minor;
        let deadline_passed = now > deadline;
        let days_remaining = if deadline_passed {
            0
        } else {
            let secs = (deadline - now).num_seconds();
            (secs + 86_399) / 86_400
        };

        Self {
            funded,
            required_minor,
            deposited_minor: balance_minor,
            remaining_minor: required_minor.saturating_sub(balance_minor),
            deadline_passed,
            days_remaining,
        }
    }
}

/// Canonical blake3 hash of a JSON document, hex-encoded.
pub fn content_hash(value: &Value) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}
