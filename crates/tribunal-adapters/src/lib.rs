//! Collaborator adapters for the tribunal core.
//!
//! The wallet custody service and the judging service are opaque external
//! systems; these deterministic in-process implementations back local
//! operation and tests.

#![deny(unsafe_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tribunal_core::{
    Case, JudgingAdapter, JudgmentDraft, LedgerAccount, TransferReceipt, TribunalError, Verdict,
    WalletLedger,
};
use uuid::Uuid;

/// In-memory custodial wallet ledger.
///
/// Accounts are created on demand with deterministic addresses; balances move
/// only through `deposit` and `transfer`. Unavailability can be toggled to
/// exercise degraded-mode paths.
#[derive(Debug, Default)]
pub struct MockWalletLedger {
    accounts: Mutex<HashMap<String, LedgerAccount>>,
    balances: Mutex<HashMap<String, u64>>,
    unavailable: AtomicBool,
}

impl MockWalletLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a ledger outage; all calls fail until restored.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Credit an account directly, standing in for an external deposit.
    pub fn deposit(&self, account_id: &str, amount_minor: u64) {
        let mut balances = self.balances.lock().expect("balance lock");
        *balances.entry(account_id.to_string()).or_insert(0) += amount_minor;
    }

    pub fn balance(&self, account_id: &str) -> u64 {
        *self
            .balances
            .lock()
            .expect("balance lock")
            .get(account_id)
            .unwrap_or(&0)
    }

    fn check_available(&self) -> Result<(), TribunalError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(TribunalError::LedgerUnavailable(
                "mock ledger is offline".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl WalletLedger for MockWalletLedger {
    async fn get_or_create_account(&self, name: &str) -> Result<LedgerAccount, TribunalError> {
        self.check_available()?;
        let mut accounts = self.accounts.lock().expect("account lock");
        let account = accounts
            .entry(name.to_string())
            .or_insert_with(|| {
                let digest = blake3::hash(name.as_bytes()).to_hex();
                LedgerAccount {
                    id: format!("acct-{name}"),
                    address: format!("mock:{}", &digest.as_str()[..20]),
                }
            })
            .clone();
        Ok(account)
    }

    async fn get_balance(&self, account_id: &str) -> Result<u64, TribunalError> {
        self.check_available()?;
        Ok(self.balance(account_id))
    }

    async fn transfer(
        &self,
        from_account_id: &str,
        _to_address: &str,
        amount_minor: u64,
    ) -> Result<TransferReceipt, TribunalError> {
        self.check_available()?;
        let mut balances = self.balances.lock().expect("balance lock");
        let balance = balances.entry(from_account_id.to_string()).or_insert(0);

        let short_id: String = Uuid::new_v4().to_string().chars().take(8).collect();
        if *balance < amount_minor {
            return Ok(TransferReceipt {
                tx_ref: format!("tx-{short_id}"),
                ok: false,
            });
        }

        *balance -= amount_minor;
        Ok(TransferReceipt {
            tx_ref: format!("tx-{short_id}"),
            ok: true,
        })
    }
}

/// Ledger that always fails, useful for chaos testing.
#[derive(Debug, Clone)]
pub struct UnavailableWalletLedger {
    reason: String,
}

impl UnavailableWalletLedger {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl WalletLedger for UnavailableWalletLedger {
    async fn get_or_create_account(&self, _name: &str) -> Result<LedgerAccount, TribunalError> {
        Err(TribunalError::LedgerUnavailable(self.reason.clone()))
    }

    async fn get_balance(&self, _account_id: &str) -> Result<u64, TribunalError> {
        Err(TribunalError::LedgerUnavailable(self.reason.clone()))
    }

    async fn transfer(
        &self,
        _from_account_id: &str,
        _to_address: &str,
        _amount_minor: u64,
    ) -> Result<TransferReceipt, TribunalError> {
        Err(TribunalError::LedgerUnavailable(self.reason.clone()))
    }
}

/// Deterministic rule-based judge.
///
/// Awards a fixed percentage of the requested damages on liable verdicts, so
/// the same case facts always produce the same outcome.
#[derive(Debug, Clone)]
pub struct FixedRuleJudge {
    verdict: Verdict,
    frivolous: bool,
    award_pct: u64,
}

impl FixedRuleJudge {
    /// Liable verdict awarding `award_pct` percent of requested damages.
    pub fn liable(award_pct: u64) -> Self {
        Self {
            verdict: Verdict::Liable,
            frivolous: false,
            award_pct: award_pct.min(100),
        }
    }

    pub fn not_liable() -> Self {
        Self {
            verdict: Verdict::NotLiable,
            frivolous: false,
            award_pct: 0,
        }
    }

    pub fn frivolous() -> Self {
        Self {
            verdict: Verdict::NotLiable,
            frivolous: true,
            award_pct: 0,
        }
    }
}

#[async_trait]
impl JudgingAdapter for FixedRuleJudge {
    async fn judge(&self, case: &Case) -> Result<JudgmentDraft, TribunalError> {
        let awarded_minor = (case.requested_minor as u128 * self.award_pct as u128 / 100) as u64;
        let reasoning = match self.verdict {
            Verdict::Liable => format!(
                "respondent found liable in category '{}'; awarding {}% of requested damages",
                case.category, self.award_pct
            ),
            Verdict::NotLiable => {
                if self.frivolous {
                    "claim lacks any supporting basis and is deemed frivolous".to_string()
                } else {
                    "evidence does not establish respondent liability".to_string()
                }
            }
        };

        Ok(JudgmentDraft {
            verdict: self.verdict,
            frivolous: self.frivolous,
            awarded_minor,
            reasoning,
            citations: vec![format!("rule:{}", case.category)],
        })
    }
}

/// Judge that always fails, exercising the conservative fallback path.
#[derive(Debug, Clone)]
pub struct FailingJudge {
    reason: String,
}

impl FailingJudge {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl JudgingAdapter for FailingJudge {
    async fn judge(&self, _case: &Case) -> Result<JudgmentDraft, TribunalError> {
        Err(TribunalError::AdapterFailure(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tribunal_core::CaseStatus;

    fn sample_case(requested_minor: u64) -> Case {
        Case {
            case_id: "case-1".to_string(),
            claimant: "addr-claimant".to_string(),
            respondent: "addr-respondent".to_string(),
            category: "contract_breach".to_string(),
            evidence: serde_json::json!({"description": "unpaid invoice"}),
            evidence_hash: "h".to_string(),
            requested_minor,
            status: CaseStatus::Filed,
            filed_at: Utc::now(),
            judgments: Vec::new(),
            appeal: None,
        }
    }

    #[tokio::test]
    async fn mock_ledger_accounts_are_deterministic() {
        let ledger = MockWalletLedger::new();
        let a = ledger.get_or_create_account("escrow-case-1").await.unwrap();
        let b = ledger.get_or_create_account("escrow-case-1").await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.address, b.address);
        assert!(a.address.starts_with("mock:"));
    }

    #[tokio::test]
    async fn mock_ledger_moves_balances_on_transfer() {
        let ledger = MockWalletLedger::new();
        let account = ledger.get_or_create_account("escrow-case-2").await.unwrap();
        ledger.deposit(&account.id, 1_000);

        let receipt = ledger.transfer(&account.id, "addr-out", 400).await.unwrap();
        assert!(receipt.ok);
        assert_eq!(ledger.get_balance(&account.id).await.unwrap(), 600);

        let receipt = ledger.transfer(&account.id, "addr-out", 900).await.unwrap();
        assert!(!receipt.ok);
        assert_eq!(ledger.get_balance(&account.id).await.unwrap(), 600);
    }

    #[tokio::test]
    async fn mock_ledger_outage_fails_every_call() {
        let ledger = MockWalletLedger::new();
        ledger.set_unavailable(true);
        assert!(matches!(
            ledger.get_or_create_account("escrow-x").await,
            Err(TribunalError::LedgerUnavailable(_))
        ));
        ledger.set_unavailable(false);
        assert!(ledger.get_or_create_account("escrow-x").await.is_ok());
    }

    #[tokio::test]
    async fn fixed_rule_judge_awards_percentage_of_requested() {
        let judge = FixedRuleJudge::liable(50);
        let draft = judge.judge(&sample_case(1_000_000)).await.unwrap();
        assert_eq!(draft.verdict, Verdict::Liable);
        assert_eq!(draft.awarded_minor, 500_000);
        assert!(!draft.citations.is_empty());
    }

    #[tokio::test]
    async fn frivolous_judge_flags_the_claim() {
        let judge = FixedRuleJudge::frivolous();
        let draft = judge.judge(&sample_case(1_000_000)).await.unwrap();
        assert_eq!(draft.verdict, Verdict::NotLiable);
        assert!(draft.frivolous);
        assert_eq!(draft.awarded_minor, 0);
    }

    #[tokio::test]
    async fn failing_adapters_return_typed_errors() {
        let ledger = UnavailableWalletLedger::new("forced outage");
        assert!(matches!(
            ledger.get_balance("acct").await,
            Err(TribunalError::LedgerUnavailable(_))
        ));

        let judge = FailingJudge::new("forced failure");
        assert!(matches!(
            judge.judge(&sample_case(1)).await,
            Err(TribunalError::AdapterFailure(_))
        ));
    }
}
