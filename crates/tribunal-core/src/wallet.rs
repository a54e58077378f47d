use crate::error::TribunalError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Named custodial account held by the wallet ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerAccount {
    pub id: String,
    pub address: String,
}

/// Outcome of a ledger transfer attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub tx_ref: String,
    pub ok: bool,
}

/// Narrow interface onto the external custodial wallet ledger.
///
/// Account creation is a single explicit call that either returns an account
/// or a typed error, never an ambiguous partial object. All three calls may
/// fail; the core treats ledger responses as eventually-accurate hints, never
/// as the source of truth for case status.
#[async_trait]
pub trait WalletLedger: Send + Sync {
    async fn get_or_create_account(&self, name: &str) -> Result<LedgerAccount, TribunalError>;

    async fn get_balance(&self, account_id: &str) -> Result<u64, TribunalError>;

    async fn transfer(
        &self,
        from_account_id: &str,
        to_address: &str,
        amount_minor: u64,
    ) -> Result<TransferReceipt, TribunalError>;
}

pub fn escrow_account_name(case_id: &str) -> String {
    format!("escrow-{case_id}")
}

pub fn penalty_account_name(case_id: &str) -> String {
    format!("penalty-{case_id}")
}

/// Deterministic placeholder address used when the ledger cannot be reached
/// at settlement creation. The record carries a degraded flag so a
/// reconciliation job can detect it and retry; funds cannot truly move to
/// this address.
pub fn placeholder_address(kind: &str, case_id: &str) -> String {
    let digest = blake3::hash(format!("{kind}:{case_id}").as_bytes()).to_hex();
    format!("degraded-{kind}-{}", &digest.as_str()[..16])
}
