//! Tribunal core: dispute case lifecycle and fund-distribution engine.
//!
//! This crate enforces the arbitration invariants with an explicit case state
//! machine, payment-gated admission, deterministic payout math, per-case
//! serialization, and an append-only audit trail. The wallet ledger and the
//! judging service are external collaborators behind narrow async traits.

#![deny(unsafe_code)]

pub mod admission;
pub mod appeal;
pub mod audit;
pub mod engine;
pub mod error;
pub mod judge;
pub mod lifecycle;
pub mod penalty;
pub mod settlement;
pub mod store;
pub mod types;
pub mod wallet;

pub use admission::{
    AdmissionGate, OfflineProofVerifier, PriceSchedule, PricedEndpoint, ProofVerifier,
    PAYMENT_PROOF_HEADER,
};
pub use appeal::{AppealRequest, Reconciliation};
pub use audit::{AuditEntry, AuditKind, AuditTrail};
pub use engine::{CaseView, EngineConfig, TribunalEngine};
pub use error::TribunalError;
pub use judge::{JudgingAdapter, JudgmentDraft};
pub use lifecycle::CaseEvent;
pub use settlement::Stakeholders;
pub use store::{DocumentStore, StoreConfig};
pub use types::{
    format_amount, parse_amount_minor, parse_amount_value, Appeal, AppealDecision, AppealRuling,
    Case, CaseFiling, CaseStatus, Distribution, FundingStatus, Judgment, JudgmentSource,
    PaymentProof, PaymentRecord, Penalty, PenaltyStatus, RecipientRole, RefundInstruction,
    RefundKind, Settlement, SettlementStatus, TransferStatus, Verdict,
};
pub use wallet::{LedgerAccount, TransferReceipt, WalletLedger};
