use crate::appeal::{build_appeal, reconcile, AppealRequest};
use crate::audit::{AuditEntry, AuditKind, AuditTrail};
use crate::error::TribunalError;
use crate::judge::{fallback_draft, seal_judgment, JudgingAdapter};
use crate::lifecycle::{advance, CaseEvent};
use crate::penalty::{open_penalty, penalty_plan};
use crate::settlement::{distribution_plan, open_settlement, Stakeholders};
use crate::store::{
    case_key, penalty_key, settlement_key, DocumentStore, StoreConfig, PENALTY_PREFIX,
    SETTLEMENT_PREFIX,
};
use crate::types::{
    Case, CaseFiling, CaseStatus, Distribution, FundingStatus, JudgmentSource, PaymentRecord,
    Penalty, PenaltyStatus, RecipientRole, Settlement, SettlementStatus, TransferStatus, Verdict,
};
use crate::wallet::{escrow_account_name, penalty_account_name, WalletLedger};
use chrono::Utc;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub stakeholders: Stakeholders,
    /// Flat amount owed by a claimant whose case is judged frivolous.
    pub frivolous_penalty_minor: u64,
    /// Bound on every wallet-ledger and judging call.
    pub collaborator_timeout: Duration,
    pub store: StoreConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stakeholders: Stakeholders {
                treasury_address: "treasury-main".to_string(),
                jury_pool_address: "jury-pool-main".to_string(),
                precedent_fund_address: "precedent-fund-main".to_string(),
            },
            // 25.00 units.
            frivolous_penalty_minor: 25_000_000,
            collaborator_timeout: Duration::from_secs(5),
            store: StoreConfig::Memory,
        }
    }
}

/// Full case view joined with its settlement and penalty records.
#[derive(Debug, Clone, Serialize)]
pub struct CaseView {
    pub case: Case,
    pub settlement: Option<Settlement>,
    pub penalty: Option<Penalty>,
}

/// Case lifecycle and fund-distribution orchestrator.
///
/// Per-case serialization: every read-modify-write of a case, settlement, or
/// penalty document happens under that case's keyed lock. The lock is never
/// held across wallet-ledger or judging calls; those are re-checked against
/// the stored state afterwards, so concurrent writers resolve to a single
/// winner.
pub struct TribunalEngine {
    store: DocumentStore,
    wallet: Arc<dyn WalletLedger>,
    judge: Arc<dyn JudgingAdapter>,
    audit: AsyncMutex<AuditTrail>,
    case_locks: RwLock<HashMap<String, Arc<AsyncMutex<()>>>>,
    /// Case ids with a settlement or penalty execution currently in flight.
    executing: StdMutex<HashSet<String>>,
    /// Rebuildable cache of cases with settlements/penalties awaiting funding
    /// or distribution; the document store stays the source of truth.
    pending_settlements: RwLock<HashSet<String>>,
    pending_penalties: RwLock<HashSet<String>>,
    config: EngineConfig,
}

impl TribunalEngine {
    pub async fn bootstrap(
        config: EngineConfig,
        wallet: Arc<dyn WalletLedger>,
        judge: Arc<dyn JudgingAdapter>,
    ) -> Result<Self, TribunalError> {
        let store = DocumentStore::bootstrap(config.store.clone()).await?;
        Self::with_store(store, config, wallet, judge).await
    }

    /// Build the engine over an already-bootstrapped store, rebuilding the
    /// in-memory pending indexes by scanning the persisted documents.
    pub async fn with_store(
        store: DocumentStore,
        config: EngineConfig,
        wallet: Arc<dyn WalletLedger>,
        judge: Arc<dyn JudgingAdapter>,
    ) -> Result<Self, TribunalError> {
        let mut pending_settlements = HashSet::new();
        for (_, doc) in store.scan_prefix(SETTLEMENT_PREFIX).await? {
            let settlement: Settlement = serde_json::from_value(doc)?;
            if matches!(
                settlement.status,
                SettlementStatus::PendingPayment | SettlementStatus::Funded
            ) {
                pending_settlements.insert(settlement.case_id);
            }
        }

        let mut pending_penalties = HashSet::new();
        for (_, doc) in store.scan_prefix(PENALTY_PREFIX).await? {
            let penalty: Penalty = serde_json::from_value(doc)?;
            if penalty.status == PenaltyStatus::PendingPayment {
                pending_penalties.insert(penalty.case_id);
            }
        }

        if !pending_settlements.is_empty() || !pending_penalties.is_empty() {
            info!(
                "rebuilt pending index: {} settlements, {} penalties",
                pending_settlements.len(),
                pending_penalties.len()
            );
        }

        Ok(Self {
            store,
            wallet,
            judge,
            audit: AsyncMutex::new(AuditTrail::new()),
            case_locks: RwLock::new(HashMap::new()),
            executing: StdMutex::new(HashSet::new()),
            pending_settlements: RwLock::new(pending_settlements),
            pending_penalties: RwLock::new(pending_penalties),
            config,
        })
    }

    pub fn store_backend(&self) -> &'static str {
        self.store.backend_label()
    }

    pub fn treasury_address(&self) -> &str {
        &self.config.stakeholders.treasury_address
    }

    /// Cases whose settlements await funding or distribution, for the
    /// external periodic sweep.
    pub async fn pending_settlements(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.pending_settlements.read().await.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.lock().await.entries().to_vec()
    }

    pub async fn verify_audit_chain(&self) -> bool {
        self.audit.lock().await.verify_chain()
    }

    // ---- case filing & lookup ----------------------------------------------

    pub async fn file_case(
        &self,
        filing: CaseFiling,
        payment: &PaymentRecord,
    ) -> Result<Case, TribunalError> {
        if filing.respondent.trim().is_empty() {
            return Err(TribunalError::Validation("respondent is required".to_string()));
        }
        if filing.category.trim().is_empty() {
            return Err(TribunalError::Validation("category is required".to_string()));
        }
        if filing.evidence.is_null() {
            return Err(TribunalError::Validation("evidence is required".to_string()));
        }
        if filing.requested_minor == 0 {
            return Err(TribunalError::Validation(
                "requested damages must be positive".to_string(),
            ));
        }
        if filing.respondent.trim() == payment.sender {
            return Err(TribunalError::Validation(
                "respondent must differ from claimant".to_string(),
            ));
        }

        let now = Utc::now();
        let case = Case {
            case_id: Uuid::new_v4().to_string(),
            claimant: payment.sender.clone(),
            respondent: filing.respondent.trim().to_string(),
            category: filing.category.trim().to_string(),
            evidence_hash: crate::types::content_hash(&filing.evidence),
            evidence: filing.evidence,
            requested_minor: filing.requested_minor,
            status: CaseStatus::Filed,
            filed_at: now,
            judgments: Vec::new(),
            appeal: None,
        };

        self.save_case(&case).await?;
        self.record_admission(&case.case_id, payment).await?;
        self.record_transition(&case.case_id, "none", "filed", "case_filed")
            .await?;
        info!("case {} filed by {}", case.case_id, case.claimant);

        Ok(case)
    }

    pub async fn get_case(&self, case_id: &str) -> Result<Case, TribunalError> {
        self.load_case(case_id).await
    }

    pub async fn case_view(&self, case_id: &str) -> Result<CaseView, TribunalError> {
        let case = self.load_case(case_id).await?;
        let settlement = self.load_settlement(case_id).await?;
        let penalty = self.load_penalty(case_id).await?;
        Ok(CaseView {
            case,
            settlement,
            penalty,
        })
    }

    // ---- judgment ----------------------------------------------------------

    /// Request a judgment from the external decision service and route the
    /// case into settlement, dismissal, or the penalty flow.
    pub async fn request_judgment(
        &self,
        case_id: &str,
        payment: &PaymentRecord,
    ) -> Result<Case, TribunalError> {
        let lock = self.case_lock(case_id).await;

        let snapshot = {
            let _guard = lock.lock().await;
            let case = self.load_case(case_id).await?;
            // Validate before the slow call; judging an already-judged case
            // is an invalid transition.
            advance(case.status, CaseEvent::JudgmentAttached)?;
            case
        };

        // The judging call runs outside the per-case lock; failure falls back
        // to a conservative default rather than failing the request.
        let adapter_call = self.judge.judge(&snapshot);
        let (draft, source) =
            match tokio::time::timeout(self.config.collaborator_timeout, adapter_call).await {
                Ok(Ok(draft)) => (draft, JudgmentSource::Adapter),
                Ok(Err(err)) => {
                    warn!("judging adapter failed for case {case_id}: {err}");
                    (fallback_draft(&err.to_string()), JudgmentSource::Fallback)
                }
                Err(_) => {
                    warn!("judging adapter timed out for case {case_id}");
                    (fallback_draft("timed out"), JudgmentSource::Fallback)
                }
            };

        let (verdict, frivolous) = {
            let _guard = lock.lock().await;
            let mut case = self.load_case(case_id).await?;
            case.status = advance(case.status, CaseEvent::JudgmentAttached)?;
            let judgment = seal_judgment(&case, draft, source, Utc::now());
            case.judgments.push(judgment.clone());
            self.save_case(&case).await?;
            self.record_admission(case_id, payment).await?;
            self.record_audit(
                case_id,
                AuditKind::Judgment,
                serde_json::json!({
                    "verdict": judgment.verdict,
                    "frivolous": judgment.frivolous,
                    "awarded_minor": judgment.awarded_minor,
                    "verdict_hash": judgment.verdict_hash,
                    "source": judgment.source,
                }),
            )
            .await?;
            self.record_transition(case_id, "filed", "judged", "judgment_attached")
                .await?;
            (judgment.verdict, judgment.frivolous)
        };

        match verdict {
            Verdict::Liable => {
                self.initiate_settlement(case_id).await?;
            }
            Verdict::NotLiable => {
                {
                    let _guard = lock.lock().await;
                    let mut case = self.load_case(case_id).await?;
                    case.status = advance(case.status, CaseEvent::Dismissed)?;
                    self.save_case(&case).await?;
                    self.record_transition(case_id, "judged", "dismissed", "dismissed")
                        .await?;
                }
                if frivolous {
                    self.initiate_penalty(case_id).await?;
                }
            }
        }

        self.load_case(case_id).await
    }

    // ---- settlement --------------------------------------------------------

    /// Open the escrow settlement for a liable case.
    ///
    /// Idempotent: a second call (or a concurrent loser) returns the existing
    /// settlement rather than creating another one.
    pub async fn initiate_settlement(&self, case_id: &str) -> Result<Settlement, TribunalError> {
        let lock = self.case_lock(case_id).await;

        {
            let _guard = lock.lock().await;
            if let Some(existing) = self.load_settlement(case_id).await? {
                return Ok(existing);
            }
            let case = self.load_case(case_id).await?;
            let judgment = case.effective_judgment().ok_or_else(|| {
                TribunalError::Validation("case has no judgment".to_string())
            })?;
            if judgment.verdict != Verdict::Liable {
                return Err(TribunalError::Validation(
                    "settlement requires a liable verdict".to_string(),
                ));
            }
            advance(case.status, CaseEvent::SettlementOpened)?;
        }

        // Resolve the escrow account outside the lock; on failure the
        // settlement is still created, degraded, so the case never sticks.
        let account = match self
            .ledger_call(
                "get_or_create_account",
                self.wallet
                    .get_or_create_account(&escrow_account_name(case_id)),
            )
            .await
        {
            Ok(account) => Some(account),
            Err(err) => {
                warn!("escrow account resolution failed for case {case_id}: {err}; entering degraded mode");
                None
            }
        };

        let _guard = lock.lock().await;
        // A concurrent initiate may have won while we talked to the ledger.
        if let Some(existing) = self.load_settlement(case_id).await? {
            return Ok(existing);
        }

        let mut case = self.load_case(case_id).await?;
        let judgment = case
            .effective_judgment()
            .cloned()
            .ok_or_else(|| TribunalError::Validation("case has no judgment".to_string()))?;
        case.status = advance(case.status, CaseEvent::SettlementOpened)?;

        let settlement = open_settlement(&case, &judgment, account, Utc::now());
        self.save_settlement(&settlement).await?;
        self.save_case(&case).await?;
        self.pending_settlements
            .write()
            .await
            .insert(case_id.to_string());
        self.record_transition(case_id, "judged", "settlement_pending", "settlement_opened")
            .await?;
        info!(
            "settlement opened for case {case_id}: {} to {}{}",
            settlement.required_minor,
            settlement.escrow_address,
            if settlement.degraded { " (degraded)" } else { "" }
        );

        Ok(settlement)
    }

    /// Query live funding for a settlement, flipping it to `funded` when the
    /// escrow balance covers the required amount.
    pub async fn check_funding(
        &self,
        case_id: &str,
    ) -> Result<(Settlement, FundingStatus), TribunalError> {
        let settlement = self.require_settlement(case_id).await?;
        if settlement.status != SettlementStatus::PendingPayment {
            let status = FundingStatus::evaluate(
                settlement.required_minor,
                settlement.deposited_minor,
                settlement.deadline,
                Utc::now(),
            );
            return Ok((settlement, status));
        }

        // Ledger errors count as zero balance, never as a request failure.
        let balance = match &settlement.escrow_account_id {
            Some(account_id) => match self
                .ledger_call("get_balance", self.wallet.get_balance(account_id))
                .await
            {
                Ok(balance) => balance,
                Err(err) => {
                    warn!("balance query failed for case {case_id}: {err}; treating as zero");
                    0
                }
            },
            None => 0,
        };

        let now = Utc::now();
        if balance < settlement.required_minor {
            let status =
                FundingStatus::evaluate(settlement.required_minor, balance, settlement.deadline, now);
            return Ok((settlement, status));
        }

        let lock = self.case_lock(case_id).await;
        let _guard = lock.lock().await;
        let mut settlement = self.require_settlement(case_id).await?;
        if settlement.status == SettlementStatus::PendingPayment {
            settlement.status = SettlementStatus::Funded;
            settlement.deposited_minor = balance;
            settlement.funded_at = Some(now);
            self.save_settlement(&settlement).await?;

            let mut case = self.load_case(case_id).await?;
            case.status = advance(case.status, CaseEvent::FundingConfirmed)?;
            self.save_case(&case).await?;
            self.record_transition(case_id, "settlement_pending", "funded", "funding_confirmed")
                .await?;
            info!("settlement for case {case_id} funded with {balance}");
        }

        let status = FundingStatus::evaluate(
            settlement.required_minor,
            settlement.deposited_minor,
            settlement.deadline,
            now,
        );
        Ok((settlement, status))
    }

    /// Fan out the four distributions for a funded settlement.
    ///
    /// Best-effort: the underlying ledger offers no multi-leg atomicity, so
    /// per-recipient failures are recorded individually without aborting the
    /// rest. Zero successful transfers leaves the settlement funded and
    /// surfaces `LedgerUnavailable` so the operation can be retried.
    pub async fn execute_settlement(&self, case_id: &str) -> Result<Settlement, TribunalError> {
        let lock = self.case_lock(case_id).await;

        let (account_id, plan) = {
            let _guard = lock.lock().await;
            let settlement = self.require_settlement(case_id).await?;
            match settlement.status {
                SettlementStatus::Funded => {}
                SettlementStatus::Distributed => {
                    return Err(TribunalError::AlreadyDistributed(case_id.to_string()))
                }
                _ => return Err(TribunalError::NotFunded(case_id.to_string())),
            }
            let case = self.load_case(case_id).await?;
            // Claim last, so every earlier failure path leaves the guard clear.
            self.claim_execution(case_id)?;
            (
                settlement.escrow_account_id.clone(),
                distribution_plan(
                    settlement.required_minor,
                    &case.claimant,
                    &self.config.stakeholders,
                ),
            )
        };

        let result = self
            .run_fanout(case_id, account_id, plan, &lock, FanoutTarget::Settlement)
            .await;
        self.release_execution(case_id);

        match result {
            Ok(FanoutOutcome::Settlement(settlement)) => Ok(settlement),
            Ok(FanoutOutcome::Penalty(_)) => unreachable!("settlement fan-out returned a penalty"),
            Err(err) => Err(err),
        }
    }

    /// Explicit expiry for a settlement stuck past its deadline. Never runs
    /// automatically; an external scheduler decides when to pull the trigger.
    pub async fn expire_settlement(&self, case_id: &str) -> Result<Settlement, TribunalError> {
        let lock = self.case_lock(case_id).await;
        let _guard = lock.lock().await;

        let mut settlement = self.require_settlement(case_id).await?;
        if settlement.status != SettlementStatus::PendingPayment {
            return Err(TribunalError::InvalidTransition {
                from: settlement.status.name().to_string(),
                event: "settlement_expired".to_string(),
            });
        }
        if Utc::now() <= settlement.deadline {
            return Err(TribunalError::Validation(
                "settlement deadline has not passed".to_string(),
            ));
        }

        settlement.status = SettlementStatus::Expired;
        self.save_settlement(&settlement).await?;

        let mut case = self.load_case(case_id).await?;
        case.status = advance(case.status, CaseEvent::SettlementExpired)?;
        self.save_case(&case).await?;
        self.pending_settlements.write().await.remove(case_id);
        self.record_transition(case_id, "settlement_pending", "expired", "settlement_expired")
            .await?;

        Ok(settlement)
    }

    // ---- penalty -----------------------------------------------------------

    /// Open the penalty owed by the claimant of a frivolous claim.
    pub async fn initiate_penalty(&self, case_id: &str) -> Result<Penalty, TribunalError> {
        let lock = self.case_lock(case_id).await;

        {
            let _guard = lock.lock().await;
            if let Some(existing) = self.load_penalty(case_id).await? {
                return Ok(existing);
            }
            let case = self.load_case(case_id).await?;
            let judgment = case.effective_judgment().ok_or_else(|| {
                TribunalError::Validation("case has no judgment".to_string())
            })?;
            if !judgment.frivolous {
                return Err(TribunalError::Validation(
                    "penalty requires a frivolous judgment".to_string(),
                ));
            }
        }

        let account = match self
            .ledger_call(
                "get_or_create_account",
                self.wallet
                    .get_or_create_account(&penalty_account_name(case_id)),
            )
            .await
        {
            Ok(account) => Some(account),
            Err(err) => {
                warn!("penalty account resolution failed for case {case_id}: {err}; entering degraded mode");
                None
            }
        };

        let _guard = lock.lock().await;
        if let Some(existing) = self.load_penalty(case_id).await? {
            return Ok(existing);
        }

        let case = self.load_case(case_id).await?;
        let penalty = open_penalty(
            &case,
            self.config.frivolous_penalty_minor,
            account,
            Utc::now(),
        );
        self.save_penalty(&penalty).await?;
        self.pending_penalties
            .write()
            .await
            .insert(case_id.to_string());
        self.record_transition(case_id, "dismissed", "penalty_pending", "penalty_opened")
            .await?;
        info!(
            "penalty opened for case {case_id}: {} owed by {}",
            penalty.amount_minor, penalty.payer
        );

        Ok(penalty)
    }

    pub async fn check_penalty_funding(
        &self,
        case_id: &str,
    ) -> Result<(Penalty, FundingStatus), TribunalError> {
        let penalty = self.require_penalty(case_id).await?;
        if penalty.status != PenaltyStatus::PendingPayment {
            let status = FundingStatus::evaluate(
                penalty.amount_minor,
                penalty.deposited_minor,
                penalty.deadline,
                Utc::now(),
            );
            return Ok((penalty, status));
        }

        let balance = match &penalty.account_id {
            Some(account_id) => match self
                .ledger_call("get_balance", self.wallet.get_balance(account_id))
                .await
            {
                Ok(balance) => balance,
                Err(err) => {
                    warn!("penalty balance query failed for case {case_id}: {err}; treating as zero");
                    0
                }
            },
            None => 0,
        };

        let now = Utc::now();
        if balance < penalty.amount_minor {
            let status =
                FundingStatus::evaluate(penalty.amount_minor, balance, penalty.deadline, now);
            return Ok((penalty, status));
        }

        let lock = self.case_lock(case_id).await;
        let _guard = lock.lock().await;
        let mut penalty = self.require_penalty(case_id).await?;
        if penalty.status == PenaltyStatus::PendingPayment {
            penalty.status = PenaltyStatus::Paid;
            penalty.deposited_minor = balance;
            penalty.paid_at = Some(now);
            self.save_penalty(&penalty).await?;
            self.pending_penalties.write().await.remove(case_id);
            self.record_transition(case_id, "penalty_pending", "penalty_paid", "penalty_paid")
                .await?;
        }

        let status =
            FundingStatus::evaluate(penalty.amount_minor, penalty.deposited_minor, penalty.deadline, now);
        Ok((penalty, status))
    }

    /// Distribute a paid penalty: treasury 70%, respondent compensation 30%.
    pub async fn execute_penalty(&self, case_id: &str) -> Result<Penalty, TribunalError> {
        let lock = self.case_lock(case_id).await;

        let (account_id, plan) = {
            let _guard = lock.lock().await;
            let penalty = self.require_penalty(case_id).await?;
            if penalty.status != PenaltyStatus::Paid {
                return Err(TribunalError::NotFunded(case_id.to_string()));
            }
            if !penalty.distributions.is_empty() {
                return Err(TribunalError::AlreadyDistributed(case_id.to_string()));
            }
            let case = self.load_case(case_id).await?;
            self.claim_execution(case_id)?;
            (
                penalty.account_id.clone(),
                penalty_plan(
                    penalty.amount_minor,
                    &self.config.stakeholders.treasury_address,
                    &case.respondent,
                ),
            )
        };

        let result = self
            .run_fanout(case_id, account_id, plan, &lock, FanoutTarget::Penalty)
            .await;
        self.release_execution(case_id);

        match result {
            Ok(FanoutOutcome::Penalty(penalty)) => Ok(penalty),
            Ok(FanoutOutcome::Settlement(_)) => unreachable!("penalty fan-out returned a settlement"),
            Err(err) => Err(err),
        }
    }

    pub async fn expire_penalty(&self, case_id: &str) -> Result<Penalty, TribunalError> {
        let lock = self.case_lock(case_id).await;
        let _guard = lock.lock().await;

        let mut penalty = self.require_penalty(case_id).await?;
        if penalty.status != PenaltyStatus::PendingPayment {
            return Err(TribunalError::InvalidTransition {
                from: penalty.status.name().to_string(),
                event: "penalty_expired".to_string(),
            });
        }
        if Utc::now() <= penalty.deadline {
            return Err(TribunalError::Validation(
                "penalty deadline has not passed".to_string(),
            ));
        }

        penalty.status = PenaltyStatus::Expired;
        self.save_penalty(&penalty).await?;
        self.pending_penalties.write().await.remove(case_id);
        self.record_transition(case_id, "penalty_pending", "penalty_expired", "penalty_expired")
            .await?;

        Ok(penalty)
    }

    // ---- appeals -----------------------------------------------------------

    pub async fn file_appeal(
        &self,
        case_id: &str,
        reason: &str,
        payment: &PaymentRecord,
    ) -> Result<Case, TribunalError> {
        let lock = self.case_lock(case_id).await;
        let _guard = lock.lock().await;

        let mut case = self.load_case(case_id).await?;
        let appeal = build_appeal(&case, reason, Utc::now())?;
        case.appeal = Some(appeal);
        self.save_case(&case).await?;
        self.record_admission(case_id, payment).await?;
        self.record_audit(
            case_id,
            AuditKind::Appeal,
            serde_json::json!({"event": "appeal_filed", "reason": reason.trim()}),
        )
        .await?;
        info!("appeal filed for case {case_id}");

        Ok(case)
    }

    /// Apply an administrative appeal decision, reconciling it against a
    /// settlement that may already be in flight.
    pub async fn decide_appeal(
        &self,
        case_id: &str,
        request: AppealRequest,
    ) -> Result<CaseView, TribunalError> {
        let lock = self.case_lock(case_id).await;
        let _guard = lock.lock().await;

        let mut case = self.load_case(case_id).await?;
        let settlement = self.load_settlement(case_id).await?;
        let outcome = reconcile(&case, settlement.as_ref(), &request, Utc::now())?;

        if let Some(draft) = outcome.replacement {
            let judgment =
                seal_judgment(&case, draft, JudgmentSource::Appellate, outcome.decision.decided_at);
            case.judgments.push(judgment);
        }
        if let Some(appeal) = case.appeal.as_mut() {
            appeal.decision = Some(outcome.decision.clone());
            appeal.review_ready = false;
        }

        let settlement = match settlement {
            Some(mut settlement) => {
                if let Some(refund) = outcome.refund.clone() {
                    self.record_audit(
                        case_id,
                        AuditKind::Refund,
                        serde_json::json!({
                            "kind": refund.kind,
                            "recipient": refund.recipient,
                            "amount_minor": refund.amount_minor,
                            "compensating": refund.compensating,
                        }),
                    )
                    .await?;
                    settlement.refunds.push(refund);
                }
                if outcome.supersede_settlement {
                    settlement.status = SettlementStatus::Superseded;
                    self.pending_settlements.write().await.remove(case_id);
                }
                if let Some(new_required) = outcome.new_required_minor {
                    settlement.required_minor = new_required;
                }
                self.save_settlement(&settlement).await?;
                Some(settlement)
            }
            None => None,
        };

        self.save_case(&case).await?;
        self.record_audit(
            case_id,
            AuditKind::Appeal,
            serde_json::json!({
                "event": "appeal_decided",
                "ruling": outcome.decision.ruling,
                "new_awarded_minor": outcome.decision.new_awarded_minor,
            }),
        )
        .await?;
        info!("appeal for case {case_id} decided: {:?}", outcome.decision.ruling);

        let penalty = self.load_penalty(case_id).await?;
        Ok(CaseView {
            case,
            settlement,
            penalty,
        })
    }

    // ---- internals ---------------------------------------------------------

    async fn case_lock(&self, case_id: &str) -> Arc<AsyncMutex<()>> {
        if let Some(existing) = self.case_locks.read().await.get(case_id).cloned() {
            return existing;
        }

        let mut locks = self.case_locks.write().await;
        locks
            .entry(case_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn claim_execution(&self, case_id: &str) -> Result<(), TribunalError> {
        let mut executing = self
            .executing
            .lock()
            .map_err(|_| TribunalError::Storage("execution guard poisoned".to_string()))?;
        if !executing.insert(case_id.to_string()) {
            // A concurrent execute is already in flight; fail cleanly.
            return Err(TribunalError::AlreadyDistributed(case_id.to_string()));
        }
        Ok(())
    }

    fn release_execution(&self, case_id: &str) {
        if let Ok(mut executing) = self.executing.lock() {
            executing.remove(case_id);
        }
    }

    async fn run_fanout(
        &self,
        case_id: &str,
        account_id: Option<String>,
        plan: Vec<(RecipientRole, String, u64)>,
        lock: &Arc<AsyncMutex<()>>,
        target: FanoutTarget,
    ) -> Result<FanoutOutcome, TribunalError> {
        let account_id = account_id.ok_or_else(|| {
            TribunalError::LedgerUnavailable(format!(
                "case {case_id} is in degraded mode; no ledger account backs the escrow"
            ))
        })?;

        let mut lines = Vec::with_capacity(plan.len());
        for (role, destination, amount_minor) in plan {
            let attempt = self
                .ledger_call(
                    "transfer",
                    self.wallet.transfer(&account_id, &destination, amount_minor),
                )
                .await;
            let line = match attempt {
                Ok(receipt) if receipt.ok => Distribution {
                    role,
                    destination,
                    amount_minor,
                    status: TransferStatus::Completed,
                    tx_ref: Some(receipt.tx_ref),
                    failure: None,
                },
                Ok(receipt) => Distribution {
                    role,
                    destination,
                    amount_minor,
                    status: TransferStatus::Failed,
                    tx_ref: Some(receipt.tx_ref),
                    failure: Some("ledger reported the transfer as not ok".to_string()),
                },
                Err(err) => {
                    warn!(
                        "transfer to {} failed for case {case_id}: {err}",
                        role.name()
                    );
                    Distribution {
                        role,
                        destination,
                        amount_minor,
                        status: TransferStatus::Failed,
                        tx_ref: None,
                        failure: Some(err.to_string()),
                    }
                }
            };
            lines.push(line);
        }

        let succeeded = lines
            .iter()
            .filter(|line| line.status == TransferStatus::Completed)
            .count();
        if succeeded == 0 {
            return Err(TribunalError::LedgerUnavailable(format!(
                "all {} transfers failed for case {case_id}; distribution can be retried",
                lines.len()
            )));
        }

        let _guard = lock.lock().await;
        self.record_audit(
            case_id,
            AuditKind::Distribution,
            serde_json::to_value(&lines)?,
        )
        .await?;

        match target {
            FanoutTarget::Settlement => {
                let mut settlement = self.require_settlement(case_id).await?;
                settlement.distributions = lines;
                settlement.status = SettlementStatus::Distributed;
                self.save_settlement(&settlement).await?;

                let mut case = self.load_case(case_id).await?;
                case.status = advance(case.status, CaseEvent::DistributionCompleted)?;
                self.save_case(&case).await?;
                self.pending_settlements.write().await.remove(case_id);
                self.record_transition(case_id, "funded", "distributed", "distribution_completed")
                    .await?;
                info!(
                    "settlement for case {case_id} distributed ({succeeded}/{} transfers ok)",
                    settlement.distributions.len()
                );
                Ok(FanoutOutcome::Settlement(settlement))
            }
            FanoutTarget::Penalty => {
                let mut penalty = self.require_penalty(case_id).await?;
                penalty.distributions = lines;
                self.save_penalty(&penalty).await?;
                info!(
                    "penalty for case {case_id} distributed ({succeeded}/{} transfers ok)",
                    penalty.distributions.len()
                );
                Ok(FanoutOutcome::Penalty(penalty))
            }
        }
    }

    async fn ledger_call<T, F>(&self, operation: &str, call: F) -> Result<T, TribunalError>
    where
        F: Future<Output = Result<T, TribunalError>>,
    {
        match tokio::time::timeout(self.config.collaborator_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(TribunalError::LedgerUnavailable(format!(
                "{operation} timed out"
            ))),
        }
    }

    async fn load_case(&self, case_id: &str) -> Result<Case, TribunalError> {
        self.store
            .get_record(&case_key(case_id))
            .await?
            .ok_or_else(|| TribunalError::NotFound(format!("case {case_id}")))
    }

    async fn save_case(&self, case: &Case) -> Result<(), TribunalError> {
        self.store.put_record(&case_key(&case.case_id), case).await
    }

    async fn load_settlement(&self, case_id: &str) -> Result<Option<Settlement>, TribunalError> {
        self.store.get_record(&settlement_key(case_id)).await
    }

    async fn require_settlement(&self, case_id: &str) -> Result<Settlement, TribunalError> {
        self.load_settlement(case_id)
            .await?
            .ok_or_else(|| TribunalError::NotFound(format!("settlement for case {case_id}")))
    }

    async fn save_settlement(&self, settlement: &Settlement) -> Result<(), TribunalError> {
        self.store
            .put_record(&settlement_key(&settlement.case_id), settlement)
            .await
    }

    async fn load_penalty(&self, case_id: &str) -> Result<Option<Penalty>, TribunalError> {
        self.store.get_record(&penalty_key(case_id)).await
    }

    async fn require_penalty(&self, case_id: &str) -> Result<Penalty, TribunalError> {
        self.load_penalty(case_id)
            .await?
            .ok_or_else(|| TribunalError::NotFound(format!("penalty for case {case_id}")))
    }

    async fn save_penalty(&self, penalty: &Penalty) -> Result<(), TribunalError> {
        self.store
            .put_record(&penalty_key(&penalty.case_id), penalty)
            .await
    }

    async fn record_admission(
        &self,
        case_id: &str,
        payment: &PaymentRecord,
    ) -> Result<(), TribunalError> {
        self.record_audit(case_id, AuditKind::Admission, serde_json::to_value(payment)?)
            .await
    }

    async fn record_transition(
        &self,
        case_id: &str,
        from: &str,
        to: &str,
        event: &str,
    ) -> Result<(), TribunalError> {
        self.record_audit(
            case_id,
            AuditKind::Transition,
            serde_json::json!({"from": from, "to": to, "event": event}),
        )
        .await
    }

    async fn record_audit(
        &self,
        case_id: &str,
        kind: AuditKind,
        payload: serde_json::Value,
    ) -> Result<(), TribunalError> {
        let mut audit = self.audit.lock().await;
        audit.append(case_id, kind, payload)?;
        Ok(())
    }
}

enum FanoutTarget {
    Settlement,
    Penalty,
}

enum FanoutOutcome {
    Settlement(Settlement),
    Penalty(Penalty),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::JudgmentDraft;
    use crate::wallet::{LedgerAccount, TransferReceipt};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// In-memory wallet ledger with toggleable unavailability.
    struct TestLedger {
        accounts: StdMutex<HashMap<String, LedgerAccount>>,
        balances: StdMutex<HashMap<String, u64>>,
        unavailable: AtomicBool,
    }

    impl TestLedger {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                accounts: StdMutex::new(HashMap::new()),
                balances: StdMutex::new(HashMap::new()),
                unavailable: AtomicBool::new(false),
            })
        }

        fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, Ordering::SeqCst);
        }

        fn deposit(&self, account_id: &str, amount_minor: u64) {
            let mut balances = self.balances.lock().unwrap();
            *balances.entry(account_id.to_string()).or_insert(0) += amount_minor;
        }

        fn check_available(&self) -> Result<(), TribunalError> {
            if self.unavailable.load(Ordering::SeqCst) {
                Err(TribunalError::LedgerUnavailable(
                    "test ledger offline".to_string(),
                ))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl WalletLedger for TestLedger {
        async fn get_or_create_account(&self, name: &str) -> Result<LedgerAccount, TribunalError> {
            self.check_available()?;
            let mut accounts = self.accounts.lock().unwrap();
            let account = accounts
                .entry(name.to_string())
                .or_insert_with(|| LedgerAccount {
                    id: format!("acct-{name}"),
                    address: format!("addr-{name}"),
                })
                .clone();
            Ok(account)
        }

        async fn get_balance(&self, account_id: &str) -> Result<u64, TribunalError> {
            self.check_available()?;
            Ok(*self.balances.lock().unwrap().get(account_id).unwrap_or(&0))
        }

        async fn transfer(
            &self,
            from_account_id: &str,
            _to_address: &str,
            amount_minor: u64,
        ) -> Result<TransferReceipt, TribunalError> {
            self.check_available()?;
            let mut balances = self.balances.lock().unwrap();
            let balance = balances.entry(from_account_id.to_string()).or_insert(0);
            if *balance < amount_minor {
                return Ok(TransferReceipt {
                    tx_ref: format!("tx-{}", Uuid::new_v4()),
                    ok: false,
                });
            }
            *balance -= amount_minor;
            Ok(TransferReceipt {
                tx_ref: format!("tx-{}", Uuid::new_v4()),
                ok: true,
            })
        }
    }

    /// Deterministic judge returning a fixed draft.
    struct TestJudge {
        verdict: Verdict,
        frivolous: bool,
        awarded_minor: u64,
    }

    impl TestJudge {
        fn liable(awarded_minor: u64) -> Arc<Self> {
            Arc::new(Self {
                verdict: Verdict::Liable,
                frivolous: false,
                awarded_minor,
            })
        }

        fn not_liable() -> Arc<Self> {
            Arc::new(Self {
                verdict: Verdict::NotLiable,
                frivolous: false,
                awarded_minor: 0,
            })
        }

        fn frivolous() -> Arc<Self> {
            Arc::new(Self {
                verdict: Verdict::NotLiable,
                frivolous: true,
                awarded_minor: 0,
            })
        }
    }

    #[async_trait]
    impl JudgingAdapter for TestJudge {
        async fn judge(&self, _case: &Case) -> Result<JudgmentDraft, TribunalError> {
            Ok(JudgmentDraft {
                verdict: self.verdict,
                frivolous: self.frivolous,
                awarded_minor: self.awarded_minor,
                reasoning: "deterministic test verdict".to_string(),
                citations: vec!["precedent-001".to_string()],
            })
        }
    }

    struct FailingJudge;

    #[async_trait]
    impl JudgingAdapter for FailingJudge {
        async fn judge(&self, _case: &Case) -> Result<JudgmentDraft, TribunalError> {
            Err(TribunalError::AdapterFailure(
                "decision service unreachable".to_string(),
            ))
        }
    }

    fn payment(sender: &str, amount_minor: u64) -> PaymentRecord {
        PaymentRecord {
            sender: sender.to_string(),
            amount_minor,
            timestamp: Utc::now(),
            endpoint: "POST /cases".to_string(),
        }
    }

    fn filing(requested_minor: u64) -> CaseFiling {
        CaseFiling {
            respondent: "addr-respondent".to_string(),
            category: "contract_breach".to_string(),
            evidence: serde_json::json!({"description": "unpaid invoice #77"}),
            requested_minor,
        }
    }

    async fn engine_with(
        wallet: Arc<dyn WalletLedger>,
        judge: Arc<dyn JudgingAdapter>,
    ) -> TribunalEngine {
        TribunalEngine::bootstrap(EngineConfig::default(), wallet, judge)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn liable_case_flows_file_judge_fund_distribute() {
        let ledger = TestLedger::new();
        let engine = engine_with(ledger.clone(), TestJudge::liable(500_000)).await;

        // File with requested damages of 1.0; the judge awards 0.5.
        let case = engine
            .file_case(filing(1_000_000), &payment("addr-claimant", 1_000_000))
            .await
            .unwrap();
        assert_eq!(case.status, CaseStatus::Filed);
        assert!(!case.evidence_hash.is_empty());

        let case = engine
            .request_judgment(&case.case_id, &payment("addr-claimant", 2_000_000))
            .await
            .unwrap();
        assert_eq!(case.status, CaseStatus::SettlementPending);
        let judgment = case.effective_judgment().unwrap();
        assert_eq!(judgment.awarded_minor, 500_000);
        assert_eq!(judgment.source, JudgmentSource::Adapter);

        let (settlement, funding) = engine.check_funding(&case.case_id).await.unwrap();
        assert!(!funding.funded);
        assert_eq!(funding.remaining_minor, 500_000);
        assert!(!funding.deadline_passed);
        assert_eq!(funding.days_remaining, 7);

        // Respondent deposits exactly the required amount.
        ledger.deposit(settlement.escrow_account_id.as_deref().unwrap(), 500_000);
        let (settlement, funding) = engine.check_funding(&case.case_id).await.unwrap();
        assert!(funding.funded);
        assert_eq!(settlement.status, SettlementStatus::Funded);

        let settlement = engine.execute_settlement(&case.case_id).await.unwrap();
        assert_eq!(settlement.status, SettlementStatus::Distributed);
        let amounts: Vec<u64> = settlement
            .distributions
            .iter()
            .map(|line| line.amount_minor)
            .collect();
        assert_eq!(amounts, vec![375_000, 75_000, 25_000, 25_000]);
        assert!(settlement
            .distributions
            .iter()
            .all(|line| line.status == TransferStatus::Completed));

        let case = engine.get_case(&case.case_id).await.unwrap();
        assert_eq!(case.status, CaseStatus::Distributed);
        assert!(engine.verify_audit_chain().await);
    }

    #[tokio::test]
    async fn initiate_twice_returns_the_same_settlement() {
        let ledger = TestLedger::new();
        let engine = engine_with(ledger, TestJudge::liable(500_000)).await;

        let case = engine
            .file_case(filing(1_000_000), &payment("addr-claimant", 1_000_000))
            .await
            .unwrap();
        engine
            .request_judgment(&case.case_id, &payment("addr-claimant", 2_000_000))
            .await
            .unwrap();

        let first = engine.initiate_settlement(&case.case_id).await.unwrap();
        let second = engine.initiate_settlement(&case.case_id).await.unwrap();
        assert_eq!(first.escrow_address, second.escrow_address);
        assert_eq!(first.required_minor, second.required_minor);
        assert_eq!(first.created_at, second.created_at);
    }

    #[tokio::test]
    async fn ledger_outage_creates_degraded_settlement() {
        let ledger = TestLedger::new();
        ledger.set_unavailable(true);
        let engine = engine_with(ledger.clone(), TestJudge::liable(500_000)).await;

        let case = engine
            .file_case(filing(1_000_000), &payment("addr-claimant", 1_000_000))
            .await
            .unwrap();
        let case = engine
            .request_judgment(&case.case_id, &payment("addr-claimant", 2_000_000))
            .await
            .unwrap();
        assert_eq!(case.status, CaseStatus::SettlementPending);

        let (settlement, funding) = engine.check_funding(&case.case_id).await.unwrap();
        assert!(settlement.degraded);
        assert!(settlement.escrow_account_id.is_none());
        assert!(settlement.escrow_address.starts_with("degraded-escrow-"));
        assert!(!funding.funded);
    }

    #[tokio::test]
    async fn execute_requires_funding_and_rejects_repeats() {
        let ledger = TestLedger::new();
        let engine = engine_with(ledger.clone(), TestJudge::liable(500_000)).await;

        let case = engine
            .file_case(filing(1_000_000), &payment("addr-claimant", 1_000_000))
            .await
            .unwrap();
        engine
            .request_judgment(&case.case_id, &payment("addr-claimant", 2_000_000))
            .await
            .unwrap();

        let err = engine.execute_settlement(&case.case_id).await.unwrap_err();
        assert!(matches!(err, TribunalError::NotFunded(_)));

        let (settlement, _) = engine.check_funding(&case.case_id).await.unwrap();
        ledger.deposit(settlement.escrow_account_id.as_deref().unwrap(), 500_000);
        engine.check_funding(&case.case_id).await.unwrap();
        engine.execute_settlement(&case.case_id).await.unwrap();

        let err = engine.execute_settlement(&case.case_id).await.unwrap_err();
        assert!(matches!(err, TribunalError::AlreadyDistributed(_)));
    }

    #[tokio::test]
    async fn adapter_failure_falls_back_to_conservative_judgment() {
        let ledger = TestLedger::new();
        let engine = engine_with(ledger, Arc::new(FailingJudge)).await;

        let case = engine
            .file_case(filing(1_000_000), &payment("addr-claimant", 1_000_000))
            .await
            .unwrap();
        let case = engine
            .request_judgment(&case.case_id, &payment("addr-claimant", 2_000_000))
            .await
            .unwrap();

        assert_eq!(case.status, CaseStatus::Dismissed);
        let judgment = case.effective_judgment().unwrap();
        assert_eq!(judgment.verdict, Verdict::NotLiable);
        assert_eq!(judgment.awarded_minor, 0);
        assert_eq!(judgment.source, JudgmentSource::Fallback);
    }

    #[tokio::test]
    async fn frivolous_claim_opens_penalty_owed_by_claimant() {
        let ledger = TestLedger::new();
        let engine = engine_with(ledger.clone(), TestJudge::frivolous()).await;

        let case = engine
            .file_case(filing(1_000_000), &payment("addr-claimant", 1_000_000))
            .await
            .unwrap();
        let case = engine
            .request_judgment(&case.case_id, &payment("addr-claimant", 2_000_000))
            .await
            .unwrap();
        assert_eq!(case.status, CaseStatus::Dismissed);

        let (penalty, funding) = engine.check_penalty_funding(&case.case_id).await.unwrap();
        assert_eq!(penalty.payer, "addr-claimant");
        assert_eq!(penalty.amount_minor, 25_000_000);
        assert!(!funding.funded);

        ledger.deposit(penalty.account_id.as_deref().unwrap(), 25_000_000);
        let (penalty, funding) = engine.check_penalty_funding(&case.case_id).await.unwrap();
        assert!(funding.funded);
        assert_eq!(penalty.status, PenaltyStatus::Paid);

        let penalty = engine.execute_penalty(&case.case_id).await.unwrap();
        let amounts: Vec<u64> = penalty
            .distributions
            .iter()
            .map(|line| line.amount_minor)
            .collect();
        assert_eq!(amounts, vec![17_500_000, 7_500_000]);
        assert_eq!(penalty.distributions[1].destination, "addr-respondent");

        let err = engine.execute_penalty(&case.case_id).await.unwrap_err();
        assert!(matches!(err, TribunalError::AlreadyDistributed(_)));
    }

    #[tokio::test]
    async fn dismissed_case_has_no_settlement() {
        let ledger = TestLedger::new();
        let engine = engine_with(ledger, TestJudge::not_liable()).await;

        let case = engine
            .file_case(filing(1_000_000), &payment("addr-claimant", 1_000_000))
            .await
            .unwrap();
        let case = engine
            .request_judgment(&case.case_id, &payment("addr-claimant", 2_000_000))
            .await
            .unwrap();
        assert_eq!(case.status, CaseStatus::Dismissed);

        let err = engine.check_funding(&case.case_id).await.unwrap_err();
        assert!(matches!(err, TribunalError::NotFound(_)));
        let view = engine.case_view(&case.case_id).await.unwrap();
        assert!(view.settlement.is_none());
        assert!(view.penalty.is_none());
    }

    #[tokio::test]
    async fn filing_rejects_self_disputes_and_missing_fields() {
        let ledger = TestLedger::new();
        let engine = engine_with(ledger, TestJudge::liable(1)).await;

        let mut self_dispute = filing(1_000_000);
        self_dispute.respondent = "addr-claimant".to_string();
        let err = engine
            .file_case(self_dispute, &payment("addr-claimant", 1_000_000))
            .await
            .unwrap_err();
        assert!(matches!(err, TribunalError::Validation(_)));

        let mut missing = filing(1_000_000);
        missing.respondent = "  ".to_string();
        let err = engine
            .file_case(missing, &payment("addr-claimant", 1_000_000))
            .await
            .unwrap_err();
        assert!(matches!(err, TribunalError::Validation(_)));

        let mut no_evidence = filing(1_000_000);
        no_evidence.evidence = serde_json::Value::Null;
        let err = engine
            .file_case(no_evidence, &payment("addr-claimant", 1_000_000))
            .await
            .unwrap_err();
        assert!(matches!(err, TribunalError::Validation(_)));
    }

    #[tokio::test]
    async fn upheld_appeal_leaves_settlement_untouched() {
        let ledger = TestLedger::new();
        let engine = engine_with(ledger.clone(), TestJudge::liable(500_000)).await;

        let case = engine
            .file_case(filing(1_000_000), &payment("addr-claimant", 1_000_000))
            .await
            .unwrap();
        engine
            .request_judgment(&case.case_id, &payment("addr-claimant", 2_000_000))
            .await
            .unwrap();
        let before = engine.check_funding(&case.case_id).await.unwrap().0;

        engine
            .file_appeal(
                &case.case_id,
                "the evidence was misweighed throughout",
                &payment("addr-respondent", 5_000_000),
            )
            .await
            .unwrap();
        let view = engine
            .decide_appeal(&case.case_id, AppealRequest::Upheld)
            .await
            .unwrap();

        let after = view.settlement.unwrap();
        assert_eq!(after.status, before.status);
        assert_eq!(after.required_minor, before.required_minor);
        assert!(after.refunds.is_empty());
        assert!(after.distributions.is_empty());
    }

    #[tokio::test]
    async fn overturned_appeal_after_distribution_records_compensating_refund() {
        let ledger = TestLedger::new();
        let engine = engine_with(ledger.clone(), TestJudge::liable(500_000)).await;

        let case = engine
            .file_case(filing(1_000_000), &payment("addr-claimant", 1_000_000))
            .await
            .unwrap();
        engine
            .request_judgment(&case.case_id, &payment("addr-claimant", 2_000_000))
            .await
            .unwrap();
        let (settlement, _) = engine.check_funding(&case.case_id).await.unwrap();
        ledger.deposit(settlement.escrow_account_id.as_deref().unwrap(), 500_000);
        engine.check_funding(&case.case_id).await.unwrap();
        engine.execute_settlement(&case.case_id).await.unwrap();

        engine
            .file_appeal(
                &case.case_id,
                "the respondent was never served notice",
                &payment("addr-respondent", 5_000_000),
            )
            .await
            .unwrap();
        let view = engine
            .decide_appeal(&case.case_id, AppealRequest::Overturned)
            .await
            .unwrap();

        let settlement = view.settlement.unwrap();
        // Already-sent funds are not rewound; a compensating obligation is
        // recorded instead.
        assert_eq!(settlement.status, SettlementStatus::Distributed);
        assert_eq!(settlement.refunds.len(), 1);
        let refund = &settlement.refunds[0];
        assert_eq!(refund.amount_minor, 500_000);
        assert!(refund.compensating);
        assert_eq!(refund.recipient, "addr-respondent");

        let effective = view.case.effective_judgment().unwrap();
        assert_eq!(effective.verdict, Verdict::NotLiable);
        assert_eq!(effective.source, JudgmentSource::Appellate);
        // The original judgment is retained for audit.
        assert_eq!(view.case.judgments.len(), 2);

        let err = engine
            .decide_appeal(&case.case_id, AppealRequest::Upheld)
            .await
            .unwrap_err();
        assert!(matches!(err, TribunalError::AlreadyDecided(_)));
    }

    #[tokio::test]
    async fn modified_appeal_before_distribution_supersedes_required_amount() {
        let ledger = TestLedger::new();
        let engine = engine_with(ledger, TestJudge::liable(500_000)).await;

        let case = engine
            .file_case(filing(1_000_000), &payment("addr-claimant", 1_000_000))
            .await
            .unwrap();
        engine
            .request_judgment(&case.case_id, &payment("addr-claimant", 2_000_000))
            .await
            .unwrap();

        engine
            .file_appeal(
                &case.case_id,
                "damages were computed from the wrong invoice",
                &payment("addr-respondent", 5_000_000),
            )
            .await
            .unwrap();
        let view = engine
            .decide_appeal(
                &case.case_id,
                AppealRequest::Modified {
                    new_verdict: None,
                    new_awarded_minor: Some(300_000),
                },
            )
            .await
            .unwrap();

        let settlement = view.settlement.unwrap();
        assert_eq!(settlement.required_minor, 300_000);
        assert_eq!(settlement.refunds.len(), 1);
        assert_eq!(settlement.refunds[0].amount_minor, 200_000);
        assert!(!settlement.refunds[0].compensating);
    }

    #[tokio::test]
    async fn decide_without_appeal_fails_no_appeal() {
        let ledger = TestLedger::new();
        let engine = engine_with(ledger, TestJudge::liable(500_000)).await;

        let case = engine
            .file_case(filing(1_000_000), &payment("addr-claimant", 1_000_000))
            .await
            .unwrap();
        let err = engine
            .decide_appeal(&case.case_id, AppealRequest::Upheld)
            .await
            .unwrap_err();
        assert!(matches!(err, TribunalError::NoAppeal(_)));
    }

    #[tokio::test]
    async fn pending_index_is_rebuilt_from_persisted_settlements() {
        let store = DocumentStore::bootstrap(StoreConfig::Memory).await.unwrap();
        let pending = Settlement {
            case_id: "case-pending".to_string(),
            escrow_account_id: Some("acct".to_string()),
            escrow_address: "addr-escrow".to_string(),
            degraded: false,
            required_minor: 100,
            deposited_minor: 0,
            status: SettlementStatus::PendingPayment,
            created_at: Utc::now(),
            deadline: Utc::now(),
            funded_at: None,
            memo: String::new(),
            distributions: Vec::new(),
            refunds: Vec::new(),
        };
        store
            .put_record(&settlement_key("case-pending"), &pending)
            .await
            .unwrap();
        let mut done = pending.clone();
        done.case_id = "case-done".to_string();
        done.status = SettlementStatus::Distributed;
        store
            .put_record(&settlement_key("case-done"), &done)
            .await
            .unwrap();

        let engine = TribunalEngine::with_store(
            store,
            EngineConfig::default(),
            TestLedger::new(),
            TestJudge::liable(1),
        )
        .await
        .unwrap();

        assert_eq!(engine.pending_settlements().await, vec!["case-pending"]);
    }

    #[tokio::test]
    async fn expire_rejects_unpassed_deadlines() {
        let ledger = TestLedger::new();
        let engine = engine_with(ledger, TestJudge::liable(500_000)).await;

        let case = engine
            .file_case(filing(1_000_000), &payment("addr-claimant", 1_000_000))
            .await
            .unwrap();
        engine
            .request_judgment(&case.case_id, &payment("addr-claimant", 2_000_000))
            .await
            .unwrap();

        let err = engine.expire_settlement(&case.case_id).await.unwrap_err();
        assert!(matches!(err, TribunalError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_case_fails_not_found() {
        let ledger = TestLedger::new();
        let engine = engine_with(ledger, TestJudge::liable(1)).await;

        let err = engine.get_case("missing").await.unwrap_err();
        assert!(matches!(err, TribunalError::NotFound(_)));
        let err = engine
            .request_judgment("missing", &payment("addr-x", 2_000_000))
            .await
            .unwrap_err();
        assert!(matches!(err, TribunalError::NotFound(_)));
    }
}
