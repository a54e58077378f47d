use crate::error::TribunalError;
use crate::types::{parse_amount_minor, PaymentProof, PaymentRecord};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::sync::Arc;

/// Header carrying the base64-encoded payment proof.
pub const PAYMENT_PROOF_HEADER: &str = "x-payment-proof";

/// State-advancing endpoints that require proof of payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricedEndpoint {
    FileCase,
    RequestJudgment,
    FileAppeal,
}

impl PricedEndpoint {
    pub fn route(self) -> &'static str {
        match self {
            Self::FileCase => "POST /cases",
            Self::RequestJudgment => "POST /cases/{id}/judgment",
            Self::FileAppeal => "POST /cases/{id}/appeal",
        }
    }
}

/// Fee schedule in minor units.
#[derive(Debug, Clone)]
pub struct PriceSchedule {
    pub file_case_minor: u64,
    pub request_judgment_minor: u64,
    pub file_appeal_minor: u64,
}

impl Default for PriceSchedule {
    fn default() -> Self {
        Self {
            // 1.00 to file, 2.00 to judge, 5.00 to appeal.
            file_case_minor: 1_000_000,
            request_judgment_minor: 2_000_000,
            file_appeal_minor: 5_000_000,
        }
    }
}

impl PriceSchedule {
    pub fn price(&self, endpoint: PricedEndpoint) -> u64 {
        match endpoint {
            PricedEndpoint::FileCase => self.file_case_minor,
            PricedEndpoint::RequestJudgment => self.request_judgment_minor,
            PricedEndpoint::FileAppeal => self.file_appeal_minor,
        }
    }
}

/// Proof verification boundary.
///
/// The default implementation decodes and checks the proof offline; a real
/// settlement verifier can replace it without changing gate call sites.
pub trait ProofVerifier: Send + Sync {
    fn verify(
        &self,
        endpoint: PricedEndpoint,
        required_minor: u64,
        header: &str,
    ) -> Result<PaymentRecord, TribunalError>;
}

/// Offline verifier: structural checks only, no external settlement lookup.
#[derive(Debug, Clone, Default)]
pub struct OfflineProofVerifier;

impl ProofVerifier for OfflineProofVerifier {
    fn verify(
        &self,
        endpoint: PricedEndpoint,
        required_minor: u64,
        header: &str,
    ) -> Result<PaymentRecord, TribunalError> {
        let bytes = BASE64
            .decode(header.trim())
            .map_err(|e| TribunalError::InvalidProof(format!("not base64: {e}")))?;
        let proof: PaymentProof = serde_json::from_slice(&bytes)
            .map_err(|e| TribunalError::InvalidProof(format!("malformed proof payload: {e}")))?;

        if proof.from.trim().is_empty() {
            return Err(TribunalError::InvalidProof(
                "proof sender is empty".to_string(),
            ));
        }

        let amount_minor = parse_amount_minor(&proof.amount)
            .map_err(|e| TribunalError::InvalidProof(format!("bad proof amount: {e}")))?;
        if amount_minor < required_minor {
            return Err(TribunalError::InvalidProof(format!(
                "proof amount {amount_minor} below required {required_minor}"
            )));
        }

        Ok(PaymentRecord {
            sender: proof.from.trim().to_string(),
            amount_minor,
            timestamp: proof.timestamp,
            endpoint: endpoint.route().to_string(),
        })
    }
}

/// Stateless admission gate in front of all state-advancing routes.
///
/// Missing proof fails with the required amount and a destination so clients
/// can retry with proof attached.
#[derive(Clone)]
pub struct AdmissionGate {
    schedule: PriceSchedule,
    pay_to: String,
    verifier: Arc<dyn ProofVerifier>,
}

impl AdmissionGate {
    pub fn new(schedule: PriceSchedule, pay_to: impl Into<String>) -> Self {
        Self {
            schedule,
            pay_to: pay_to.into(),
            verifier: Arc::new(OfflineProofVerifier),
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn ProofVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn price(&self, endpoint: PricedEndpoint) -> u64 {
        self.schedule.price(endpoint)
    }

    pub fn pay_to(&self) -> &str {
        &self.pay_to
    }

    pub fn authorize(
        &self,
        endpoint: PricedEndpoint,
        header: Option<&str>,
    ) -> Result<PaymentRecord, TribunalError> {
        let required_minor = self.schedule.price(endpoint);
        let header = header.ok_or_else(|| TribunalError::PaymentRequired {
            required_minor,
            pay_to: self.pay_to.clone(),
        })?;

        self.verifier.verify(endpoint, required_minor, header)
    }
}
