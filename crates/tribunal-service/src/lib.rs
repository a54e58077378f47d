#![deny(unsafe_code)]

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tribunal_adapters::{FixedRuleJudge, MockWalletLedger};
use tribunal_core::{
    parse_amount_value, AdmissionGate, Appeal, AppealRequest, CaseFiling, CaseStatus, CaseView,
    EngineConfig, FundingStatus, JudgingAdapter, Judgment, Penalty, PriceSchedule, PricedEndpoint,
    Settlement, TribunalEngine, TribunalError, Verdict, WalletLedger, PAYMENT_PROOF_HEADER,
};

#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub engine: EngineConfig,
    pub schedule: PriceSchedule,
}

#[derive(Clone)]
pub struct ServiceState {
    pub engine: Arc<TribunalEngine>,
    pub gate: AdmissionGate,
}

impl ServiceState {
    /// Bootstrap with the deterministic in-process collaborators. Real wallet
    /// custody and judging services slot in through `bootstrap_with`.
    pub async fn bootstrap(config: ServiceConfig) -> Result<Self, TribunalError> {
        let wallet = Arc::new(MockWalletLedger::new());
        let judge = Arc::new(FixedRuleJudge::liable(50));
        Self::bootstrap_with(config, wallet, judge).await
    }

    pub async fn bootstrap_with(
        config: ServiceConfig,
        wallet: Arc<dyn WalletLedger>,
        judge: Arc<dyn JudgingAdapter>,
    ) -> Result<Self, TribunalError> {
        let gate = AdmissionGate::new(
            config.schedule.clone(),
            config.engine.stakeholders.treasury_address.clone(),
        );
        let engine = TribunalEngine::bootstrap(config.engine, wallet, judge).await?;

        Ok(Self {
            engine: Arc::new(engine),
            gate,
        })
    }
}

pub fn build_router(state: ServiceState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/cases", post(file_case))
        .route("/cases/:id", get(get_case))
        .route("/cases/:id/judgment", post(request_judgment))
        .route("/cases/:id/settlement", get(get_settlement))
        .route("/cases/:id/settlement/execute", post(execute_settlement))
        .route("/cases/:id/penalty", get(get_penalty))
        .route("/cases/:id/penalty/execute", post(execute_penalty))
        .route("/cases/:id/appeal", post(file_appeal))
        .route("/cases/:id/appeal/decide", post(decide_appeal))
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] TribunalError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Core(err) = self;
        let status = match &err {
            TribunalError::Validation(_) | TribunalError::InvalidProof(_) => {
                StatusCode::BAD_REQUEST
            }
            TribunalError::PaymentRequired { .. } => StatusCode::PAYMENT_REQUIRED,
            TribunalError::NotFound(_) | TribunalError::NoAppeal(_) => StatusCode::NOT_FOUND,
            TribunalError::InvalidTransition { .. }
            | TribunalError::NotFunded(_)
            | TribunalError::AlreadyDistributed(_)
            | TribunalError::AlreadyDecided(_) => StatusCode::CONFLICT,
            TribunalError::AdapterFailure(_) => StatusCode::BAD_GATEWAY,
            TribunalError::LedgerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            TribunalError::Storage(_) | TribunalError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let mut body = serde_json::json!({
            "error": {
                "kind": err.kind(),
                "message": err.to_string(),
            }
        });
        // 402 additionally carries the price and a destination so the client
        // can retry with proof attached.
        if let TribunalError::PaymentRequired {
            required_minor,
            pay_to,
        } = &err
        {
            body["error"]["required_amount_minor"] = serde_json::json!(required_minor);
            body["error"]["pay_to"] = serde_json::json!(pay_to);
        }

        (status, Json(body)).into_response()
    }
}

fn proof_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(PAYMENT_PROOF_HEADER)
        .and_then(|value| value.to_str().ok())
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    storage_backend: &'static str,
}

async fn health(State(state): State<ServiceState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "tribunal-service",
        storage_backend: state.engine.store_backend(),
    })
}

#[derive(Debug, Clone, Deserialize)]
struct FileCaseBody {
    respondent: Option<String>,
    category: Option<String>,
    evidence: Option<Value>,
    requested_damages: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
struct FileCaseResponse {
    case_id: String,
    evidence_hash: String,
}

async fn file_case(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(body): Json<FileCaseBody>,
) -> Result<Json<FileCaseResponse>, ApiError> {
    let payment = state
        .gate
        .authorize(PricedEndpoint::FileCase, proof_header(&headers))?;

    let respondent = require_field(body.respondent, "respondent")?;
    let category = require_field(body.category, "category")?;
    let evidence = body
        .evidence
        .ok_or_else(|| TribunalError::Validation("evidence is required".to_string()))?;
    let requested = body
        .requested_damages
        .ok_or_else(|| TribunalError::Validation("requested_damages is required".to_string()))?;
    let requested_minor = parse_amount_value(&requested)?;

    let case = state
        .engine
        .file_case(
            CaseFiling {
                respondent,
                category,
                evidence,
                requested_minor,
            },
            &payment,
        )
        .await?;

    Ok(Json(FileCaseResponse {
        case_id: case.case_id,
        evidence_hash: case.evidence_hash,
    }))
}

#[derive(Debug, Clone, Serialize)]
struct JudgmentResponse {
    case_id: String,
    status: CaseStatus,
    judgment: Judgment,
    verdict_hash: String,
}

async fn request_judgment(
    State(state): State<ServiceState>,
    Path(case_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<JudgmentResponse>, ApiError> {
    let payment = state
        .gate
        .authorize(PricedEndpoint::RequestJudgment, proof_header(&headers))?;

    let case = state.engine.request_judgment(&case_id, &payment).await?;
    let judgment = case
        .effective_judgment()
        .cloned()
        .ok_or_else(|| TribunalError::Storage("judged case has no judgment".to_string()))?;

    Ok(Json(JudgmentResponse {
        case_id: case.case_id,
        status: case.status,
        verdict_hash: judgment.verdict_hash.clone(),
        judgment,
    }))
}

async fn get_case(
    State(state): State<ServiceState>,
    Path(case_id): Path<String>,
) -> Result<Json<CaseView>, ApiError> {
    Ok(Json(state.engine.case_view(&case_id).await?))
}

#[derive(Debug, Clone, Serialize)]
struct SettlementResponse {
    settlement: Settlement,
    funding: FundingStatus,
}

async fn get_settlement(
    State(state): State<ServiceState>,
    Path(case_id): Path<String>,
) -> Result<Json<SettlementResponse>, ApiError> {
    let (settlement, funding) = state.engine.check_funding(&case_id).await?;
    Ok(Json(SettlementResponse {
        settlement,
        funding,
    }))
}

#[derive(Debug, Clone, Serialize)]
struct ExecuteSettlementResponse {
    settlement: Settlement,
}

async fn execute_settlement(
    State(state): State<ServiceState>,
    Path(case_id): Path<String>,
) -> Result<Json<ExecuteSettlementResponse>, ApiError> {
    let settlement = state.engine.execute_settlement(&case_id).await?;
    Ok(Json(ExecuteSettlementResponse { settlement }))
}

#[derive(Debug, Clone, Serialize)]
struct PenaltyResponse {
    penalty: Penalty,
    funding: FundingStatus,
}

async fn get_penalty(
    State(state): State<ServiceState>,
    Path(case_id): Path<String>,
) -> Result<Json<PenaltyResponse>, ApiError> {
    let (penalty, funding) = state.engine.check_penalty_funding(&case_id).await?;
    Ok(Json(PenaltyResponse { penalty, funding }))
}

#[derive(Debug, Clone, Serialize)]
struct ExecutePenaltyResponse {
    penalty: Penalty,
}

async fn execute_penalty(
    State(state): State<ServiceState>,
    Path(case_id): Path<String>,
) -> Result<Json<ExecutePenaltyResponse>, ApiError> {
    let penalty = state.engine.execute_penalty(&case_id).await?;
    Ok(Json(ExecutePenaltyResponse { penalty }))
}

#[derive(Debug, Clone, Deserialize)]
struct AppealBody {
    reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct AppealResponse {
    case_id: String,
    appeal: Appeal,
}

async fn file_appeal(
    State(state): State<ServiceState>,
    Path(case_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<AppealBody>,
) -> Result<Json<AppealResponse>, ApiError> {
    let payment = state
        .gate
        .authorize(PricedEndpoint::FileAppeal, proof_header(&headers))?;
    let reason = require_field(body.reason, "reason")?;

    let case = state.engine.file_appeal(&case_id, &reason, &payment).await?;
    let appeal = case
        .appeal
        .clone()
        .ok_or_else(|| TribunalError::Storage("filed appeal is missing".to_string()))?;

    Ok(Json(AppealResponse {
        case_id: case.case_id,
        appeal,
    }))
}

#[derive(Debug, Clone, Deserialize)]
struct DecideAppealBody {
    decision: Option<String>,
    new_verdict: Option<String>,
    new_amount: Option<Value>,
}

async fn decide_appeal(
    State(state): State<ServiceState>,
    Path(case_id): Path<String>,
    Json(body): Json<DecideAppealBody>,
) -> Result<Json<CaseView>, ApiError> {
    let decision = require_field(body.decision, "decision")?;
    let request = match decision.as_str() {
        "upheld" => AppealRequest::Upheld,
        "overturned" => AppealRequest::Overturned,
        "modified" => {
            let new_verdict = match body.new_verdict.as_deref() {
                None => None,
                Some("liable") => Some(Verdict::Liable),
                Some("not_liable") => Some(Verdict::NotLiable),
                Some(other) => {
                    return Err(TribunalError::Validation(format!(
                        "invalid new_verdict '{other}'; expected liable or not_liable"
                    ))
                    .into())
                }
            };
            let new_awarded_minor = body
                .new_amount
                .as_ref()
                .map(parse_amount_value)
                .transpose()?;
            AppealRequest::Modified {
                new_verdict,
                new_awarded_minor,
            }
        }
        other => {
            return Err(TribunalError::Validation(format!(
                "invalid decision '{other}'; expected one of: upheld, overturned, modified"
            ))
            .into())
        }
    };

    Ok(Json(state.engine.decide_appeal(&case_id, request).await?))
}

fn require_field(value: Option<String>, name: &str) -> Result<String, TribunalError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(TribunalError::Validation(format!("{name} is required"))),
    }
}
