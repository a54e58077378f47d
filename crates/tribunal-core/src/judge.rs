use crate::error::TribunalError;
use crate::types::{content_hash, Case, Judgment, JudgmentSource, Verdict};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Raw verdict material returned by the external judging service.
#[derive(Debug, Clone)]
pub struct JudgmentDraft {
    pub verdict: Verdict,
    pub frivolous: bool,
    pub awarded_minor: u64,
    pub reasoning: String,
    pub citations: Vec<String>,
}

/// Opaque external decision service.
#[async_trait]
pub trait JudgingAdapter: Send + Sync {
    async fn judge(&self, case: &Case) -> Result<JudgmentDraft, TribunalError>;
}

/// Conservative default applied when the judging service is unreachable or
/// returns unparseable content. A stuck case is worse than a conservative
/// one, so the request proceeds with a not-liable, zero-damages verdict.
pub fn fallback_draft(detail: &str) -> JudgmentDraft {
    JudgmentDraft {
        verdict: Verdict::NotLiable,
        frivolous: false,
        awarded_minor: 0,
        reasoning: format!("judging service unavailable; conservative default applied ({detail})"),
        citations: Vec::new(),
    }
}

/// Seal a draft into an immutable judgment record.
///
/// Awarded damages are clamped to the requested amount; the verdict hash
/// covers the full verdict material so downstream consumers can detect any
/// divergence between what was issued and what is stored.
pub fn seal_judgment(
    case: &Case,
    draft: JudgmentDraft,
    source: JudgmentSource,
    now: DateTime<Utc>,
) -> Judgment {
    let awarded_minor = draft.awarded_minor.min(case.requested_minor);
    let material = serde_json::json!({
        "case_id": case.case_id,
        "verdict": draft.verdict,
        "frivolous": draft.frivolous,
        "awarded_minor": awarded_minor,
        "reasoning": draft.reasoning,
        "citations": draft.citations,
    });

    Judgment {
        verdict: draft.verdict,
        frivolous: draft.frivolous,
        awarded_minor,
        reasoning: draft.reasoning,
        citations: draft.citations,
        verdict_hash: content_hash(&material),
        source,
        issued_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CaseStatus;

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

    #[test]
    fn awarded_damages_never_exceed_requested() {
        let case = sample_case(1_000_000);
        let draft = JudgmentDraft {
            verdict: Verdict::Liable,
            frivolous: false,
            awarded_minor: 5_000_000,
            reasoning: "overshooting adapter".to_string(),
            citations: Vec::new(),
        };

        let judgment = seal_judgment(&case, draft, JudgmentSource::Adapter, Utc::now());
        assert_eq!(judgment.awarded_minor, 1_000_000);
    }

    #[test]
    fn fallback_is_not_liable_with_zero_damages() {
        let draft = fallback_draft("connection refused");
        assert_eq!(draft.verdict, Verdict::NotLiable);
        assert_eq!(draft.awarded_minor, 0);
        assert!(draft.reasoning.contains("conservative default"));
    }

    #[test]
    fn verdict_hash_covers_awarded_amount() {
        let case = sample_case(1_000_000);
        let mk = |awarded| JudgmentDraft {
            verdict: Verdict::Liable,
            frivolous: false,
            awarded_minor: awarded,
            reasoning: "r".to_string(),
            citations: Vec::new(),
        };

        let now = Utc::now();
        let a = seal_judgment(&case, mk(500_000), JudgmentSource::Adapter, now);
        let b = seal_judgment(&case, mk(250_000), JudgmentSource::Adapter, now);
        assert_ne!(a.verdict_hash, b.verdict_hash);
    }
}
