//! Normalization of the model's PR-readiness verdict into a fixed schema.
//!
//! Parsing is strict: text that is not a JSON object is rejected with a
//! [`PayloadError`]. Once parsed, [`normalize`] never fails; mistyped or
//! out-of-range fields fall back to their safest value.

use serde::Serialize;
use serde_json::{Map, Value};

pub const MAX_RISK_SCORE: i64 = 100;
pub const MAX_FAILURE_MODES: usize = 8;
pub const MAX_NEXT_ACTIONS: usize = 3;

pub const MAX_EXTERNAL_VALIDATION: i64 = 30;
pub const MAX_BENEFICIARY_CLARITY: i64 = 20;
pub const MAX_EXPLAINABILITY: i64 = 20;
pub const MAX_THIRD_PARTY_SUPPORT: i64 = 15;
pub const MAX_IMPACT_VS_ACTIVITY: i64 = 15;

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("Upstream payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Upstream payload is not a JSON object")]
    NotAnObject,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    #[serde(rename = "GO")]
    Go,
    #[serde(rename = "CONDITIONAL")]
    Conditional,
    #[serde(rename = "NO-GO")]
    NoGo,
}

impl Verdict {
    /// Only the three exact literals are recognised. Anything else is a
    /// NO-GO so that an unreadable verdict can never unlock generation.
    pub fn from_value(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some("GO") => Verdict::Go,
            Some("CONDITIONAL") => Verdict::Conditional,
            _ => Verdict::NoGo,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Go => "GO",
            Verdict::Conditional => "CONDITIONAL",
            Verdict::NoGo => "NO-GO",
        }
    }

    pub fn permits_generation(&self) -> bool {
        matches!(self, Verdict::Go | Verdict::Conditional)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Higher is worse. Each dimension is capped independently.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RiskBreakdown {
    pub external_validation: i64,
    pub beneficiary_clarity: i64,
    pub explainability: i64,
    pub third_party_support: i64,
    pub impact_vs_activity: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Recommendation {
    pub summary: String,
    pub next_actions: Vec<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct EvaluationResult {
    pub verdict: Verdict,
    pub risk_score: i64,
    pub risk_breakdown: RiskBreakdown,
    pub primary_failure_modes: Vec<String>,
    pub journalist_reaction: String,
    pub recommendation: Recommendation,
}

/// A normalized result together with the model text it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub result: EvaluationResult,
    pub raw: String,
}

pub fn parse_evaluation(raw: &str) -> Result<EvaluationResult, PayloadError> {
    let value: Value = serde_json::from_str(raw)?;
    if !value.is_object() {
        return Err(PayloadError::NotAnObject);
    }
    Ok(normalize(&value))
}

/// Map any JSON value onto the evaluation schema. Non-object input is
/// treated as an object with every field missing.
pub fn normalize(value: &Value) -> EvaluationResult {
    let empty = Map::new();
    let obj = value.as_object().unwrap_or(&empty);

    let breakdown = obj
        .get("risk_breakdown")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let recommendation = obj
        .get("recommendation")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    EvaluationResult {
        verdict: Verdict::from_value(obj.get("verdict")),
        risk_score: clamp_score(obj.get("risk_score"), MAX_RISK_SCORE),
        risk_breakdown: RiskBreakdown {
            external_validation: clamp_score(
                breakdown.get("external_validation"),
                MAX_EXTERNAL_VALIDATION,
            ),
            beneficiary_clarity: clamp_score(
                breakdown.get("beneficiary_clarity"),
                MAX_BENEFICIARY_CLARITY,
            ),
            explainability: clamp_score(breakdown.get("explainability"), MAX_EXPLAINABILITY),
            third_party_support: clamp_score(
                breakdown.get("third_party_support"),
                MAX_THIRD_PARTY_SUPPORT,
            ),
            impact_vs_activity: clamp_score(
                breakdown.get("impact_vs_activity"),
                MAX_IMPACT_VS_ACTIVITY,
            ),
        },
        primary_failure_modes: text_list(obj.get("primary_failure_modes"), MAX_FAILURE_MODES),
        journalist_reaction: text(obj.get("journalist_reaction")),
        recommendation: Recommendation {
            summary: text(recommendation.get("summary")),
            next_actions: text_list(recommendation.get("next_actions"), MAX_NEXT_ACTIONS),
        },
    }
}

/// Truncate toward zero and clamp into `[0, max]`. Numbers and numeric
/// strings are accepted; anything else is `0`.
fn clamp_score(value: Option<&Value>, max: i64) -> i64 {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() => n.trunc().clamp(0.0, max as f64) as i64,
        _ => 0,
    }
}

fn text(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

fn text_list(value: Option<&Value>, limit: usize) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().take(limit).map(coerce_text).collect(),
        _ => Vec::new(),
    }
}

fn coerce_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
