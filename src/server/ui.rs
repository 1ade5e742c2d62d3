use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Form;
use serde::Deserialize;
use uuid::Uuid;

use super::api::{ApiError, BODY_TOO_LARGE};
use super::AppState;
use crate::evaluation::MAX_NEXT_ACTIONS;
use crate::gateway::CompletionGateway;
use crate::session::{FormFields, Session, SessionError, SessionId, SessionState};

pub const SESSION_COOKIE: &str = "prcopilot_session";

/// The details panel shows fewer failure modes than an evaluation may carry.
pub const DISPLAYED_FAILURE_MODES: usize = 6;

#[derive(Deserialize, Debug, Default)]
pub struct EvaluateForm {
    #[serde(default)]
    pub announcement: String,
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub funding: String,
    #[serde(default)]
    pub partners: String,
}

impl From<EvaluateForm> for FormFields {
    fn from(form: EvaluateForm) -> Self {
        Self {
            announcement: form.announcement,
            market: form.market,
            funding: form.funding,
            partners: form.partners,
        }
    }
}

pub fn session_id(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

fn page(status: StatusCode, id: SessionId, html: String) -> Response {
    let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id);
    (status, [(SET_COOKIE, cookie)], Html(html)).into_response()
}

fn render<G>(state: &AppState<G>, id: SessionId, status: StatusCode) -> Response {
    let html = state.sessions.with(id, |session| render_page(session));
    page(status, id, html)
}

fn rejection_status(err: &SessionError) -> StatusCode {
    match err {
        SessionError::Invalid(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::CONFLICT,
    }
}

pub async fn index<G: CompletionGateway>(
    State(state): State<Arc<AppState<G>>>,
    headers: HeaderMap,
) -> Response {
    let id = state.sessions.resolve(session_id(&headers));
    render(&state, id, StatusCode::OK)
}

pub async fn evaluate<G: CompletionGateway>(
    State(state): State<Arc<AppState<G>>>,
    headers: HeaderMap,
    form: Result<Form<EvaluateForm>, FormRejection>,
) -> Response {
    let id = state.sessions.resolve(session_id(&headers));

    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            let status = rejection.status();
            log::warn!("rejecting evaluate form for session {}: {}", id, rejection);
            let message = if status == StatusCode::PAYLOAD_TOO_LARGE {
                BODY_TOO_LARGE.to_string()
            } else {
                rejection.body_text()
            };
            state.sessions.with(id, |session| session.report(message));
            return render(&state, id, status);
        }
    };

    let ctx = match state
        .sessions
        .with(id, |session| session.begin_evaluation(form.into()))
    {
        Ok(ctx) => ctx,
        Err(err) => return render(&state, id, rejection_status(&err)),
    };

    let status = match state.agent.evaluate(&ctx).await {
        Ok(evaluation) => {
            state
                .sessions
                .with(id, |session| session.complete_evaluation(evaluation));
            StatusCode::OK
        }
        Err(err) => {
            let err = ApiError::from(err);
            log::error!("evaluation failed for session {}: {}", id, err);
            state
                .sessions
                .with(id, |session| session.fail_evaluation("Evaluation failed"));
            err.status()
        }
    };

    render(&state, id, status)
}

pub async fn generate<G: CompletionGateway>(
    State(state): State<Arc<AppState<G>>>,
    headers: HeaderMap,
) -> Response {
    let id = state.sessions.resolve(session_id(&headers));

    let brief = match state.sessions.with(id, Session::begin_generation) {
        Ok(brief) => brief,
        Err(err) => return render(&state, id, rejection_status(&err)),
    };

    let status = match state.agent.draft_press_release(&brief).await {
        Ok(draft) => {
            state
                .sessions
                .with(id, |session| session.complete_generation(draft));
            StatusCode::OK
        }
        Err(err) => {
            log::error!("generation failed for session {}: {}", id, err);
            state
                .sessions
                .with(id, |session| session.fail_generation("Generation failed"));
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    render(&state, id, status)
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub fn render_page(session: &Session) -> String {
    let form = session.form();
    let busy = session.state().is_in_flight();
    let evaluation = session.evaluation();

    let mut html = String::from(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>PR Copilot</title>\n</head>\n<body>\n<main>\n<h1>PR Copilot</h1>\n",
    );

    if let Some(error) = session.error() {
        html.push_str(&format!(
            "<p class=\"error\" role=\"alert\">{}</p>\n",
            escape_html(error)
        ));
    }

    html.push_str("<form method=\"post\" action=\"/ui/evaluate\">\n");
    for (name, label, value) in [
        ("market", "Market", &form.market),
        ("partners", "Partners/Customers", &form.partners),
        ("funding", "Funding", &form.funding),
    ] {
        html.push_str(&format!(
            "<p><label>{} <input name=\"{}\" value=\"{}\" size=\"50\"></label></p>\n",
            label,
            name,
            escape_html(value)
        ));
    }
    html.push_str(&format!(
        "<p><textarea name=\"announcement\" rows=\"6\" cols=\"80\">{}</textarea></p>\n",
        escape_html(&form.announcement)
    ));
    html.push_str(&format!(
        "<button type=\"submit\"{}>{}</button>\n</form>\n",
        disabled(busy),
        if session.state() == SessionState::Evaluating {
            "Evaluating..."
        } else {
            "Run PR Readiness Check"
        }
    ));

    let verdict = evaluation
        .map(|e| e.result.verdict.as_str())
        .unwrap_or("(not evaluated yet)");
    html.push_str(&format!("<p><strong>Verdict:</strong> {}</p>\n", verdict));

    let score = evaluation
        .map(|e| format!("{}/100", e.result.risk_score))
        .unwrap_or_else(|| "(n/a)".to_string());
    html.push_str(&format!("<p><strong>Risk score:</strong> {}</p>\n", score));

    if let Some(evaluation) = evaluation {
        html.push_str(&render_details(&evaluation.result));
    }

    html.push_str(&format!(
        "<form method=\"post\" action=\"/ui/generate\">\n<button type=\"submit\"{}>{}</button>\n</form>\n",
        disabled(!session.can_generate()),
        if session.state() == SessionState::Generating {
            "Generating..."
        } else {
            "Generate Press Release"
        }
    ));

    if let Some(draft) = session.draft() {
        html.push_str(&format!("<pre>{}</pre>\n", escape_html(draft)));
    }

    html.push_str(&format!(
        "<p>{} free generations remaining</p>\n</main>\n</body>\n</html>\n",
        session.generations_remaining()
    ));

    html
}

fn render_details(result: &crate::evaluation::EvaluationResult) -> String {
    let mut html = String::from("<details>\n<summary>Show details</summary>\n");

    if !result.primary_failure_modes.is_empty() {
        html.push_str("<strong>Primary failure modes</strong>\n<ul>\n");
        for mode in result
            .primary_failure_modes
            .iter()
            .take(DISPLAYED_FAILURE_MODES)
        {
            html.push_str(&format!("<li>{}</li>\n", escape_html(mode)));
        }
        html.push_str("</ul>\n");
    }

    if !result.journalist_reaction.is_empty() {
        html.push_str(&format!(
            "<strong>Journalist reaction</strong>\n<p>{}</p>\n",
            escape_html(&result.journalist_reaction)
        ));
    }

    if !result.recommendation.summary.is_empty() {
        html.push_str(&format!(
            "<strong>Recommendation</strong>\n<p>{}</p>\n",
            escape_html(&result.recommendation.summary)
        ));
    }

    if !result.recommendation.next_actions.is_empty() {
        html.push_str("<strong>Next actions</strong>\n<ol>\n");
        for action in result
            .recommendation
            .next_actions
            .iter()
            .take(MAX_NEXT_ACTIONS)
        {
            html.push_str(&format!("<li>{}</li>\n", escape_html(action)));
        }
        html.push_str("</ol>\n");
    }

    html.push_str("</details>\n");
    html
}

fn disabled(flag: bool) -> &'static str {
    if flag {
        " disabled"
    } else {
        ""
    }
}
