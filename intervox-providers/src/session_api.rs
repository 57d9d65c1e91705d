// Request builders and response parsers for the remote session API.
//
// The server is the source of truth for question sequencing; `is_feedback`
// is the sole discriminator between a feedback-only reply and the next
// question.

use crate::request::{Body, HttpRequest, Method, join_url};
use anyhow::{Context, anyhow, bail};
use intervox_core::assessment::OverallFeedback;
use intervox_core::setup::InterviewSetup;
use intervox_core::types::SessionId;
use serde::Deserialize;
use serde_json::json;

#[derive(Clone, PartialEq, Eq)]
pub struct SessionApiConfig {
    pub base_url: String,
    pub api_key: String,
}

impl std::fmt::Debug for SessionApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

fn authorized_json_post(cfg: &SessionApiConfig, path: &str, payload: String) -> HttpRequest {
    HttpRequest {
        method: Method::Post,
        url: join_url(&cfg.base_url, path),
        headers: vec![
            ("Content-Type".into(), "application/json".into()),
            ("Authorization".into(), format!("Bearer {}", cfg.api_key)),
        ],
        body: Body::Json(payload),
    }
}

pub fn build_start_request(
    cfg: &SessionApiConfig,
    setup: &InterviewSetup,
) -> anyhow::Result<HttpRequest> {
    let payload = serde_json::to_string(setup).context("encode interview setup")?;
    Ok(authorized_json_post(cfg, "/interview/start", payload))
}

pub fn build_submit_request(
    cfg: &SessionApiConfig,
    session: &SessionId,
    answer: &str,
) -> HttpRequest {
    let payload = json!({ "answer": answer }).to_string();
    authorized_json_post(cfg, &format!("/interview/{}/answer", session.as_str()), payload)
}

pub fn build_revise_request(cfg: &SessionApiConfig, session: &SessionId) -> HttpRequest {
    authorized_json_post(
        cfg,
        &format!("/interview/{}/revise", session.as_str()),
        "{}".into(),
    )
}

pub fn build_next_request(cfg: &SessionApiConfig, session: &SessionId) -> HttpRequest {
    authorized_json_post(
        cfg,
        &format!("/interview/{}/next", session.as_str()),
        "{}".into(),
    )
}

pub fn build_assessment_request(cfg: &SessionApiConfig, session: &SessionId) -> HttpRequest {
    authorized_json_post(
        cfg,
        &format!("/interview/{}/assessment", session.as_str()),
        "{}".into(),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedInterview {
    pub session_id: SessionId,
    pub question: String,
    pub is_feedback: bool,
}

#[derive(Debug, Deserialize)]
struct StartWire {
    #[serde(default)]
    success: bool,
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
    question: Option<String>,
    #[serde(rename = "isFeedback", default)]
    is_feedback: bool,
}

pub fn parse_start_response(body: &[u8]) -> anyhow::Result<StartedInterview> {
    let wire: StartWire = serde_json::from_slice(body).context("decode start response")?;
    if !wire.success {
        bail!("interview start reported failure");
    }
    let session_id = wire
        .session_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("start response missing session id"))?;
    let question = wire
        .question
        .filter(|q| !q.is_empty())
        .ok_or_else(|| anyhow!("start response missing first question"))?;

    Ok(StartedInterview {
        session_id: SessionId::new(session_id),
        question,
        is_feedback: wire.is_feedback,
    })
}

/// Normalized reply to an answer submission: either immediate feedback or
/// the next question, as flagged by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerReply {
    pub text: String,
    pub is_feedback: bool,
}

#[derive(Debug, Deserialize)]
struct AnswerWire {
    question: Option<String>,
    feedback: Option<String>,
    #[serde(rename = "isFeedback", default)]
    is_feedback: bool,
}

pub fn parse_answer_reply(body: &[u8]) -> anyhow::Result<AnswerReply> {
    let wire: AnswerWire = serde_json::from_slice(body).context("decode answer reply")?;
    let text = if wire.is_feedback {
        wire.feedback.or(wire.question)
    } else {
        wire.question.or(wire.feedback)
    };
    let text = text
        .filter(|t| !t.is_empty())
        .ok_or_else(|| anyhow!("answer reply carried neither question nor feedback"))?;

    Ok(AnswerReply {
        text,
        is_feedback: wire.is_feedback,
    })
}

#[derive(Debug, Deserialize)]
struct QuestionWire {
    question: Option<String>,
}

/// Parses the revise / next-question replies, which carry a bare question.
pub fn parse_question_reply(body: &[u8]) -> anyhow::Result<String> {
    let wire: QuestionWire = serde_json::from_slice(body).context("decode question reply")?;
    wire.question
        .filter(|q| !q.is_empty())
        .ok_or_else(|| anyhow!("reply missing question"))
}

#[derive(Debug, Deserialize)]
struct AssessmentWire {
    status: Option<String>,
    #[serde(rename = "overallFeedback")]
    overall_feedback: Option<OverallFeedback>,
}

pub fn parse_final_assessment(body: &[u8]) -> anyhow::Result<OverallFeedback> {
    let wire: AssessmentWire =
        serde_json::from_slice(body).context("decode final assessment")?;
    if wire.status.as_deref() == Some("error") {
        bail!("assessment endpoint reported an error");
    }
    wire.overall_feedback
        .ok_or_else(|| anyhow!("final assessment missing overallFeedback"))
}
