use async_trait::async_trait;
use intervox_core::assessment::OverallFeedback;
use intervox_core::setup::InterviewSetup;
use intervox_core::types::SessionId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct AudioInput {
    // Mono PCM samples at `sample_rate_hz`; capture/downmix happened at the
    // device boundary.
    pub sample_rate_hz: u32,
    pub samples: Vec<f32>,
}

/// Result of a successful session start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartedSession {
    pub session_id: SessionId,
    pub question: String,
    pub is_feedback: bool,
}

/// Reply to an answer submission: immediate feedback or the next question,
/// discriminated solely by `is_feedback`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnReply {
    pub text: String,
    pub is_feedback: bool,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("microphone unavailable: {0}")]
    Unavailable(String),

    #[error("a capture is already in progress")]
    AlreadyRecording,

    #[error("capture failed: {0}")]
    Failed(#[source] anyhow::Error),
}

#[derive(Debug, Error)]
#[error("transcription failed: {0}")]
pub struct TranscriptionError(#[from] pub anyhow::Error);

#[derive(Debug, Error)]
#[error("speech synthesis failed: {0}")]
pub struct SynthesisError(#[from] pub anyhow::Error);

/// Microphone access: start/stop one buffered capture at a time.
#[async_trait]
pub trait VoiceCapture: Send + Sync {
    /// Begins buffering audio. Fails when the microphone is unavailable or a
    /// capture is already in progress.
    async fn start(&self) -> Result<(), CaptureError>;

    /// Finalizes the buffered audio and returns it.
    async fn stop(&self) -> Result<AudioInput, CaptureError>;
}

/// Speech-to-text over one finished capture. Single in-flight call per
/// recording; no partial or streaming transcripts.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &AudioInput) -> Result<String, TranscriptionError>;
}

/// Plays one synthesized utterance at a time.
#[async_trait]
pub trait SpeechPlayer: Send + Sync {
    /// Resolves when playback ends naturally or is skipped. Invoking `speak`
    /// while an utterance is active cancels the previous one first
    /// (last-call-wins).
    async fn speak(&self, text: &str) -> Result<(), SynthesisError>;

    /// Stops active playback immediately. Safe when nothing is playing.
    fn skip(&self);
}

/// The remote session API. The server is the source of truth for question
/// sequencing content; failures surface as transport-level errors here and
/// are resolved to state transitions by the controller.
#[async_trait]
pub trait SessionApi: Send + Sync {
    async fn start_session(&self, setup: &InterviewSetup) -> anyhow::Result<StartedSession>;

    async fn submit_answer(
        &self,
        session: &SessionId,
        answer: &str,
    ) -> anyhow::Result<TurnReply>;

    /// Re-requests a fresh prompt for the same question slot.
    async fn revise_answer(&self, session: &SessionId) -> anyhow::Result<String>;

    async fn next_question(&self, session: &SessionId) -> anyhow::Result<String>;

    async fn final_assessment(&self, session: &SessionId) -> anyhow::Result<OverallFeedback>;
}
