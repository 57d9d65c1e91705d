use crate::adapters::{DeviceCapture, HttpSessionApi, HttpTranscriber, TtsPlayer};
use crate::config::ClientConfig;
use intervox_core::setup::InterviewSetup;
use intervox_core::store::ConversationStore;
use intervox_engine::controller::{TurnController, TurnError};
use intervox_engine::traits::CaptureError;
use std::sync::Arc;

/// Turns a capture failure into short, actionable text for the user.
/// Details stay in the logs.
pub fn user_facing_capture_error(e: &CaptureError) -> String {
    match e {
        CaptureError::Unavailable(_) => {
            "No microphone detected. Check your mic and pick an input device.".into()
        }
        CaptureError::AlreadyRecording => "A recording is already in progress.".into(),
        CaptureError::Failed(inner) => {
            let raw = inner.to_string().to_lowercase();
            if raw.contains("permission") || raw.contains("access") {
                "Microphone access appears blocked. Check your system privacy settings.".into()
            } else {
                "Audio recording failed. Check the logs for details.".into()
            }
        }
    }
}

type UnloadGuard = Box<dyn Fn() -> bool + Send + Sync>;

/// Application facade over the turn controller: owns the wiring of the HTTP
/// and device adapters, plus the teardown confirmation hook.
#[derive(Clone)]
pub struct InterviewService {
    controller: TurnController,
    unload_guard: Arc<std::sync::Mutex<Option<UnloadGuard>>>,
}

impl InterviewService {
    pub fn new(config: &ClientConfig, preferred_microphone: Option<&str>) -> Self {
        let controller = TurnController::new(
            ConversationStore::new(config.max_questions),
            Arc::new(HttpSessionApi::new(config)),
            Arc::new(DeviceCapture::new(
                preferred_microphone.map(str::to_string),
            )),
            Arc::new(HttpTranscriber::new(config)),
            Arc::new(TtsPlayer::new(config)),
        );
        Self::with_controller(controller)
    }

    /// Wraps an already-wired controller; used where the trait
    /// implementations are supplied by the caller.
    pub fn with_controller(controller: TurnController) -> Self {
        Self {
            controller,
            unload_guard: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    pub fn controller(&self) -> &TurnController {
        &self.controller
    }

    pub fn store(&self) -> &ConversationStore {
        self.controller.store()
    }

    /// Registers the confirmation callback consulted before a mid-interview
    /// teardown. Without one, teardown proceeds unconditionally.
    pub fn set_unload_guard<F>(&self, guard: F)
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        *self.unload_guard.lock().unwrap() = Some(Box::new(guard));
    }

    /// Requests session teardown. Mid-interview, the unload guard is asked
    /// first and a refusal leaves everything running. Returns whether the
    /// teardown happened.
    pub async fn request_teardown(&self) -> bool {
        let mid_interview =
            self.store().interview_started() && !self.store().interview_complete();
        if mid_interview {
            let confirmed = self
                .unload_guard
                .lock()
                .unwrap()
                .as_ref()
                .map(|guard| guard())
                .unwrap_or(true);
            if !confirmed {
                return false;
            }
        }

        self.controller.abandon().await;
        true
    }

    /// Discards whatever session exists and starts a fresh one with the
    /// given setup.
    pub async fn start_new_interview(&self, setup: &InterviewSetup) -> Result<(), TurnError> {
        self.controller.abandon().await;
        self.controller.start_session(setup).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use intervox_core::assessment::OverallFeedback;
    use intervox_core::setup::{InterviewCategory, SetupInputType};
    use intervox_core::types::SessionId;
    use intervox_engine::traits::{
        AudioInput, SessionApi, SpeechPlayer, StartedSession, SynthesisError, Transcriber,
        TranscriptionError, TurnReply, VoiceCapture,
    };
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubApi;

    #[async_trait]
    impl SessionApi for StubApi {
        async fn start_session(&self, _setup: &InterviewSetup) -> anyhow::Result<StartedSession> {
            Ok(StartedSession {
                session_id: SessionId::new("s-1"),
                question: "Q1".into(),
                is_feedback: false,
            })
        }

        async fn submit_answer(
            &self,
            _session: &SessionId,
            _answer: &str,
        ) -> anyhow::Result<TurnReply> {
            Ok(TurnReply {
                text: "Noted.".into(),
                is_feedback: true,
            })
        }

        async fn revise_answer(&self, _session: &SessionId) -> anyhow::Result<String> {
            Ok("Q1'".into())
        }

        async fn next_question(&self, _session: &SessionId) -> anyhow::Result<String> {
            Ok("Q2".into())
        }

        async fn final_assessment(
            &self,
            _session: &SessionId,
        ) -> anyhow::Result<OverallFeedback> {
            anyhow::bail!("not used")
        }
    }

    struct StubCapture;

    #[async_trait]
    impl VoiceCapture for StubCapture {
        async fn start(&self) -> Result<(), intervox_engine::traits::CaptureError> {
            Ok(())
        }

        async fn stop(&self) -> Result<AudioInput, intervox_engine::traits::CaptureError> {
            Ok(AudioInput {
                sample_rate_hz: 16_000,
                samples: vec![],
            })
        }
    }

    struct StubTranscriber;

    #[async_trait]
    impl Transcriber for StubTranscriber {
        async fn transcribe(&self, _audio: &AudioInput) -> Result<String, TranscriptionError> {
            Ok(String::new())
        }
    }

    struct StubPlayer;

    #[async_trait]
    impl SpeechPlayer for StubPlayer {
        async fn speak(&self, _text: &str) -> Result<(), SynthesisError> {
            Ok(())
        }

        fn skip(&self) {}
    }

    fn service() -> InterviewService {
        InterviewService::with_controller(TurnController::new(
            ConversationStore::new(3),
            Arc::new(StubApi),
            Arc::new(StubCapture),
            Arc::new(StubTranscriber),
            Arc::new(StubPlayer),
        ))
    }

    fn setup() -> InterviewSetup {
        InterviewSetup {
            company_name: None,
            job_role: None,
            category: InterviewCategory::Hr,
            interview_type: Some("behavioral".into()),
            domain: None,
            input_type: SetupInputType::SkillsBased,
            skills: vec![],
            job_description: None,
            max_questions: 3,
        }
    }

    #[tokio::test]
    async fn teardown_outside_a_session_skips_the_guard() {
        let svc = service();
        svc.set_unload_guard(|| false);

        assert!(svc.request_teardown().await);
    }

    #[tokio::test]
    async fn teardown_mid_interview_respects_the_guard() {
        let svc = service();
        svc.start_new_interview(&setup()).await.unwrap();
        assert!(svc.store().interview_started());

        let allow = Arc::new(AtomicBool::new(false));
        let flag = allow.clone();
        svc.set_unload_guard(move || flag.load(Ordering::SeqCst));

        assert!(!svc.request_teardown().await);
        assert!(svc.store().interview_started());

        allow.store(true, Ordering::SeqCst);
        assert!(svc.request_teardown().await);
        assert!(!svc.store().interview_started());
        assert!(svc.store().messages().is_empty());
    }

    #[tokio::test]
    async fn start_new_interview_discards_the_previous_session() {
        let svc = service();
        svc.start_new_interview(&setup()).await.unwrap();
        svc.start_new_interview(&setup()).await.unwrap();

        assert_eq!(svc.store().question_count(), 1);
        assert_eq!(svc.store().messages().len(), 1);
    }

    #[test]
    fn capture_errors_map_to_friendly_text() {
        let unavailable = CaptureError::Unavailable("no input device found".into());
        assert!(user_facing_capture_error(&unavailable).contains("No microphone"));

        let blocked = CaptureError::Failed(anyhow::anyhow!("device access denied"));
        assert!(user_facing_capture_error(&blocked).contains("privacy settings"));

        let other = CaptureError::Failed(anyhow::anyhow!("stream died"));
        assert!(user_facing_capture_error(&other).contains("Check the logs"));
    }
}
