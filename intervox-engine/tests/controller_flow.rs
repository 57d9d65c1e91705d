use async_trait::async_trait;
use intervox_core::assessment::{CoachingScores, OverallFeedback};
use intervox_core::setup::{InterviewCategory, InterviewSetup, SetupInputType};
use intervox_core::store::ConversationStore;
use intervox_core::types::{Role, SessionId};
use intervox_engine::controller::{Phase, TurnController, TurnError};
use intervox_engine::traits::{
    AudioInput, CaptureError, SessionApi, SpeechPlayer, StartedSession, Transcriber,
    TranscriptionError, TurnReply, VoiceCapture,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

struct MockApi {
    submit_replies: Mutex<VecDeque<TurnReply>>,
    next_replies: Mutex<VecDeque<String>>,
    revise_replies: Mutex<VecDeque<String>>,
    submitted_answers: Mutex<Vec<String>>,
    assessment_calls: AtomicUsize,
    fail_submit: AtomicBool,
    fail_revise: AtomicBool,
    fail_next: AtomicBool,
    fail_assessment: AtomicBool,
    // When set, submit_answer parks until the gate is released, so tests can
    // observe the WaitingOnServer phase.
    submit_gate: Option<Arc<Notify>>,
}

impl MockApi {
    fn new() -> Self {
        Self {
            submit_replies: Mutex::new(VecDeque::new()),
            next_replies: Mutex::new(VecDeque::new()),
            revise_replies: Mutex::new(VecDeque::new()),
            submitted_answers: Mutex::new(Vec::new()),
            assessment_calls: AtomicUsize::new(0),
            fail_submit: AtomicBool::new(false),
            fail_revise: AtomicBool::new(false),
            fail_next: AtomicBool::new(false),
            fail_assessment: AtomicBool::new(false),
            submit_gate: None,
        }
    }

    fn queue_feedback(&self, text: &str) {
        self.submit_replies.lock().unwrap().push_back(TurnReply {
            text: text.into(),
            is_feedback: true,
        });
    }

    fn queue_next(&self, question: &str) {
        self.next_replies
            .lock()
            .unwrap()
            .push_back(question.into());
    }
}

#[async_trait]
impl SessionApi for MockApi {
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
        answer: &str,
    ) -> anyhow::Result<TurnReply> {
        if let Some(gate) = &self.submit_gate {
            gate.notified().await;
        }
        if self.fail_submit.load(Ordering::SeqCst) {
            anyhow::bail!("connection reset");
        }
        self.submitted_answers
            .lock()
            .unwrap()
            .push(answer.to_string());
        Ok(self
            .submit_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(TurnReply {
                text: "Thanks, noted.".into(),
                is_feedback: true,
            }))
    }

    async fn revise_answer(&self, _session: &SessionId) -> anyhow::Result<String> {
        if self.fail_revise.load(Ordering::SeqCst) {
            anyhow::bail!("connection reset");
        }
        Ok(self
            .revise_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "Q-revised".into()))
    }

    async fn next_question(&self, _session: &SessionId) -> anyhow::Result<String> {
        if self.fail_next.load(Ordering::SeqCst) {
            anyhow::bail!("connection reset");
        }
        Ok(self
            .next_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "Q-next".into()))
    }

    async fn final_assessment(&self, _session: &SessionId) -> anyhow::Result<OverallFeedback> {
        self.assessment_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_assessment.load(Ordering::SeqCst) {
            anyhow::bail!("connection reset");
        }
        Ok(OverallFeedback {
            overall_score: 78,
            level: "Intermediate".into(),
            summary: "Good overall.".into(),
            coaching_scores: CoachingScores {
                clarity_of_motivation: 4,
                career_goal_alignment: 4,
                specificity_of_learning: 3,
            },
            questions_analysis: vec![],
            closure_message: "Keep going.".into(),
        })
    }
}

struct MockCapture {
    recording: AtomicBool,
    stops: AtomicUsize,
}

impl MockCapture {
    fn new() -> Self {
        Self {
            recording: AtomicBool::new(false),
            stops: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VoiceCapture for MockCapture {
    async fn start(&self) -> Result<(), CaptureError> {
        if self.recording.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::AlreadyRecording);
        }
        Ok(())
    }

    async fn stop(&self) -> Result<AudioInput, CaptureError> {
        self.recording.store(false, Ordering::SeqCst);
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(AudioInput {
            sample_rate_hz: 16_000,
            samples: vec![0.0; 160],
        })
    }
}

struct MockTranscriber {
    calls: AtomicUsize,
    fail: AtomicBool,
    text: String,
}

impl MockTranscriber {
    fn returning(text: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            text: text.into(),
        }
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, _audio: &AudioInput) -> Result<String, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(TranscriptionError(anyhow::anyhow!("decode failed")));
        }
        Ok(self.text.clone())
    }
}

struct MockPlayer {
    // Manual players park until skip() releases them; instant players
    // resolve immediately, as if every utterance were zero-length.
    manual: bool,
    notify: Notify,
    skips: AtomicUsize,
}

impl MockPlayer {
    fn instant() -> Self {
        Self {
            manual: false,
            notify: Notify::new(),
            skips: AtomicUsize::new(0),
        }
    }

    fn manual() -> Self {
        Self {
            manual: true,
            notify: Notify::new(),
            skips: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SpeechPlayer for MockPlayer {
    async fn speak(&self, _text: &str) -> Result<(), intervox_engine::traits::SynthesisError> {
        if self.manual {
            self.notify.notified().await;
        }
        Ok(())
    }

    fn skip(&self) {
        self.skips.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

fn hr_setup(max_questions: u32) -> InterviewSetup {
    InterviewSetup {
        company_name: None,
        job_role: None,
        category: InterviewCategory::Hr,
        interview_type: Some("behavioral".into()),
        domain: None,
        input_type: SetupInputType::SkillsBased,
        skills: vec![],
        job_description: None,
        max_questions,
    }
}

fn answer_of_len(n: usize) -> String {
    "a".repeat(n)
}

struct Rig {
    controller: TurnController,
    api: Arc<MockApi>,
    capture: Arc<MockCapture>,
    transcriber: Arc<MockTranscriber>,
    player: Arc<MockPlayer>,
}

fn rig(max_questions: u32, api: MockApi, player: MockPlayer) -> Rig {
    let api = Arc::new(api);
    let capture = Arc::new(MockCapture::new());
    let transcriber = Arc::new(MockTranscriber::returning("spoken answer"));
    let player = Arc::new(player);

    let controller = TurnController::new(
        ConversationStore::new(max_questions),
        api.clone(),
        capture.clone(),
        transcriber.clone(),
        player.clone(),
    );

    Rig {
        controller,
        api,
        capture,
        transcriber,
        player,
    }
}

/// Lets spawned continuations (playback end, forced stop) run to rest.
async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn full_interview_runs_to_assessment_exactly_once() {
    let api = MockApi::new();
    for q in ["Q2", "Q3"] {
        api.queue_next(q);
    }
    for fb in ["FB1", "FB2", "FB3"] {
        api.queue_feedback(fb);
    }

    let r = rig(3, api, MockPlayer::instant());
    let c = &r.controller;
    let store = c.store().clone();

    c.start_session(&hr_setup(3)).await.unwrap();
    settle().await;
    assert_eq!(store.question_count(), 1);
    assert_eq!(c.phase(), Phase::Idle);

    for round in 1..=3u32 {
        c.submit_answer(&answer_of_len(150)).await.unwrap();
        settle().await;
        assert_eq!(c.phase(), Phase::AwaitingDecision);
        assert!(store.latest_is_feedback());
        assert_eq!(store.question_count(), round);

        c.decide_continue().await.unwrap();
        settle().await;

        if round < 3 {
            assert_eq!(store.question_count(), round + 1);
            assert_eq!(c.phase(), Phase::Idle);
        }
    }

    assert_eq!(c.phase(), Phase::Complete);
    assert_eq!(r.api.assessment_calls.load(Ordering::SeqCst), 1);
    assert!(store.interview_complete());
    assert_eq!(store.overall_feedback().unwrap().overall_score, 78);
    assert_eq!(store.question_count(), 3);

    // A second fetch without reset is rejected, not re-issued.
    let err = c.fetch_final_assessment().await.unwrap_err();
    assert!(matches!(err, TurnError::AssessmentAlreadyFetched));
    assert_eq!(r.api.assessment_calls.load(Ordering::SeqCst), 1);

    // Submissions after completion are permanently disabled.
    let err = c.submit_answer(&answer_of_len(150)).await.unwrap_err();
    assert!(matches!(err, TurnError::SessionComplete));
}

#[tokio::test]
async fn short_answers_never_reach_the_network() {
    let r = rig(3, MockApi::new(), MockPlayer::instant());
    let c = &r.controller;

    c.start_session(&hr_setup(3)).await.unwrap();
    settle().await;
    let before = c.store().messages().len();

    let err = c.submit_answer(&answer_of_len(139)).await.unwrap_err();
    assert!(matches!(err, TurnError::Guard(_)));
    assert_eq!(c.store().messages().len(), before);
    assert!(r.api.submitted_answers.lock().unwrap().is_empty());

    // Exactly the minimum passes.
    c.submit_answer(&answer_of_len(140)).await.unwrap();
    settle().await;
    assert_eq!(r.api.submitted_answers.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn oversized_answers_are_truncated_before_submission() {
    let r = rig(3, MockApi::new(), MockPlayer::instant());
    let c = &r.controller;

    c.start_session(&hr_setup(3)).await.unwrap();
    settle().await;

    c.submit_answer(&answer_of_len(1600)).await.unwrap();
    let sent = r.api.submitted_answers.lock().unwrap();
    assert_eq!(sent[0].chars().count(), 1499);
}

#[tokio::test]
async fn revise_keeps_question_count_and_requeues_the_slot() {
    let api = MockApi::new();
    api.queue_feedback("FB1");
    let r = rig(3, api, MockPlayer::instant());
    let c = &r.controller;
    let store = c.store().clone();

    c.start_session(&hr_setup(3)).await.unwrap();
    settle().await;
    c.submit_answer(&answer_of_len(150)).await.unwrap();
    settle().await;
    assert_eq!(store.question_count(), 1);

    c.decide_revise().await.unwrap();
    settle().await;

    assert_eq!(store.question_count(), 1);
    assert_eq!(c.phase(), Phase::Idle);
    let last = store.messages().pop().unwrap();
    assert_eq!(last.role, Role::Ai);
    assert!(!last.is_feedback);
}

#[tokio::test(start_paused = true)]
async fn recording_is_force_stopped_at_the_limit() {
    let r = rig(3, MockApi::new(), MockPlayer::instant());
    let c = &r.controller;

    c.start_session(&hr_setup(3)).await.unwrap();
    settle().await;

    c.start_recording().await.unwrap();
    assert_eq!(c.phase(), Phase::Recording);
    assert_eq!(c.recording_seconds_left(), Some(60));

    tokio::time::sleep(Duration::from_secs(61)).await;
    settle().await;

    assert_eq!(c.phase(), Phase::Idle);
    assert_eq!(r.capture.stops.load(Ordering::SeqCst), 1);
    assert_eq!(r.transcriber.calls.load(Ordering::SeqCst), 1);
    assert_eq!(c.draft(), "spoken answer");

    // A late manual stop after expiry is a no-op.
    c.stop_recording().await.unwrap();
    assert_eq!(r.capture.stops.load(Ordering::SeqCst), 1);
    assert_eq!(r.transcriber.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn double_stop_requests_transcription_exactly_once() {
    let r = rig(3, MockApi::new(), MockPlayer::instant());
    let c = &r.controller;

    c.start_session(&hr_setup(3)).await.unwrap();
    settle().await;

    c.start_recording().await.unwrap();
    c.stop_recording().await.unwrap();
    c.stop_recording().await.unwrap();

    assert_eq!(r.capture.stops.load(Ordering::SeqCst), 1);
    assert_eq!(r.transcriber.calls.load(Ordering::SeqCst), 1);
    assert_eq!(c.phase(), Phase::Idle);
}

#[tokio::test]
async fn transcription_failure_preserves_the_typed_draft() {
    let r = rig(3, MockApi::new(), MockPlayer::instant());
    let c = &r.controller;

    c.start_session(&hr_setup(3)).await.unwrap();
    settle().await;

    c.set_draft("half-typed thought");
    r.transcriber.fail.store(true, Ordering::SeqCst);

    c.start_recording().await.unwrap();
    let err = c.stop_recording().await.unwrap_err();
    assert!(matches!(err, TurnError::Transcription(_)));

    assert_eq!(c.draft(), "half-typed thought");
    assert_eq!(c.phase(), Phase::Idle);
}

#[tokio::test]
async fn speaking_blocks_recording_and_submission_until_skipped() {
    let r = rig(3, MockApi::new(), MockPlayer::manual());
    let c = &r.controller;

    c.start_session(&hr_setup(3)).await.unwrap();
    settle().await;

    // The first question is still being spoken.
    assert!(c.store().is_ai_speaking());
    assert!(matches!(
        c.start_recording().await.unwrap_err(),
        TurnError::Busy(Phase::Speaking)
    ));
    assert!(matches!(
        c.submit_answer(&answer_of_len(150)).await.unwrap_err(),
        TurnError::Busy(Phase::Speaking)
    ));

    c.skip_speech();
    settle().await;
    assert!(!c.store().is_ai_speaking());
    assert_eq!(c.phase(), Phase::Idle);

    c.start_recording().await.unwrap();
    assert_eq!(c.phase(), Phase::Recording);
}

#[tokio::test]
async fn waiting_on_server_blocks_competing_triggers() {
    let gate = Arc::new(Notify::new());
    let mut api = MockApi::new();
    api.submit_gate = Some(gate.clone());
    api.queue_feedback("FB1");

    let r = rig(3, api, MockPlayer::instant());
    let c = r.controller.clone();

    c.start_session(&hr_setup(3)).await.unwrap();
    settle().await;

    let submit = {
        let c = c.clone();
        tokio::spawn(async move { c.submit_answer(&answer_of_len(150)).await })
    };
    settle().await;

    assert_eq!(c.phase(), Phase::WaitingOnServer);
    assert!(matches!(
        c.start_recording().await.unwrap_err(),
        TurnError::Busy(Phase::WaitingOnServer)
    ));

    gate.notify_waiters();
    submit.await.unwrap().unwrap();
    settle().await;
    assert_eq!(c.phase(), Phase::AwaitingDecision);
}

#[tokio::test]
async fn enter_submits_only_when_the_guard_passes() {
    let r = rig(3, MockApi::new(), MockPlayer::instant());
    let c = &r.controller;

    c.start_session(&hr_setup(3)).await.unwrap();
    settle().await;

    c.set_draft(&answer_of_len(50));
    assert!(!c.submit_on_enter(false).await.unwrap());
    assert_eq!(c.draft().chars().count(), 50);

    c.set_draft(&answer_of_len(200));
    assert!(!c.submit_on_enter(true).await.unwrap());
    assert!(c.submit_on_enter(false).await.unwrap());
    assert!(c.draft().is_empty());
}

#[tokio::test]
async fn abandon_resets_everything_and_ignores_stale_replies() {
    let gate = Arc::new(Notify::new());
    let mut api = MockApi::new();
    api.submit_gate = Some(gate.clone());

    let r = rig(3, api, MockPlayer::instant());
    let c = r.controller.clone();
    let store = c.store().clone();

    c.start_session(&hr_setup(3)).await.unwrap();
    settle().await;

    let submit = {
        let c = c.clone();
        tokio::spawn(async move { c.submit_answer(&answer_of_len(150)).await })
    };
    settle().await;
    assert_eq!(c.phase(), Phase::WaitingOnServer);

    c.abandon().await;
    assert_eq!(c.phase(), Phase::Idle);
    assert!(store.messages().is_empty());
    assert_eq!(store.question_count(), 0);

    // The superseded reply resolves but must not touch the fresh session.
    gate.notify_waiters();
    submit.await.unwrap().unwrap();
    settle().await;
    assert!(store.messages().is_empty());
    assert_eq!(c.phase(), Phase::Idle);
}

#[tokio::test]
async fn failed_submission_returns_to_idle_with_draft_restored() {
    let r = rig(3, MockApi::new(), MockPlayer::instant());
    let c = &r.controller;
    let store = c.store().clone();

    c.start_session(&hr_setup(3)).await.unwrap();
    settle().await;

    r.api.fail_submit.store(true, Ordering::SeqCst);
    c.set_draft(&answer_of_len(150));
    let err = c.submit_draft().await.unwrap_err();
    assert!(matches!(err, TurnError::Network(_)));

    // The answer is handed back for editing; the transcript keeps the
    // attempted turn.
    assert_eq!(c.phase(), Phase::Idle);
    assert_eq!(c.draft().chars().count(), 150);
    assert_eq!(store.messages().len(), 2);
    assert_eq!(store.messages().pop().unwrap().role, Role::User);

    // Once the connection recovers, the same draft goes through.
    r.api.fail_submit.store(false, Ordering::SeqCst);
    c.submit_draft().await.unwrap();
    settle().await;
    assert_eq!(c.phase(), Phase::AwaitingDecision);
    assert!(c.draft().is_empty());
}

#[tokio::test]
async fn failed_revise_settles_back_to_awaiting_decision() {
    let api = MockApi::new();
    api.queue_feedback("FB1");
    let r = rig(3, api, MockPlayer::instant());
    let c = &r.controller;
    let store = c.store().clone();

    c.start_session(&hr_setup(3)).await.unwrap();
    settle().await;
    c.submit_answer(&answer_of_len(150)).await.unwrap();
    settle().await;
    assert_eq!(c.phase(), Phase::AwaitingDecision);

    r.api.fail_revise.store(true, Ordering::SeqCst);
    let err = c.decide_revise().await.unwrap_err();
    assert!(matches!(err, TurnError::Network(_)));
    assert_eq!(c.phase(), Phase::AwaitingDecision);
    assert_eq!(store.question_count(), 1);

    r.api.fail_revise.store(false, Ordering::SeqCst);
    c.decide_revise().await.unwrap();
    settle().await;
    assert_eq!(c.phase(), Phase::Idle);
    assert_eq!(store.question_count(), 1);
}

#[tokio::test]
async fn failed_next_question_settles_back_to_awaiting_decision() {
    let api = MockApi::new();
    api.queue_feedback("FB1");
    api.queue_next("Q2");
    let r = rig(3, api, MockPlayer::instant());
    let c = &r.controller;
    let store = c.store().clone();

    c.start_session(&hr_setup(3)).await.unwrap();
    settle().await;
    c.submit_answer(&answer_of_len(150)).await.unwrap();
    settle().await;

    r.api.fail_next.store(true, Ordering::SeqCst);
    let err = c.decide_continue().await.unwrap_err();
    assert!(matches!(err, TurnError::Network(_)));
    assert_eq!(c.phase(), Phase::AwaitingDecision);
    assert_eq!(store.question_count(), 1);

    r.api.fail_next.store(false, Ordering::SeqCst);
    c.decide_continue().await.unwrap();
    settle().await;
    assert_eq!(c.phase(), Phase::Idle);
    assert_eq!(store.question_count(), 2);
}

#[tokio::test]
async fn failed_assessment_can_be_retried_from_complete() {
    let api = MockApi::new();
    api.queue_feedback("FB1");
    let r = rig(1, api, MockPlayer::instant());
    let c = &r.controller;
    let store = c.store().clone();

    c.start_session(&hr_setup(1)).await.unwrap();
    settle().await;
    c.submit_answer(&answer_of_len(150)).await.unwrap();
    settle().await;

    r.api.fail_assessment.store(true, Ordering::SeqCst);
    let err = c.decide_continue().await.unwrap_err();
    assert!(matches!(err, TurnError::TerminalData(_)));

    // No partial state: still Complete, nothing recorded, retry is open.
    assert_eq!(c.phase(), Phase::Complete);
    assert!(store.overall_feedback().is_none());
    assert!(!store.interview_complete());

    r.api.fail_assessment.store(false, Ordering::SeqCst);
    c.fetch_final_assessment().await.unwrap();
    assert_eq!(r.api.assessment_calls.load(Ordering::SeqCst), 2);
    assert!(store.interview_complete());
    assert!(store.overall_feedback().is_some());
}

#[tokio::test]
async fn invalid_setup_blocks_the_start_call() {
    let r = rig(3, MockApi::new(), MockPlayer::instant());
    let c = &r.controller;

    let bad = InterviewSetup {
        interview_type: None,
        ..hr_setup(3)
    };
    let err = c.start_session(&bad).await.unwrap_err();
    assert!(matches!(err, TurnError::Setup(_)));
    assert_eq!(c.phase(), Phase::Idle);
    assert!(c.store().messages().is_empty());
}

#[tokio::test]
async fn transcript_populates_the_draft_after_voice_answer() {
    let r = rig(3, MockApi::new(), MockPlayer::instant());
    let c = &r.controller;

    c.start_session(&hr_setup(3)).await.unwrap();
    settle().await;

    c.start_recording().await.unwrap();
    assert_eq!(c.phase(), Phase::Recording);
    c.stop_recording().await.unwrap();

    assert_eq!(c.draft(), "spoken answer");
    assert_eq!(c.phase(), Phase::Idle);
    // Voice capture alone appends nothing; submission is a separate step.
    assert_eq!(c.store().messages().len(), 1);
}
