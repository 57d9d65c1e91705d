use crate::timer::Countdown;
use crate::traits::{
    CaptureError, SessionApi, SpeechPlayer, Transcriber, TranscriptionError, VoiceCapture,
};
use intervox_core::answer::{AnswerGuardError, clip_answer, enter_submits, validate_answer};
use intervox_core::setup::{InterviewSetup, SetupValidationError};
use intervox_core::store::{ConversationStore, StoreError};
use intervox_core::types::Message;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Hard ceiling on one recording, in seconds.
pub const RECORDING_LIMIT_SECS: u32 = 60;

/// Controller phases. Exactly one suspension point maps to each non-idle,
/// non-decision phase: microphone capture, transcription call, playback,
/// network round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Recording,
    Transcribing,
    AwaitingDecision,
    Speaking,
    WaitingOnServer,
    Complete,
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Setup(#[from] SetupValidationError),

    #[error(transparent)]
    Guard(#[from] AnswerGuardError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Transcription(#[from] TranscriptionError),

    #[error("network call failed: {0}")]
    Network(#[source] anyhow::Error),

    #[error("final assessment unavailable: {0}")]
    TerminalData(#[source] anyhow::Error),

    #[error("operation not allowed while {0:?}")]
    Busy(Phase),

    #[error("no feedback decision is pending")]
    NotAwaitingDecision,

    #[error("no interview session in progress")]
    NoSession,

    #[error("interview already complete")]
    SessionComplete,

    #[error("final assessment already fetched")]
    AssessmentAlreadyFetched,
}

impl From<StoreError> for TurnError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::FeedbackAlreadySet => TurnError::AssessmentAlreadyFetched,
        }
    }
}

struct ControllerState {
    phase: Phase,
    draft: String,
    countdown: Option<Countdown>,

    // Session generation. Bumped on start/abandon so that a stale async
    // continuation (network reply, transcript, playback end) resolving after
    // a reset cannot corrupt the newer session.
    epoch: u64,
}

/// The conversation turn controller: sole orchestrator of the
/// question -> answer -> feedback -> next cycle for one interview session.
///
/// Cloning yields a handle to the same controller; internal continuations
/// (timer expiry, playback end) hold such clones.
#[derive(Clone)]
pub struct TurnController {
    store: ConversationStore,
    api: Arc<dyn SessionApi>,
    capture: Arc<dyn VoiceCapture>,
    transcriber: Arc<dyn Transcriber>,
    player: Arc<dyn SpeechPlayer>,
    state: Arc<Mutex<ControllerState>>,
}

impl TurnController {
    pub fn new(
        store: ConversationStore,
        api: Arc<dyn SessionApi>,
        capture: Arc<dyn VoiceCapture>,
        transcriber: Arc<dyn Transcriber>,
        player: Arc<dyn SpeechPlayer>,
    ) -> Self {
        Self {
            store,
            api,
            capture,
            transcriber,
            player,
            state: Arc::new(Mutex::new(ControllerState {
                phase: Phase::Idle,
                draft: String::new(),
                countdown: None,
                epoch: 0,
            })),
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().unwrap().phase
    }

    pub fn draft(&self) -> String {
        self.state.lock().unwrap().draft.clone()
    }

    /// Replaces the draft, clipped at the maximum answer length.
    pub fn set_draft(&self, text: &str) {
        self.state.lock().unwrap().draft = clip_answer(text).to_string();
    }

    /// Seconds left on the active recording, if one is running.
    pub fn recording_seconds_left(&self) -> Option<u32> {
        let state = self.state.lock().unwrap();
        state.countdown.as_ref().map(|c| c.remaining())
    }

    fn begin(&self, expected: Phase, next: Phase) -> Result<u64, Phase> {
        let mut state = self.state.lock().unwrap();
        if state.phase != expected {
            return Err(state.phase);
        }
        state.phase = next;
        Ok(state.epoch)
    }

    fn epoch_current(&self, epoch: u64) -> bool {
        self.state.lock().unwrap().epoch == epoch
    }

    /// Sets the phase only if the session context is still the one the
    /// caller captured.
    fn settle(&self, epoch: u64, phase: Phase) {
        let mut state = self.state.lock().unwrap();
        if state.epoch == epoch {
            state.phase = phase;
        }
    }

    /// Validates setup, starts a fresh session, and speaks the first
    /// question. The first accepted question counts toward `question_count`.
    pub async fn start_session(&self, setup: &InterviewSetup) -> Result<(), TurnError> {
        setup.validate()?;

        let epoch = {
            let mut state = self.state.lock().unwrap();
            match state.phase {
                Phase::Idle | Phase::Complete => {}
                other => return Err(TurnError::Busy(other)),
            }
            state.epoch += 1;
            state.phase = Phase::WaitingOnServer;
            state.draft.clear();
            state.epoch
        };
        self.store.reset();

        match self.api.start_session(setup).await {
            Ok(started) => {
                if !self.epoch_current(epoch) {
                    return Ok(());
                }
                self.store.set_session(started.session_id);
                self.store.set_interview_started(true);
                self.store.increment_question_count();
                self.store
                    .add_message(Message::ai(&started.question, started.is_feedback));
                self.settle(epoch, Phase::Speaking);
                self.speak_in_background(started.question, epoch);
                Ok(())
            }
            Err(e) => {
                log::error!("failed to start interview: {e:#}");
                self.settle(epoch, Phase::Idle);
                Err(TurnError::Network(e))
            }
        }
    }

    /// Begins voice capture with the 60-second countdown attached.
    pub async fn start_recording(&self) -> Result<(), TurnError> {
        if self.store.interview_complete() {
            return Err(TurnError::SessionComplete);
        }
        if self.store.is_ai_speaking() {
            return Err(TurnError::Busy(Phase::Speaking));
        }

        let epoch = self
            .begin(Phase::Idle, Phase::Recording)
            .map_err(TurnError::Busy)?;

        if let Err(e) = self.capture.start().await {
            self.settle(epoch, Phase::Idle);
            return Err(e.into());
        }

        let expiry_handle = self.clone();
        let countdown = Countdown::start(RECORDING_LIMIT_SECS, |_| {}, move || {
            // Expiry takes the same stop path as a manual stop.
            tokio::spawn(async move {
                if let Err(e) = expiry_handle.stop_recording().await {
                    log::warn!("countdown-forced stop failed: {e}");
                }
            });
        });

        let mut state = self.state.lock().unwrap();
        if state.epoch == epoch && state.phase == Phase::Recording {
            state.countdown = Some(countdown);
        }
        // Otherwise the session moved on; dropping the countdown cancels it.
        Ok(())
    }

    /// Stops capture and transcribes the answer into the draft.
    ///
    /// A no-op when no recording is active, so manual stop racing countdown
    /// expiry requests transcription exactly once.
    pub async fn stop_recording(&self) -> Result<(), TurnError> {
        let epoch = {
            let mut state = self.state.lock().unwrap();
            if state.phase != Phase::Recording {
                return Ok(());
            }
            state.phase = Phase::Transcribing;
            let countdown = state.countdown.take();
            let epoch = state.epoch;
            drop(state);
            if let Some(mut countdown) = countdown {
                countdown.cancel();
            }
            epoch
        };

        let audio = match self.capture.stop().await {
            Ok(audio) => audio,
            Err(e) => {
                self.settle(epoch, Phase::Idle);
                return Err(e.into());
            }
        };

        if !self.epoch_current(epoch) {
            return Ok(());
        }

        match self.transcriber.transcribe(&audio).await {
            Ok(text) => {
                let mut state = self.state.lock().unwrap();
                if state.epoch == epoch {
                    state.draft = clip_answer(&text).to_string();
                    if state.phase == Phase::Transcribing {
                        state.phase = Phase::Idle;
                    }
                }
                Ok(())
            }
            Err(e) => {
                // The draft is left untouched: a voice failure must not
                // clobber a partially typed answer.
                self.settle(epoch, Phase::Idle);
                Err(e.into())
            }
        }
    }

    /// Submits the current draft, clearing it once the guard passes.
    pub async fn submit_draft(&self) -> Result<(), TurnError> {
        let draft = self.draft();
        let answer = validate_answer(&draft)?;
        self.state.lock().unwrap().draft.clear();

        let result = self.submit_answer(&answer).await;
        if result.is_err() {
            // Give the answer back for editing rather than losing it.
            let mut state = self.state.lock().unwrap();
            if state.draft.is_empty() {
                state.draft = draft;
            }
        }
        result
    }

    /// Enter-without-shift submits only when the guard passes; otherwise the
    /// keystroke is absorbed. Returns whether a submission happened.
    pub async fn submit_on_enter(&self, shift_held: bool) -> Result<bool, TurnError> {
        if !enter_submits(&self.draft(), shift_held) {
            return Ok(false);
        }
        self.submit_draft().await.map(|_| true)
    }

    /// Appends the user's answer and asks the server for feedback or the
    /// next question.
    pub async fn submit_answer(&self, text: &str) -> Result<(), TurnError> {
        if self.store.interview_complete() {
            return Err(TurnError::SessionComplete);
        }
        if self.store.is_ai_speaking() {
            return Err(TurnError::Busy(Phase::Speaking));
        }
        let session = self.store.session_id().ok_or(TurnError::NoSession)?;

        // Guard first: a rejected answer appends nothing and sends nothing.
        let answer = validate_answer(text)?;

        let epoch = self
            .begin(Phase::Idle, Phase::WaitingOnServer)
            .map_err(TurnError::Busy)?;

        self.store.add_message(Message::user(answer.clone()));

        match self.api.submit_answer(&session, &answer).await {
            Ok(reply) => {
                if !self.epoch_current(epoch) {
                    return Ok(());
                }
                self.store
                    .add_message(Message::ai(&reply.text, reply.is_feedback));

                if reply.is_feedback {
                    // The user owes a revise/continue decision; feedback
                    // playback happens inside that phase.
                    self.settle(epoch, Phase::AwaitingDecision);
                } else {
                    self.store.increment_question_count();
                    self.settle(epoch, Phase::Speaking);
                }
                self.speak_in_background(reply.text, epoch);
                Ok(())
            }
            Err(e) => {
                log::warn!("answer submission failed: {e:#}");
                self.settle(epoch, Phase::Idle);
                Err(TurnError::Network(e))
            }
        }
    }

    /// "Yes, revise": re-requests a fresh prompt for the same slot without
    /// touching `question_count`.
    pub async fn decide_revise(&self) -> Result<(), TurnError> {
        if self.store.is_ai_speaking() {
            return Err(TurnError::Busy(Phase::Speaking));
        }
        let session = self.store.session_id().ok_or(TurnError::NoSession)?;

        let epoch = self
            .begin(Phase::AwaitingDecision, Phase::WaitingOnServer)
            .map_err(|_| TurnError::NotAwaitingDecision)?;

        match self.api.revise_answer(&session).await {
            Ok(question) => {
                if !self.epoch_current(epoch) {
                    return Ok(());
                }
                self.store.add_message(Message::ai(&question, false));
                self.settle(epoch, Phase::Speaking);
                self.speak_in_background(question, epoch);
                Ok(())
            }
            Err(e) => {
                log::warn!("revise request failed: {e:#}");
                self.settle(epoch, Phase::AwaitingDecision);
                Err(TurnError::Network(e))
            }
        }
    }

    /// "No, continue": advances to the next question, or — at the final
    /// question — completes the interview and fetches the assessment.
    pub async fn decide_continue(&self) -> Result<(), TurnError> {
        if self.store.is_ai_speaking() {
            return Err(TurnError::Busy(Phase::Speaking));
        }
        let session = self.store.session_id().ok_or(TurnError::NoSession)?;

        if self.store.question_count() >= self.store.max_questions() {
            let epoch = self
                .begin(Phase::AwaitingDecision, Phase::Complete)
                .map_err(|_| TurnError::NotAwaitingDecision)?;
            return self.fetch_assessment_inner(epoch).await;
        }

        let epoch = self
            .begin(Phase::AwaitingDecision, Phase::WaitingOnServer)
            .map_err(|_| TurnError::NotAwaitingDecision)?;

        match self.api.next_question(&session).await {
            Ok(question) => {
                if !self.epoch_current(epoch) {
                    return Ok(());
                }
                self.store.increment_question_count();
                self.store.add_message(Message::ai(&question, false));
                self.settle(epoch, Phase::Speaking);
                self.speak_in_background(question, epoch);
                Ok(())
            }
            Err(e) => {
                log::warn!("next-question request failed: {e:#}");
                self.settle(epoch, Phase::AwaitingDecision);
                Err(TurnError::Network(e))
            }
        }
    }

    /// Retries the final assessment fetch after a failed attempt. Only legal
    /// once the interview reached `Complete`.
    pub async fn fetch_final_assessment(&self) -> Result<(), TurnError> {
        let epoch = {
            let state = self.state.lock().unwrap();
            if state.phase != Phase::Complete {
                return Err(TurnError::Busy(state.phase));
            }
            state.epoch
        };
        self.fetch_assessment_inner(epoch).await
    }

    async fn fetch_assessment_inner(&self, epoch: u64) -> Result<(), TurnError> {
        if self.store.overall_feedback().is_some() {
            return Err(TurnError::AssessmentAlreadyFetched);
        }
        let session = self.store.session_id().ok_or(TurnError::NoSession)?;

        match self.api.final_assessment(&session).await {
            Ok(feedback) => {
                if !self.epoch_current(epoch) {
                    return Ok(());
                }
                self.store.set_overall_feedback(feedback)?;
                self.store.set_interview_complete(true);
                Ok(())
            }
            Err(e) => {
                // Loading cleared, no partial state written; the caller may
                // retry via `fetch_final_assessment`.
                log::error!("final assessment fetch failed: {e:#}");
                Err(TurnError::TerminalData(e))
            }
        }
    }

    /// Stops the current utterance. The transcript and counters are
    /// untouched; only the audio channel is affected.
    pub fn skip_speech(&self) {
        self.player.skip();
    }

    /// Abandons the session from any non-terminal point: cancels the
    /// countdown, stops playback, discards any in-flight capture, and resets
    /// the store to a fresh state.
    pub async fn abandon(&self) {
        let was_recording = {
            let mut state = self.state.lock().unwrap();
            state.epoch += 1;
            let was_recording = state.phase == Phase::Recording;
            state.phase = Phase::Idle;
            state.draft.clear();
            let countdown = state.countdown.take();
            drop(state);
            if let Some(mut countdown) = countdown {
                countdown.cancel();
            }
            was_recording
        };

        self.player.skip();
        if was_recording {
            // Best-effort: stop and discard captured audio.
            let _ = self.capture.stop().await;
        }
        self.store.reset();
    }

    fn speak_in_background(&self, text: String, epoch: u64) {
        self.store.set_ai_speaking(true);
        let handle = self.clone();
        tokio::spawn(async move {
            if let Err(e) = handle.player.speak(&text).await {
                log::warn!("speech synthesis failed: {e}");
            }
            if !handle.epoch_current(epoch) {
                return;
            }
            handle.store.set_ai_speaking(false);

            let mut state = handle.state.lock().unwrap();
            if state.epoch == epoch && state.phase == Phase::Speaking {
                state.phase = Phase::Idle;
            }
        });
    }
}
