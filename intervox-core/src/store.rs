use crate::assessment::OverallFeedback;
use crate::types::{Message, SessionId};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("overall feedback already recorded for this session")]
    FeedbackAlreadySet,
}

/// Change notification delivered to store observers.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    SessionStarted(SessionId),
    MessageAppended(Message),
    QuestionCount(u32),
    SpeakingChanged(bool),
    FeedbackRecorded,
    Completed,
    Reset,
}

type Observer = Box<dyn Fn(&StoreEvent) + Send + Sync>;

#[derive(Debug, Default)]
struct StoreState {
    session_id: Option<SessionId>,
    messages: Vec<Message>,
    question_count: u32,
    interview_started: bool,
    interview_complete: bool,
    overall_feedback: Option<OverallFeedback>,
    is_ai_speaking: bool,
}

/// The ordered transcript of turns plus session lifecycle flags.
///
/// Single shared mutable state for one interview session. Cloning yields a
/// handle to the same underlying state. All operations are synchronous
/// in-memory mutations; no I/O happens here.
#[derive(Clone)]
pub struct ConversationStore {
    state: Arc<Mutex<StoreState>>,
    observers: Arc<Mutex<Vec<Observer>>>,
    max_questions: u32,
}

impl ConversationStore {
    pub fn new(max_questions: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            observers: Arc::new(Mutex::new(Vec::new())),
            max_questions,
        }
    }

    /// Registers an observer for subsequent state changes.
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.observers.lock().unwrap().push(Box::new(observer));
    }

    fn notify(&self, event: StoreEvent) {
        // Observers run outside the state lock so they may read back freely.
        let observers = self.observers.lock().unwrap();
        for obs in observers.iter() {
            obs(&event);
        }
    }

    pub fn set_session(&self, id: SessionId) {
        self.state.lock().unwrap().session_id = Some(id.clone());
        self.notify(StoreEvent::SessionStarted(id));
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.state.lock().unwrap().session_id.clone()
    }

    /// Appends a turn to the transcript. Messages are append-only; insertion
    /// order is the display order and the semantic turn order.
    pub fn add_message(&self, message: Message) {
        self.state.lock().unwrap().messages.push(message.clone());
        self.notify(StoreEvent::MessageAppended(message));
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.lock().unwrap().messages.clone()
    }

    /// Bumps the question counter. The store does not clamp; exceeding
    /// `max_questions` is a controller-level programming error.
    pub fn increment_question_count(&self) -> u32 {
        let count = {
            let mut state = self.state.lock().unwrap();
            state.question_count += 1;
            state.question_count
        };
        self.notify(StoreEvent::QuestionCount(count));
        count
    }

    pub fn question_count(&self) -> u32 {
        self.state.lock().unwrap().question_count
    }

    pub fn max_questions(&self) -> u32 {
        self.max_questions
    }

    pub fn set_interview_started(&self, started: bool) {
        self.state.lock().unwrap().interview_started = started;
    }

    pub fn interview_started(&self) -> bool {
        self.state.lock().unwrap().interview_started
    }

    pub fn set_interview_complete(&self, complete: bool) {
        self.state.lock().unwrap().interview_complete = complete;
        if complete {
            self.notify(StoreEvent::Completed);
        }
    }

    pub fn interview_complete(&self) -> bool {
        self.state.lock().unwrap().interview_complete
    }

    /// Records the final assessment. Set at most once per session; a second
    /// call without an intervening reset is rejected.
    pub fn set_overall_feedback(&self, feedback: OverallFeedback) -> Result<(), StoreError> {
        {
            let mut state = self.state.lock().unwrap();
            if state.overall_feedback.is_some() {
                return Err(StoreError::FeedbackAlreadySet);
            }
            state.overall_feedback = Some(feedback);
        }
        self.notify(StoreEvent::FeedbackRecorded);
        Ok(())
    }

    pub fn overall_feedback(&self) -> Option<OverallFeedback> {
        self.state.lock().unwrap().overall_feedback.clone()
    }

    pub fn set_ai_speaking(&self, speaking: bool) {
        self.state.lock().unwrap().is_ai_speaking = speaking;
        self.notify(StoreEvent::SpeakingChanged(speaking));
    }

    pub fn is_ai_speaking(&self) -> bool {
        self.state.lock().unwrap().is_ai_speaking
    }

    /// Whether the latest transcript entry is immediate AI feedback, i.e. the
    /// user currently owes a revise/continue decision.
    pub fn latest_is_feedback(&self) -> bool {
        self.state
            .lock()
            .unwrap()
            .messages
            .last()
            .map(|m| m.is_feedback)
            .unwrap_or(false)
    }

    /// Restores all fields to initial empty values. `max_questions` is
    /// configuration, not session state, and survives the reset.
    pub fn reset(&self) {
        {
            let mut state = self.state.lock().unwrap();
            *state = StoreState::default();
        }
        self.notify(StoreEvent::Reset);
    }
}
