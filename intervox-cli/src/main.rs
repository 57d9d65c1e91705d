// Terminal driver: runs a full interview against the remote API configured
// through INTERVOX_* environment variables. Answers are typed; spoken turns
// are printed instead of synthesized, so no audio device is needed.

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use intervox_app::adapters::{HttpSessionApi, HttpTranscriber};
use intervox_app::{ClientConfig, InterviewService};
use intervox_core::answer::{MAX_ANSWER_CHARS, MIN_ANSWER_CHARS};
use intervox_core::setup::{InterviewCategory, InterviewSetup, SetupInputType};
use intervox_core::store::ConversationStore;
use intervox_engine::controller::{Phase, TurnController, TurnError};
use intervox_engine::traits::{
    AudioInput, CaptureError, SpeechPlayer, SynthesisError, VoiceCapture,
};

struct ConsolePlayer;

#[async_trait::async_trait]
impl SpeechPlayer for ConsolePlayer {
    async fn speak(&self, text: &str) -> Result<(), SynthesisError> {
        println!("\n[interviewer] {text}");
        Ok(())
    }

    fn skip(&self) {}
}

struct NoMicrophone;

#[async_trait::async_trait]
impl VoiceCapture for NoMicrophone {
    async fn start(&self) -> Result<(), CaptureError> {
        Err(CaptureError::Unavailable(
            "voice capture is not wired in the terminal driver".into(),
        ))
    }

    async fn stop(&self) -> Result<AudioInput, CaptureError> {
        Err(CaptureError::Unavailable(
            "voice capture is not wired in the terminal driver".into(),
        ))
    }
}

fn setup_from_env(max_questions: u32) -> InterviewSetup {
    InterviewSetup {
        company_name: std::env::var("INTERVOX_COMPANY").ok(),
        job_role: std::env::var("INTERVOX_JOB_ROLE").ok(),
        category: InterviewCategory::Hr,
        interview_type: Some(
            std::env::var("INTERVOX_INTERVIEW_TYPE").unwrap_or_else(|_| "behavioral".into()),
        ),
        domain: None,
        input_type: SetupInputType::SkillsBased,
        skills: vec![],
        job_description: None,
        max_questions,
    }
}

fn read_line() -> anyhow::Result<String> {
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line)
}

/// Waits until nothing is being spoken and no server call is in flight, so
/// the prompt does not interleave with interviewer output.
async fn wait_for_quiet(controller: &TurnController) {
    loop {
        let busy = controller.store().is_ai_speaking()
            || matches!(
                controller.phase(),
                Phase::Speaking | Phase::WaitingOnServer | Phase::Transcribing
            );
        if !busy {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cfg = ClientConfig::from_env()?;
    log::debug!("using configuration {cfg:?}");

    let controller = TurnController::new(
        ConversationStore::new(cfg.max_questions),
        Arc::new(HttpSessionApi::new(&cfg)),
        Arc::new(NoMicrophone),
        Arc::new(HttpTranscriber::new(&cfg)),
        Arc::new(ConsolePlayer),
    );
    let service = InterviewService::with_controller(controller);
    let controller = service.controller().clone();

    println!(
        "Starting a {}-question practice interview...",
        cfg.max_questions
    );
    service
        .start_new_interview(&setup_from_env(cfg.max_questions))
        .await?;

    loop {
        wait_for_quiet(&controller).await;

        match controller.phase() {
            Phase::Complete => break,
            Phase::AwaitingDecision => {
                print!("Revise this answer? [y/N] ");
                std::io::stdout().flush()?;
                let line = read_line()?;
                if line.trim().eq_ignore_ascii_case("y") {
                    controller.decide_revise().await?;
                } else {
                    controller.decide_continue().await?;
                }
            }
            Phase::Idle => {
                println!(
                    "\nYour answer ({MIN_ANSWER_CHARS}-{MAX_ANSWER_CHARS} characters, one line):"
                );
                let line = read_line()?;
                match controller.submit_answer(line.trim()).await {
                    Ok(()) => {}
                    Err(TurnError::Guard(e)) => println!("{e}"),
                    Err(e) => return Err(e.into()),
                }
            }
            _ => tokio::time::sleep(Duration::from_millis(25)).await,
        }
    }

    if let Some(fb) = controller.store().overall_feedback() {
        println!("\n=== Final assessment ===");
        println!("score: {} ({})", fb.overall_score, fb.level);
        println!("{}", fb.summary);
        println!("{}", fb.closure_message);
    }

    Ok(())
}
