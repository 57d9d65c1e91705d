// HTTP- and device-backed implementations of the engine trait seams.
//
// Each adapter is a thin shell: requests are built and parsed by
// intervox-providers, devices are driven by intervox-audio; this module only
// connects them and maps errors into the engine taxonomy.

use crate::config::ClientConfig;
use anyhow::{Context, anyhow, bail};
use async_trait::async_trait;
use intervox_audio::{AudioCaptureError, MicRecorder, PlaybackStop, play_mono};
use intervox_core::assessment::OverallFeedback;
use intervox_core::setup::InterviewSetup;
use intervox_core::types::SessionId;
use intervox_engine::traits::{
    AudioInput, CaptureError, SessionApi, SpeechPlayer, StartedSession, SynthesisError,
    Transcriber, TranscriptionError, TurnReply, VoiceCapture,
};
use intervox_providers::runtime::{HttpResponse, execute};
use intervox_providers::transcription::{AudioUpload, encode_pcm_s16le};
use intervox_providers::{session_api, transcription, tts};
use std::sync::Arc;

fn ensure_success(resp: &HttpResponse, what: &str) -> anyhow::Result<()> {
    if resp.is_success() {
        return Ok(());
    }
    Err(anyhow!(
        "{what} failed: status={} body={}",
        resp.status,
        String::from_utf8_lossy(&resp.body)
    ))
}

/// `SessionApi` over the remote HTTP endpoints.
pub struct HttpSessionApi {
    cfg: session_api::SessionApiConfig,
}

impl HttpSessionApi {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            cfg: config.session_api(),
        }
    }
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn start_session(&self, setup: &InterviewSetup) -> anyhow::Result<StartedSession> {
        let req = session_api::build_start_request(&self.cfg, setup)?;
        let resp = execute(&req).await?;
        ensure_success(&resp, "interview start")?;
        let started = session_api::parse_start_response(&resp.body)?;
        Ok(StartedSession {
            session_id: started.session_id,
            question: started.question,
            is_feedback: started.is_feedback,
        })
    }

    async fn submit_answer(
        &self,
        session: &SessionId,
        answer: &str,
    ) -> anyhow::Result<TurnReply> {
        let req = session_api::build_submit_request(&self.cfg, session, answer);
        let resp = execute(&req).await?;
        ensure_success(&resp, "answer submission")?;
        let reply = session_api::parse_answer_reply(&resp.body)?;
        Ok(TurnReply {
            text: reply.text,
            is_feedback: reply.is_feedback,
        })
    }

    async fn revise_answer(&self, session: &SessionId) -> anyhow::Result<String> {
        let req = session_api::build_revise_request(&self.cfg, session);
        let resp = execute(&req).await?;
        ensure_success(&resp, "revise request")?;
        session_api::parse_question_reply(&resp.body)
    }

    async fn next_question(&self, session: &SessionId) -> anyhow::Result<String> {
        let req = session_api::build_next_request(&self.cfg, session);
        let resp = execute(&req).await?;
        ensure_success(&resp, "next-question request")?;
        session_api::parse_question_reply(&resp.body)
    }

    async fn final_assessment(&self, session: &SessionId) -> anyhow::Result<OverallFeedback> {
        let req = session_api::build_assessment_request(&self.cfg, session);
        let resp = execute(&req).await?;
        ensure_success(&resp, "final assessment")?;
        session_api::parse_final_assessment(&resp.body)
    }
}

/// `Transcriber` over the multipart transcription endpoint.
pub struct HttpTranscriber {
    cfg: transcription::TranscribeConfig,
}

impl HttpTranscriber {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            cfg: config.transcription(),
        }
    }

    async fn transcribe_inner(&self, audio: &AudioInput) -> anyhow::Result<String> {
        // The upload format is fixed at 16 kHz; capture resamples before
        // handing audio over.
        if audio.sample_rate_hz != 16_000 {
            bail!(
                "transcription upload expects 16 kHz audio, got {} Hz",
                audio.sample_rate_hz
            );
        }

        let upload = AudioUpload {
            filename: "answer.pcm".into(),
            mime_type: "application/octet-stream".into(),
            bytes: encode_pcm_s16le(&audio.samples),
        };
        let req = transcription::build_transcribe_request(&self.cfg, &upload);
        let resp = execute(&req).await?;
        ensure_success(&resp, "transcription")?;
        transcription::parse_transcription(&resp.body)
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio: &AudioInput) -> Result<String, TranscriptionError> {
        self.transcribe_inner(audio).await.map_err(TranscriptionError)
    }
}

#[derive(Default)]
struct ActiveUtterance {
    generation: u64,
    stop: Option<PlaybackStop>,
}

/// `SpeechPlayer` that synthesizes via the TTS endpoint and plays on the
/// default output device. Last-call-wins: a new `speak` stops whatever is
/// still playing.
pub struct TtsPlayer {
    cfg: tts::SynthesisConfig,
    active: Arc<std::sync::Mutex<ActiveUtterance>>,
}

impl TtsPlayer {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            cfg: config.synthesis(),
            active: Arc::new(std::sync::Mutex::new(ActiveUtterance::default())),
        }
    }

    async fn speak_inner(&self, text: &str) -> anyhow::Result<()> {
        // Claim the utterance slot before the fetch: a skip issued during
        // the synthesis round-trip supersedes this utterance.
        let my_generation = {
            let mut active = self.active.lock().unwrap();
            if let Some(prev) = active.stop.take() {
                prev.stop();
            }
            active.generation += 1;
            active.generation
        };

        let req = tts::build_speech_request(&self.cfg, text);
        let resp = execute(&req).await?;
        ensure_success(&resp, "speech synthesis")?;
        let audio = tts::parse_speech_response(&resp.body)?;

        if self.active.lock().unwrap().generation != my_generation {
            return Ok(());
        }

        // The playback worker blocks during stream setup and teardown; keep
        // it off the async executor.
        let playback =
            tokio::task::spawn_blocking(move || play_mono(audio.samples, audio.sample_rate_hz))
                .await
                .context("playback worker panicked")??;

        {
            let mut active = self.active.lock().unwrap();
            if active.generation == my_generation {
                active.stop = Some(playback.stop_handle());
            } else {
                // Superseded while the stream was being set up.
                playback.stop();
            }
        }

        tokio::task::spawn_blocking(move || playback.wait())
            .await
            .context("playback wait panicked")?;

        let mut active = self.active.lock().unwrap();
        if active.generation == my_generation {
            active.stop = None;
        }
        Ok(())
    }
}

#[async_trait]
impl SpeechPlayer for TtsPlayer {
    async fn speak(&self, text: &str) -> Result<(), SynthesisError> {
        self.speak_inner(text).await.map_err(SynthesisError)
    }

    fn skip(&self) {
        // Bumping the generation also cancels an utterance whose synthesis
        // fetch has not finished yet.
        let mut active = self.active.lock().unwrap();
        active.generation += 1;
        if let Some(stop) = active.stop.take() {
            stop.stop();
        }
    }
}

fn capture_error(e: AudioCaptureError) -> CaptureError {
    match e {
        AudioCaptureError::NoInputDevice => {
            CaptureError::Unavailable("no input device found".into())
        }
        AudioCaptureError::AlreadyRecording => CaptureError::AlreadyRecording,
        other => CaptureError::Failed(anyhow::Error::new(other)),
    }
}

/// `VoiceCapture` over the microphone recorder, opened lazily on first use
/// and reused across recordings.
pub struct DeviceCapture {
    preferred_device: Option<String>,
    recorder: Arc<tokio::sync::Mutex<Option<MicRecorder>>>,
}

impl DeviceCapture {
    pub fn new(preferred_device: Option<String>) -> Self {
        Self {
            preferred_device,
            recorder: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }
}

fn capture_worker_failed(e: tokio::task::JoinError) -> CaptureError {
    CaptureError::Failed(anyhow!("audio worker task failed: {e}"))
}

#[async_trait]
impl VoiceCapture for DeviceCapture {
    async fn start(&self) -> Result<(), CaptureError> {
        let mut recorder = self.recorder.lock().await;
        if recorder.is_none() {
            // Device open waits on the stream worker handshake; keep that
            // off the async executor.
            let preferred = self.preferred_device.clone();
            let opened =
                tokio::task::spawn_blocking(move || MicRecorder::open_named(preferred.as_deref()))
                    .await
                    .map_err(capture_worker_failed)?
                    .map_err(capture_error)?;
            *recorder = Some(opened);
        }
        recorder
            .as_ref()
            .ok_or_else(|| CaptureError::Unavailable("no input device found".into()))?
            .start()
            .map_err(capture_error)
    }

    async fn stop(&self) -> Result<AudioInput, CaptureError> {
        let mut slot = self.recorder.lock().await;
        let recorder = slot
            .take()
            .ok_or_else(|| CaptureError::Unavailable("no active recorder".into()))?;

        // stop_captured blocks on the stream worker draining; resampling is
        // CPU-bound. Both run off the executor, and the recorder goes back
        // into the slot either way.
        let (recorder, result) = tokio::task::spawn_blocking(move || {
            let result = recorder.stop_captured().and_then(|captured| {
                let samples = if captured.sample_rate_hz == 16_000 {
                    captured.samples
                } else {
                    MicRecorder::resample_to_16k(&captured.samples, captured.sample_rate_hz)?
                };
                Ok(AudioInput {
                    sample_rate_hz: 16_000,
                    samples,
                })
            });
            (recorder, result)
        })
        .await
        .map_err(capture_worker_failed)?;

        *slot = Some(recorder);
        result.map_err(capture_error)
    }
}
