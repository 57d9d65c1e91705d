use crate::request::{Body, HttpRequest, Method, join_url};
use anyhow::{Context, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::json;

#[derive(Clone, PartialEq, Eq)]
pub struct SynthesisConfig {
    pub base_url: String,
    pub api_key: String,
    pub voice: Option<String>,
}

impl std::fmt::Debug for SynthesisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("voice", &self.voice)
            .finish()
    }
}

/// Decoded synthesized speech, ready for the playback device.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    pub sample_rate_hz: u32,
    pub samples: Vec<f32>,
}

pub fn build_speech_request(cfg: &SynthesisConfig, text: &str) -> HttpRequest {
    let mut payload = json!({ "text": text });
    if let Some(voice) = cfg.voice.as_ref().filter(|v| !v.trim().is_empty()) {
        payload["voice"] = json!(voice);
    }

    HttpRequest {
        method: Method::Post,
        url: join_url(&cfg.base_url, "/speech/synthesize"),
        headers: vec![
            ("Content-Type".into(), "application/json".into()),
            ("Authorization".into(), format!("Bearer {}", cfg.api_key)),
        ],
        body: Body::Json(payload.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct SpeechWire {
    audio_base64: String,
    sample_rate_hz: u32,
}

/// Parses the synthesis response: base64-encoded little-endian 16-bit PCM,
/// decoded to mono f32 samples.
pub fn parse_speech_response(body: &[u8]) -> anyhow::Result<SynthesizedAudio> {
    let wire: SpeechWire = serde_json::from_slice(body).context("decode synthesis JSON")?;
    let pcm = BASE64
        .decode(wire.audio_base64.as_bytes())
        .context("decode synthesis audio")?;
    if pcm.len() % 2 != 0 {
        bail!("synthesis audio has odd byte length");
    }
    if wire.sample_rate_hz == 0 {
        bail!("synthesis audio has zero sample rate");
    }

    let samples = pcm
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / i16::MAX as f32)
        .collect();

    Ok(SynthesizedAudio {
        sample_rate_hz: wire.sample_rate_hz,
        samples,
    })
}
