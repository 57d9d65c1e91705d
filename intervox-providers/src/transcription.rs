use crate::request::{Body, HttpRequest, Method, join_url};
use anyhow::Context;
use serde::Deserialize;

#[derive(Clone, PartialEq, Eq)]
pub struct TranscribeConfig {
    pub base_url: String,
    pub api_key: String,
    pub language: Option<String>,
}

impl std::fmt::Debug for TranscribeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscribeConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("language", &self.language)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioUpload {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Encodes mono f32 samples in [-1, 1] as little-endian 16-bit PCM for
/// upload.
pub fn encode_pcm_s16le(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let clamped = s.clamp(-1.0, 1.0);
        let v = (clamped * i16::MAX as f32) as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

pub fn build_transcribe_request(cfg: &TranscribeConfig, audio: &AudioUpload) -> HttpRequest {
    let boundary = format!("Boundary-{}", uuid::Uuid::new_v4());

    let mut body: Vec<u8> = Vec::new();
    append_file(
        &mut body,
        &boundary,
        "file",
        &audio.filename,
        &audio.mime_type,
        &audio.bytes,
    );
    append_field(&mut body, &boundary, "file_format", "pcm_s16le_16");
    if let Some(lang) = cfg.language.as_ref().filter(|s| !s.trim().is_empty()) {
        append_field(&mut body, &boundary, "language", lang);
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    HttpRequest {
        method: Method::Post,
        url: join_url(&cfg.base_url, "/speech/transcribe"),
        headers: vec![
            (
                "Content-Type".into(),
                format!("multipart/form-data; boundary={boundary}"),
            ),
            ("Accept".into(), "application/json".into()),
            ("Authorization".into(), format!("Bearer {}", cfg.api_key)),
        ],
        body: Body::MultipartFormData {
            boundary,
            bytes: body,
        },
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionWire {
    text: String,
}

pub fn parse_transcription(body: &[u8]) -> anyhow::Result<String> {
    let wire: TranscriptionWire =
        serde_json::from_slice(body).context("decode transcription JSON")?;
    Ok(wire.text)
}

fn append_field(body: &mut Vec<u8>, boundary: &str, name: &str, value: &str) {
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(value.as_bytes());
    body.extend_from_slice(b"\r\n");
}

fn append_file(
    body: &mut Vec<u8>,
    boundary: &str,
    name: &str,
    filename: &str,
    mime_type: &str,
    bytes: &[u8],
) {
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {mime_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(b"\r\n");
}
