use anyhow::Context;
use intervox_providers::session_api::SessionApiConfig;
use intervox_providers::transcription::TranscribeConfig;
use intervox_providers::tts::SynthesisConfig;

pub const DEFAULT_MAX_QUESTIONS: u32 = 3;

/// Client-side configuration for one interview deployment: where the remote
/// API lives, how to authenticate, and how the session is shaped.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub api_key: String,
    pub tts_voice: Option<String>,
    pub language: Option<String>,
    pub max_questions: u32,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &"[REDACTED]")
            .field("tts_voice", &self.tts_voice)
            .field("language", &self.language)
            .field("max_questions", &self.max_questions)
            .finish()
    }
}

impl ClientConfig {
    /// Reads the configuration from `INTERVOX_*` environment variables.
    /// Only the API base URL is mandatory.
    pub fn from_env() -> anyhow::Result<Self> {
        let api_base_url =
            std::env::var("INTERVOX_API_BASE").context("INTERVOX_API_BASE is required")?;
        let api_key = std::env::var("INTERVOX_API_KEY").unwrap_or_default();
        let tts_voice = non_blank(std::env::var("INTERVOX_TTS_VOICE").ok());
        let language = non_blank(std::env::var("INTERVOX_LANGUAGE").ok());
        let max_questions = parse_max_questions(std::env::var("INTERVOX_MAX_QUESTIONS").ok())?;

        Ok(Self {
            api_base_url,
            api_key,
            tts_voice,
            language,
            max_questions,
        })
    }

    pub fn session_api(&self) -> SessionApiConfig {
        SessionApiConfig {
            base_url: self.api_base_url.clone(),
            api_key: self.api_key.clone(),
        }
    }

    pub fn transcription(&self) -> TranscribeConfig {
        TranscribeConfig {
            base_url: self.api_base_url.clone(),
            api_key: self.api_key.clone(),
            language: self.language.clone(),
        }
    }

    pub fn synthesis(&self) -> SynthesisConfig {
        SynthesisConfig {
            base_url: self.api_base_url.clone(),
            api_key: self.api_key.clone(),
            voice: self.tts_voice.clone(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_max_questions(raw: Option<String>) -> anyhow::Result<u32> {
    match raw.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(DEFAULT_MAX_QUESTIONS),
        Some(s) => {
            let n: u32 = s
                .parse()
                .context("INTERVOX_MAX_QUESTIONS must be a positive integer")?;
            if n == 0 {
                anyhow::bail!("INTERVOX_MAX_QUESTIONS must be at least 1");
            }
            Ok(n)
        }
    }
}
