pub mod request;
pub mod runtime;
pub mod session_api;
pub mod transcription;
pub mod tts;
