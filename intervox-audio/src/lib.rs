pub mod player;
pub mod recorder;
pub mod resample;

pub use player::{Playback, PlaybackError, PlaybackStop, play_mono};
pub use recorder::{AudioCaptureError, CapturedAudio, MicRecorder};
