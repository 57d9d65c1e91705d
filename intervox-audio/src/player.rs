// CPAL-based playback for synthesized speech.
//
// Mirror of the recorder's worker/command layout: the output stream lives on
// its own thread and the `Playback` handle can stop it immediately. Exactly
// one utterance plays per handle; starting a new utterance is the caller's
// last-call-wins decision (stop the old handle, open a new one).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SizedSample, Stream};

use crate::resample::resample_mono_f32;

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("no output device found")]
    NoOutputDevice,

    #[error("failed to get default config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to play stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("playback worker failed: {0}")]
    Worker(String),

    #[error("playback worker startup timeout")]
    WorkerTimeout,

    #[error("failed to resample: {0}")]
    Resample(#[from] anyhow::Error),

    #[error("internal channel error")]
    Channel,
}

/// Handle to one in-flight utterance.
pub struct Playback {
    stop_tx: mpsc::Sender<()>,
    done_rx: mpsc::Receiver<()>,
    worker_handle: Option<std::thread::JoinHandle<()>>,
}

/// Clonable stop control detached from the owning `Playback`, for callers
/// that wait on one task and stop from another.
#[derive(Clone)]
pub struct PlaybackStop {
    stop_tx: mpsc::Sender<()>,
}

impl PlaybackStop {
    /// Stops playback immediately. Idempotent and safe after natural end.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(());
    }
}

impl Playback {
    /// Stops playback immediately. Idempotent and safe after natural end.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(());
    }

    pub fn stop_handle(&self) -> PlaybackStop {
        PlaybackStop {
            stop_tx: self.stop_tx.clone(),
        }
    }

    /// Blocks until playback ends naturally or is stopped.
    pub fn wait(mut self) {
        let _ = self.done_rx.recv();
        if let Some(h) = self.worker_handle.take() {
            let _ = h.join();
        }
    }
}

enum WorkerMsg {
    Ready,
    Error(String),
}

/// Plays mono f32 PCM on the default output device, resampling to the device
/// rate as needed.
pub fn play_mono(samples: Vec<f32>, sample_rate_hz: u32) -> Result<Playback, PlaybackError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(PlaybackError::NoOutputDevice)?;
    let config = device.default_output_config()?;
    let device_rate = config.sample_rate().0;

    let samples = if device_rate == sample_rate_hz {
        samples
    } else {
        resample_mono_f32(&samples, sample_rate_hz, device_rate)
            .map_err(PlaybackError::Resample)?
    };

    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let (done_tx, done_rx) = mpsc::channel::<()>();
    let (worker_tx, worker_rx) = mpsc::channel::<WorkerMsg>();

    let worker_handle = std::thread::spawn(move || {
        let sample_format = config.sample_format();
        let channels = config.channels() as usize;
        let samples = Arc::new(samples);
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stream = match sample_format {
            SampleFormat::F32 => build_output_stream::<f32>(
                &device,
                &config.clone().into(),
                channels,
                samples.clone(),
                position.clone(),
                finished.clone(),
            ),
            SampleFormat::I16 => build_output_stream::<i16>(
                &device,
                &config.clone().into(),
                channels,
                samples.clone(),
                position.clone(),
                finished.clone(),
            ),
            SampleFormat::U16 => build_output_stream::<u16>(
                &device,
                &config.clone().into(),
                channels,
                samples.clone(),
                position.clone(),
                finished.clone(),
            ),
            _ => build_output_stream::<f32>(
                &device,
                &config.clone().into(),
                channels,
                samples.clone(),
                position.clone(),
                finished.clone(),
            ),
        };

        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                let _ = worker_tx.send(WorkerMsg::Error(format!("build stream: {e}")));
                log::error!("Output stream build failed: {e}");
                return;
            }
        };

        if let Err(e) = stream.play() {
            let _ = worker_tx.send(WorkerMsg::Error(format!("play stream: {e}")));
            log::error!("Output stream play failed: {e}");
            return;
        }

        let _ = worker_tx.send(WorkerMsg::Ready);

        // Park until the utterance drains or the caller stops it.
        loop {
            match stop_rx.recv_timeout(Duration::from_millis(50)) {
                Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if finished.load(Ordering::Relaxed) {
                        break;
                    }
                }
            }
        }

        drop(stream);
        let _ = done_tx.send(());
    });

    match worker_rx.recv_timeout(Duration::from_secs(2)) {
        Ok(WorkerMsg::Ready) => {}
        Ok(WorkerMsg::Error(e)) => return Err(PlaybackError::Worker(e)),
        Err(mpsc::RecvTimeoutError::Timeout) => return Err(PlaybackError::WorkerTimeout),
        Err(_) => return Err(PlaybackError::Channel),
    }

    Ok(Playback {
        stop_tx,
        done_rx,
        worker_handle: Some(worker_handle),
    })
}

fn build_output_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    samples: Arc<Vec<f32>>,
    position: Arc<AtomicUsize>,
    finished: Arc<AtomicBool>,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: SizedSample + cpal::FromSample<f32> + Send + 'static,
{
    let cb = move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        let mut i = position.load(Ordering::Relaxed);
        for frame in data.chunks_mut(channels.max(1)) {
            let s = samples.get(i).copied().unwrap_or(0.0);
            i += 1;
            for ch in frame.iter_mut() {
                *ch = T::from_sample(s);
            }
        }
        if i >= samples.len() {
            finished.store(true, Ordering::Relaxed);
        }
        position.store(i, Ordering::Relaxed);
    };

    device.build_output_stream(
        config,
        cb,
        |err| {
            log::error!("Output stream error: {err}");
        },
        None,
    )
}
