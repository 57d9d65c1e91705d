use anyhow::Context;
use rubato::Resampler;

/// Resamples mono f32 PCM in [-1, 1] to a target rate.
///
/// Used in both directions: captured answers are normalized to 16 kHz before
/// transcription upload, and synthesized speech is matched to the output
/// device rate before playback.
pub fn resample_mono_f32(
    input_samples: &[f32],
    input_sample_rate_hz: u32,
    target_sample_rate_hz: u32,
) -> anyhow::Result<Vec<f32>> {
    if input_sample_rate_hz == target_sample_rate_hz {
        return Ok(input_samples.to_vec());
    }
    if input_samples.is_empty() {
        return Ok(Vec::new());
    }

    let input_rate: usize = input_sample_rate_hz
        .try_into()
        .context("invalid input sample rate")?;
    let target_rate: usize = target_sample_rate_hz
        .try_into()
        .context("invalid target sample rate")?;

    let params = rubato::SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: rubato::SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window: rubato::WindowFunction::BlackmanHarris2,
    };

    let mut resampler = rubato::SincFixedIn::<f32>::new(
        target_rate as f64 / input_rate as f64,
        2.0,
        params,
        input_samples.len(),
        1,
    )
    .context("create resampler")?;

    let input = vec![input_samples.to_vec()];
    let out = resampler.process(&input, None).context("resample")?;
    Ok(out.into_iter().next().unwrap_or_default())
}
