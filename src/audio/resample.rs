//! Band-limited block resampling via `rubato`.
//!
//! Loopback devices are opened at a fixed hardware rate; the classifier
//! wants 16 kHz.  [`resample_interleaved`] converts one captured block at a
//! time with a windowed-sinc resampler (`SincFixedIn` + `BlackmanHarris2`).
//!
//! Every call builds a fresh resampler, so the output depends only on the
//! input block.  The filter delay is removed and the result is trimmed (or
//! zero-padded) to exactly `floor(len × to_rate / from_rate)` frames.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ResampleError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("failed to construct resampler: {0}")]
    Construction(#[from] rubato::ResamplerConstructionError),

    #[error("resampling failed: {0}")]
    Process(#[from] rubato::ResampleError),
}

// ---------------------------------------------------------------------------
// Length helpers
// ---------------------------------------------------------------------------

/// Number of frames produced when resampling `frames` frames.
///
/// ```
/// use sound_radar::audio::resampled_len;
///
/// assert_eq!(resampled_len(44_100, 44_100, 16_000), 16_000);
/// assert_eq!(resampled_len(1_000, 44_100, 16_000), 362); // floor(362.81…)
/// ```
pub fn resampled_len(frames: usize, from_rate: u32, to_rate: u32) -> usize {
    if from_rate == 0 {
        return 0;
    }
    (frames as u64 * to_rate as u64 / from_rate as u64) as usize
}

fn sinc_params() -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    }
}

// ---------------------------------------------------------------------------
// resample_interleaved
// ---------------------------------------------------------------------------

/// Resample interleaved `samples` with `channels` channels from
/// `from_rate` to `to_rate`.
///
/// * Equal rates return the input unchanged (minus any partial frame).
/// * Empty input, zero channels or a zero-length result return an empty
///   vector.
pub fn resample_interleaved(
    samples: &[f32],
    channels: u16,
    from_rate: u32,
    to_rate: u32,
) -> Result<Vec<f32>, ResampleError> {
    let ch = channels as usize;
    if ch == 0 {
        return Ok(Vec::new());
    }

    let frames = samples.len() / ch;
    if from_rate == to_rate {
        return Ok(samples[..frames * ch].to_vec());
    }

    let out_frames = resampled_len(frames, from_rate, to_rate);
    if frames == 0 || out_frames == 0 {
        return Ok(Vec::new());
    }

    let planar: Vec<Vec<f32>> = (0..ch)
        .map(|c| samples.chunks_exact(ch).map(|f| f[c]).collect())
        .collect();

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, sinc_params(), frames, ch)?;

    let delay = resampler.output_delay();
    let wanted = delay + out_frames;

    let mut collected: Vec<Vec<f32>> = vec![Vec::with_capacity(wanted); ch];
    let append = |collected: &mut Vec<Vec<f32>>, block: Vec<Vec<f32>>| {
        for (dst, src) in collected.iter_mut().zip(block) {
            dst.extend_from_slice(&src);
        }
    };

    let first = resampler.process(&planar, None)?;
    append(&mut collected, first);

    // Each zero-fed pass yields roughly `out_frames` more frames.
    let max_flushes = 2 + delay.div_ceil(out_frames);
    let mut flushes = 0;
    while collected[0].len() < wanted && flushes < max_flushes {
        let tail = resampler.process_partial(None::<&[Vec<f32>]>, None)?;
        append(&mut collected, tail);
        flushes += 1;
    }

    let mut output = Vec::with_capacity(out_frames * ch);
    for i in delay..wanted {
        for channel in &collected {
            output.push(channel.get(i).copied().unwrap_or(0.0));
        }
    }

    Ok(output)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
