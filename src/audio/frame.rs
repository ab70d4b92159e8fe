//! Multi-channel audio frame handed from capture to the processing worker.

use super::device::DeviceKind;

// ---------------------------------------------------------------------------
// AudioFrame
// ---------------------------------------------------------------------------

/// One fixed-duration block of interleaved `f32` audio at the pipeline's
/// target sample rate.
///
/// Frames are immutable; stages that transform audio consume a frame and
/// produce a new one.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
    device_kind: DeviceKind,
}

impl AudioFrame {
    /// Wrap interleaved `samples`.  A trailing partial frame is dropped.
    pub fn new(
        mut samples: Vec<f32>,
        channels: u16,
        sample_rate: u32,
        device_kind: DeviceKind,
    ) -> Self {
        let whole = match channels {
            0 => 0,
            n => samples.len() / n as usize * n as usize,
        };
        samples.truncate(whole);
        Self {
            samples,
            channels,
            sample_rate,
            device_kind,
        }
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Which kind of device produced this frame.
    pub fn device_kind(&self) -> DeviceKind {
        self.device_kind
    }

    /// Samples per channel.
    pub fn len(&self) -> usize {
        match self.channels {
            0 => 0,
            n => self.samples.len() / n as usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f32 / self.sample_rate as f32
    }

    /// De-interleave one channel.  Returns an empty vector for an index
    /// outside the frame.
    pub fn channel(&self, index: usize) -> Vec<f32> {
        let n = self.channels as usize;
        if index >= n {
            return Vec::new();
        }
        self.samples.chunks_exact(n).map(|f| f[index]).collect()
    }

    /// Consume the frame, returning its interleaved samples.
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_frame_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioFrame>();
    }

    #[test]
    fn channel_deinterleaves() {
        let frame = AudioFrame::new(
            vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6],
            3,
            16_000,
            DeviceKind::Loopback,
        );
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.channel(0), vec![0.1, 0.4]);
        assert_eq!(frame.channel(2), vec![0.3, 0.6]);
        assert!(frame.channel(3).is_empty());
    }

    #[test]
    fn trailing_partial_frame_is_dropped() {
        let frame = AudioFrame::new(vec![0.0; 5], 2, 16_000, DeviceKind::Microphone);
        assert_eq!(frame.samples().len(), 4);
        assert_eq!(frame.len(), 2);
    }

    #[test]
    fn duration_matches_length() {
        let frame = AudioFrame::new(vec![0.0; 32_000], 2, 16_000, DeviceKind::Loopback);
        assert!((frame.duration_secs() - 1.0).abs() < 1e-6);
    }
}
