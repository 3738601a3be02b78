//! Microphone input using CPAL
//!
//! Runs the driver callback on its own thread; every complete frame is handed to the
//! shared [`CaptureBuffer`]. No computation happens in the callback beyond chunking.

use crate::capture::{CaptureBuffer, CaptureSettings};
use crate::error::{VoiceError, VoiceResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::sync::Arc;
use tracing::{info, warn};

/// External microphone feeding the pre-roll capture buffer.
pub struct MicrophoneInput {
    settings: CaptureSettings,
    device: Device,
    sample_format: SampleFormat,
    stream_config: StreamConfig,
}

impl MicrophoneInput {
    /// Open the default input device, mono at the configured sample rate.
    pub fn new(settings: CaptureSettings) -> VoiceResult<Self> {
        info!(
            "🎤 Initializing microphone ({}Hz, {}ms frames)",
            settings.sample_rate, settings.frame_ms
        );

        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| VoiceError::AudioDevice("No input device available".to_string()))?;

        info!(
            "📱 Using input device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let default_config = device.default_input_config()?;
        let sample_format = default_config.sample_format();

        let stream_config = StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(settings.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(settings.frame_samples() as u32),
        };

        Ok(Self {
            settings,
            device,
            sample_format,
            stream_config,
        })
    }

    /// Start the stream. Keep the returned `Stream` alive for as long as capture should run.
    pub fn start(self, buffer: Arc<CaptureBuffer>) -> VoiceResult<Stream> {
        info!("▶️ Starting microphone stream");
        let frame_samples = self.settings.frame_samples().max(1);

        let mut framer = Framer::new(frame_samples, buffer);
        let on_error = move |err: cpal::StreamError| warn!("Microphone stream error: {}", err);
        let stream = match self.sample_format {
            SampleFormat::F32 => self.device.build_input_stream(
                &self.stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    framer.push(data.iter().copied());
                },
                on_error,
                None,
            )?,
            SampleFormat::I16 => self.device.build_input_stream(
                &self.stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    framer.push(data.iter().map(|&s| i16_to_f32(s)));
                },
                on_error,
                None,
            )?,
            SampleFormat::U16 => self.device.build_input_stream(
                &self.stream_config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    framer.push(data.iter().map(|&s| u16_to_f32(s)));
                },
                on_error,
                None,
            )?,
            other => {
                return Err(VoiceError::AudioStream(format!(
                    "Unsupported sample format: {:?}",
                    other
                )))
            }
        };

        stream.play()?;
        info!("✅ Microphone capture started");
        Ok(stream)
    }
}

fn i16_to_f32(s: i16) -> f32 {
    s as f32 / 32768.0
}

fn u16_to_f32(s: u16) -> f32 {
    (s as f32 - 32768.0) / 32768.0
}

/// Accumulates driver callbacks (arbitrary length) into fixed-size frames.
struct Framer {
    frame_samples: usize,
    pending: Vec<f32>,
    buffer: Arc<CaptureBuffer>,
}

impl Framer {
    fn new(frame_samples: usize, buffer: Arc<CaptureBuffer>) -> Self {
        Self {
            frame_samples,
            pending: Vec::with_capacity(frame_samples),
            buffer,
        }
    }

    fn push(&mut self, samples: impl Iterator<Item = f32>) {
        for sample in samples {
            self.pending.push(sample);
            if self.pending.len() >= self.frame_samples {
                self.buffer.on_frame(&self.pending);
                self.pending.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framer_emits_only_complete_frames() {
        let buffer = Arc::new(CaptureBuffer::new(CaptureSettings::default()));
        let mut framer = Framer::new(160, Arc::clone(&buffer));
        framer.push(std::iter::repeat(0.1).take(400));
        assert_eq!(buffer.preroll_len(), 2);
        framer.push(std::iter::repeat(0.1).take(80));
        assert_eq!(buffer.preroll_len(), 3);
    }

    #[test]
    fn integer_samples_map_to_unit_range() {
        assert_eq!(i16_to_f32(0), 0.0);
        assert_eq!(i16_to_f32(i16::MIN), -1.0);
        assert_eq!(u16_to_f32(32768), 0.0);
        assert_eq!(u16_to_f32(0), -1.0);
        assert!(u16_to_f32(u16::MAX) > 0.99);
    }
}
