//! **Pre-roll capture buffer** — the producer/consumer hand-off between the microphone
//! callback thread and the turn loop.
//!
//! The mic thread calls [`CaptureBuffer::on_frame`] every ~10 ms. A rolling pre-roll
//! window (oldest frame evicted) always holds the last `preroll_ms` of audio so that
//! utterance onsets are not clipped. `start_capture` snapshots that window and starts
//! collecting; `stop_and_save` writes snapshot + captured frames as one mono 16-bit WAV.

use crate::error::VoiceResult;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Capture timing. Pre-roll capacity is `preroll_ms / frame_ms` frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Sample rate in Hz (default: 16000)
    pub sample_rate: u32,
    /// Duration of one microphone frame (default: 10 ms = 160 samples at 16 kHz)
    pub frame_ms: u32,
    /// Pre-roll window (default: 500 ms)
    pub preroll_ms: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            frame_ms: 10,
            preroll_ms: 500,
        }
    }
}

impl CaptureSettings {
    /// Number of frames the pre-roll window holds.
    pub fn preroll_frames(&self) -> usize {
        if self.frame_ms == 0 {
            return 0;
        }
        (self.preroll_ms / self.frame_ms) as usize
    }

    /// Samples per frame at the configured rate.
    pub fn frame_samples(&self) -> usize {
        (self.sample_rate as usize * self.frame_ms as usize) / 1000
    }
}

#[derive(Default)]
struct CaptureState {
    preroll: VecDeque<Vec<f32>>,
    /// Pre-roll contents frozen at `start_capture`.
    onset: Vec<Vec<f32>>,
    active: Vec<Vec<f32>>,
    capturing: bool,
}

/// Shared buffer: written by the mic thread, drained by the turn loop on stop.
pub struct CaptureBuffer {
    settings: CaptureSettings,
    capacity: usize,
    state: Mutex<CaptureState>,
}

impl CaptureBuffer {
    pub fn new(settings: CaptureSettings) -> Self {
        let capacity = settings.preroll_frames();
        Self {
            settings,
            capacity,
            state: Mutex::new(CaptureState {
                preroll: VecDeque::with_capacity(capacity),
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CaptureState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Pre-roll capacity in frames.
    pub fn preroll_capacity(&self) -> usize {
        self.capacity
    }

    /// Frames currently held in the rolling pre-roll window.
    pub fn preroll_len(&self) -> usize {
        self.lock().preroll.len()
    }

    pub fn is_capturing(&self) -> bool {
        self.lock().capturing
    }

    /// Append one microphone frame. Called from the audio driver thread.
    pub fn on_frame(&self, frame: &[f32]) {
        let mut state = self.lock();
        if self.capacity > 0 {
            if state.preroll.len() == self.capacity {
                state.preroll.pop_front();
            }
            state.preroll.push_back(frame.to_vec());
        }
        if state.capturing {
            state.active.push(frame.to_vec());
        }
    }

    /// Reset the active buffer and begin capturing an utterance.
    pub fn start_capture(&self) {
        let mut state = self.lock();
        state.onset = state.preroll.iter().cloned().collect();
        state.active.clear();
        state.capturing = true;
        debug!("Capture: started with {} pre-roll frames", state.onset.len());
    }

    /// Stop capturing and write pre-roll + captured frames to `path`.
    ///
    /// Returns `Ok(None)` without touching the filesystem when no frame arrived
    /// while capturing (aborted or empty utterance).
    pub fn stop_and_save(&self, path: &Path) -> VoiceResult<Option<PathBuf>> {
        let (onset, active) = {
            let mut state = self.lock();
            state.capturing = false;
            if state.active.is_empty() {
                state.onset.clear();
                return Ok(None);
            }
            (std::mem::take(&mut state.onset), std::mem::take(&mut state.active))
        };

        let frames = onset.len() + active.len();
        write_wav(path, self.settings.sample_rate, onset.iter().chain(active.iter()))?;
        info!(
            "🎙️ Utterance saved: {} frames ({} pre-roll) → {}",
            frames,
            onset.len(),
            path.display()
        );
        Ok(Some(path.to_path_buf()))
    }
}

/// Write f32 frames (-1.0..1.0) as single-channel 16-bit PCM.
pub(crate) fn write_wav<'a>(
    path: &Path,
    sample_rate: u32,
    frames: impl Iterator<Item = &'a Vec<f32>>,
) -> VoiceResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for frame in frames {
        for &s in frame {
            let clamped = s.clamp(-1.0, 1.0);
            writer.write_sample((clamped * 32767.0).round() as i16)?;
        }
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(value: f32, settings: &CaptureSettings) -> Vec<f32> {
        vec![value; settings.frame_samples()]
    }

    #[test]
    fn default_settings_give_fifty_frame_preroll() {
        let s = CaptureSettings::default();
        assert_eq!(s.preroll_frames(), 50);
        assert_eq!(s.frame_samples(), 160);
    }

    #[test]
    fn preroll_never_exceeds_capacity() {
        let buffer = CaptureBuffer::new(CaptureSettings::default());
        let f = frame(0.1, buffer.settings());
        for _ in 0..500 {
            buffer.on_frame(&f);
        }
        assert_eq!(buffer.preroll_len(), 50);
    }

    #[test]
    fn stop_without_frames_returns_none_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = CaptureBuffer::new(CaptureSettings::default());
        let f = frame(0.2, buffer.settings());
        for _ in 0..10 {
            buffer.on_frame(&f);
        }
        buffer.start_capture();
        let path = dir.path().join("empty.wav");
        assert!(buffer.stop_and_save(&path).unwrap().is_none());
        assert!(!path.exists());
        assert!(!buffer.is_capturing());
    }

    #[test]
    fn saved_file_holds_preroll_then_captured_frames() {
        let dir = tempfile::tempdir().unwrap();
        let settings = CaptureSettings::default();
        let buffer = CaptureBuffer::new(settings.clone());

        // Fill the pre-roll with quiet frames.
        let quiet = frame(0.0, &settings);
        for _ in 0..80 {
            buffer.on_frame(&quiet);
        }
        buffer.start_capture();
        let loud = frame(0.5, &settings);
        for _ in 0..7 {
            buffer.on_frame(&loud);
        }

        let path = dir.path().join("utt.wav");
        let saved = buffer.stop_and_save(&path).unwrap();
        assert_eq!(saved.as_deref(), Some(path.as_path()));

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16000);
        assert_eq!(spec.bits_per_sample, 16);

        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        let per_frame = settings.frame_samples();
        assert_eq!(samples.len(), (50 + 7) * per_frame);
        // Chronological: silence first, then speech.
        assert!(samples[..50 * per_frame].iter().all(|&s| s == 0));
        assert!(samples[50 * per_frame..].iter().all(|&s| s > 16000));
    }

    #[test]
    fn frames_after_stop_are_not_captured() {
        let dir = tempfile::tempdir().unwrap();
        let settings = CaptureSettings {
            preroll_ms: 0,
            ..Default::default()
        };
        let buffer = CaptureBuffer::new(settings.clone());
        buffer.start_capture();
        buffer.on_frame(&frame(0.3, &settings));
        let first = dir.path().join("a.wav");
        buffer.stop_and_save(&first).unwrap();

        buffer.on_frame(&frame(0.3, &settings));
        let second = dir.path().join("b.wav");
        assert!(buffer.stop_and_save(&second).unwrap().is_none());
    }
}
