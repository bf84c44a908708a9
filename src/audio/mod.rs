//! Audio playback module — blocking sink abstraction and shared volume.
//!
//! Architecture:
//! - [`AudioSink`]: synchronous blocking interface; the queue dispatcher owns
//!   its sink on a dedicated `std::thread`, never on the tokio executor
//! - [`AudioError`]: domain error type (thiserror)
//! - [`Volume`]: process-shared scalar consulted by the sink on each play;
//!   readers never block
//!
//! Playback serialization is the dispatcher's job, not the sink's: there is
//! exactly one dispatcher worker, so at most one `play` is in flight.

pub mod rodio_sink;

pub use rodio_sink::RodioSink;

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Errors that can occur during audio playback.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("Audio device not found")]
    DeviceNotFound,
    #[error("Failed to decode audio file: {0}")]
    DecodingFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A blocking audio output.
///
/// `play` returns only once the file has finished playing (or failed).
/// Implementations run on the dispatcher's dedicated `std::thread`.
pub trait AudioSink: Send {
    fn play(&mut self, path: &Path) -> Result<(), AudioError>;
}

/// Shared playback volume in `[0.0, 1.0]`, stored as f32 bits in an atomic.
///
/// Writers clamp; readers never block. The external volume endpoint accepts
/// both 0–1 fractions and 0–100 percentages, so [`Volume::set_any`] treats
/// values above 1.0 as percentages.
#[derive(Debug, Clone)]
pub struct Volume {
    bits: Arc<AtomicU32>,
}

impl Volume {
    pub fn new(initial: f32) -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(initial.clamp(0.0, 1.0).to_bits())),
        }
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Set the volume as a 0.0–1.0 fraction, clamped. Returns the applied value.
    pub fn set(&self, value: f32) -> f32 {
        let clamped = value.clamp(0.0, 1.0);
        self.bits.store(clamped.to_bits(), Ordering::Relaxed);
        clamped
    }

    /// Set from either a 0–1 fraction or a 0–100 percentage.
    pub fn set_any(&self, value: f32) -> f32 {
        if value > 1.0 {
            self.set(value / 100.0)
        } else {
            self.set(value)
        }
    }

    /// Current volume as a whole percentage.
    pub fn percent(&self) -> u8 {
        (self.get() * 100.0).round() as u8
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(crate::constants::audio::DEFAULT_VOLUME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_default_matches_constant() {
        // Arrange / Act
        let volume = Volume::default();

        // Assert
        assert_eq!(volume.get(), crate::constants::audio::DEFAULT_VOLUME);
    }

    #[test]
    fn test_volume_set_clamps_to_valid_range() {
        let volume = Volume::new(0.5);

        // Act — above max
        assert_eq!(volume.set(2.0), 1.0);
        assert_eq!(volume.get(), 1.0);

        // Act — below min
        assert_eq!(volume.set(-1.0), 0.0);
        assert_eq!(volume.get(), 0.0);
    }

    #[test]
    fn test_volume_set_any_accepts_percentages() {
        let volume = Volume::new(0.5);

        // Act — 0–100 form
        assert!((volume.set_any(75.0) - 0.75).abs() < f32::EPSILON);
        // Act — 0–1 form
        assert!((volume.set_any(0.25) - 0.25).abs() < f32::EPSILON);
        // Act — out-of-range percentage clamps
        assert_eq!(volume.set_any(250.0), 1.0);
    }

    #[test]
    fn test_volume_percent_rounds() {
        let volume = Volume::new(0.8);
        assert_eq!(volume.percent(), 80);

        volume.set(0.333);
        assert_eq!(volume.percent(), 33);
    }

    #[test]
    fn test_volume_clones_share_state() {
        let volume = Volume::new(0.5);
        let clone = volume.clone();

        volume.set(0.9);
        assert!((clone.get() - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_audio_error_display_device_not_found() {
        let err = AudioError::DeviceNotFound;
        assert_eq!(err.to_string(), "Audio device not found");
    }

    #[test]
    fn test_audio_error_display_decoding_failed() {
        let err = AudioError::DecodingFailed("bad mp3".to_string());
        assert_eq!(err.to_string(), "Failed to decode audio file: bad mp3");
    }
}
