// RodioSink — native cross-platform audio playback via rodio.
//
// Uses WASAPI on Windows, ALSA on Linux, CoreAudio on macOS.
//
// Design notes:
//   - rodio 0.21 API: OutputStreamBuilder::open_default_stream(), Sink::connect_new(),
//     Decoder::try_from(file).
//   - A fresh Sink is created per play() call; sleep_until_end() provides the
//     blocking contract the dispatcher relies on.
//   - OutputStream must remain alive for the duration of playback — drop = silence.

use std::path::Path;

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};

use super::{AudioError, AudioSink, Volume};

/// Native audio sink using rodio (WASAPI / ALSA / CoreAudio).
///
/// The shared [`Volume`] is consulted at the start of each file, so a volume
/// change takes effect on the next file of a sequence, not mid-file.
pub struct RodioSink {
    /// Output stream — **must stay alive** for the duration of playback.
    /// Drop = silence. The underscore prefix is idiomatic for "kept alive, not read directly".
    _stream: OutputStream,
    volume: Volume,
}

impl std::fmt::Debug for RodioSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioSink")
            .field("volume", &self.volume.get())
            .finish()
    }
}

impl RodioSink {
    /// Create a new `RodioSink`, initialising the default audio output device.
    ///
    /// Returns `Err(AudioError::DeviceNotFound)` when no output device is
    /// available (headless CI, containers, appliances without a DAC). The
    /// service then runs with audio disabled and marks dispatched items
    /// failed rather than refusing submissions.
    pub fn new(volume: Volume) -> Result<Self, AudioError> {
        let mut stream =
            OutputStreamBuilder::open_default_stream().map_err(|_| AudioError::DeviceNotFound)?;
        // Suppress the "Dropping OutputStream" stderr message on shutdown.
        stream.log_on_drop(false);

        Ok(Self {
            _stream: stream,
            volume,
        })
    }
}

impl AudioSink for RodioSink {
    /// Decode and play a single file to completion.
    ///
    /// Blocks the calling thread until the sink drains. Missing files map to
    /// `AudioError::Io`, undecodable content to `AudioError::DecodingFailed`.
    fn play(&mut self, path: &Path) -> Result<(), AudioError> {
        let file = std::fs::File::open(path).map_err(AudioError::Io)?;
        let decoder =
            Decoder::try_from(file).map_err(|e| AudioError::DecodingFailed(e.to_string()))?;

        let sink = Sink::connect_new(self._stream.mixer());
        sink.set_volume(self.volume.get());
        sink.append(decoder);
        sink.sleep_until_end();

        Ok(())
    }
}
