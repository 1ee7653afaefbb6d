//! External interfaces: devices, decoded MIDI, keymap/sample loading.

/// Decoded-MIDI-to-command translation.
pub mod converter;
/// Keymap config parsing and WAV sample decoding.
pub mod keymap;
/// The decoded MIDI event model.
pub mod midi;

use crate::error::DeviceError;

/// A device or file handing the graph fixed-size blocks of samples.
///
/// Implementations live outside the core (cpal, JACK, a file reader); the
/// contract is only that a call fills the whole block at the configured
/// rate without blocking past the block deadline.
pub trait BlockSource: Send {
    fn read_block(&mut self, out: &mut [f32]) -> Result<(), DeviceError>;
}

/// A device or file accepting fixed-size blocks from a sink.
pub trait BlockSink: Send {
    fn write_block(&mut self, block: &[f32]) -> Result<(), DeviceError>;
}

/// In-memory sink: collects everything written. Offline bounces, tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub samples: Vec<f32>,
}

impl BlockSink for MemorySink {
    fn write_block(&mut self, block: &[f32]) -> Result<(), DeviceError> {
        self.samples.extend_from_slice(block);
        Ok(())
    }
}

/// In-memory source: serves a fixed buffer, then silence.
#[derive(Debug)]
pub struct MemorySource {
    samples: Vec<f32>,
    position: usize,
}

impl MemorySource {
    pub fn new(samples: Vec<f32>) -> Self {
        Self {
            samples,
            position: 0,
        }
    }
}

impl BlockSource for MemorySource {
    fn read_block(&mut self, out: &mut [f32]) -> Result<(), DeviceError> {
        for slot in out.iter_mut() {
            *slot = self.samples.get(self.position).copied().unwrap_or(0.0);
            self.position += 1;
        }
        Ok(())
    }
}
