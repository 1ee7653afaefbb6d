#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A decoded MIDI event. Raw byte parsing happens upstream (a hardware
/// transport, a file reader); the graph only ever sees these.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8, velocity: u8 },
    SustainOn { channel: u8 },
    SustainOff { channel: u8 },
    PitchBend { channel: u8, value: i16 },
    /// Anything the core does not interpret, carried through opaquely.
    Other { channel: u8, status: u8, data: [u8; 2] },
}

impl MidiEvent {
    pub fn channel(&self) -> u8 {
        match *self {
            MidiEvent::NoteOn { channel, .. }
            | MidiEvent::NoteOff { channel, .. }
            | MidiEvent::SustainOn { channel }
            | MidiEvent::SustainOff { channel }
            | MidiEvent::PitchBend { channel, .. }
            | MidiEvent::Other { channel, .. } => channel,
        }
    }
}

/// A decoded event stamped with the sample time it should take effect at.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedMidi {
    pub at: u64,
    pub event: MidiEvent,
}

impl TimedMidi {
    pub fn new(at: u64, event: MidiEvent) -> Self {
        Self { at, event }
    }
}
