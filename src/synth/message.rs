#[cfg(feature = "rtrb")]
use rtrb::Consumer;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Instrument control commands, the payload the control plane sends and
/// the per-instrument scheduler defers.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    SustainOn,
    SustainOff,
    AllNotesOff,
}

/// A command stamped with the sample time it should take effect at.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TimedCommand {
    pub at: u64,
    pub command: Command,
}

impl TimedCommand {
    pub fn new(at: u64, command: Command) -> Self {
        Self { at, command }
    }
}

/// Where an instrument drains its pending commands from.
///
/// The default implementation is the consuming end of an `rtrb` SPSC
/// ring, so a MIDI callback on the control context can push without ever
/// blocking the audio context.
pub trait CommandReceiver: Send {
    fn pop(&mut self) -> Option<TimedCommand>;
}

#[cfg(feature = "rtrb")]
impl CommandReceiver for Consumer<TimedCommand> {
    fn pop(&mut self) -> Option<TimedCommand> {
        Consumer::pop(self).ok()
    }
}

/// A pre-seeded command list, drained in order. Tests and offline renders.
pub struct CommandQueue {
    pending: std::collections::VecDeque<TimedCommand>,
}

impl CommandQueue {
    pub fn new(commands: Vec<TimedCommand>) -> Self {
        Self {
            pending: commands.into(),
        }
    }
}

impl CommandReceiver for CommandQueue {
    fn pop(&mut self) -> Option<TimedCommand> {
        self.pending.pop_front()
    }
}
