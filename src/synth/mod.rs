// Purpose: voice management, polyphony, MIDI-driven instruments.
// This layer sits above the graph and decides which voices make sound.

pub mod instrument;
pub mod message;
pub mod poly;
pub mod voice;

pub use instrument::Instrument;
pub use message::{Command, CommandReceiver, TimedCommand};
pub use poly::VoicePool;
pub use voice::{SamplerVoice, Voice};
