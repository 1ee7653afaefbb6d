use crate::io::midi::MidiEvent;
use crate::synth::message::Command;

/// Translate a decoded MIDI event on `channel_filter` into an instrument
/// command. Events on other channels, and kinds the instrument does not
/// act on, map to `None`.
pub fn midi_to_command(event: MidiEvent, channel_filter: u8) -> Option<Command> {
    if event.channel() != channel_filter {
        return None;
    }
    match event {
        MidiEvent::NoteOn { key, velocity, .. } => Some(Command::NoteOn {
            note: key,
            velocity,
        }),
        MidiEvent::NoteOff { key, .. } => Some(Command::NoteOff { note: key }),
        MidiEvent::SustainOn { .. } => Some(Command::SustainOn),
        MidiEvent::SustainOff { .. } => Some(Command::SustainOff),
        MidiEvent::PitchBend { .. } | MidiEvent::Other { .. } => None,
    }
}

/// MIDI note number to frequency in Hz. A4 = 440 Hz = note 69.
pub fn midi_note_to_freq(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}
