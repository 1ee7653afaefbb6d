use std::sync::Arc;

use crate::io::keymap::SampleBank;

/// One unit of a polyphony pool.
///
/// The pool decides *which* voice plays; the voice decides *how*. A voice
/// must tolerate any call order — a steal is simply `note_on` while
/// already sounding.
pub trait Voice: Send {
    fn note_on(&mut self, note: u8, velocity: u8);
    fn note_off(&mut self, note: u8);
    /// Next output sample. Exactly 0.0 when not sounding.
    fn next_sample(&mut self) -> f32;
    /// Still audibly producing (a release tail counts).
    fn is_sounding(&self) -> bool;
}

/// Sample-playback voice over a shared [`SampleBank`] — the drum-kit
/// voice. Samples are one-shot: `note_off` is ignored and playback runs
/// to the end; a new `note_on` (including a steal) replaces the playback
/// immediately.
pub struct SamplerVoice {
    bank: Arc<SampleBank>,
    playing: Option<Playback>,
}

struct Playback {
    data: Arc<Vec<f32>>,
    position: usize,
    gain: f32,
}

impl SamplerVoice {
    pub fn new(bank: Arc<SampleBank>) -> Self {
        Self {
            bank,
            playing: None,
        }
    }
}

impl Voice for SamplerVoice {
    fn note_on(&mut self, note: u8, velocity: u8) {
        self.playing = self.bank.get(note).map(|data| Playback {
            data: data.clone(),
            position: 0,
            gain: velocity as f32 / 127.0,
        });
    }

    fn note_off(&mut self, _note: u8) {
        // one-shot samples play to completion
    }

    fn next_sample(&mut self) -> f32 {
        let Some(playback) = self.playing.as_mut() else {
            return 0.0;
        };
        match playback.data.get(playback.position) {
            Some(&sample) => {
                playback.position += 1;
                sample * playback.gain
            }
            None => {
                self.playing = None;
                0.0
            }
        }
    }

    fn is_sounding(&self) -> bool {
        self.playing.is_some()
    }
}
