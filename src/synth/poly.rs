use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::synth::message::Command;
use crate::synth::voice::Voice;

/*
Polyphonic Voice Allocation
===========================

A fixed pool of N voices serves an unbounded stream of notes. Three
structures track who is doing what:

  notes    active MIDI note -> voice index
  free     voices not currently bound to a note (FIFO)
  lru      every voice, ordered by last trigger (front = oldest)

Note-down walks one of three paths:

  already sounding  ->  re-trigger the same voice (it moves to the LRU
                        back; the envelope restarts — that is this
                        implementation's documented retrigger policy)
  free voice        ->  pop the free list's front
  pool exhausted    ->  steal: take the LRU front, forcibly end its
                        note, evict its mapping, reuse it

Stealing always prefers the least-recently-triggered voice — never an
arbitrary or highest-note one — which bounds the audible disruption to
the oldest-sounding note. Running out of voices is a designed-for steady
state, not an error.

The sustain pedal defers releases: note-up while sustaining only clears
the "physically held" flag, and the actual release (free-list return,
note-off handler) happens at sustain-up for every voice whose key is no
longer down.
*/

pub struct VoicePool<V> {
    voices: Vec<V>,
    /// Note each voice is bound to, if any. Index-aligned with `voices`.
    assigned: Vec<Option<u8>>,
    /// Whether the bound note's key is physically down.
    held: Vec<bool>,
    /// All voices ordered by last trigger; front = least recent.
    lru: VecDeque<usize>,
    /// Voices with no bound note, in release order.
    free: VecDeque<usize>,
    /// Active note -> voice index.
    notes: HashMap<u8, usize>,
    sustain: bool,
}

impl<V: Voice> VoicePool<V> {
    /// Pool over pre-built voices. The voices live as long as the pool;
    /// nothing is allocated or dropped per note.
    pub fn new(voices: Vec<V>) -> Self {
        let count = voices.len();
        Self {
            voices,
            assigned: vec![None; count],
            held: vec![false; count],
            lru: (0..count).collect(),
            free: (0..count).collect(),
            notes: HashMap::new(),
            sustain: false,
        }
    }

    /// Dispatch one control command.
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::NoteOn { note, velocity } => self.note_on(note, velocity),
            Command::NoteOff { note } => self.note_off(note),
            Command::SustainOn => self.sustain_on(),
            Command::SustainOff => self.sustain_off(),
            Command::AllNotesOff => self.all_notes_off(),
        }
    }

    pub fn note_on(&mut self, note: u8, velocity: u8) {
        let index = if let Some(&index) = self.notes.get(&note) {
            // re-trigger in place; the binding is already correct
            index
        } else if let Some(index) = self.free.pop_front() {
            index
        } else {
            let Some(&index) = self.lru.front() else {
                return; // empty pool
            };
            if let Some(old) = self.assigned[index].take() {
                debug!(stolen_from = old, to = note, voice = index, "stealing voice");
                self.voices[index].note_off(old);
                self.notes.remove(&old);
            }
            index
        };

        self.touch(index);
        self.assigned[index] = Some(note);
        self.held[index] = true;
        self.notes.insert(note, index);
        self.voices[index].note_on(note, velocity);
    }

    pub fn note_off(&mut self, note: u8) {
        let Some(&index) = self.notes.get(&note) else {
            return; // already released or stolen
        };
        self.held[index] = false;
        if self.sustain {
            return; // deferred until sustain-up
        }
        self.release(index, note);
    }

    pub fn sustain_on(&mut self) {
        self.sustain = true;
    }

    /// Release every voice whose key is no longer physically down.
    pub fn sustain_off(&mut self) {
        self.sustain = false;
        let pending: Vec<(usize, u8)> = self
            .notes
            .iter()
            .filter(|&(_, &index)| !self.held[index])
            .map(|(&note, &index)| (index, note))
            .collect();
        for (index, note) in pending {
            self.release(index, note);
        }
    }

    /// Release everything, sustain or not.
    pub fn all_notes_off(&mut self) {
        let all: Vec<(usize, u8)> = self
            .notes
            .iter()
            .map(|(&note, &index)| (index, note))
            .collect();
        for (index, note) in all {
            self.held[index] = false;
            self.release(index, note);
        }
    }

    /// Mix of all voices for the next sample.
    pub fn next_sample(&mut self) -> f32 {
        self.voices.iter_mut().map(|v| v.next_sample()).sum()
    }

    pub fn sustain(&self) -> bool {
        self.sustain
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// The voice currently bound to `note`, if any.
    pub fn voice_for(&self, note: u8) -> Option<usize> {
        self.notes.get(&note).copied()
    }

    pub fn active_notes(&self) -> usize {
        self.notes.len()
    }

    fn release(&mut self, index: usize, note: u8) {
        self.notes.remove(&note);
        self.assigned[index] = None;
        self.free.push_back(index);
        self.voices[index].note_off(note);
    }

    /// Move a voice to the most-recently-triggered end of the LRU order.
    fn touch(&mut self, index: usize) {
        self.lru.retain(|&i| i != index);
        self.lru.push_back(index);
    }
}
