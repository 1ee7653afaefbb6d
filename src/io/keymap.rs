//! Drum-style keymap configuration: a text file mapping MIDI notes to
//! sample files.
//!
//! Format, one entry per line:
//!
//! ```text
//! # kit v2
//! 36 kick.wav
//! 38 snare.wav
//! 42 hats/closed.wav
//! ```
//!
//! Blank lines and `#` comments are ignored. Relative sample paths are
//! resolved against the keymap file's directory. Any malformed line or
//! unreadable sample fails loading with an error naming the culprit;
//! entries already loaded are simply dropped with the failed bank.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hound::{SampleFormat, WavReader};
use tracing::debug;

use crate::error::KeymapError;

/// Parse keymap text into `(note, path)` entries, without touching disk.
pub fn parse_keymap(text: &str) -> Result<Vec<(u8, PathBuf)>, KeymapError> {
    let mut entries = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.splitn(2, char::is_whitespace);
        let note_text = parts.next().unwrap_or_default();
        let path_text = parts.next().map(str::trim).unwrap_or_default();
        if path_text.is_empty() {
            return Err(KeymapError::BadLine {
                line,
                text: raw.to_string(),
            });
        }
        let note: u8 = note_text.parse().map_err(|_| KeymapError::BadNote {
            line,
            text: note_text.to_string(),
        })?;
        if note > 127 {
            return Err(KeymapError::BadNote {
                line,
                text: note_text.to_string(),
            });
        }
        entries.push((note, PathBuf::from(path_text)));
    }
    Ok(entries)
}

/// Decode a WAV file to mono f32 samples.
///
/// PCM integer and IEEE float files are both accepted; multi-channel
/// files are averaged down to mono.
pub fn load_sample(path: &Path) -> Result<Vec<f32>, KeymapError> {
    let bad = |source| KeymapError::BadSample {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = WavReader::open(path).map_err(bad)?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let frames: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(bad)?,
        SampleFormat::Int => {
            let full_scale = (1u32 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / full_scale))
                .collect::<Result<_, _>>()
                .map_err(bad)?
        }
    };

    if channels <= 1 {
        return Ok(frames);
    }
    Ok(frames
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect())
}

/// Decoded keymap: every referenced sample loaded and ready to trigger.
#[derive(Debug)]
pub struct SampleBank {
    samples: HashMap<u8, Arc<Vec<f32>>>,
}

impl SampleBank {
    /// Read and decode a keymap file and every sample it references.
    pub fn load(path: &Path) -> Result<Self, KeymapError> {
        let text = fs::read_to_string(path).map_err(|source| KeymapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let entries = parse_keymap(&text)?;
        Self::from_entries(entries, path.parent())
    }

    /// Build a bank from parsed entries, resolving relative paths against
    /// `base`.
    pub fn from_entries(
        entries: Vec<(u8, PathBuf)>,
        base: Option<&Path>,
    ) -> Result<Self, KeymapError> {
        let mut samples = HashMap::new();
        for (note, rel) in entries {
            let path = match base {
                Some(dir) if rel.is_relative() => dir.join(&rel),
                _ => rel,
            };
            let data = load_sample(&path)?;
            debug!(note, path = %path.display(), frames = data.len(), "loaded keymap sample");
            samples.insert(note, Arc::new(data));
        }
        Ok(Self { samples })
    }

    /// Bank assembled from already-decoded data (tests, embedded kits).
    pub fn from_samples(samples: HashMap<u8, Arc<Vec<f32>>>) -> Self {
        Self { samples }
    }

    pub fn get(&self, note: u8) -> Option<&Arc<Vec<f32>>> {
        self.samples.get(&note)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn write_wav(path: &Path, channels: u16, samples: &[i16]) {
        let spec = WavSpec {
            channels,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn parses_entries_and_skips_comments() {
        let text = "# drum kit\n\n36 kick.wav\n  38   snare.wav  \n";
        let entries = parse_keymap(text).unwrap();
        assert_eq!(
            entries,
            vec![
                (36, PathBuf::from("kick.wav")),
                (38, PathBuf::from("snare.wav")),
            ]
        );
    }

    #[test]
    fn rejects_line_without_a_path() {
        let err = parse_keymap("36\n").unwrap_err();
        assert!(matches!(err, KeymapError::BadLine { line: 1, .. }));
    }

    #[test]
    fn rejects_non_numeric_and_out_of_range_notes() {
        assert!(matches!(
            parse_keymap("kick kick.wav\n").unwrap_err(),
            KeymapError::BadNote { line: 1, .. }
        ));
        assert!(matches!(
            parse_keymap("# ok\n200 kick.wav\n").unwrap_err(),
            KeymapError::BadNote { line: 2, .. }
        ));
    }

    #[test]
    fn loads_samples_relative_to_the_keymap() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("kick.wav"), 1, &[i16::MAX / 2; 8]);
        let keymap = dir.path().join("kit.map");
        fs::write(&keymap, "36 kick.wav\n").unwrap();

        let bank = SampleBank::load(&keymap).unwrap();
        assert_eq!(bank.len(), 1);
        let kick = bank.get(36).unwrap();
        assert_eq!(kick.len(), 8);
        assert!((kick[0] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn missing_sample_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let keymap = dir.path().join("kit.map");
        fs::write(&keymap, "36 nope.wav\n").unwrap();

        let err = SampleBank::load(&keymap).unwrap_err();
        match err {
            KeymapError::BadSample { path, .. } => {
                assert!(path.ends_with("nope.wav"));
            }
            other => panic!("expected BadSample, got {other:?}"),
        }
    }

    #[test]
    fn stereo_samples_average_to_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.wav");
        // L = full scale, R = 0 -> mono = 0.5
        write_wav(&path, 2, &[i16::MAX, 0, i16::MAX, 0]);
        let mono = load_sample(&path).unwrap();
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.5).abs() < 1e-3);
    }
}
