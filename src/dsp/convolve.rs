use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use tracing::debug;

use crate::error::ConvolveError;
use crate::graph::FilterFn;

/*
Overlap-Add Partitioned Convolution
===================================

Convolving a stream against an arbitrary-length impulse response, one
block at a time, in bounded per-block cost. Direct convolution is
O(block x L) per block; for a one-second reverb tail L is tens of
thousands of taps. The FFT route:

1. At construction, split the impulse into segments of `step` taps each
   (step = fft_size - block_size), zero-pad every segment to `fft_size`,
   and transform each once. The padding is the guard zone: a circular
   convolution of `step` taps against `block_size` samples needs
   step + block_size - 1 <= fft_size points to equal the *linear*
   convolution — without the guard zeros the tail would wrap around and
   corrupt the head of the block.

2. Per input block: one forward FFT of the (padded) block, then for each
   segment a complex multiply and one inverse FFT. Segment i's result is
   the part of the full convolution contributed by taps
   [i*step, (i+1)*step), so it lands `i * step` samples ahead in an
   accumulation buffer, added onto whatever earlier blocks already left
   there — that sum-of-shifted-pieces is the overlap-add.

3. Emit the first `block_size` accumulated samples, slide the buffer,
   zero the vacated tail.

Per-block cost is O(segments x fft_size log fft_size) regardless of how
the impulse aligns with block boundaries. The impulse is energy-normalized
up front (divide by the root of the sum of squares) so output level does
not scale with impulse length.
*/

/// Default transform size: the reference tuning of 8x the block size,
/// rounded up to a power of two.
fn default_fft_size(block_size: usize) -> usize {
    (block_size * 8).next_power_of_two()
}

/// Streaming FFT convolution against a fixed impulse response.
pub struct Convolver {
    block_size: usize,
    fft_size: usize,
    /// Taps covered per segment: `fft_size - block_size`.
    step: usize,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    /// Pre-transformed impulse segments, one spectrum per partition.
    segments: Vec<Vec<Complex<f32>>>,
    /// Scratch: spectrum of the current input block.
    spectrum: Vec<Complex<f32>>,
    /// Scratch: per-segment product before the inverse transform.
    work: Vec<Complex<f32>>,
    /// Overlap-add accumulator spanning every segment's landing zone.
    acc: Vec<f32>,
}

impl Convolver {
    /// Engine with the default transform size for this block size.
    pub fn new(impulse: &[f32], block_size: usize) -> Result<Self, ConvolveError> {
        Self::with_fft_size(impulse, block_size, default_fft_size(block_size))
    }

    /// Engine with an explicit transform size (power of two, larger than
    /// the block size). Bigger transforms mean fewer segments but more
    /// latency-free work per call; the default suits typical block sizes.
    pub fn with_fft_size(
        impulse: &[f32],
        block_size: usize,
        fft_size: usize,
    ) -> Result<Self, ConvolveError> {
        if impulse.is_empty() {
            return Err(ConvolveError::EmptyImpulse);
        }
        if !fft_size.is_power_of_two() || fft_size <= block_size || block_size == 0 {
            return Err(ConvolveError::BadFftSize {
                fft_size,
                block_size,
            });
        }

        let step = fft_size - block_size;
        let taps = impulse.len();
        let segment_count = (taps - 1).div_ceil(step) + 1;

        // Normalize to unit energy so a long impulse does not get louder
        // than a short one. A silent impulse stays silent.
        let energy: f32 = impulse.iter().map(|h| h * h).sum();
        let scale = if energy > 0.0 { 1.0 / energy.sqrt() } else { 1.0 };

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let ifft = planner.plan_fft_inverse(fft_size);

        let mut segments = Vec::with_capacity(segment_count);
        for seg in 0..segment_count {
            let start = (seg * step).min(taps);
            let end = ((seg + 1) * step).min(taps);
            let mut padded = vec![Complex::new(0.0, 0.0); fft_size];
            for (slot, &tap) in padded.iter_mut().zip(&impulse[start..end]) {
                *slot = Complex::new(tap * scale, 0.0);
            }
            fft.process(&mut padded);
            segments.push(padded);
        }

        debug!(
            taps,
            block_size,
            fft_size,
            segments = segment_count,
            "built convolution engine"
        );

        Ok(Self {
            block_size,
            fft_size,
            step,
            fft,
            ifft,
            segments,
            spectrum: vec![Complex::new(0.0, 0.0); fft_size],
            work: vec![Complex::new(0.0, 0.0); fft_size],
            acc: vec![0.0; (segment_count - 1) * step + fft_size],
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Convolve one block: `out` receives the next `block_size` samples of
    /// the linear convolution of everything fed in so far.
    pub fn process_block(&mut self, input: &[f32], out: &mut [f32]) -> Result<(), ConvolveError> {
        if input.len() != self.block_size {
            return Err(ConvolveError::BlockSize {
                expected: self.block_size,
                found: input.len(),
            });
        }
        if out.len() != self.block_size {
            return Err(ConvolveError::BlockSize {
                expected: self.block_size,
                found: out.len(),
            });
        }

        // forward transform of the zero-padded block, once per call
        for (slot, &x) in self.spectrum.iter_mut().zip(input.iter()) {
            *slot = Complex::new(x, 0.0);
        }
        for slot in self.spectrum.iter_mut().skip(input.len()) {
            *slot = Complex::new(0.0, 0.0);
        }
        self.fft.process(&mut self.spectrum);

        // rustfft leaves the round trip scaled by fft_size
        let norm = 1.0 / self.fft_size as f32;

        for (seg, seg_spectrum) in self.segments.iter().enumerate() {
            for ((w, &x), &h) in self
                .work
                .iter_mut()
                .zip(self.spectrum.iter())
                .zip(seg_spectrum.iter())
            {
                *w = x * h;
            }
            self.ifft.process(&mut self.work);

            let base = seg * self.step;
            for (offset, w) in self.work.iter().enumerate() {
                self.acc[base + offset] += w.re * norm;
            }
        }

        out.copy_from_slice(&self.acc[..self.block_size]);

        // slide the accumulator and open up the vacated future slot
        self.acc.copy_within(self.block_size.., 0);
        let tail = self.acc.len() - self.block_size;
        self.acc[tail..].fill(0.0);
        Ok(())
    }

    /// Reset stream state (the accumulator); the impulse spectra stay.
    pub fn reset(&mut self) {
        self.acc.fill(0.0);
    }

    /// Wrap the engine as a single-input graph transform.
    ///
    /// The per-sample pull protocol meets the block-based engine here:
    /// input samples batch up until a block is full, then one engine call
    /// refills the pending output queue. The transform therefore has a
    /// fixed latency of one block, reported by [`Convolver::latency`].
    pub fn into_filter(mut self) -> FilterFn {
        let block = self.block_size;
        let mut in_buf: Vec<f32> = Vec::with_capacity(block);
        let mut out_buf: Vec<f32> = vec![0.0; block];
        let mut pending: std::collections::VecDeque<f32> =
            std::collections::VecDeque::with_capacity(2 * block);
        Box::new(move |ins: &[f32], _t: u64, outs: &mut [f32]| {
            outs[0] = pending.pop_front().unwrap_or(0.0);
            in_buf.push(ins[0]);
            if in_buf.len() == block {
                // a full block convolves or, on the unreachable size
                // mismatch, decays to silence rather than panicking
                if self.process_block(&in_buf, &mut out_buf).is_ok() {
                    pending.extend(out_buf.iter().copied());
                }
                in_buf.clear();
            }
        })
    }

    /// Samples of delay added by [`Convolver::into_filter`].
    pub fn latency(&self) -> usize {
        self.block_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Direct-form linear convolution, energy-normalized the same way the
    /// engine normalizes, as the reference result.
    fn direct(signal: &[f32], impulse: &[f32]) -> Vec<f32> {
        let energy: f32 = impulse.iter().map(|h| h * h).sum();
        let scale = if energy > 0.0 { 1.0 / energy.sqrt() } else { 1.0 };
        let mut out = vec![0.0; signal.len() + impulse.len() - 1];
        for (n, &x) in signal.iter().enumerate() {
            for (k, &h) in impulse.iter().enumerate() {
                out[n + k] += x * h * scale;
            }
        }
        out
    }

    fn run_blocks(conv: &mut Convolver, signal: &[f32]) -> Vec<f32> {
        let block = conv.block_size();
        assert_eq!(signal.len() % block, 0);
        let mut out = vec![0.0; signal.len()];
        for (input, output) in signal.chunks(block).zip(out.chunks_mut(block)) {
            conv.process_block(input, output).unwrap();
        }
        out
    }

    #[test]
    fn unit_impulse_is_identity() {
        let mut conv = Convolver::new(&[1.0], 4).unwrap();
        let signal: Vec<f32> = (0..12).map(|i| (i as f32 * 0.7).sin()).collect();
        let out = run_blocks(&mut conv, &signal);
        for (&got, &want) in out.iter().zip(signal.iter()) {
            assert_abs_diff_eq!(got, want, epsilon = 1e-5);
        }
    }

    #[test]
    fn short_impulse_matches_direct_form_across_block_seams() {
        let impulse = [0.5, 0.5];
        let block = 4;
        let mut conv = Convolver::new(&impulse, block).unwrap();

        // block-length-aligned pulse: nonzero right at the seam
        let mut signal = vec![0.0; 12];
        signal[3] = 1.0;
        signal[4] = -1.0;

        let out = run_blocks(&mut conv, &signal);
        let want = direct(&signal, &impulse);
        for (n, &got) in out.iter().enumerate() {
            assert_abs_diff_eq!(got, want[n], epsilon = 1e-5);
        }
    }

    #[test]
    fn long_impulse_spans_multiple_segments() {
        let block = 4;
        let fft_size = 16; // step = 12, so 40 taps need several segments
        let impulse: Vec<f32> = (0..40).map(|i| ((i * 7 % 11) as f32 - 5.0) / 11.0).collect();
        let mut conv = Convolver::with_fft_size(&impulse, block, fft_size).unwrap();
        assert!(conv.segment_count() > 3);

        let signal: Vec<f32> = (0..64).map(|i| ((i * 13 % 17) as f32 - 8.0) / 17.0).collect();
        let out = run_blocks(&mut conv, &signal);
        let want = direct(&signal, &impulse);
        for (n, &got) in out.iter().enumerate() {
            assert_abs_diff_eq!(got, want[n], epsilon = 1e-4);
        }
    }

    #[test]
    fn segment_count_follows_partition_size() {
        // 1 tap always fits one segment
        assert_eq!(Convolver::with_fft_size(&[1.0], 4, 16).unwrap().segment_count(), 1);
        // 13 taps over step=12 spill into a second segment
        let taps = vec![0.1; 13];
        assert_eq!(
            Convolver::with_fft_size(&taps, 4, 16).unwrap().segment_count(),
            2
        );
    }

    #[test]
    fn construction_rejects_bad_inputs() {
        assert!(matches!(
            Convolver::new(&[], 128),
            Err(ConvolveError::EmptyImpulse)
        ));
        assert!(matches!(
            Convolver::with_fft_size(&[1.0], 128, 100),
            Err(ConvolveError::BadFftSize { .. })
        ));
        assert!(matches!(
            Convolver::with_fft_size(&[1.0], 128, 128),
            Err(ConvolveError::BadFftSize { .. })
        ));
    }

    #[test]
    fn wrong_block_length_is_reported() {
        let mut conv = Convolver::new(&[1.0], 8).unwrap();
        let mut out = vec![0.0; 8];
        assert!(matches!(
            conv.process_block(&[0.0; 4], &mut out),
            Err(ConvolveError::BlockSize {
                expected: 8,
                found: 4
            })
        ));
    }

    #[test]
    fn silent_impulse_convolves_to_silence() {
        let mut conv = Convolver::new(&[0.0, 0.0, 0.0], 4).unwrap();
        let out = run_blocks(&mut conv, &[1.0; 8]);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn graph_filter_wrapper_adds_one_block_of_latency() {
        use crate::config::AudioConfig;
        use crate::graph::Graph;

        let block = 4;
        let conv = Convolver::new(&[1.0], block).unwrap();
        let latency = conv.latency();
        assert_eq!(latency, block);

        let mut graph = Graph::new(AudioConfig::new(44_100, block));
        let src = graph.add_source(1, |t, out| out[0] = t as f32 + 1.0);
        let wet = graph.add_transform(1, 1, conv.into_filter());
        let src_out = graph.channel(src, 0).unwrap();
        graph
            .inputs(wet)
            .unwrap()
            .set_input(0, Some(src_out))
            .unwrap();

        let out = graph.channel(wet, 0).unwrap();
        let mut pulled = vec![0.0f32; 12];
        graph.read_block(out, 0, &mut pulled).unwrap();

        // first block is the wrapper's pipeline delay, then the identity
        // impulse reproduces the input one block late
        assert_eq!(&pulled[..latency], &[0.0; 4]);
        for (i, &got) in pulled[latency..].iter().enumerate() {
            assert_abs_diff_eq!(got, i as f32 + 1.0, epsilon = 1e-5);
        }
    }
}
