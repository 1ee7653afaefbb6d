//! Block-based DSP engines that plug into the graph as transforms.
//!
//! Concrete filter math (biquads, shelving, envelopes) is deliberately a
//! caller-supplied closure; what lives here are the engines with real
//! machinery behind them.

/// FFT overlap-add convolution.
pub mod convolve;

pub use convolve::Convolver;
