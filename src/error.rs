//! Error taxonomy for the whole crate.
//!
//! Timing problems (a reader outrunning a ring's live window, an unbound
//! input) are absorbed where they occur and degrade to silence; they never
//! appear here. The types below cover what does propagate: topology
//! mistakes, impulse/keymap construction failures, and device loss.

use std::path::PathBuf;

use thiserror::Error;

/// Failure reading a [`TimeRing`](crate::ring::TimeRing) outside its live window.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RingError {
    /// The sample existed once but has been overwritten by newer writes.
    #[error("t={t} already evicted (live window starts at {lowest_t})")]
    Evicted { t: u64, lowest_t: u64 },
    /// The sample has not been produced yet.
    #[error("t={t} not yet produced (live window ends at {highest_t})")]
    Unwritten { t: u64, highest_t: u64 },
}

/// Topology and pull failures surfaced by [`Graph`](crate::graph::Graph).
#[derive(Debug, Error)]
pub enum GraphError {
    /// The node id is stale (node removed) or never existed.
    #[error("node id is stale or unknown")]
    NodeNotFound,
    /// The channel id is stale (producer removed) or never existed.
    #[error("channel id is stale or unknown")]
    ChannelNotFound,
    /// A port index past the node's declared port count.
    #[error("port {port} out of range for node with {count} ports")]
    PortOutOfRange { port: usize, count: usize },
    /// A pull re-entered a node that is already mid-advance.
    #[error("pull re-entered a node already advancing; the graph has a cycle")]
    PullCycle,
    /// An input operation was attempted on a node without input ports.
    #[error("node has no input ports")]
    NotAConsumer,
    /// Adjacent composite stages with mismatched port counts.
    #[error("stage produces {produced} outputs but the next stage expects {expected} inputs")]
    StageMismatch { produced: usize, expected: usize },
    /// A composite needs at least one stage.
    #[error("composite requires at least one stage")]
    EmptyComposite,
    #[error(transparent)]
    Ring(#[from] RingError),
}

/// Construction and block-size failures in the convolution engine.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConvolveError {
    #[error("impulse response is empty")]
    EmptyImpulse,
    #[error("fft size {fft_size} must be a power of two larger than block size {block_size}")]
    BadFftSize { fft_size: usize, block_size: usize },
    #[error("expected a block of {expected} samples, got {found}")]
    BlockSize { expected: usize, found: usize },
}

/// Failures constructing a keymap-backed sample bank.
#[derive(Debug, Error)]
pub enum KeymapError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("keymap line {line}: expected `<note> <path>`, got {text:?}")]
    BadLine { line: usize, text: String },
    #[error("keymap line {line}: {text:?} is not a MIDI note (0-127)")]
    BadNote { line: usize, text: String },
    #[error("failed to decode sample {path}")]
    BadSample {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
}

/// Device-side block transfer failure. Whether a caller treats this as
/// fatal (the reference behavior) or recoverable is its own policy.
#[derive(Debug, Error)]
#[error("audio device failure: {0}")]
pub struct DeviceError(pub String);
