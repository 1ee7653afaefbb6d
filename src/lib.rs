//! Pull-based real-time audio signal graph.
//!
//! Sinks pull, sources produce on demand, and every sample is addressed
//! by absolute time — no drops, no duplicates. A separate control plane
//! rewires inputs and schedules sample-accurate events while audio runs.

pub mod config;
pub mod dsp; // Block-based engines (FFT convolution)
pub mod engine; // Sample-accurate event scheduling
pub mod error;
pub mod graph; // Composable pull-graph nodes
pub mod io;
pub mod ring;
pub mod synth; // Voice management and polyphony

pub use config::AudioConfig;
pub use error::{ConvolveError, DeviceError, GraphError, KeymapError, RingError};
pub use graph::{ChannelId, Graph, InputHandle, NodeId};
pub use ring::TimeRing;
