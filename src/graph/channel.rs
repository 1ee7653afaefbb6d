use crate::graph::NodeId;
use crate::ring::TimeRing;

/// One generator output port: a time ring plus the identity of the node
/// that fills it.
///
/// A channel is created when its node is added to the graph and removed
/// with it. Consumers never own a channel; they hold a `ChannelId` and the
/// graph checks liveness on every access. Any number of consumers may read
/// the same channel (fan-out) — the ring's live window is what bounds how
/// far apart their read positions can drift.
pub struct Channel {
    source: NodeId,
    port: usize,
    ring: TimeRing<f32>,
    /// Set after an evicted-sample warning so a persistently slow reader
    /// logs once per underrun episode, not once per sample.
    pub(crate) stale_warned: bool,
}

impl Channel {
    pub(crate) fn new(source: NodeId, port: usize, capacity: usize) -> Self {
        Self {
            source,
            port,
            ring: TimeRing::new(capacity),
            stale_warned: false,
        }
    }

    /// The node that produces into this channel.
    pub fn source(&self) -> NodeId {
        self.source
    }

    /// Which of the source's output ports this channel carries.
    pub fn port(&self) -> usize {
        self.port
    }

    pub fn ring(&self) -> &TimeRing<f32> {
        &self.ring
    }

    pub(crate) fn ring_mut(&mut self) -> &mut TimeRing<f32> {
        &mut self.ring
    }
}
