use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::error::GraphError;
use crate::graph::{ChannelId, Graph, NodeId};

/// The pull contract every graph node implements.
///
/// A node advances one frame at a time: consume one sample from each bound
/// input (if it has inputs), emit one sample to each output channel (if it
/// has outputs), and move its clock forward by exactly one. The graph
/// invokes `advance` on a node whenever a downstream reader needs a sample
/// the node has not produced yet — nodes never run ahead of demand.
pub trait Node: Send {
    /// Number of output channels this node fills per advance. 0 for sinks.
    fn output_count(&self) -> usize;

    /// The shared input-binding table, for nodes that consume.
    fn input_handle(&self) -> Option<InputHandle> {
        None
    }

    /// The next timestamp this node will produce (and, fused, consume).
    /// Monotonic and gapless: after N advances from t, it reads t + N.
    fn next_t(&self) -> u64;

    /// Jump the node's clock to `t` when attaching to a running timeline.
    /// The graph rebases the node's channels alongside this.
    fn seek(&mut self, t: u64);

    /// Produce exactly one frame. Implementations emit via
    /// [`Graph::emit`] and may recursively pull their own inputs.
    fn advance(&mut self, graph: &mut Graph, id: NodeId) -> Result<(), GraphError>;
}

/// A consumer's channel-binding table, shared with the control plane.
///
/// The audio path snapshots the bindings under the lock and releases it
/// before recursing upstream, so a control-context rebind can never block
/// the pull for longer than one table copy — and a rebind becomes audible
/// at the consumer's next frame, not mid-frame.
#[derive(Clone)]
pub struct InputHandle {
    slots: Arc<Mutex<Vec<Option<ChannelId>>>>,
}

impl InputHandle {
    pub(crate) fn new(input_count: usize) -> Self {
        Self {
            slots: Arc::new(Mutex::new(vec![None; input_count])),
        }
    }

    /// Bind input `port` to `channel`, or to silence with `None`.
    pub fn set_input(&self, port: usize, channel: Option<ChannelId>) -> Result<(), GraphError> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let count = slots.len();
        let slot = slots
            .get_mut(port)
            .ok_or(GraphError::PortOutOfRange { port, count })?;
        debug!(port, ?channel, "rebinding input");
        *slot = channel;
        Ok(())
    }

    /// Unbind input `port`; it reads as silence until rebound.
    pub fn remove_input(&self, port: usize) -> Result<(), GraphError> {
        self.set_input(port, None)
    }

    pub fn input_count(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Copy the current bindings into `buf` without holding the lock
    /// afterwards. Called once per consumed frame by the audio path.
    pub(crate) fn snapshot_into(&self, buf: &mut Vec<Option<ChannelId>>) {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        buf.clear();
        buf.extend_from_slice(&slots);
    }
}

/// Read one sample per bound input at time `t` into `frame`.
///
/// Unbound ports read as exact silence — a disconnected input must never
/// crash or stall the graph. The first starved read warns; the flag resets
/// when every port is bound again.
pub(crate) fn gather_inputs(
    graph: &mut Graph,
    bound: &[Option<ChannelId>],
    t: u64,
    frame: &mut [f32],
    starved_warned: &mut bool,
) -> Result<(), GraphError> {
    let mut any_unbound = false;
    for (port, binding) in bound.iter().enumerate() {
        frame[port] = match binding {
            Some(channel) => graph.sample_at(*channel, t)?,
            None => {
                any_unbound = true;
                if !*starved_warned {
                    warn!(port, t, "input unbound; reading silence");
                    *starved_warned = true;
                }
                0.0
            }
        };
    }
    if !any_unbound {
        *starved_warned = false;
    }
    Ok(())
}
