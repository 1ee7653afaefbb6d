//! The pull-based signal graph.
//!
//! Data flows forward (source → transform → sink) but demand flows
//! backward: pulling a sink consumes a frame, consuming reads each bound
//! channel, and a channel that is asked for a time it has not produced yet
//! advances its parent node until it has. Nothing runs ahead of demand,
//! every node's clock is gapless, and the whole evaluation is
//! single-threaded and depth-first — the control plane only ever touches
//! the graph through input-binding handles and message queues.

/// Time ring plus producer identity for one output port.
pub mod channel;
/// Filter banks addressed as a single unit.
pub mod composite;
/// The `Node` pull contract and input-binding tables.
pub mod node;
/// Consumer-only terminal nodes.
pub mod sink;
/// Generator-only nodes.
pub mod source;
/// Fused consumer+generator filter nodes.
pub mod transform;

pub use channel::Channel;
pub use composite::{Composite, StageSpec};
pub use node::{InputHandle, Node};
pub use sink::{DeliverFn, Sink};
pub use source::{ProduceFn, Source};
pub use transform::{AfterConsumeFn, FilterFn, Transform};

use tracing::{debug, warn};

use crate::config::AudioConfig;
use crate::error::{GraphError, RingError};

/// Stable handle to a node. Slots are reused after removal; the
/// generation makes a handle to a removed node fail instead of aliasing
/// its replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// Stable handle to a channel, checked the same way as [`NodeId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId {
    index: u32,
    generation: u32,
}

struct NodeSlot {
    generation: u32,
    node: Option<Box<dyn Node>>,
    outputs: Vec<ChannelId>,
    vacant: bool,
}

impl NodeSlot {
    fn empty() -> Self {
        Self {
            generation: 0,
            node: None,
            outputs: Vec::new(),
            vacant: true,
        }
    }
}

struct ChannelSlot {
    generation: u32,
    channel: Option<Channel>,
}

/// Arena owner of every node and channel, and the pull engine over them.
pub struct Graph {
    config: AudioConfig,
    nodes: Vec<NodeSlot>,
    channels: Vec<ChannelSlot>,
    free_nodes: Vec<usize>,
    free_channels: Vec<usize>,
}

impl Graph {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            channels: Vec::new(),
            free_nodes: Vec::new(),
            free_channels: Vec::new(),
        }
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Add any node. One channel is created per output port, sized by the
    /// config's ring capacity.
    pub fn add_node(&mut self, node: Box<dyn Node>) -> NodeId {
        let output_count = node.output_count();
        let index = match self.free_nodes.pop() {
            Some(index) => index,
            None => {
                self.nodes.push(NodeSlot::empty());
                self.nodes.len() - 1
            }
        };
        let id = NodeId {
            index: index as u32,
            generation: self.nodes[index].generation,
        };

        let mut outputs = Vec::with_capacity(output_count);
        for port in 0..output_count {
            outputs.push(self.add_channel(Channel::new(id, port, self.config.ring_capacity)));
        }

        let slot = &mut self.nodes[index];
        slot.node = Some(node);
        slot.outputs = outputs;
        slot.vacant = false;
        debug!(?id, outputs = output_count, "added node");
        id
    }

    pub fn add_source(
        &mut self,
        outputs: usize,
        produce: impl FnMut(u64, &mut [f32]) + Send + 'static,
    ) -> NodeId {
        self.add_node(Box::new(Source::new(outputs, produce)))
    }

    pub fn add_transform(
        &mut self,
        inputs: usize,
        outputs: usize,
        filter: impl FnMut(&[f32], u64, &mut [f32]) + Send + 'static,
    ) -> NodeId {
        self.add_node(Box::new(Transform::new(inputs, outputs, filter)))
    }

    pub fn add_sink(
        &mut self,
        inputs: usize,
        deliver: impl FnMut(u64, &[f32]) + Send + 'static,
    ) -> NodeId {
        self.add_node(Box::new(Sink::new(inputs, deliver)))
    }

    /// Remove a node and invalidate its channels. Handles held elsewhere
    /// go stale: later access reports `NodeNotFound`/`ChannelNotFound`.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.node_slot(id)?;
        let slot = &mut self.nodes[id.index as usize];
        if slot.node.is_none() {
            return Err(GraphError::PullCycle);
        }
        let outputs = std::mem::take(&mut slot.outputs);
        slot.node = None;
        slot.vacant = true;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_nodes.push(id.index as usize);

        for channel in outputs {
            if let Some(slot) = self.channels.get_mut(channel.index as usize) {
                if slot.generation == channel.generation {
                    slot.channel = None;
                    slot.generation = slot.generation.wrapping_add(1);
                    self.free_channels.push(channel.index as usize);
                }
            }
        }
        debug!(?id, "removed node");
        Ok(())
    }

    /// The channel carrying `node`'s output `port`.
    pub fn channel(&self, node: NodeId, port: usize) -> Result<ChannelId, GraphError> {
        let slot = self.node_slot(node)?;
        slot.outputs
            .get(port)
            .copied()
            .ok_or(GraphError::PortOutOfRange {
                port,
                count: slot.outputs.len(),
            })
    }

    /// The input-binding handle of a consumer node. Clone it onto the
    /// control context to rewire the graph while audio runs.
    pub fn inputs(&self, node: NodeId) -> Result<InputHandle, GraphError> {
        self.node_slot(node)?
            .node
            .as_ref()
            .ok_or(GraphError::PullCycle)?
            .input_handle()
            .ok_or(GraphError::NotAConsumer)
    }

    pub fn output_count(&self, node: NodeId) -> Result<usize, GraphError> {
        Ok(self.node_slot(node)?.outputs.len())
    }

    /// The node's clock: next timestamp it will produce/consume.
    pub fn next_t(&self, node: NodeId) -> Result<u64, GraphError> {
        Ok(self
            .node_slot(node)?
            .node
            .as_ref()
            .ok_or(GraphError::PullCycle)?
            .next_t())
    }

    /// Jump a node and its channels onto a running timeline at `t`. Only
    /// meaningful for a node that has not been pulled on this timeline.
    pub fn rebase_node(&mut self, id: NodeId, t: u64) -> Result<(), GraphError> {
        self.node_slot(id)?;
        let outputs = self.nodes[id.index as usize].outputs.clone();
        self.nodes[id.index as usize]
            .node
            .as_mut()
            .ok_or(GraphError::PullCycle)?
            .seek(t);
        for channel in outputs {
            self.channel_mut(channel)?.ring_mut().rebase(t);
        }
        debug!(?id, t, "rebased node");
        Ok(())
    }

    /// The sample at time `t` on `channel`, advancing the producing node
    /// as far as needed. This is the lazy pull: demand here is what makes
    /// upstream nodes run.
    ///
    /// A request for an already-evicted time returns silence and warns —
    /// a slow reader degrades, it does not crash the graph.
    pub fn sample_at(&mut self, channel: ChannelId, t: u64) -> Result<f32, GraphError> {
        loop {
            let (highest, source) = {
                let chan = self.channel_ref(channel)?;
                (chan.ring().highest_t(), chan.source())
            };
            if t < highest {
                break;
            }
            self.advance_node(source)?;
        }

        let chan = self.channel_mut(channel)?;
        match chan.ring().read(t) {
            Ok(value) => {
                chan.stale_warned = false;
                Ok(value)
            }
            Err(RingError::Evicted { t, lowest_t }) => {
                if !chan.stale_warned {
                    warn!(t, lowest_t, "sample evicted before read; reading silence");
                    chan.stale_warned = true;
                }
                Ok(0.0)
            }
            // unreachable: the loop above produced through `t`
            Err(err) => Err(GraphError::Ring(err)),
        }
    }

    /// Pull a contiguous block `[t0, t0 + out.len())` from a channel.
    pub fn read_block(
        &mut self,
        channel: ChannelId,
        t0: u64,
        out: &mut [f32],
    ) -> Result<(), GraphError> {
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.sample_at(channel, t0 + i as u64)?;
        }
        Ok(())
    }

    /// Drive a sink (or any node) forward by one frame.
    pub fn pull_frame(&mut self, sink: NodeId) -> Result<(), GraphError> {
        self.advance_node(sink)
    }

    /// Drive a sink forward by `frames` frames — the outer audio loop.
    pub fn pull_block(&mut self, sink: NodeId, frames: usize) -> Result<(), GraphError> {
        for _ in 0..frames {
            self.advance_node(sink)?;
        }
        Ok(())
    }

    /// Append one frame to a node's output channels. Called by node
    /// implementations from inside `advance`.
    pub fn emit(&mut self, id: NodeId, frame: &[f32]) -> Result<(), GraphError> {
        let count = self.node_slot(id)?.outputs.len();
        if frame.len() != count {
            return Err(GraphError::PortOutOfRange {
                port: frame.len(),
                count,
            });
        }
        for port in 0..count {
            let channel = self.nodes[id.index as usize].outputs[port];
            self.channel_mut(channel)?.ring_mut().write(frame[port]);
        }
        Ok(())
    }

    /// Run one node for one frame. The node is taken out of its slot for
    /// the duration, which is also the cycle detector: re-entering the
    /// same node on the same pull finds the slot empty.
    fn advance_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        let slot = self
            .nodes
            .get_mut(id.index as usize)
            .ok_or(GraphError::NodeNotFound)?;
        if slot.generation != id.generation || slot.vacant {
            return Err(GraphError::NodeNotFound);
        }
        let mut node = slot.node.take().ok_or(GraphError::PullCycle)?;
        let result = node.advance(self, id);
        self.nodes[id.index as usize].node = Some(node);
        result
    }

    fn add_channel(&mut self, channel: Channel) -> ChannelId {
        let index = match self.free_channels.pop() {
            Some(index) => index,
            None => {
                self.channels.push(ChannelSlot {
                    generation: 0,
                    channel: None,
                });
                self.channels.len() - 1
            }
        };
        let slot = &mut self.channels[index];
        slot.channel = Some(channel);
        ChannelId {
            index: index as u32,
            generation: slot.generation,
        }
    }

    fn node_slot(&self, id: NodeId) -> Result<&NodeSlot, GraphError> {
        let slot = self
            .nodes
            .get(id.index as usize)
            .ok_or(GraphError::NodeNotFound)?;
        if slot.generation != id.generation || slot.vacant {
            return Err(GraphError::NodeNotFound);
        }
        Ok(slot)
    }

    fn channel_ref(&self, id: ChannelId) -> Result<&Channel, GraphError> {
        let slot = self
            .channels
            .get(id.index as usize)
            .ok_or(GraphError::ChannelNotFound)?;
        if slot.generation != id.generation {
            return Err(GraphError::ChannelNotFound);
        }
        slot.channel.as_ref().ok_or(GraphError::ChannelNotFound)
    }

    fn channel_mut(&mut self, id: ChannelId) -> Result<&mut Channel, GraphError> {
        let slot = self
            .channels
            .get_mut(id.index as usize)
            .ok_or(GraphError::ChannelNotFound)?;
        if slot.generation != id.generation {
            return Err(GraphError::ChannelNotFound);
        }
        slot.channel.as_mut().ok_or(GraphError::ChannelNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_graph() -> Graph {
        Graph::new(AudioConfig::new(44_100, 4).with_ring_capacity(8))
    }

    #[test]
    fn graph_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Graph>();
    }

    #[test]
    fn advances_are_monotonic_and_gapless() {
        let mut graph = small_graph();
        let src = graph.add_source(1, |t, out| out[0] = t as f32);
        for n in 1..=10 {
            graph.pull_frame(src).unwrap();
            assert_eq!(graph.next_t(src).unwrap(), n);
        }
    }

    #[test]
    fn fan_out_readers_share_one_producer() {
        let mut graph = small_graph();
        let counter = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let calls = counter.clone();
        let src = graph.add_source(1, move |t, out| {
            calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            out[0] = t as f32;
        });
        let out = graph.channel(src, 0).unwrap();

        let a = graph.add_transform(1, 1, |ins, _, outs| outs[0] = ins[0]);
        let b = graph.add_transform(1, 1, |ins, _, outs| outs[0] = ins[0] * -1.0);
        graph.inputs(a).unwrap().set_input(0, Some(out)).unwrap();
        graph.inputs(b).unwrap().set_input(0, Some(out)).unwrap();

        let a_out = graph.channel(a, 0).unwrap();
        let b_out = graph.channel(b, 0).unwrap();
        for t in 0..4 {
            assert_eq!(graph.sample_at(a_out, t).unwrap(), t as f32);
            assert_eq!(graph.sample_at(b_out, t).unwrap(), -(t as f32));
        }
        // each sample produced exactly once despite two readers
        assert_eq!(counter.load(std::sync::atomic::Ordering::Relaxed), 4);
    }

    #[test]
    fn slow_reader_gets_silence_not_an_error() {
        let mut graph = small_graph();
        let src = graph.add_source(1, |t, out| out[0] = t as f32 + 1.0);
        let out = graph.channel(src, 0).unwrap();

        // run far ahead of the ring capacity of 8
        assert_eq!(graph.sample_at(out, 29).unwrap(), 30.0);
        // t=0 fell out of the live window long ago
        assert_eq!(graph.sample_at(out, 0).unwrap(), 0.0);
        // live window still intact
        assert_eq!(graph.sample_at(out, 25).unwrap(), 26.0);
    }

    #[test]
    fn cycles_are_detected_not_recursed() {
        let mut graph = small_graph();
        let a = graph.add_transform(1, 1, |ins, _, outs| outs[0] = ins[0]);
        let b = graph.add_transform(1, 1, |ins, _, outs| outs[0] = ins[0]);
        let a_out = graph.channel(a, 0).unwrap();
        let b_out = graph.channel(b, 0).unwrap();
        graph.inputs(a).unwrap().set_input(0, Some(b_out)).unwrap();
        graph.inputs(b).unwrap().set_input(0, Some(a_out)).unwrap();

        assert!(matches!(
            graph.sample_at(a_out, 0),
            Err(GraphError::PullCycle)
        ));
        // the failed pull must not wedge the graph: breaking the cycle heals it
        graph.inputs(b).unwrap().remove_input(0).unwrap();
        assert_eq!(graph.sample_at(a_out, 0).unwrap(), 0.0);
    }

    #[test]
    fn removed_node_invalidates_its_handles() {
        let mut graph = small_graph();
        let src = graph.add_source(1, |_, out| out[0] = 1.0);
        let out = graph.channel(src, 0).unwrap();
        graph.remove_node(src).unwrap();

        assert!(matches!(graph.next_t(src), Err(GraphError::NodeNotFound)));
        assert!(matches!(
            graph.sample_at(out, 0),
            Err(GraphError::ChannelNotFound)
        ));

        // the slot is recycled with a fresh generation; old ids stay dead
        let replacement = graph.add_source(1, |_, out| out[0] = 2.0);
        assert!(matches!(graph.next_t(src), Err(GraphError::NodeNotFound)));
        let new_out = graph.channel(replacement, 0).unwrap();
        assert_eq!(graph.sample_at(new_out, 0).unwrap(), 2.0);
    }

    #[test]
    fn rebase_attaches_a_node_mid_timeline() {
        let mut graph = small_graph();
        let early = graph.add_source(1, |t, out| out[0] = t as f32);
        let early_out = graph.channel(early, 0).unwrap();
        graph.sample_at(early_out, 99).unwrap();

        let late = graph.add_source(1, |t, out| out[0] = t as f32);
        graph.rebase_node(late, 100).unwrap();
        let late_out = graph.channel(late, 0).unwrap();

        assert_eq!(graph.next_t(late).unwrap(), 100);
        assert_eq!(graph.sample_at(late_out, 100).unwrap(), 100.0);
    }

    #[test]
    fn read_block_pulls_a_contiguous_range() {
        let mut graph = small_graph();
        let src = graph.add_source(1, |t, out| out[0] = t as f32);
        let out = graph.channel(src, 0).unwrap();
        let mut block = [0.0f32; 4];
        graph.read_block(out, 2, &mut block).unwrap();
        assert_eq!(block, [2.0, 3.0, 4.0, 5.0]);
    }
}
