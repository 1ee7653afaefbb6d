use crate::error::GraphError;
use crate::graph::node::{gather_inputs, InputHandle, Node};
use crate::graph::{ChannelId, Graph, NodeId};

/// Receives each consumed frame: `(t, samples)`, one sample per input port.
pub type DeliverFn = Box<dyn FnMut(u64, &[f32]) + Send>;

/// A consumer-only node: the terminal end of a pull chain.
///
/// Sinks have no output channels; the outer loop drives them through
/// [`Graph::pull_frame`]/[`Graph::pull_block`], and every consumed frame is
/// handed to the delivery closure — a device writer, a file writer, a test
/// probe. Pulling a sink is what makes the rest of the graph do work.
pub struct Sink {
    inputs: InputHandle,
    deliver: DeliverFn,
    next_in_t: u64,
    snapshot: Vec<Option<ChannelId>>,
    frame: Vec<f32>,
    starved_warned: bool,
}

impl Sink {
    pub fn new(inputs: usize, deliver: impl FnMut(u64, &[f32]) + Send + 'static) -> Self {
        assert!(inputs > 0, "a sink needs at least one input port");
        Self {
            inputs: InputHandle::new(inputs),
            deliver: Box::new(deliver),
            next_in_t: 0,
            snapshot: Vec::with_capacity(inputs),
            frame: vec![0.0; inputs],
            starved_warned: false,
        }
    }
}

impl Node for Sink {
    fn output_count(&self) -> usize {
        0
    }

    fn input_handle(&self) -> Option<InputHandle> {
        Some(self.inputs.clone())
    }

    fn next_t(&self) -> u64 {
        self.next_in_t
    }

    fn seek(&mut self, t: u64) {
        self.next_in_t = t;
    }

    fn advance(&mut self, graph: &mut Graph, _id: NodeId) -> Result<(), GraphError> {
        let t = self.next_in_t;
        self.inputs.snapshot_into(&mut self.snapshot);
        gather_inputs(
            graph,
            &self.snapshot,
            t,
            &mut self.frame,
            &mut self.starved_warned,
        )?;
        (self.deliver)(t, &self.frame);
        self.next_in_t += 1;
        Ok(())
    }
}
