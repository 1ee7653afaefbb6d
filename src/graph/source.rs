use crate::error::GraphError;
use crate::graph::node::Node;
use crate::graph::{Graph, NodeId};

/// Fills one sample per output port for the given timestamp.
pub type ProduceFn = Box<dyn FnMut(u64, &mut [f32]) + Send>;

/// A generator-only node: no inputs, one or more output channels.
///
/// The closure is the whole synthesis algorithm — oscillator, sampler,
/// MIDI-driven instrument. It is called lazily, exactly once per
/// timestamp, only when a downstream consumer actually needs that sample.
pub struct Source {
    produce: ProduceFn,
    next_out_t: u64,
    frame: Vec<f32>,
}

impl Source {
    pub fn new(outputs: usize, produce: impl FnMut(u64, &mut [f32]) + Send + 'static) -> Self {
        assert!(outputs > 0, "a source needs at least one output port");
        Self {
            produce: Box::new(produce),
            next_out_t: 0,
            frame: vec![0.0; outputs],
        }
    }
}

impl Node for Source {
    fn output_count(&self) -> usize {
        self.frame.len()
    }

    fn next_t(&self) -> u64 {
        self.next_out_t
    }

    fn seek(&mut self, t: u64) {
        self.next_out_t = t;
    }

    fn advance(&mut self, graph: &mut Graph, id: NodeId) -> Result<(), GraphError> {
        let t = self.next_out_t;
        (self.produce)(t, &mut self.frame);
        graph.emit(id, &self.frame)?;
        self.next_out_t += 1;
        Ok(())
    }
}
