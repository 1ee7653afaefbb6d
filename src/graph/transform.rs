use crate::error::GraphError;
use crate::graph::node::{gather_inputs, InputHandle, Node};
use crate::graph::{ChannelId, Graph, NodeId};

/// Pure per-frame transform: `(inputs, t, outputs)`.
pub type FilterFn = Box<dyn FnMut(&[f32], u64, &mut [f32]) + Send>;

/// Hook fired after each consumed frame, with the frame's timestamp.
pub type AfterConsumeFn = Box<dyn FnMut(u64) + Send>;

/// A filter node: a consumer and a generator fused at the hip.
///
/// Consuming a frame *is* producing one — `advance` reads one sample from
/// every bound input at `next_t`, applies the transform closure, emits the
/// results, and moves the single fused clock forward. Keeping one clock
/// (rather than separate in/out positions) is what makes the timing
/// guarantee trivial: input time and output time can never drift apart.
pub struct Transform {
    inputs: InputHandle,
    filter: FilterFn,
    next_in_t: u64,
    snapshot: Vec<Option<ChannelId>>,
    in_frame: Vec<f32>,
    out_frame: Vec<f32>,
    after_consume: Option<AfterConsumeFn>,
    starved_warned: bool,
}

impl Transform {
    pub fn new(
        inputs: usize,
        outputs: usize,
        filter: impl FnMut(&[f32], u64, &mut [f32]) + Send + 'static,
    ) -> Self {
        assert!(outputs > 0, "a transform needs at least one output port");
        Self {
            inputs: InputHandle::new(inputs),
            filter: Box::new(filter),
            next_in_t: 0,
            snapshot: Vec::with_capacity(inputs),
            in_frame: vec![0.0; inputs],
            out_frame: vec![0.0; outputs],
            after_consume: None,
            starved_warned: false,
        }
    }

    /// Register a hook that runs after every consumed frame. Used to drive
    /// things that must track consumption exactly: MIDI clocks, metering.
    pub fn after_consume(mut self, hook: impl FnMut(u64) + Send + 'static) -> Self {
        self.after_consume = Some(Box::new(hook));
        self
    }

    fn consume(&mut self, graph: &mut Graph, id: NodeId) -> Result<(), GraphError> {
        let t = self.next_in_t;

        // Snapshot bindings under the lock, then release it: the recursive
        // pull below must never run while the control plane is blocked out.
        self.inputs.snapshot_into(&mut self.snapshot);

        gather_inputs(
            graph,
            &self.snapshot,
            t,
            &mut self.in_frame,
            &mut self.starved_warned,
        )?;

        (self.filter)(&self.in_frame, t, &mut self.out_frame);
        graph.emit(id, &self.out_frame)?;
        self.next_in_t += 1;

        if let Some(hook) = self.after_consume.as_mut() {
            hook(t);
        }
        Ok(())
    }
}

impl Node for Transform {
    fn output_count(&self) -> usize {
        self.out_frame.len()
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

    fn advance(&mut self, graph: &mut Graph, id: NodeId) -> Result<(), GraphError> {
        self.consume(graph, id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use crate::config::AudioConfig;
    use crate::graph::Graph;

    #[test]
    fn transforms_inputs_per_sample() {
        let mut graph = Graph::new(AudioConfig::default());
        let src = graph.add_source(1, |_, out| out[0] = 1.0);
        let doubler = graph.add_transform(1, 1, |ins, _, outs| outs[0] = ins[0] * 2.0);

        let src_out = graph.channel(src, 0).unwrap();
        graph
            .inputs(doubler)
            .unwrap()
            .set_input(0, Some(src_out))
            .unwrap();

        let out = graph.channel(doubler, 0).unwrap();
        for t in 0..8 {
            assert_eq!(graph.sample_at(out, t).unwrap(), 2.0);
        }
        assert_eq!(graph.next_t(doubler).unwrap(), 8);
        assert_eq!(graph.next_t(src).unwrap(), 8);
    }

    #[test]
    fn unbound_input_reads_silence_never_fails() {
        let mut graph = Graph::new(AudioConfig::default());
        let gain = graph.add_transform(2, 1, |ins, _, outs| outs[0] = ins[0] + ins[1]);
        let out = graph.channel(gain, 0).unwrap();

        for t in 0..16 {
            assert_eq!(graph.sample_at(out, t).unwrap(), 0.0);
        }
    }

    #[test]
    fn rebinding_takes_effect_on_next_frame() {
        let mut graph = Graph::new(AudioConfig::default());
        let ones = graph.add_source(1, |_, out| out[0] = 1.0);
        let tens = graph.add_source(1, |_, out| out[0] = 10.0);
        let through = graph.add_transform(1, 1, |ins, _, outs| outs[0] = ins[0]);

        let handle = graph.inputs(through).unwrap();
        let ones_out = graph.channel(ones, 0).unwrap();
        let tens_out = graph.channel(tens, 0).unwrap();
        let out = graph.channel(through, 0).unwrap();

        handle.set_input(0, Some(ones_out)).unwrap();
        assert_eq!(graph.sample_at(out, 0).unwrap(), 1.0);

        handle.set_input(0, Some(tens_out)).unwrap();
        assert_eq!(graph.sample_at(out, 1).unwrap(), 10.0);

        handle.remove_input(0).unwrap();
        assert_eq!(graph.sample_at(out, 2).unwrap(), 0.0);
    }

    #[test]
    fn set_input_rejects_bad_port() {
        let mut graph = Graph::new(AudioConfig::default());
        let node = graph.add_transform(1, 1, |ins, _, outs| outs[0] = ins[0]);
        let handle = graph.inputs(node).unwrap();
        assert!(matches!(
            handle.set_input(3, None),
            Err(crate::error::GraphError::PortOutOfRange { port: 3, count: 1 })
        ));
    }

    #[test]
    fn after_consume_hook_sees_every_timestamp() {
        let seen = Arc::new(AtomicU64::new(0));
        let seen_in_hook = seen.clone();

        let mut graph = Graph::new(AudioConfig::default());
        let src = graph.add_source(1, |_, out| out[0] = 0.5);
        let node = crate::graph::Transform::new(1, 1, |ins: &[f32], _, outs: &mut [f32]| {
            outs[0] = ins[0]
        })
        .after_consume(move |t| {
            seen_in_hook.store(t + 1, Ordering::Relaxed);
        });
        let metered = graph.add_node(Box::new(node));

        let src_out = graph.channel(src, 0).unwrap();
        graph
            .inputs(metered)
            .unwrap()
            .set_input(0, Some(src_out))
            .unwrap();

        let out = graph.channel(metered, 0).unwrap();
        for t in 0..5 {
            graph.sample_at(out, t).unwrap();
        }
        assert_eq!(seen.load(Ordering::Relaxed), 5);
    }
}
