use crate::error::GraphError;
use crate::graph::node::InputHandle;
use crate::graph::transform::FilterFn;
use crate::graph::{ChannelId, Graph, NodeId};

/// One stage of a composite: port counts plus the transform closure.
pub struct StageSpec {
    pub inputs: usize,
    pub outputs: usize,
    pub filter: FilterFn,
}

impl StageSpec {
    pub fn new(
        inputs: usize,
        outputs: usize,
        filter: impl FnMut(&[f32], u64, &mut [f32]) + Send + 'static,
    ) -> Self {
        Self {
            inputs,
            outputs,
            filter: Box::new(filter),
        }
    }
}

/// A bank of filters wired in series and addressed as one unit.
///
/// The member transforms are ordinary graph nodes; the composite is a
/// facade that remembers which one is the entry and which the exit, so
/// input rebinding and channel lookup forward to the right member. Wiring
/// between adjacent stages is fixed at construction: stage `i` port `p`
/// feeds stage `i+1` port `p`.
pub struct Composite {
    stages: Vec<NodeId>,
    entry: InputHandle,
    exit_channels: Vec<ChannelId>,
}

impl Composite {
    /// Build the members inside `graph` and wire them nose to tail.
    ///
    /// Fails without leaving members behind: on a port-count mismatch the
    /// already-added stages are removed again.
    pub fn new(graph: &mut Graph, specs: Vec<StageSpec>) -> Result<Self, GraphError> {
        if specs.is_empty() {
            return Err(GraphError::EmptyComposite);
        }

        let mut stages: Vec<NodeId> = Vec::with_capacity(specs.len());
        let mut prev: Option<(NodeId, usize)> = None;
        for spec in specs {
            let StageSpec {
                inputs,
                outputs,
                filter,
            } = spec;

            if let Some((_, produced)) = prev {
                if inputs != produced {
                    for id in &stages {
                        let _ = graph.remove_node(*id);
                    }
                    return Err(GraphError::StageMismatch {
                        produced,
                        expected: inputs,
                    });
                }
            }

            let id = graph.add_transform(inputs, outputs, filter);
            if let Some((prev_id, _)) = prev {
                let handle = graph.inputs(id)?;
                for port in 0..inputs {
                    let channel = graph.channel(prev_id, port)?;
                    handle.set_input(port, Some(channel))?;
                }
            }
            prev = Some((id, outputs));
            stages.push(id);
        }

        let entry = graph.inputs(stages[0])?;
        let exit = stages[stages.len() - 1];
        let exit_count = graph.output_count(exit)?;
        let mut exit_channels = Vec::with_capacity(exit_count);
        for port in 0..exit_count {
            exit_channels.push(graph.channel(exit, port)?);
        }

        Ok(Self {
            stages,
            entry,
            exit_channels,
        })
    }

    /// Bind the bank's external input: forwards to the entry stage.
    pub fn set_input(&self, port: usize, channel: Option<ChannelId>) -> Result<(), GraphError> {
        self.entry.set_input(port, channel)
    }

    /// Unbind the bank's external input: forwards to the entry stage.
    pub fn remove_input(&self, port: usize) -> Result<(), GraphError> {
        self.entry.remove_input(port)
    }

    /// The bank's external output: forwards to the exit stage's channels.
    pub fn channel(&self, port: usize) -> Result<ChannelId, GraphError> {
        self.exit_channels
            .get(port)
            .copied()
            .ok_or(GraphError::PortOutOfRange {
                port,
                count: self.exit_channels.len(),
            })
    }

    /// Member nodes in pull order, entry first.
    pub fn stages(&self) -> &[NodeId] {
        &self.stages
    }
}
