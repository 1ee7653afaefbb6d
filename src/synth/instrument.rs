use crate::engine::Scheduler;
use crate::graph::{Graph, NodeId};
use crate::synth::message::{Command, CommandReceiver, TimedCommand};
use crate::synth::poly::VoicePool;
use crate::synth::voice::Voice;

/// A MIDI-driven polyphonic instrument, playable as a graph source.
///
/// This is where the two planes meet: the control context pushes
/// timestamped commands into the receiver whenever it likes; the audio
/// context drains them into the per-instrument scheduler at the top of
/// every produced sample and fires exactly the ones that are due. A
/// command for sample 48_000 lands on sample 48_000 no matter how early
/// it was sent or which thread sent it.
pub struct Instrument<V, R> {
    pool: VoicePool<V>,
    rx: R,
    scheduler: Scheduler<Command>,
}

impl<V: Voice, R: CommandReceiver> Instrument<V, R> {
    pub fn new(pool: VoicePool<V>, rx: R) -> Self {
        Self {
            pool,
            rx,
            scheduler: Scheduler::new(),
        }
    }

    /// Produce the sample at `t`: drain arrivals, fire due commands, mix.
    ///
    /// Commands stamped in the past fire immediately (at-or-before
    /// semantics); commands for the future wait in the scheduler.
    pub fn tick(&mut self, t: u64) -> f32 {
        while let Some(TimedCommand { at, command }) = self.rx.pop() {
            self.scheduler.schedule(at, command);
        }
        let pool = &mut self.pool;
        self.scheduler.run(t, |command| pool.apply(command));
        pool.next_sample()
    }

    pub fn pool(&self) -> &VoicePool<V> {
        &self.pool
    }

    /// Move the instrument into `graph` as a single-output source.
    pub fn spawn(self, graph: &mut Graph) -> NodeId
    where
        V: 'static,
        R: 'static,
    {
        let mut instrument = self;
        graph.add_source(1, move |t, out| out[0] = instrument.tick(t))
    }
}
