//! Effect scheduling.
//!
//! The [`Scheduler`] trait is the seam between the engine and whatever drives
//! time: the real-timer loop in the binary, [`BatchRunner`] for headless runs,
//! or a test calling `tick` by hand.
//!
//! [`EffectScheduler`] dispatches every active effect once per tick, in list
//! order, into one shared [`ChannelFrame`]. Effects later in the list overwrite
//! earlier ones on shared channels; there is no blending. The frame is
//! committed to the sink once, after all effects ran.

use std::collections::HashMap;

use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::blocks::Block;
use crate::compiler::{CompiledProgram, compile};
use crate::dmx_types::ChannelSink;
use crate::effect::{Effect, EffectKind};
use crate::frame::ChannelFrame;
use crate::interpreter::{RuntimeState, StepContext};
use crate::procedural;

/// Default scheduler period (10 Hz).
pub const DEFAULT_TICK_MS: u64 = 100;

/// What happened during one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Sequence number, starting at 1
    pub tick: u64,
    /// Effects that were stepped or evaluated
    pub dispatched: usize,
    /// Channel writes committed
    pub writes: usize,
}

pub trait Scheduler {
    /// Run one tick at wall-clock time `now_ms` and commit the result to `sink`.
    fn tick<S: ChannelSink>(&mut self, now_ms: f64, effects: &[Effect], sink: &mut S) -> TickReport;
}

/// Compiled program kept with the block list it was compiled from.
struct CachedProgram {
    source: Vec<Block>,
    program: CompiledProgram,
}

pub struct EffectScheduler<R: Rng = StdRng> {
    /// Interpreter state per block-program effect, kept while the effect exists
    runtime: HashMap<u32, RuntimeState>,
    programs: HashMap<u32, CachedProgram>,
    rng: R,
    ticks: u64,
}

impl EffectScheduler<StdRng> {
    /// Scheduler with an OS-seeded generator.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Scheduler whose random effects replay identically for the same seed.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::new(),
        }
    }
}

impl Default for EffectScheduler<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> EffectScheduler<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            runtime: HashMap::new(),
            programs: HashMap::new(),
            rng,
            ticks: 0,
        }
    }

    pub fn runtime_state(&self, effect_id: u32) -> Option<&RuntimeState> {
        self.runtime.get(&effect_id)
    }

    /// Compiled program of a block-program effect, as of the last tick it ran.
    pub fn program(&self, effect_id: u32) -> Option<&CompiledProgram> {
        self.programs.get(&effect_id).map(|cached| &cached.program)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Forget everything kept for a deleted effect.
    pub fn remove_effect(&mut self, effect_id: u32) {
        if self.runtime.remove(&effect_id).is_some() {
            debug!("Discarded runtime state of effect {effect_id}");
        }
        self.programs.remove(&effect_id);
    }

    /// Drop state of effects no longer in the list. Inactive effects keep theirs.
    fn prune(&mut self, effects: &[Effect]) {
        let deleted: Vec<u32> = self
            .runtime
            .keys()
            .chain(self.programs.keys())
            .filter(|id| !effects.iter().any(|e| e.id == **id))
            .copied()
            .collect();
        for id in deleted {
            self.remove_effect(id);
        }
    }

    /// Recompile when the effect's block list changed since the last tick.
    fn refresh_program(&mut self, effect: &Effect) {
        let stale = self
            .programs
            .get(&effect.id)
            .is_none_or(|cached| cached.source != effect.blocks);
        if stale {
            let program = compile(&effect.blocks);
            debug!(
                "Compiled effect {} \"{}\": {}",
                effect.id,
                effect.name,
                program.summary()
            );
            self.programs.insert(
                effect.id,
                CachedProgram {
                    source: effect.blocks.clone(),
                    program,
                },
            );
        }
    }

    fn step_program(&mut self, effect: &Effect, now_ms: f64, frame: &mut ChannelFrame<'_>) {
        self.refresh_program(effect);
        let Some(cached) = self.programs.get(&effect.id) else {
            return;
        };
        let state = self.runtime.entry(effect.id).or_insert_with(|| {
            debug!("Created runtime state for effect {}", effect.id);
            RuntimeState::new()
        });
        let mut ctx = StepContext {
            effect,
            now_ms,
            frame,
            rng: &mut self.rng,
        };
        if let Some(index) = state.step(&cached.program, &mut ctx) {
            trace!("Effect {} executed instruction {index}", effect.id);
        }
    }
}

impl<R: Rng> Scheduler for EffectScheduler<R> {
    fn tick<S: ChannelSink>(&mut self, now_ms: f64, effects: &[Effect], sink: &mut S) -> TickReport {
        self.ticks += 1;
        self.prune(effects);

        let mut dispatched = 0;
        let writes = {
            let mut frame = ChannelFrame::new(sink.fixtures());
            for effect in effects.iter().filter(|e| e.is_active) {
                match effect.kind {
                    EffectKind::BlockProgram if effect.blocks.is_empty() => continue,
                    EffectKind::BlockProgram => self.step_program(effect, now_ms, &mut frame),
                    EffectKind::BuiltIn(kind) => {
                        procedural::render(kind, effect, now_ms, &mut frame, &mut self.rng);
                    }
                }
                dispatched += 1;
            }
            frame.finish()
        };

        let report = TickReport {
            tick: self.ticks,
            dispatched,
            writes: writes.len(),
        };
        sink.commit(writes);
        trace!("Tick {report:?}");
        report
    }
}

/// Headless driver: advances a synthetic clock by a fixed interval per tick.
pub struct BatchRunner<S> {
    scheduler: S,
    now_ms: f64,
    interval_ms: f64,
}

impl<S: Scheduler> BatchRunner<S> {
    pub fn new(scheduler: S, start_ms: f64, interval_ms: u64) -> Self {
        Self {
            scheduler,
            now_ms: start_ms,
            interval_ms: interval_ms as f64,
        }
    }

    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// One tick at the current time, then advance the clock.
    pub fn step<C: ChannelSink>(&mut self, effects: &[Effect], sink: &mut C) -> TickReport {
        let report = self.scheduler.tick(self.now_ms, effects, sink);
        self.now_ms += self.interval_ms;
        report
    }

    pub fn run<C: ChannelSink>(&mut self, ticks: u64, effects: &[Effect], sink: &mut C) -> Vec<TickReport> {
        (0..ticks).map(|_| self.step(effects, sink)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{BlockKind, SetIntensity};
    use crate::dmx_types::{Fixture, FixtureStore, FixtureTemplateLibrary};
    use crate::effect::BuiltInKind;

    fn store() -> FixtureStore {
        let lib = FixtureTemplateLibrary::new();
        let dimmer = lib.get_template("Generic Dimmer").unwrap();
        FixtureStore::new(vec![
            Fixture::from_template(1, "A", dimmer, 1),
            Fixture::from_template(2, "B", dimmer, 2),
        ])
    }

    fn intensity_program(id: u32, levels: &[f64]) -> Effect {
        let blocks = levels
            .iter()
            .enumerate()
            .map(|(order, level)| {
                Block::new(
                    order as u32,
                    order,
                    BlockKind::SetIntensity(SetIntensity { intensity: *level }),
                )
            })
            .collect();
        Effect::block_program(id, "levels", vec![1], blocks)
    }

    #[test]
    fn inactive_and_empty_effects_are_skipped() {
        let mut sink = store();
        let effects = vec![
            Effect::built_in(1, "off", BuiltInKind::Strobe, vec![1]).with_active(false),
            Effect::block_program(2, "empty", vec![1], Vec::new()),
        ];
        let report = EffectScheduler::seeded(1).tick(0.0, &effects, &mut sink);
        assert_eq!(report.dispatched, 0);
        assert_eq!(report.writes, 0);
        assert_eq!(report.tick, 1);
    }

    #[test]
    fn deleting_an_effect_drops_its_state() {
        let mut sink = store();
        let mut scheduler = EffectScheduler::seeded(1);
        let effects = vec![intensity_program(5, &[10.0, 20.0, 30.0])];
        scheduler.tick(0.0, &effects, &mut sink);
        assert_eq!(scheduler.runtime_state(5).map(|s| s.program_counter), Some(1));
        assert!(scheduler.program(5).is_some());

        scheduler.tick(100.0, &[], &mut sink);
        assert!(scheduler.runtime_state(5).is_none());
        assert!(scheduler.program(5).is_none());
    }

    #[test]
    fn edited_blocks_are_recompiled() {
        let mut sink = store();
        let mut scheduler = EffectScheduler::seeded(1);
        let mut effects = vec![intensity_program(5, &[10.0, 20.0])];
        scheduler.tick(0.0, &effects, &mut sink);
        assert_eq!(scheduler.program(5).map(|p| p.block_count()), Some(2));

        effects[0] = intensity_program(5, &[10.0, 20.0, 30.0, 40.0]);
        scheduler.tick(100.0, &effects, &mut sink);
        assert_eq!(scheduler.program(5).map(|p| p.block_count()), Some(4));
        // the program counter carries on from where it was
        assert_eq!(sink.get(1).and_then(|f| f.value(0)), Some(51));
    }

    #[test]
    fn batch_runner_advances_the_clock() {
        let mut sink = store();
        let effects = vec![Effect::built_in(1, "strobe", BuiltInKind::Strobe, vec![1, 2])];
        let mut runner = BatchRunner::new(EffectScheduler::seeded(1), 0.0, DEFAULT_TICK_MS);
        let reports = runner.run(4, &effects, &mut sink);
        assert_eq!(reports.len(), 4);
        assert_eq!(runner.now_ms(), 400.0);
        assert_eq!(runner.scheduler().ticks(), 4);
        // t = 300: floor(300 / 200) mod 2 = 1 -> dark
        assert_eq!(sink.get(2).and_then(|f| f.value(0)), Some(0));
        assert!(reports.iter().all(|r| r.writes == 2));
    }
}
