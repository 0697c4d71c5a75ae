//! Block program interpreter.
//!
//! Each block-program effect owns a [`RuntimeState`]: a program counter and a
//! stack of open loops. One [`RuntimeState::step`] executes exactly one
//! instruction. Reaching the end of the program restarts it from the top with
//! an empty loop stack, whatever nesting was still open.

use rand::Rng;

use crate::blocks::BlockKind;
use crate::compiler::CompiledProgram;
use crate::dmx_types::{Color, percent_to_dmx};
use crate::effect::Effect;
use crate::frame::ChannelFrame;

/// Bookkeeping for one open loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopFrame {
    /// Index of the `loop-start` that opened the loop. A repeating `loop-end`
    /// jumps to `start_index + 1`, the first body instruction.
    pub start_index: usize,
    /// Repeats left after the pass currently running
    pub remaining_loops: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuntimeState {
    pub program_counter: usize,
    pub loop_stack: Vec<LoopFrame>,
}

/// Everything an instruction may write to during a tick.
pub struct StepContext<'e, 'f, 'a, R> {
    pub effect: &'e Effect,
    pub now_ms: f64,
    pub frame: &'f mut ChannelFrame<'a>,
    pub rng: &'f mut R,
}

impl RuntimeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restart(&mut self) {
        self.program_counter = 0;
        self.loop_stack.clear();
    }

    /// Execute the instruction at the program counter and advance.
    /// Returns the index of the executed instruction, `None` for an empty program.
    pub fn step<R: Rng>(
        &mut self,
        program: &CompiledProgram,
        ctx: &mut StepContext<'_, '_, '_, R>,
    ) -> Option<usize> {
        if program.is_empty() {
            return None;
        }
        // The program may have shrunk since the last tick
        if self.program_counter >= program.len() {
            self.restart();
        }

        let index = self.program_counter;
        let instruction = program.instruction(index)?;
        if !self.execute(&instruction.kind, ctx) {
            self.program_counter += 1;
        }
        if self.program_counter >= program.len() {
            self.restart();
        }
        Some(index)
    }

    /// Returns true when the instruction set the program counter itself.
    fn execute<R: Rng>(&mut self, kind: &BlockKind, ctx: &mut StepContext<'_, '_, '_, R>) -> bool {
        let targets = ctx.frame.targets(&ctx.effect.fixture_ids);

        match kind {
            BlockKind::SetColor(p) => {
                let color = Color::from_rgbw(p.red, p.green, p.blue, p.white);
                for target in &targets {
                    ctx.frame.set_rgbw(target.fixture, color);
                }
            }
            BlockKind::SetIntensity(p) => {
                let value = percent_to_dmx(p.intensity);
                for target in &targets {
                    ctx.frame.set(target.fixture, 0, value);
                }
            }
            BlockKind::ChaseStep(p) => {
                for target in &targets {
                    let value = if target.position == p.fixture_index { 255 } else { 0 };
                    ctx.frame.set(target.fixture, 0, value);
                }
            }
            BlockKind::StrobePulse(_) => {
                let value = if ctx.rng.random_bool(0.5) { 255 } else { 0 };
                for target in &targets {
                    ctx.frame.set(target.fixture, 0, value);
                }
            }
            BlockKind::RainbowShift(_) => {
                let color = Color::from_hue((ctx.now_ms / 10.0) % 360.0);
                for target in &targets {
                    ctx.frame.set_rgb(target.fixture, color);
                }
            }
            BlockKind::RandomColor => {
                let color = Color::from_rgb(ctx.rng.random(), ctx.rng.random(), ctx.rng.random());
                for target in &targets {
                    ctx.frame.set_rgb(target.fixture, color);
                }
            }
            BlockKind::PanTilt(p) => {
                for target in targets.iter().filter(|t| t.fixture.fixture_type.is_moving_head()) {
                    ctx.frame.set_named(target.fixture, "Pan", p.pan);
                    ctx.frame.set_named(target.fixture, "Tilt", p.tilt);
                }
            }
            BlockKind::LoopStart(p) => {
                self.loop_stack.push(LoopFrame {
                    start_index: self.program_counter,
                    remaining_loops: p.iterations() - 1,
                });
            }
            BlockKind::LoopEnd => {
                if let Some(frame) = self.loop_stack.last_mut() {
                    if frame.remaining_loops > 0 {
                        frame.remaining_loops -= 1;
                        self.program_counter = frame.start_index + 1;
                        return true;
                    }
                    self.loop_stack.pop();
                }
            }
            // One tick of deliberate pause
            BlockKind::Wait(_) | BlockKind::Fade(_) => {}
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{Block, ChaseStep, LoopStart, PanTilt, SetColor, SetIntensity, Wait};
    use crate::compiler::compile;
    use crate::dmx_types::{Fixture, FixtureTemplateLibrary};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn fixtures() -> Vec<Fixture> {
        let lib = FixtureTemplateLibrary::new();
        vec![
            Fixture::from_template(1, "Dimmer", lib.get_template("Generic Dimmer").unwrap(), 1),
            Fixture::from_template(2, "RGB", lib.get_template("Generic RGB Par").unwrap(), 2),
            Fixture::from_template(3, "RGBW", lib.get_template("Generic RGBW Par").unwrap(), 5),
            Fixture::from_template(4, "Head", lib.get_template("Generic Moving Head").unwrap(), 9),
        ]
    }

    fn program(kinds: Vec<BlockKind>) -> CompiledProgram {
        let blocks: Vec<Block> = kinds
            .into_iter()
            .enumerate()
            .map(|(order, kind)| Block::new(order as u32, order, kind))
            .collect();
        compile(&blocks)
    }

    fn effect() -> Effect {
        Effect::block_program(1, "prog", vec![1, 2, 3, 4], Vec::new())
    }

    /// Run `ticks` steps, returning the executed indices and the last tick's writes.
    fn run(
        state: &mut RuntimeState,
        program: &CompiledProgram,
        ticks: usize,
    ) -> (Vec<usize>, crate::frame::ChannelWrites) {
        let fixtures = fixtures();
        let effect = effect();
        let mut rng = StdRng::seed_from_u64(3);
        let mut executed = Vec::new();
        let mut last = Default::default();
        for tick in 0..ticks {
            let mut frame = ChannelFrame::new(&fixtures);
            let mut ctx = StepContext {
                effect: &effect,
                now_ms: tick as f64 * 100.0,
                frame: &mut frame,
                rng: &mut rng,
            };
            executed.extend(state.step(program, &mut ctx));
            last = frame.finish();
        }
        (executed, last)
    }

    fn looped(count: u32) -> BlockKind {
        BlockKind::LoopStart(LoopStart { loop_count: count })
    }

    #[test]
    fn loop_body_runs_count_times() {
        let prog = program(vec![
            looped(3),
            BlockKind::SetIntensity(SetIntensity { intensity: 1.0 }),
            BlockKind::LoopEnd,
        ]);
        let mut state = RuntimeState::new();
        let (executed, _) = run(&mut state, &prog, 7);
        assert_eq!(executed, vec![0, 1, 2, 1, 2, 1, 2]);
        assert_eq!(state, RuntimeState::new());
    }

    #[test]
    fn nested_loops_multiply() {
        let prog = program(vec![
            looped(2),
            looped(3),
            BlockKind::Wait(Wait { wait_time: 1.0 }),
            BlockKind::LoopEnd,
            BlockKind::LoopEnd,
        ]);
        let mut state = RuntimeState::new();
        let (executed, _) = run(&mut state, &prog, 17);
        assert_eq!(
            executed,
            vec![0, 1, 2, 3, 2, 3, 2, 3, 4, 1, 2, 3, 2, 3, 2, 3, 4]
        );
        assert_eq!(executed.iter().filter(|i| **i == 2).count(), 6);
        assert_eq!(state, RuntimeState::new());
    }

    #[test]
    fn end_of_program_discards_open_loops() {
        let prog = program(vec![looped(5), BlockKind::Wait(Wait { wait_time: 1.0 })]);
        let mut state = RuntimeState::new();
        run(&mut state, &prog, 1);
        assert_eq!(
            state.loop_stack,
            vec![LoopFrame {
                start_index: 0,
                remaining_loops: 4
            }]
        );
        run(&mut state, &prog, 1);
        assert_eq!(state, RuntimeState::new());
    }

    #[test]
    fn stray_loop_end_just_advances() {
        let prog = program(vec![BlockKind::LoopEnd, BlockKind::RandomColor]);
        let mut state = RuntimeState::new();
        let (executed, _) = run(&mut state, &prog, 3);
        assert_eq!(executed, vec![0, 1, 0]);
    }

    #[test]
    fn set_color_skips_non_color_fixtures() {
        let prog = program(vec![BlockKind::SetColor(SetColor {
            red: 1,
            green: 2,
            blue: 3,
            white: 4,
        })]);
        let (_, writes) = run(&mut RuntimeState::new(), &prog, 1);
        assert_eq!(writes.get(1, 0), None);
        assert_eq!(writes.get(2, 0), Some(1));
        assert_eq!(writes.get(2, 3), None);
        assert_eq!(writes.get(3, 3), Some(4));
        assert_eq!(writes.get(4, 0), None);
    }

    #[test]
    fn chase_step_lights_one_position() {
        let prog = program(vec![BlockKind::ChaseStep(ChaseStep {
            fixture_index: 1,
            duration: 0.0,
        })]);
        let (_, writes) = run(&mut RuntimeState::new(), &prog, 1);
        assert_eq!(writes.get(1, 0), Some(0));
        assert_eq!(writes.get(2, 0), Some(255));
        assert_eq!(writes.get(3, 0), Some(0));
        assert_eq!(writes.get(4, 0), Some(0));
    }

    #[test]
    fn pan_tilt_only_moves_heads() {
        let prog = program(vec![BlockKind::PanTilt(PanTilt { pan: 10, tilt: 200 })]);
        let (_, writes) = run(&mut RuntimeState::new(), &prog, 1);
        assert_eq!(writes.get(4, 0), Some(10));
        assert_eq!(writes.get(4, 2), Some(200));
        assert_eq!(writes.len(), 2);
    }

    #[test]
    fn rainbow_shift_uses_wall_clock() {
        let fixtures = fixtures();
        let effect = effect();
        let prog = program(vec![BlockKind::RainbowShift(Default::default())]);
        let mut frame = ChannelFrame::new(&fixtures);
        let mut rng = StdRng::seed_from_u64(0);
        let mut ctx = StepContext {
            effect: &effect,
            // 1200 / 10 mod 360 = 120 -> green
            now_ms: 1200.0,
            frame: &mut frame,
            rng: &mut rng,
        };
        RuntimeState::new().step(&prog, &mut ctx);
        let writes = frame.finish();
        assert_eq!(writes.get(2, 0), Some(0));
        assert_eq!(writes.get(2, 1), Some(255));
        assert_eq!(writes.get(3, 2), Some(0));
    }

    #[test]
    fn strobe_pulse_is_reproducible_with_a_seed() {
        let prog = program(vec![BlockKind::StrobePulse(Default::default())]);
        let a = run(&mut RuntimeState::new(), &prog, 5);
        let b = run(&mut RuntimeState::new(), &prog, 5);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_program_does_nothing() {
        let mut state = RuntimeState::new();
        let (executed, writes) = run(&mut state, &program(vec![]), 3);
        assert!(executed.is_empty());
        assert!(writes.is_empty());
    }
}
