//! Built-in procedural animations.
//!
//! Every animation is a closed-form function of wall-clock time, the
//! effect's speed and intensity, and the fixture's position in the effect's
//! fixture list. Nothing is remembered between ticks. The few animations that
//! flicker randomly draw from the caller's generator so runs can be replayed.

use std::f64::consts::{PI, TAU};

use rand::Rng;

use crate::dmx_types::{Color, Fixture, FixtureType, clamp_dmx, percent_to_dmx, scale_by_percent};
use crate::effect::{BuiltInKind, Effect};
use crate::frame::ChannelFrame;

const CHASE_CYCLE_MS: f64 = 2000.0;
const STROBE_PERIOD_MS: f64 = 200.0;
const RAINBOW_CYCLE_MS: f64 = 5000.0;
const FADE_CYCLE_MS: f64 = 3000.0;
const SWEEP_CYCLE_MS: f64 = 4000.0;
const WIPE_CYCLE_MS: f64 = 3000.0;
const BOUNCE_CYCLE_MS: f64 = 2000.0;
const THEATER_PERIOD_MS: f64 = 1000.0;
const WAVE_CYCLE_MS: f64 = 3000.0;
const PULSE_CYCLE_MS: f64 = 2000.0;
const COLOR_FADE_CYCLE_MS: f64 = 5000.0;

/// Hue distance between neighbouring fixtures in the rainbow.
const RAINBOW_HUE_SPREAD: f64 = 30.0;
/// Sparkle probability per fixture and tick at full speed.
const SPARKLE_CHANCE: f64 = 0.02;

/// Inputs of one evaluation.
#[derive(Clone, Copy, Debug)]
pub struct Sample {
    /// Wall-clock milliseconds
    pub t: f64,
    /// Speed factor, `0.0..=1.0`
    pub speed: f64,
    /// Intensity percent, `0.0..=100.0`
    pub intensity: f64,
    /// Position of the fixture in the effect's fixture list
    pub position: usize,
    /// Length of the effect's fixture list
    pub count: usize,
}

/// What an animation wants written to one fixture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Output {
    /// Channel 0
    Dimmer(u8),
    /// Channels 0-2 of color fixtures
    Rgb(Color),
    /// `Pan` and `Intensity` channels of moving heads
    Sweep { pan: u8, intensity: u8 },
}

/// Phase within the current cycle, `0.0..1.0`. Speed 0 holds phase 0.
fn cycle_progress(t: f64, base_ms: f64, speed: f64) -> f64 {
    if speed <= 0.0 {
        return 0.0;
    }
    let cycle = base_ms / speed;
    t.rem_euclid(cycle) / cycle
}

/// Number of whole periods elapsed. Speed 0 holds at 0.
fn periods(t: f64, base_ms: f64, speed: f64) -> f64 {
    if speed <= 0.0 {
        return 0.0;
    }
    t / (base_ms / speed)
}

fn lit(on: bool, intensity: f64) -> Output {
    Output::Dimmer(if on { percent_to_dmx(intensity) } else { 0 })
}

/// `floor(sin(progress * 2pi) * 127 + 128)`
fn sine_byte(progress: f64) -> f64 {
    ((progress * TAU).sin() * 127.0 + 128.0).floor()
}

impl BuiltInKind {
    /// Whether this animation writes anything to a fixture of the given type.
    pub fn applies_to(&self, fixture_type: FixtureType) -> bool {
        match self {
            BuiltInKind::Rainbow | BuiltInKind::Fire | BuiltInKind::ColorFade => {
                fixture_type.is_color()
            }
            BuiltInKind::Sweep => fixture_type.is_moving_head(),
            _ => true,
        }
    }
}

/// Evaluate one animation for one fixture.
pub fn evaluate<R: Rng>(kind: BuiltInKind, s: &Sample, rng: &mut R) -> Output {
    match kind {
        BuiltInKind::Chase => {
            let count = s.count.max(1) as f64;
            let active = periods(s.t, CHASE_CYCLE_MS, s.speed).rem_euclid(count).floor();
            lit(s.position as f64 == active, s.intensity)
        }
        BuiltInKind::Strobe => {
            let on = periods(s.t, STROBE_PERIOD_MS, s.speed).rem_euclid(2.0).floor() == 0.0;
            lit(on, s.intensity)
        }
        BuiltInKind::Rainbow => {
            let progress = cycle_progress(s.t, RAINBOW_CYCLE_MS, s.speed);
            let hue = (progress * 360.0 + s.position as f64 * RAINBOW_HUE_SPREAD) % 360.0;
            Output::Rgb(Color::from_hue(hue).scaled(s.intensity))
        }
        BuiltInKind::Fade => {
            let progress = cycle_progress(s.t, FADE_CYCLE_MS, s.speed);
            Output::Dimmer(scale_by_percent(sine_byte(progress), s.intensity))
        }
        BuiltInKind::Sweep => {
            let progress = cycle_progress(s.t, SWEEP_CYCLE_MS, s.speed);
            Output::Sweep {
                pan: clamp_dmx(sine_byte(progress)),
                intensity: percent_to_dmx(s.intensity),
            }
        }
        BuiltInKind::Sparkle => lit(rng.random::<f64>() < s.speed * SPARKLE_CHANCE, s.intensity),
        BuiltInKind::Wipe => {
            let progress = cycle_progress(s.t, WIPE_CYCLE_MS, s.speed);
            let active_count = (progress * s.count as f64).floor();
            lit(s.position as f64 <= active_count, s.intensity)
        }
        BuiltInKind::Bounce => {
            let progress = cycle_progress(s.t, BOUNCE_CYCLE_MS, s.speed);
            let bounce = (progress * PI).sin().abs();
            let active = (bounce * s.count.saturating_sub(1) as f64).floor();
            lit(s.position as f64 == active, s.intensity)
        }
        BuiltInKind::TheaterChase => {
            let step = periods(s.t, THEATER_PERIOD_MS, s.speed).rem_euclid(3.0).floor();
            lit((s.position % 3) as f64 == step, s.intensity)
        }
        BuiltInKind::Fire => {
            let flicker = 0.7 + rng.random::<f64>() * 0.3;
            let red = clamp_dmx(255.0 * flicker * s.intensity / 100.0);
            let green = clamp_dmx((100.0 + rng.random::<f64>() * 50.0) * flicker * s.intensity / 100.0);
            Output::Rgb(Color::from_rgb(red, green, 0))
        }
        BuiltInKind::Wave => {
            let progress = cycle_progress(s.t, WAVE_CYCLE_MS, s.speed);
            let offset = s.position as f64 / s.count.max(1) as f64 * TAU;
            let level = ((progress * TAU + offset).sin() + 1.0) / 2.0;
            Output::Dimmer(clamp_dmx(level * s.intensity * 255.0 / 100.0))
        }
        BuiltInKind::Pulse => {
            let progress = cycle_progress(s.t, PULSE_CYCLE_MS, s.speed);
            let level = (progress * PI).sin().powi(2);
            Output::Dimmer(clamp_dmx(level * s.intensity * 255.0 / 100.0))
        }
        BuiltInKind::ColorFade => {
            let progress = cycle_progress(s.t, COLOR_FADE_CYCLE_MS, s.speed);
            Output::Rgb(color_ramp(progress).scaled(s.intensity))
        }
    }
}

/// Linear R -> G -> B -> R ramp over `0.0..1.0`.
fn color_ramp(progress: f64) -> Color {
    let segment = (progress * 3.0).floor().clamp(0.0, 2.0);
    let s = progress * 3.0 - segment;
    let rising = clamp_dmx(255.0 * s);
    let falling = clamp_dmx(255.0 * (1.0 - s));
    match segment as u8 {
        0 => Color::from_rgb(falling, rising, 0),
        1 => Color::from_rgb(0, falling, rising),
        _ => Color::from_rgb(rising, 0, falling),
    }
}

fn apply(frame: &mut ChannelFrame<'_>, fixture: &Fixture, output: Output) {
    match output {
        Output::Dimmer(value) => frame.set(fixture, 0, value),
        Output::Rgb(color) => frame.set_rgb(fixture, color),
        Output::Sweep { pan, intensity } => {
            frame.set_named(fixture, "Pan", pan);
            frame.set_named(fixture, "Intensity", intensity);
        }
    }
}

/// Evaluate a built-in effect for all of its fixtures and record the writes.
/// Returns the number of fixtures written.
pub fn render<R: Rng>(
    kind: BuiltInKind,
    effect: &Effect,
    now_ms: f64,
    frame: &mut ChannelFrame<'_>,
    rng: &mut R,
) -> usize {
    let count = effect.fixture_ids.len();
    let mut written = 0;
    for target in frame.targets(&effect.fixture_ids) {
        if !kind.applies_to(target.fixture.fixture_type) {
            continue;
        }
        let sample = Sample {
            t: now_ms,
            speed: effect.speed(),
            intensity: effect.intensity(),
            position: target.position,
            count,
        };
        apply(frame, target.fixture, evaluate(kind, &sample, rng));
        written += 1;
    }
    written
}
