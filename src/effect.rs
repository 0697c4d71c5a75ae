use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::blocks::Block;

const BLOCK_PROGRAM: &str = "block-program";

/// Built-in procedural animations.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum BuiltInKind {
    Chase,
    Strobe,
    Rainbow,
    Fade,
    Sweep,
    Sparkle,
    Wipe,
    Bounce,
    TheaterChase,
    Fire,
    Wave,
    Pulse,
    ColorFade,
}

/// What drives an effect: a procedural formula or a compiled block program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EffectKind {
    BuiltIn(BuiltInKind),
    BlockProgram,
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectKind::BuiltIn(kind) => kind.fmt(f),
            EffectKind::BlockProgram => f.write_str(BLOCK_PROGRAM),
        }
    }
}

impl FromStr for EffectKind {
    type Err = strum::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case(BLOCK_PROGRAM) {
            return Ok(EffectKind::BlockProgram);
        }
        s.parse().map(EffectKind::BuiltIn)
    }
}

impl TryFrom<String> for EffectKind {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EffectKind> for String {
    fn from(kind: EffectKind) -> Self {
        kind.to_string()
    }
}

/// An effect as handed to the engine.
/// Records are created and edited outside the engine; the scheduler only reads them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Effect {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    pub kind: EffectKind,
    /// Ordered: the position of an id is the fixture's index for chases and waves
    pub fixture_ids: Vec<u32>,
    /// Percent, 0-100
    #[serde(default = "full_percent")]
    pub speed_percent: f64,
    /// Percent, 0-100
    #[serde(default = "full_percent")]
    pub intensity_percent: f64,
    #[serde(default)]
    pub is_active: bool,
    /// Program source, only read for block-program effects
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Block>,
}

fn full_percent() -> f64 {
    100.0
}

impl Effect {
    pub fn built_in(id: u32, name: impl Into<String>, kind: BuiltInKind, fixture_ids: Vec<u32>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: EffectKind::BuiltIn(kind),
            fixture_ids,
            speed_percent: full_percent(),
            intensity_percent: full_percent(),
            is_active: true,
            blocks: Vec::new(),
        }
    }

    pub fn block_program(
        id: u32,
        name: impl Into<String>,
        fixture_ids: Vec<u32>,
        blocks: Vec<Block>,
    ) -> Self {
        Self {
            kind: EffectKind::BlockProgram,
            blocks,
            ..Self::built_in(id, name, BuiltInKind::Chase, fixture_ids)
        }
    }

    #[must_use]
    pub fn with_speed(mut self, percent: f64) -> Self {
        self.set_speed(percent);
        self
    }

    #[must_use]
    pub fn with_intensity(mut self, percent: f64) -> Self {
        self.set_intensity(percent);
        self
    }

    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }

    pub fn set_speed(&mut self, percent: f64) {
        self.speed_percent = percent.clamp(0.0, 100.0);
    }

    pub fn set_intensity(&mut self, percent: f64) {
        self.intensity_percent = percent.clamp(0.0, 100.0);
    }

    /// Speed as a factor in `0.0..=1.0`.
    pub fn speed(&self) -> f64 {
        self.speed_percent.clamp(0.0, 100.0) / 100.0
    }

    /// Intensity percent clamped to `0.0..=100.0`.
    pub fn intensity(&self) -> f64 {
        self.intensity_percent.clamp(0.0, 100.0)
    }

    pub fn is_block_program(&self) -> bool {
        self.kind == EffectKind::BlockProgram
    }
}
