//! Block program instructions.
//!
//! A block is one user-authored instruction of a block-program effect. The
//! kinds form a closed set. Reading a block never fails on its parameters:
//! missing, null or wrongly typed fields take their documented default (0 for
//! colors, intensity and durations, 128 for pan/tilt, 1 for loop counts) and
//! out-of-range numbers are clamped, so nothing downstream has to guess. Only
//! an unknown `type` is rejected.

use std::fmt;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use strum::VariantNames;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BlockError {
    #[error("Block {id} has order {order} but sits at position {position}")]
    OrderMismatch { id: u32, order: usize, position: usize },
}

/// One instruction of a block program.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: u32,
    /// Position in the sequence; must equal the array index.
    pub order: usize,
    #[serde(flatten)]
    pub kind: BlockKind,
}

impl Block {
    pub fn new(id: u32, order: usize, kind: BlockKind) -> Self {
        Self { id, order, kind }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, strum::IntoStaticStr, strum::VariantNames)]
#[serde(tag = "type", content = "params", rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum BlockKind {
    SetColor(SetColor),
    SetIntensity(SetIntensity),
    Fade(Fade),
    Wait(Wait),
    ChaseStep(ChaseStep),
    StrobePulse(StrobePulse),
    RainbowShift(RainbowShift),
    RandomColor,
    PanTilt(PanTilt),
    LoopStart(LoopStart),
    LoopEnd,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetColor {
    #[serde(deserialize_with = "lenient::color")]
    pub red: u8,
    #[serde(deserialize_with = "lenient::color")]
    pub green: u8,
    #[serde(deserialize_with = "lenient::color")]
    pub blue: u8,
    #[serde(deserialize_with = "lenient::color")]
    pub white: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetIntensity {
    /// Percent, 0-100
    #[serde(deserialize_with = "lenient::percent")]
    pub intensity: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fade {
    /// Milliseconds
    #[serde(deserialize_with = "lenient::millis")]
    pub duration: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Wait {
    /// Milliseconds
    #[serde(deserialize_with = "lenient::millis")]
    pub wait_time: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChaseStep {
    /// Position in the effect's fixture list that lights up
    #[serde(deserialize_with = "lenient::index")]
    pub fixture_index: usize,
    #[serde(deserialize_with = "lenient::millis")]
    pub duration: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrobePulse {
    #[serde(deserialize_with = "lenient::millis")]
    pub duration: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RainbowShift {
    #[serde(deserialize_with = "lenient::number")]
    pub hue_shift: f64,
    #[serde(deserialize_with = "lenient::millis")]
    pub duration: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanTilt {
    #[serde(deserialize_with = "lenient::position")]
    pub pan: u8,
    #[serde(deserialize_with = "lenient::position")]
    pub tilt: u8,
}

impl Default for PanTilt {
    fn default() -> Self {
        Self { pan: 128, tilt: 128 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoopStart {
    #[serde(deserialize_with = "lenient::count")]
    pub loop_count: u32,
}

impl Default for LoopStart {
    fn default() -> Self {
        Self { loop_count: 1 }
    }
}

impl LoopStart {
    /// Number of times the body runs. A count of 0 still runs the body once.
    pub fn iterations(&self) -> u32 {
        self.loop_count.max(1)
    }
}

/// Field readers for parameter records. Null or non-numeric values give the
/// field's default, numbers are clamped into the field's range.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn read<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(Value::deserialize(d)?.as_f64())
    }

    pub fn color<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
        Ok(read(d)?.map_or(0, |v| v.clamp(0.0, 255.0) as u8))
    }

    pub fn position<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
        Ok(read(d)?.map_or(128, |v| v.clamp(0.0, 255.0) as u8))
    }

    pub fn percent<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(read(d)?.map_or(0.0, |v| v.clamp(0.0, 100.0)))
    }

    pub fn millis<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(read(d)?.map_or(0.0, |v| v.max(0.0)))
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(read(d)?.unwrap_or(0.0))
    }

    pub fn index<'de, D: Deserializer<'de>>(d: D) -> Result<usize, D::Error> {
        Ok(read(d)?.map_or(0, |v| v.max(0.0) as usize))
    }

    pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        Ok(read(d)?.map_or(1, |v| v.clamp(0.0, f64::from(u32::MAX)) as u32))
    }
}

/// Parameter record from a `params` value; anything but an object reads as `{}`.
fn params<T: DeserializeOwned + Default>(params: &Map<String, Value>) -> T {
    T::deserialize(Value::Object(params.clone())).unwrap_or_default()
}

impl<'de> Deserialize<'de> for BlockKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Tagged {
            #[serde(rename = "type")]
            kind: String,
            #[serde(default)]
            params: Value,
        }

        let Tagged { kind, params: raw } = Tagged::deserialize(deserializer)?;
        let map = match raw {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Ok(match kind.as_str() {
            "set-color" => BlockKind::SetColor(params(&map)),
            "set-intensity" => BlockKind::SetIntensity(params(&map)),
            "fade" => BlockKind::Fade(params(&map)),
            "wait" => BlockKind::Wait(params(&map)),
            "chase-step" => BlockKind::ChaseStep(params(&map)),
            "strobe-pulse" => BlockKind::StrobePulse(params(&map)),
            "rainbow-shift" => BlockKind::RainbowShift(params(&map)),
            "random-color" => BlockKind::RandomColor,
            "pan-tilt" => BlockKind::PanTilt(params(&map)),
            "loop-start" => BlockKind::LoopStart(params(&map)),
            "loop-end" => BlockKind::LoopEnd,
            other => return Err(D::Error::unknown_variant(other, BlockKind::VARIANTS)),
        })
    }
}

impl BlockKind {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Declared duration in milliseconds, used for duration estimates only.
    pub fn nominal_duration_ms(&self) -> f64 {
        match self {
            BlockKind::Fade(p) => p.duration,
            BlockKind::Wait(p) => p.wait_time,
            BlockKind::ChaseStep(p) => p.duration,
            BlockKind::StrobePulse(p) => p.duration,
            BlockKind::RainbowShift(p) => p.duration,
            BlockKind::SetColor(_)
            | BlockKind::SetIntensity(_)
            | BlockKind::RandomColor
            | BlockKind::PanTilt(_)
            | BlockKind::LoopStart(_)
            | BlockKind::LoopEnd => 0.0,
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        match self {
            BlockKind::SetColor(p) if p.white > 0 => write!(
                f,
                "{name}(r={},g={},b={},w={})",
                p.red, p.green, p.blue, p.white
            ),
            BlockKind::SetColor(p) => {
                write!(f, "{name}(r={},g={},b={})", p.red, p.green, p.blue)
            }
            BlockKind::SetIntensity(p) => write!(f, "{name}({}%)", p.intensity),
            BlockKind::Fade(p) => write!(f, "{name}({}ms)", p.duration),
            BlockKind::Wait(p) => write!(f, "{name}({}ms)", p.wait_time),
            BlockKind::ChaseStep(p) => {
                write!(f, "{name}(fixture={},{}ms)", p.fixture_index, p.duration)
            }
            BlockKind::StrobePulse(p) => write!(f, "{name}({}ms)", p.duration),
            BlockKind::RainbowShift(p) => {
                write!(f, "{name}(hue={},{}ms)", p.hue_shift, p.duration)
            }
            BlockKind::PanTilt(p) => write!(f, "{name}(pan={},tilt={})", p.pan, p.tilt),
            BlockKind::LoopStart(p) => write!(f, "{name}(count={})", p.loop_count),
            BlockKind::RandomColor | BlockKind::LoopEnd => f.write_str(name),
        }
    }
}

/// Check that every block's `order` equals its position.
pub fn validate_order(blocks: &[Block]) -> Result<(), BlockError> {
    match blocks
        .iter()
        .enumerate()
        .find(|(position, b)| b.order != *position)
    {
        Some((position, b)) => Err(BlockError::OrderMismatch {
            id: b.id,
            order: b.order,
            position,
        }),
        None => Ok(()),
    }
}

/// Rewrite `order` from array position, e.g. after an insert or a move.
pub fn renumber(blocks: &mut [Block]) {
    blocks
        .iter_mut()
        .enumerate()
        .for_each(|(position, b)| b.order = position);
}
