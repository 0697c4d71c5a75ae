//! DMX Types and Data Structures
//!
//! This module defines the fixture-side types the effect engine writes into:
//!
//! ## Fixture Management
//! - [`FixtureType`] - Capability class of a fixture (RGB, moving head, ...)
//! - [`Channel`] - One byte-valued control on a fixture
//! - [`Fixture`] - A patched fixture with its ordered channel list
//! - [`FixtureTemplate`] - Channel layout used to build fixtures
//! - [`FixtureTemplateLibrary`] - Collection of the predefined templates
//!
//! ## Channel Types
//! - [`ChannelType`] - Function of a template channel, gives the channel its name
//! - [`Color`] - RGBW color values, with HSL conversion for hue based effects
//!
//! ## Output
//! - [`ChannelSink`] - Owner of fixture state receiving committed writes
//! - [`FixtureStore`] - The in-memory sink used by the engine
//! - [`DMXBufferValue`] - Single addressed channel value for universe mixing

pub use open_dmx::DMX_CHANNELS;
use serde::{Deserialize, Serialize};

use crate::frame::ChannelWrites;

/// Color values for RGB-type fixtures.
/// Each field holds a DMX value (0-255) for that color component.
#[derive(Clone, Copy, Default, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Color {
    /// Red channel value (0-255)
    pub r: u8,
    /// Green channel value (0-255)
    pub g: u8,
    /// Blue channel value (0-255)
    pub b: u8,
    /// White channel value (0-255) - only written to RGBW fixtures
    pub w: u8,
}

impl Color {
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, w: 0 }
    }

    pub fn from_rgbw(r: u8, g: u8, b: u8, w: u8) -> Self {
        Self { r, g, b, w }
    }

    /// Standard piecewise HSL to RGB conversion.
    ///
    /// `hue` is in degrees and wraps, `saturation` and `lightness` are in `0.0..=1.0`.
    pub fn from_hsl(hue: f64, saturation: f64, lightness: f64) -> Self {
        let hue = hue.rem_euclid(360.0);
        let saturation = saturation.clamp(0.0, 1.0);
        let lightness = lightness.clamp(0.0, 1.0);

        let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
        let x = chroma * (1.0 - ((hue / 60.0) % 2.0 - 1.0).abs());
        let m = lightness - chroma / 2.0;

        let (r, g, b) = match hue {
            h if h < 60.0 => (chroma, x, 0.0),
            h if h < 120.0 => (x, chroma, 0.0),
            h if h < 180.0 => (0.0, chroma, x),
            h if h < 240.0 => (0.0, x, chroma),
            h if h < 300.0 => (x, 0.0, chroma),
            _ => (chroma, 0.0, x),
        };

        Self::from_rgb(
            unit_to_dmx(r + m),
            unit_to_dmx(g + m),
            unit_to_dmx(b + m),
        )
    }

    /// Fully saturated color at the given hue (HSL with s=1, l=0.5).
    pub fn from_hue(hue: f64) -> Self {
        Self::from_hsl(hue, 1.0, 0.5)
    }

    /// Scale the RGB components by a percentage, flooring each component.
    pub fn scaled(self, percent: f64) -> Self {
        Self {
            r: scale_by_percent(f64::from(self.r), percent),
            g: scale_by_percent(f64::from(self.g), percent),
            b: scale_by_percent(f64::from(self.b), percent),
            w: self.w,
        }
    }
}

fn unit_to_dmx(v: f64) -> u8 {
    clamp_dmx((v * 255.0).round())
}

/// Clamp a computed value into a DMX byte, flooring fractions.
pub fn clamp_dmx(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.floor().clamp(0.0, 255.0) as u8
}

/// `floor(percent * 2.55)` computed without the 2.55 rounding error,
/// so 100% maps to exactly 255.
pub fn percent_to_dmx(percent: f64) -> u8 {
    clamp_dmx(percent * 255.0 / 100.0)
}

/// `floor(value * percent / 100)`.
pub fn scale_by_percent(value: f64, percent: f64) -> u8 {
    clamp_dmx(value * percent / 100.0)
}

/// Capability class of a fixture.
/// Effects decide which fixtures they touch from this, never from channel names alone.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Debug,
    Default,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum FixtureType {
    /// Single dimmer or unknown device
    #[default]
    Generic,
    /// Red, green, blue on channels 0-2
    Rgb,
    /// Red, green, blue, white on channels 0-3
    Rgbw,
    /// Pan/tilt head, channels addressed by name
    MovingHead,
    StepperMotor,
    Servo,
}

impl FixtureType {
    /// RGB or RGBW: the fixture accepts color writes on channels 0-2.
    pub fn is_color(&self) -> bool {
        matches!(self, FixtureType::Rgb | FixtureType::Rgbw)
    }

    pub fn has_white(&self) -> bool {
        *self == FixtureType::Rgbw
    }

    pub fn is_moving_head(&self) -> bool {
        *self == FixtureType::MovingHead
    }
}

/// Channel type definitions for fixture templates.
/// Each variant corresponds to a specific function of a lighting fixture
/// and provides the channel name effects use for name-pattern addressing.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub enum ChannelType {
    /// Intensity/Dimmer - controls overall brightness (0 = off, 255 = full)
    Intensity,
    Red,
    Green,
    Blue,
    White,
    /// Pan - horizontal movement for moving heads (coarse 8-bit)
    Pan,
    /// Pan Fine - fine horizontal adjustment (16-bit, used with Pan)
    PanFine,
    /// Tilt - vertical movement for moving heads (coarse 8-bit)
    Tilt,
    /// Tilt Fine - fine vertical adjustment (16-bit, used with Tilt)
    TiltFine,
    /// Speed - controls movement speed for moving heads
    Speed,
    /// Shutter - blocks light output for strobe effects
    Shutter,
    ColorWheel,
    GoboWheel,
}

impl ChannelType {
    pub fn name(&self) -> &'static str {
        match self {
            ChannelType::Intensity => "Intensity",
            ChannelType::Red => "Red",
            ChannelType::Green => "Green",
            ChannelType::Blue => "Blue",
            ChannelType::White => "White",
            ChannelType::Pan => "Pan",
            ChannelType::PanFine => "Pan Fine",
            ChannelType::Tilt => "Tilt",
            ChannelType::TiltFine => "Tilt Fine",
            ChannelType::Speed => "Speed",
            ChannelType::Shutter => "Shutter",
            ChannelType::ColorWheel => "Color Wheel",
            ChannelType::GoboWheel => "Gobo Wheel",
        }
    }
}

/// A single byte-valued control on a fixture.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: u32,
    /// DMX address (1-based, 1-512)
    pub number: usize,
    /// Human-readable name, used for `Pan`/`Tilt`/`Intensity` addressing
    pub name: String,
    /// Current value (0-255)
    #[serde(default)]
    pub value: u8,
}

/// A patched fixture.
/// The position of a channel in `channels` is its index for positional
/// addressing (0 = dimmer, 0-3 = R/G/B/W on color fixtures).
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    /// Unique identifier for this fixture instance
    pub id: u32,
    /// User-assigned name for this fixture
    #[serde(default)]
    pub name: String,
    pub fixture_type: FixtureType,
    pub channels: Vec<Channel>,
}

impl Fixture {
    pub fn new(id: u32, name: impl Into<String>, fixture_type: FixtureType) -> Self {
        Self {
            id,
            name: name.into(),
            fixture_type,
            channels: Vec::new(),
        }
    }

    /// Build a fixture from a template, numbering its channels from `start_channel`.
    /// Channel ids are derived from the fixture id so they stay unique in a rig.
    pub fn from_template(
        id: u32,
        name: impl Into<String>,
        template: &FixtureTemplate,
        start_channel: usize,
    ) -> Self {
        let channels = template
            .channels
            .iter()
            .enumerate()
            .map(|(offset, channel_type)| Channel {
                id: id.wrapping_mul(1000).wrapping_add(offset as u32),
                number: start_channel + offset,
                name: channel_type.name().to_string(),
                value: 0,
            })
            .collect();
        Self {
            id,
            name: name.into(),
            fixture_type: template.fixture_type,
            channels,
        }
    }

    pub fn value(&self, index: usize) -> Option<u8> {
        self.channels.get(index).map(|c| c.value)
    }

    /// Resolve a channel by name: exact (case-insensitive) match first,
    /// then the first channel whose name contains `pattern`.
    pub fn channel_index_by_name(&self, pattern: &str) -> Option<usize> {
        let pattern = pattern.to_lowercase();
        self.channels
            .iter()
            .position(|c| c.name.to_lowercase() == pattern)
            .or_else(|| {
                self.channels
                    .iter()
                    .position(|c| c.name.to_lowercase().contains(&pattern))
            })
    }

    pub fn named_value(&self, pattern: &str) -> Option<u8> {
        self.channel_index_by_name(pattern)
            .and_then(|idx| self.value(idx))
    }

    pub fn dmx_values(&self) -> Vec<DMXBufferValue> {
        self.channels
            .iter()
            .map(|c| DMXBufferValue::new(c.number, c.value))
            .collect()
    }
}

/// Channel layout used to build fixtures.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct FixtureTemplate {
    /// Display name (e.g., "Generic RGB Par")
    pub name: String,
    pub fixture_type: FixtureType,
    /// Channel functions in order
    pub channels: Vec<ChannelType>,
}

impl FixtureTemplate {
    pub fn new(name: &str, fixture_type: FixtureType, channels: Vec<ChannelType>) -> Self {
        Self {
            name: name.to_string(),
            fixture_type,
            channels,
        }
    }

    pub fn total_channels(&self) -> usize {
        self.channels.len()
    }
}

/// Library of the predefined fixture templates.
#[derive(Clone, Debug)]
pub struct FixtureTemplateLibrary {
    pub templates: Vec<FixtureTemplate>,
}

impl Default for FixtureTemplateLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureTemplateLibrary {
    pub fn new() -> Self {
        let mut library = Self {
            templates: Vec::new(),
        };
        library.load_predefined_templates();
        library
    }

    pub fn get_template(&self, name: &str) -> Option<&FixtureTemplate> {
        self.templates
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    fn load_predefined_templates(&mut self) {
        use ChannelType as Ch;

        self.templates.push(FixtureTemplate::new(
            "Generic Dimmer",
            FixtureType::Generic,
            vec![Ch::Intensity],
        ));
        // Color fixtures keep R/G/B(/W) on channels 0-3
        self.templates.push(FixtureTemplate::new(
            "Generic RGB Par",
            FixtureType::Rgb,
            vec![Ch::Red, Ch::Green, Ch::Blue],
        ));
        self.templates.push(FixtureTemplate::new(
            "Generic RGBW Par",
            FixtureType::Rgbw,
            vec![Ch::Red, Ch::Green, Ch::Blue, Ch::White],
        ));
        self.templates.push(FixtureTemplate::new(
            "Generic Moving Head",
            FixtureType::MovingHead,
            vec![
                Ch::Pan,
                Ch::PanFine,
                Ch::Tilt,
                Ch::TiltFine,
                Ch::Speed,
                Ch::ColorWheel,
                Ch::GoboWheel,
                Ch::Shutter,
                Ch::Intensity,
            ],
        ));
    }
}

/// Represents a single addressed DMX channel value.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct DMXBufferValue {
    /// DMX channel number (1-based, 1-512)
    pub chan: usize,
    /// DMX value (0-255)
    pub dmx: u8,
}

impl DMXBufferValue {
    pub fn new(chan: usize, val: u8) -> Self {
        Self { chan, dmx: val }
    }
}

/// Owner of fixture/channel state.
/// The scheduler reads fixture metadata from it and commits one batch of
/// writes per tick.
pub trait ChannelSink {
    fn fixtures(&self) -> &[Fixture];

    /// Apply a tick's writes. Writes addressing unknown fixtures or channels are dropped.
    fn commit(&mut self, writes: ChannelWrites);
}

/// In-memory fixture state.
#[derive(Clone, Default, Serialize, Deserialize, Debug)]
#[serde(transparent)]
pub struct FixtureStore {
    fixtures: Vec<Fixture>,
}

impl FixtureStore {
    pub fn new(fixtures: Vec<Fixture>) -> Self {
        Self { fixtures }
    }

    pub fn add(&mut self, fixture: Fixture) {
        self.fixtures.push(fixture);
    }

    pub fn get(&self, id: u32) -> Option<&Fixture> {
        self.fixtures.iter().find(|f| f.id == id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Fixture> {
        self.fixtures.iter_mut().find(|f| f.id == id)
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    /// External (manual) write, e.g. a console slider.
    /// Returns false if the fixture or channel does not exist.
    pub fn set_channel(&mut self, fixture_id: u32, index: usize, value: u8) -> bool {
        self.get_mut(fixture_id)
            .and_then(|f| f.channels.get_mut(index))
            .map(|c| c.value = value)
            .is_some()
    }

    pub fn blackout(&mut self) {
        self.fixtures
            .iter_mut()
            .flat_map(|f| f.channels.iter_mut())
            .for_each(|c| c.value = 0);
    }
}

impl ChannelSink for FixtureStore {
    fn fixtures(&self) -> &[Fixture] {
        &self.fixtures
    }

    fn commit(&mut self, writes: ChannelWrites) {
        for (key, value) in writes.iter() {
            self.set_channel(key.fixture_id, key.index, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsl_primaries() {
        assert_eq!(Color::from_hue(0.0), Color::from_rgb(255, 0, 0));
        assert_eq!(Color::from_hue(120.0), Color::from_rgb(0, 255, 0));
        assert_eq!(Color::from_hue(240.0), Color::from_rgb(0, 0, 255));
        assert_eq!(Color::from_hue(360.0), Color::from_rgb(255, 0, 0));
        assert_eq!(Color::from_hue(60.0), Color::from_rgb(255, 255, 0));
    }

    #[test]
    fn percent_scaling_hits_both_ends() {
        assert_eq!(percent_to_dmx(100.0), 255);
        assert_eq!(percent_to_dmx(0.0), 0);
        assert_eq!(percent_to_dmx(50.0), 127);
        assert_eq!(percent_to_dmx(1.0), 2);
        assert_eq!(percent_to_dmx(150.0), 255);
        assert_eq!(percent_to_dmx(-3.0), 0);
    }

    #[test]
    fn name_lookup_prefers_exact_match() {
        let lib = FixtureTemplateLibrary::new();
        let head = Fixture::from_template(
            7,
            "Head",
            lib.get_template("generic moving head").unwrap(),
            100,
        );
        assert_eq!(head.channel_index_by_name("Pan"), Some(0));
        assert_eq!(head.channel_index_by_name("tilt"), Some(2));
        assert_eq!(head.channel_index_by_name("Intensity"), Some(8));
        assert_eq!(head.channel_index_by_name("fine"), Some(1));
        assert_eq!(head.channel_index_by_name("Zoom"), None);
        assert_eq!(head.channels[8].number, 108);
    }

    #[test]
    fn manual_writes_ignore_unknown_targets() {
        let lib = FixtureTemplateLibrary::new();
        let mut store = FixtureStore::new(vec![Fixture::from_template(
            1,
            "Par",
            lib.get_template("Generic RGB Par").unwrap(),
            1,
        )]);
        assert!(store.set_channel(1, 2, 40));
        assert!(!store.set_channel(1, 3, 40));
        assert!(!store.set_channel(9, 0, 40));
        assert_eq!(store.get(1).unwrap().value(2), Some(40));
        store.blackout();
        assert_eq!(store.get(1).unwrap().value(2), Some(0));
    }

    #[test]
    fn fixture_type_names() {
        assert_eq!(FixtureType::MovingHead.to_string(), "moving-head");
        assert_eq!("RGBW".parse::<FixtureType>().unwrap(), FixtureType::Rgbw);
    }
}
