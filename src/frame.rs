//! Per-tick channel write snapshot.
//!
//! Effects never touch fixture state directly: during a tick they write into a
//! [`ChannelFrame`], which reads fixture metadata from the sink and records
//! writes keyed by fixture and channel position. A later write to the same
//! key replaces the earlier one, so effects later in dispatch order win.
//! The finished [`ChannelWrites`] are committed to the sink in one step.

use std::collections::BTreeMap;

use crate::dmx_types::{Color, Fixture};

/// Address of one channel: fixture id plus positional channel index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelKey {
    pub fixture_id: u32,
    pub index: usize,
}

/// Writes collected during one tick, ready to be committed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelWrites(BTreeMap<ChannelKey, u8>);

impl ChannelWrites {
    pub fn get(&self, fixture_id: u32, index: usize) -> Option<u8> {
        self.0.get(&ChannelKey { fixture_id, index }).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChannelKey, u8)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A fixture targeted by an effect together with its position in the
/// effect's fixture list. The position is the index space for chases and waves.
#[derive(Clone, Copy, Debug)]
pub struct Target<'a> {
    pub position: usize,
    pub fixture: &'a Fixture,
}

pub struct ChannelFrame<'a> {
    fixtures: &'a [Fixture],
    writes: ChannelWrites,
}

impl<'a> ChannelFrame<'a> {
    pub fn new(fixtures: &'a [Fixture]) -> Self {
        Self {
            fixtures,
            writes: ChannelWrites::default(),
        }
    }

    pub fn fixture(&self, id: u32) -> Option<&'a Fixture> {
        self.fixtures.iter().find(|f| f.id == id)
    }

    /// Resolve an effect's fixture id list.
    /// Ids with no matching fixture are skipped but still consume their position.
    pub fn targets(&self, fixture_ids: &[u32]) -> Vec<Target<'a>> {
        fixture_ids
            .iter()
            .enumerate()
            .filter_map(|(position, id)| {
                self.fixture(*id)
                    .map(|fixture| Target { position, fixture })
            })
            .collect()
    }

    /// Positional write. No-op if the fixture has no channel at `index`.
    pub fn set(&mut self, fixture: &Fixture, index: usize, value: u8) {
        if index < fixture.channels.len() {
            self.writes.0.insert(
                ChannelKey {
                    fixture_id: fixture.id,
                    index,
                },
                value,
            );
        }
    }

    /// Name-pattern write (`Pan`, `Tilt`, `Intensity`). No-op if no channel matches.
    pub fn set_named(&mut self, fixture: &Fixture, pattern: &str, value: u8) {
        if let Some(index) = fixture.channel_index_by_name(pattern) {
            self.set(fixture, index, value);
        }
    }

    /// Write R/G/B to channels 0-2 of RGB and RGBW fixtures.
    pub fn set_rgb(&mut self, fixture: &Fixture, color: Color) {
        if !fixture.fixture_type.is_color() {
            return;
        }
        self.set(fixture, 0, color.r);
        self.set(fixture, 1, color.g);
        self.set(fixture, 2, color.b);
    }

    /// Like [`ChannelFrame::set_rgb`], plus white on channel 3 for RGBW fixtures.
    pub fn set_rgbw(&mut self, fixture: &Fixture, color: Color) {
        self.set_rgb(fixture, color);
        if fixture.fixture_type.has_white() {
            self.set(fixture, 3, color.w);
        }
    }

    pub fn pending(&self, fixture_id: u32, index: usize) -> Option<u8> {
        self.writes.get(fixture_id, index)
    }

    pub fn finish(self) -> ChannelWrites {
        self.writes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dmx_types::{FixtureTemplateLibrary, FixtureType};

    fn rig() -> Vec<Fixture> {
        let lib = FixtureTemplateLibrary::new();
        vec![
            Fixture::from_template(1, "Dimmer", lib.get_template("Generic Dimmer").unwrap(), 1),
            Fixture::from_template(2, "RGB", lib.get_template("Generic RGB Par").unwrap(), 2),
            Fixture::from_template(3, "RGBW", lib.get_template("Generic RGBW Par").unwrap(), 5),
        ]
    }

    #[test]
    fn color_writes_respect_capabilities() {
        let fixtures = rig();
        let mut frame = ChannelFrame::new(&fixtures);
        let color = Color::from_rgbw(10, 20, 30, 40);
        for target in frame.targets(&[1, 2, 3]) {
            frame.set_rgbw(target.fixture, color);
        }
        let writes = frame.finish();
        assert_eq!(writes.get(1, 0), None);
        assert_eq!(writes.get(2, 2), Some(30));
        assert_eq!(writes.get(2, 3), None);
        assert_eq!(writes.get(3, 3), Some(40));
        assert_eq!(writes.len(), 7);
    }

    #[test]
    fn later_write_replaces_earlier() {
        let fixtures = rig();
        let mut frame = ChannelFrame::new(&fixtures);
        let dimmer = frame.fixture(1).unwrap();
        frame.set(dimmer, 0, 10);
        assert_eq!(frame.pending(1, 0), Some(10));
        frame.set(dimmer, 0, 99);
        frame.set(dimmer, 5, 99);
        assert_eq!(frame.pending(1, 0), Some(99));
        assert_eq!(frame.pending(1, 5), None);
        assert_eq!(frame.finish().iter().collect::<Vec<_>>(), vec![(
            ChannelKey {
                fixture_id: 1,
                index: 0
            },
            99
        )]);
    }

    #[test]
    fn unknown_ids_keep_their_position() {
        let fixtures = rig();
        let frame = ChannelFrame::new(&fixtures);
        let targets = frame.targets(&[42, 3, 1]);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].position, 1);
        assert_eq!(targets[0].fixture.fixture_type, FixtureType::Rgbw);
        assert_eq!(targets[1].position, 2);
    }
}
