//! Rig files: the patched fixtures and the effect list, as JSON.
//!
//! ```json
//! {
//!   "fixtures": [{"id": 1, "fixtureType": "rgb", "channels": [...]}],
//!   "effects": [{"id": 1, "kind": "chase", "fixtureIds": [1], "isActive": true}]
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blocks::{
    Block, BlockError, BlockKind, LoopStart, PanTilt, SetColor, Wait, validate_order,
};
use crate::dmx_types::{ChannelSink, Fixture, FixtureStore, FixtureTemplateLibrary};
use crate::effect::{BuiltInKind, Effect};

#[derive(Error, Debug)]
pub enum RigError {
    #[error("Could not read rig file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid rig JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Duplicate fixture id: {0}")]
    DuplicateFixture(u32),
    #[error("Duplicate effect id: {0}")]
    DuplicateEffect(u32),
    #[error("Effect {effect_id}: {source}")]
    Block {
        effect_id: u32,
        #[source]
        source: BlockError,
    },
    #[error("Unknown fixture template: {0}")]
    UnknownTemplate(String),
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rig {
    #[serde(default)]
    pub fixtures: FixtureStore,
    #[serde(default)]
    pub effects: Vec<Effect>,
}

impl Rig {
    /// Parse and validate a rig.
    pub fn from_json(json: &str) -> Result<Self, RigError> {
        let rig: Rig = serde_json::from_str(json)?;
        rig.validate()?;
        Ok(rig)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RigError> {
        let path = path.as_ref();
        let rig = Self::from_json(&fs::read_to_string(path)?)?;
        info!(
            "Loaded rig {}: {} fixtures, {} effects",
            path.display(),
            rig.fixtures.len(),
            rig.effects.len()
        );
        Ok(rig)
    }

    /// Reject duplicate ids and misordered blocks.
    /// Effects pointing at unknown fixtures are accepted; those ids are skipped when rendering.
    pub fn validate(&self) -> Result<(), RigError> {
        let mut fixture_ids = HashSet::new();
        for fixture in self.fixtures.fixtures() {
            if !fixture_ids.insert(fixture.id) {
                return Err(RigError::DuplicateFixture(fixture.id));
            }
        }

        let mut effect_ids = HashSet::new();
        for effect in &self.effects {
            if !effect_ids.insert(effect.id) {
                return Err(RigError::DuplicateEffect(effect.id));
            }
            validate_order(&effect.blocks).map_err(|source| RigError::Block {
                effect_id: effect.id,
                source,
            })?;
            for id in effect.fixture_ids.iter().filter(|id| !fixture_ids.contains(*id)) {
                warn!("Effect {} \"{}\" targets unknown fixture {id}", effect.id, effect.name);
            }
        }
        Ok(())
    }

    pub fn effect(&self, id: u32) -> Option<&Effect> {
        self.effects.iter().find(|e| e.id == id)
    }

    pub fn effect_mut(&mut self, id: u32) -> Option<&mut Effect> {
        self.effects.iter_mut().find(|e| e.id == id)
    }

    pub fn remove_effect(&mut self, id: u32) -> Option<Effect> {
        let idx = self.effects.iter().position(|e| e.id == id)?;
        Some(self.effects.remove(idx))
    }

    /// Small built-in rig: three dimmers, three RGB pars, an RGBW par and a moving head.
    pub fn demo() -> Result<Self, RigError> {
        let lib = FixtureTemplateLibrary::new();
        let template = |name: &str| {
            lib.get_template(name)
                .ok_or_else(|| RigError::UnknownTemplate(name.to_string()))
        };

        let dimmer = template("Generic Dimmer")?;
        let par = template("Generic RGB Par")?;
        let mut fixtures = FixtureStore::default();
        for n in 0..3 {
            fixtures.add(Fixture::from_template(1 + n, format!("Par {}", n + 1), par, 1 + 3 * n as usize));
            fixtures.add(Fixture::from_template(6 + n, format!("Dimmer {}", n + 1), dimmer, 40 + n as usize));
        }
        fixtures.add(Fixture::from_template(4, "Wash", template("Generic RGBW Par")?, 10));
        fixtures.add(Fixture::from_template(5, "Spot", template("Generic Moving Head")?, 20));

        let program = [
            BlockKind::LoopStart(LoopStart { loop_count: 3 }),
            BlockKind::PanTilt(PanTilt { pan: 64, tilt: 100 }),
            BlockKind::Wait(Wait { wait_time: 500.0 }),
            BlockKind::PanTilt(PanTilt { pan: 192, tilt: 160 }),
            BlockKind::Wait(Wait { wait_time: 500.0 }),
            BlockKind::LoopEnd,
            BlockKind::SetColor(SetColor {
                white: 255,
                ..Default::default()
            }),
            BlockKind::RandomColor,
        ];
        let blocks = program
            .into_iter()
            .enumerate()
            .map(|(order, kind)| Block::new(100 + order as u32, order, kind))
            .collect();

        let rig = Rig {
            fixtures,
            effects: vec![
                Effect::built_in(1, "Dimmer chase", BuiltInKind::Chase, vec![6, 7, 8]),
                Effect::built_in(2, "Rainbow", BuiltInKind::Rainbow, vec![1, 2, 3, 4]).with_speed(50.0),
                Effect::block_program(3, "Spot routine", vec![5, 4], blocks),
            ],
        };
        rig.validate()?;
        Ok(rig)
    }
}
