//! Lighting effect engine for a DMX console.
//!
//! Effects are either built-in procedural animations or user-authored block
//! programs. A scheduler ticks every active effect in list order and commits
//! the resulting channel writes to the fixture store; later effects overwrite
//! earlier ones on shared channels.

pub mod blocks;
pub mod compiler;
pub mod config;
pub mod console;
pub mod dmx_output;
pub mod dmx_types;
pub mod effect;
pub mod frame;
pub mod input;
pub mod interpreter;
pub mod procedural;
pub mod rig;
pub mod scheduler;

pub use blocks::{Block, BlockKind};
pub use compiler::{CompiledProgram, compile, effect_summary};
pub use config::EngineConfig;
pub use dmx_types::{ChannelSink, Fixture, FixtureStore};
pub use effect::{BuiltInKind, Effect, EffectKind};
pub use interpreter::RuntimeState;
pub use rig::Rig;
pub use scheduler::{BatchRunner, EffectScheduler, Scheduler, TickReport};
