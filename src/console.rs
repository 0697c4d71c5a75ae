use log::info;
use scan_fmt::scan_fmt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compiler::compile;
use crate::rig::Rig;

#[derive(Error, Debug, PartialEq)]
pub enum ConsoleError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Effect {0} not found")]
    UnknownEffect(u32),
    #[error("Fixture {0} has no channel {1}")]
    UnknownChannel(u32, usize),
    #[error("Invalid percent: {0}. Must be between 0 and 100")]
    InvalidPercent(String),
    #[error("Invalid level: {0}. Must be between 0 and 255")]
    InvalidLevel(String),
    #[error("Effect {0} is not a block program")]
    NotABlockProgram(u32),
    #[error("Missing arguments for command: {0}")]
    MissingArgs(String),
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, strum::Display)]
pub enum ConsoleCommand {
    #[strum(serialize = "Fx {id} On")]
    Activate { id: u32 },
    #[strum(serialize = "Fx {id} Off")]
    Deactivate { id: u32 },
    #[strum(serialize = "Fx {id} Delete")]
    Delete { id: u32 },
    #[strum(serialize = "Fx {id} Speed {percent}")]
    Speed { id: u32, percent: f64 },
    #[strum(serialize = "Fx {id} Intensity {percent}")]
    Intensity { id: u32, percent: f64 },
    #[strum(serialize = "Fx {id} Summary")]
    Summary { id: u32 },
    #[strum(serialize = "Fix {fixture_id} Chan {index} at {value}")]
    SetChannel {
        fixture_id: u32,
        index: usize,
        value: u8,
    },
    #[strum(serialize = "List")]
    List,
    #[strum(serialize = "Blackout")]
    Blackout,
}

fn percent(raw: f64) -> Result<f64, ConsoleError> {
    if (0.0..=100.0).contains(&raw) {
        Ok(raw)
    } else {
        Err(ConsoleError::InvalidPercent(raw.to_string()))
    }
}

impl TryFrom<String> for ConsoleCommand {
    type Error = ConsoleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let s = value.trim().to_lowercase();
        if s == "b/o" || s == "blackout" || s == "bo" {
            return Ok(ConsoleCommand::Blackout);
        }
        if s == "list" || s == "ls" {
            return Ok(ConsoleCommand::List);
        }
        if let Ok((id, verb, raw)) = scan_fmt!(&s, "fx {} {} {}", u32, String, f64) {
            return match verb.as_str() {
                "speed" => Ok(ConsoleCommand::Speed { id, percent: percent(raw)? }),
                "intensity" | "int" => Ok(ConsoleCommand::Intensity { id, percent: percent(raw)? }),
                _ => Err(ConsoleError::UnknownCommand(value)),
            };
        }
        if let Ok((id, verb)) = scan_fmt!(&s, "fx {} {}", u32, String) {
            return match verb.as_str() {
                "on" => Ok(ConsoleCommand::Activate { id }),
                "off" => Ok(ConsoleCommand::Deactivate { id }),
                "delete" | "del" => Ok(ConsoleCommand::Delete { id }),
                "summary" => Ok(ConsoleCommand::Summary { id }),
                "speed" | "intensity" | "int" => Err(ConsoleError::MissingArgs(s)),
                _ => Err(ConsoleError::UnknownCommand(value)),
            };
        }
        if let Ok((fixture_id, index, level)) = scan_fmt!(&s, "fix {} chan {} at {}", u32, usize, u32) {
            let value = u8::try_from(level).map_err(|_| ConsoleError::InvalidLevel(level.to_string()))?;
            return Ok(ConsoleCommand::SetChannel {
                fixture_id,
                index,
                value,
            });
        }

        let mut words = s.split_whitespace();
        match (words.next(), words.count()) {
            (Some(cmd @ ("fx" | "fix")), n) if n < 2 => Err(ConsoleError::MissingArgs(cmd.to_string())),
            _ => Err(ConsoleError::UnknownCommand(value)),
        }
    }
}

impl ConsoleCommand {
    pub fn parse(input: &str) -> Result<ConsoleCommand, ConsoleError> {
        ConsoleCommand::try_from(input.to_string())
    }
}

/// Parse and apply one command line to the rig. Returns the text to show the operator.
pub fn execute_console_command(rig: &mut Rig, input: &str) -> Result<String, ConsoleError> {
    let cmd = ConsoleCommand::parse(input)?;

    let reply = match &cmd {
        ConsoleCommand::Activate { id } | ConsoleCommand::Deactivate { id } => {
            let active = matches!(cmd, ConsoleCommand::Activate { .. });
            let effect = rig.effect_mut(*id).ok_or(ConsoleError::UnknownEffect(*id))?;
            effect.is_active = active;
            format!("{} \"{}\" {}", effect.id, effect.name, if active { "on" } else { "off" })
        }
        ConsoleCommand::Delete { id } => {
            let effect = rig.remove_effect(*id).ok_or(ConsoleError::UnknownEffect(*id))?;
            format!("{} \"{}\" deleted", effect.id, effect.name)
        }
        ConsoleCommand::Speed { id, percent } => {
            let effect = rig.effect_mut(*id).ok_or(ConsoleError::UnknownEffect(*id))?;
            effect.set_speed(*percent);
            format!("{} speed {}%", effect.id, effect.speed_percent)
        }
        ConsoleCommand::Intensity { id, percent } => {
            let effect = rig.effect_mut(*id).ok_or(ConsoleError::UnknownEffect(*id))?;
            effect.set_intensity(*percent);
            format!("{} intensity {}%", effect.id, effect.intensity_percent)
        }
        ConsoleCommand::Summary { id } => {
            let effect = rig.effect(*id).ok_or(ConsoleError::UnknownEffect(*id))?;
            if !effect.is_block_program() {
                return Err(ConsoleError::NotABlockProgram(*id));
            }
            let program = compile(&effect.blocks);
            format!("{}\n{}", program.summary(), program.compiled())
        }
        ConsoleCommand::SetChannel {
            fixture_id,
            index,
            value,
        } => {
            if !rig.fixtures.set_channel(*fixture_id, *index, *value) {
                return Err(ConsoleError::UnknownChannel(*fixture_id, *index));
            }
            format!("{fixture_id}.{index} = {value}")
        }
        ConsoleCommand::List => rig
            .effects
            .iter()
            .map(|e| {
                format!(
                    "{:>3} {:<20} {:<14} {} speed {}% intensity {}%",
                    e.id,
                    e.name,
                    e.kind.to_string(),
                    if e.is_active { "on " } else { "off" },
                    e.speed_percent,
                    e.intensity_percent
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
        ConsoleCommand::Blackout => {
            rig.fixtures.blackout();
            "blackout".to_string()
        }
    };
    info!("{cmd}");
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(ConsoleCommand::parse("FX 3 on"), Ok(ConsoleCommand::Activate { id: 3 }));
        assert_eq!(ConsoleCommand::parse("fx 3 off"), Ok(ConsoleCommand::Deactivate { id: 3 }));
        assert_eq!(
            ConsoleCommand::parse("fx 2 speed 40"),
            Ok(ConsoleCommand::Speed { id: 2, percent: 40.0 })
        );
        assert_eq!(
            ConsoleCommand::parse(" fix 1 chan 2 at 255 "),
            Ok(ConsoleCommand::SetChannel {
                fixture_id: 1,
                index: 2,
                value: 255
            })
        );
        assert_eq!(ConsoleCommand::parse("b/o"), Ok(ConsoleCommand::Blackout));
        assert_eq!(ConsoleCommand::Speed { id: 2, percent: 40.0 }.to_string(), "Fx 2 Speed 40");
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            ConsoleCommand::parse("fx 2 speed 140"),
            Err(ConsoleError::InvalidPercent(_))
        ));
        assert!(matches!(
            ConsoleCommand::parse("fix 1 chan 0 at 300"),
            Err(ConsoleError::InvalidLevel(_))
        ));
        assert!(matches!(ConsoleCommand::parse("fx"), Err(ConsoleError::MissingArgs(_))));
        assert!(matches!(ConsoleCommand::parse("fx 2 speed"), Err(ConsoleError::MissingArgs(_))));
        assert!(matches!(ConsoleCommand::parse("fx 2 dance"), Err(ConsoleError::UnknownCommand(_))));
        assert!(matches!(ConsoleCommand::parse("go"), Err(ConsoleError::UnknownCommand(_))));
    }

    #[test]
    fn applies_to_the_rig() {
        let mut rig = Rig::demo().unwrap();
        execute_console_command(&mut rig, "fx 1 off").unwrap();
        assert!(!rig.effect(1).unwrap().is_active);
        execute_console_command(&mut rig, "fx 2 intensity 25").unwrap();
        assert_eq!(rig.effect(2).unwrap().intensity_percent, 25.0);
        execute_console_command(&mut rig, "fix 5 chan 0 at 90").unwrap();
        assert_eq!(rig.fixtures.get(5).and_then(|f| f.value(0)), Some(90));
        execute_console_command(&mut rig, "blackout").unwrap();
        assert_eq!(rig.fixtures.get(5).and_then(|f| f.value(0)), Some(0));

        let summary = execute_console_command(&mut rig, "fx 3 summary").unwrap();
        assert!(summary.starts_with("8 blocks · 1 loop · ~"));
        assert_eq!(
            execute_console_command(&mut rig, "fx 1 summary"),
            Err(ConsoleError::NotABlockProgram(1))
        );

        execute_console_command(&mut rig, "fx 3 delete").unwrap();
        assert!(rig.effect(3).is_none());
        assert_eq!(
            execute_console_command(&mut rig, "fx 3 on"),
            Err(ConsoleError::UnknownEffect(3))
        );
        assert_eq!(
            execute_console_command(&mut rig, "fix 5 chan 99 at 1"),
            Err(ConsoleError::UnknownChannel(5, 99))
        );
        assert_eq!(execute_console_command(&mut rig, "list").unwrap().lines().count(), 2);
    }
}
