use open_dmx::check_valid_channel;

use crate::dmx_types::{DMX_CHANNELS, Fixture};

/// Render committed fixture values into one DMX universe.
/// Overlapping addresses: the later fixture wins.
pub fn mix_fixture_outputs(fixtures: &[Fixture]) -> [u8; DMX_CHANNELS] {
    let mut dmx_chans = [0u8; DMX_CHANNELS];

    fixtures
        .iter()
        .flat_map(|fixture| fixture.dmx_values())
        .filter(|v| check_valid_channel(v.chan).is_ok())
        .for_each(|v| {
            if let Some(chan) = v.chan.checked_sub(1).and_then(|idx| dmx_chans.get_mut(idx)) {
                *chan = v.dmx;
            }
        });
    dmx_chans
}

/// Compact `addr:value` listing of the non-zero slots, for the monitor log.
pub fn describe_frame(dmx_chans: &[u8; DMX_CHANNELS]) -> String {
    let lit: Vec<String> = dmx_chans
        .iter()
        .enumerate()
        .filter(|(_, v)| **v > 0)
        .map(|(idx, v)| format!("{}:{v}", idx + 1))
        .collect();
    if lit.is_empty() {
        "dark".to_string()
    } else {
        lit.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dmx_types::{Channel, FixtureTemplateLibrary, FixtureType};

    #[test]
    fn values_land_on_their_addresses() {
        let lib = FixtureTemplateLibrary::new();
        let mut par = Fixture::from_template(1, "Par", lib.get_template("Generic RGB Par").unwrap(), 10);
        par.channels[1].value = 200;
        let frame = mix_fixture_outputs(&[par]);
        assert_eq!(frame[9], 0);
        assert_eq!(frame[10], 200);
        assert_eq!(describe_frame(&frame), "11:200");
    }

    #[test]
    fn invalid_addresses_are_skipped_and_later_fixtures_win() {
        let mut a = Fixture::new(1, "A", FixtureType::Generic);
        a.channels = vec![
            Channel { id: 1, number: 0, name: "Intensity".into(), value: 9 },
            Channel { id: 2, number: 5, name: "Intensity".into(), value: 10 },
        ];
        let mut b = Fixture::new(2, "B", FixtureType::Generic);
        b.channels = vec![
            Channel { id: 3, number: 5, name: "Intensity".into(), value: 20 },
            Channel { id: 4, number: 513, name: "Intensity".into(), value: 30 },
        ];
        let frame = mix_fixture_outputs(&[a, b]);
        assert_eq!(frame[0], 0);
        assert_eq!(frame[4], 20);
        assert_eq!(frame.iter().filter(|v| **v > 0).count(), 1);
    }

    #[test]
    fn empty_rig_is_dark() {
        assert_eq!(describe_frame(&mix_fixture_outputs(&[])), "dark");
    }
}
