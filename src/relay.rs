// Use rppal in production
#[cfg(not(test))]
use rppal::gpio::{Gpio, OutputPin};

#[cfg(test)]
// This is only used in testing, not compiled in release.
use crate::mocks::mock_gpio::{Gpio, OutputPin};

use log::info;

use crate::actuator::{ActuatorBank, Channel};
use crate::config::RelayPins;
use crate::error::GimbalError;

/// Four GPIO-driven relays, one per motor direction.
pub struct RelayBank {
    yaw_pos: OutputPin,
    yaw_neg: OutputPin,
    pitch_up: OutputPin,
    pitch_down: OutputPin,
    active_low: bool,
}

impl RelayBank {
    /// Claims the pins with every relay de-energized.
    pub fn new(pins: &RelayPins) -> Result<Self, GimbalError> {
        let gpio = Gpio::new()?;
        let active_low = pins.active_low;
        let claim = |pin: u8| -> Result<OutputPin, GimbalError> {
            let pin = gpio.get(pin)?;
            Ok(if active_low {
                pin.into_output_high()
            } else {
                pin.into_output_low()
            })
        };

        let bank = Self {
            yaw_pos: claim(pins.yaw_pos)?,
            yaw_neg: claim(pins.yaw_neg)?,
            pitch_up: claim(pins.pitch_up)?,
            pitch_down: claim(pins.pitch_down)?,
            active_low,
        };

        info!(
            "✓ Relays on GPIO {} / {} (yaw), {} / {} (pitch)",
            pins.yaw_pos, pins.yaw_neg, pins.pitch_up, pins.pitch_down
        );
        Ok(bank)
    }

    pub fn is_energized(&self, channel: Channel) -> bool {
        self.pin(channel).is_set_high() != self.active_low
    }

    fn pin(&self, channel: Channel) -> &OutputPin {
        match channel {
            Channel::YawPos => &self.yaw_pos,
            Channel::YawNeg => &self.yaw_neg,
            Channel::PitchUp => &self.pitch_up,
            Channel::PitchDown => &self.pitch_down,
        }
    }

    fn pin_mut(&mut self, channel: Channel) -> &mut OutputPin {
        match channel {
            Channel::YawPos => &mut self.yaw_pos,
            Channel::YawNeg => &mut self.yaw_neg,
            Channel::PitchUp => &mut self.pitch_up,
            Channel::PitchDown => &mut self.pitch_down,
        }
    }
}

impl ActuatorBank for RelayBank {
    fn set(&mut self, channel: Channel, on: bool) {
        let high = on != self.active_low;
        let pin = self.pin_mut(channel);
        if high {
            pin.set_high();
        } else {
            pin.set_low();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::Interlock;
    use crate::mocks::mock_gpio::{self, Level};

    #[test]
    fn test_pins_start_released() -> Result<(), GimbalError> {
        mock_gpio::reset_mock_pins();
        let pins = RelayPins::default();

        let bank = RelayBank::new(&pins)?;

        for pin in [pins.yaw_pos, pins.yaw_neg, pins.pitch_up, pins.pitch_down] {
            assert_eq!(mock_gpio::mock_pin_level(pin), Some(Level::Low));
        }
        assert!(Channel::ALL.iter().all(|c| !bank.is_energized(*c)));
        Ok(())
    }

    #[test]
    fn test_channels_map_to_configured_pins() -> Result<(), GimbalError> {
        mock_gpio::reset_mock_pins();
        let pins = RelayPins::default();
        let mut bank = RelayBank::new(&pins)?;

        bank.set(Channel::PitchDown, true);

        assert_eq!(mock_gpio::mock_pin_level(pins.pitch_down), Some(Level::High));
        assert_eq!(mock_gpio::mock_pin_level(pins.pitch_up), Some(Level::Low));
        assert!(bank.is_energized(Channel::PitchDown));
        Ok(())
    }

    #[test]
    fn test_active_low_board() -> Result<(), GimbalError> {
        mock_gpio::reset_mock_pins();
        let pins = RelayPins {
            active_low: true,
            ..RelayPins::default()
        };
        let mut bank = RelayBank::new(&pins)?;
        assert_eq!(mock_gpio::mock_pin_level(pins.yaw_pos), Some(Level::High));

        bank.set(Channel::YawPos, true);

        assert_eq!(mock_gpio::mock_pin_level(pins.yaw_pos), Some(Level::Low));
        assert!(bank.is_energized(Channel::YawPos));
        Ok(())
    }

    #[test]
    fn test_interlock_over_gpio() -> Result<(), GimbalError> {
        mock_gpio::reset_mock_pins();
        let pins = RelayPins::default();
        let mut interlock = Interlock::new(RelayBank::new(&pins)?);

        interlock.set(Channel::YawPos, true);
        interlock.set(Channel::YawNeg, true);

        assert!(!interlock.bank().is_energized(Channel::YawPos));
        assert!(interlock.bank().is_energized(Channel::YawNeg));

        interlock.release_all();
        assert!(Channel::ALL.iter().all(|c| !interlock.bank().is_energized(*c)));
        Ok(())
    }
}
