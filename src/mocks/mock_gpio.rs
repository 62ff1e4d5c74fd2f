// This file is only compiled during tests

use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Level {
    Low,
    High,
}

thread_local! {
    static MOCK_PINS: RefCell<HashMap<u8, Level>> = RefCell::new(HashMap::new());
}

pub struct Gpio;

impl Gpio {
    pub fn new() -> Result<Self, rppal::gpio::Error> {
        Ok(Gpio)
    }

    pub fn get(&self, pin: u8) -> Result<Pin, rppal::gpio::Error> {
        Ok(Pin { pin })
    }
}

pub struct Pin {
    pin: u8,
}

impl Pin {
    pub fn into_output_low(self) -> OutputPin {
        set_level(self.pin, Level::Low);
        OutputPin { pin: self.pin }
    }

    pub fn into_output_high(self) -> OutputPin {
        set_level(self.pin, Level::High);
        OutputPin { pin: self.pin }
    }
}

pub struct OutputPin {
    pin: u8,
}

impl OutputPin {
    pub fn set_high(&mut self) {
        set_level(self.pin, Level::High);
    }

    pub fn set_low(&mut self) {
        set_level(self.pin, Level::Low);
    }

    pub fn is_set_high(&self) -> bool {
        mock_pin_level(self.pin) == Some(Level::High)
    }
}

fn set_level(pin: u8, level: Level) {
    MOCK_PINS.with(|pins| {
        pins.borrow_mut().insert(pin, level);
    });
}

// test helper to read back what the code under test drove
pub fn mock_pin_level(pin: u8) -> Option<Level> {
    MOCK_PINS.with(|pins| pins.borrow().get(&pin).copied())
}

// test helper to reset all pins
pub fn reset_mock_pins() {
    MOCK_PINS.with(|pins| {
        pins.borrow_mut().clear();
    });
}
