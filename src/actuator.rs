use log::debug;

/// The four relay channels of a yaw/pitch head.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    YawPos,
    YawNeg,
    PitchUp,
    PitchDown,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::YawPos,
        Channel::YawNeg,
        Channel::PitchUp,
        Channel::PitchDown,
    ];

    pub fn axis(self) -> Axis {
        match self {
            Channel::YawPos | Channel::YawNeg => Axis::Yaw,
            Channel::PitchUp | Channel::PitchDown => Axis::Pitch,
        }
    }

    /// The other channel on the same axis.
    pub fn partner(self) -> Channel {
        match self {
            Channel::YawPos => Channel::YawNeg,
            Channel::YawNeg => Channel::YawPos,
            Channel::PitchUp => Channel::PitchDown,
            Channel::PitchDown => Channel::PitchUp,
        }
    }

    fn index(self) -> usize {
        match self {
            Channel::YawPos => 0,
            Channel::YawNeg => 1,
            Channel::PitchUp => 2,
            Channel::PitchDown => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Yaw,
    Pitch,
}

impl Axis {
    pub fn channel(self, drive: Drive) -> Channel {
        match (self, drive) {
            (Axis::Yaw, Drive::Positive) => Channel::YawPos,
            (Axis::Yaw, Drive::Negative) => Channel::YawNeg,
            (Axis::Pitch, Drive::Positive) => Channel::PitchUp,
            (Axis::Pitch, Drive::Negative) => Channel::PitchDown,
        }
    }
}

/// Direction of travel on one axis. Positive is clockwise for yaw and up for pitch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Drive {
    Positive,
    Negative,
}

/// Independent on/off outputs. Commands are fire-and-forget and idempotent.
pub trait ActuatorBank {
    fn set(&mut self, channel: Channel, on: bool);
}

impl<A: ActuatorBank + ?Sized> ActuatorBank for &mut A {
    fn set(&mut self, channel: Channel, on: bool) {
        (**self).set(channel, on)
    }
}

/// Guards an [`ActuatorBank`] so that at most one channel per axis is ever on.
///
/// Energizing a channel always releases its partner first, so a conflicting
/// request is coalesced into a direction change instead of shorting the motor.
pub struct Interlock<A: ActuatorBank> {
    bank: A,
    state: [bool; 4],
}

impl<A: ActuatorBank> Interlock<A> {
    /// Takes ownership of the bank and forces every channel off.
    pub fn new(bank: A) -> Self {
        let mut interlock = Self {
            bank,
            state: [false; 4],
        };
        interlock.release_all();
        interlock
    }

    pub fn set(&mut self, channel: Channel, on: bool) {
        if on {
            let partner = channel.partner();
            if self.state[partner.index()] {
                debug!("Interlock: releasing {:?} before {:?}", partner, channel);
            }
            self.write(partner, false);
        }
        self.write(channel, on);
    }

    /// Run one axis in a direction, or hold it with both relays off.
    pub fn drive(&mut self, axis: Axis, drive: Option<Drive>) {
        match drive {
            Some(d) => self.set(axis.channel(d), true),
            None => self.release(axis),
        }
    }

    pub fn release(&mut self, axis: Axis) {
        self.write(axis.channel(Drive::Positive), false);
        self.write(axis.channel(Drive::Negative), false);
    }

    pub fn release_all(&mut self) {
        for channel in Channel::ALL {
            self.write(channel, false);
        }
    }

    pub fn is_on(&self, channel: Channel) -> bool {
        self.state[channel.index()]
    }

    pub fn bank(&self) -> &A {
        &self.bank
    }

    fn write(&mut self, channel: Channel, on: bool) {
        self.bank.set(channel, on);
        self.state[channel.index()] = on;
    }
}

impl<A: ActuatorBank> Drop for Interlock<A> {
    fn drop(&mut self) {
        self.release_all();
    }
}
