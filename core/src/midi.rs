// Copyright (c) 2023 Mike Tsao. All rights reserved.

pub use midly::{
    live::LiveEvent,
    num::{u4, u7},
    MidiMessage,
};

use std::fmt::Display;
use strum_macros::{Display as StrumDisplay, EnumString, IntoStaticStr};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

pub type MidiChannel = u8;

/// General MIDI reserves channel 10 (zero-based 9) for percussion.
pub const PERCUSSION_CHANNEL: MidiChannel = 9;

/// The kinds of incoming events a filter can be registered against.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, StrumDisplay, EnumString, IntoStaticStr)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(rename_all = "snake_case"))]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    NoteOn,
    NoteOff,
    ControlChange,
    /// Anything else the device sends (pitch bend, aftertouch, ...).
    Other,
}

/// One incoming device event, flattened to the four fields a filter looks at.
/// For a control change, `note` is the controller number and `value` is the
/// controller value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub channel: MidiChannel,
    pub note: u8,
    pub value: u8,
}
impl Event {
    pub fn new(kind: EventKind, channel: MidiChannel, note: u8, value: u8) -> Self {
        Self {
            kind,
            channel,
            note,
            value,
        }
    }

    pub fn note_on(channel: MidiChannel, note: u8, velocity: u8) -> Self {
        Self::new(EventKind::NoteOn, channel, note, velocity)
    }

    pub fn note_off(channel: MidiChannel, note: u8, velocity: u8) -> Self {
        Self::new(EventKind::NoteOff, channel, note, velocity)
    }

    pub fn control_change(channel: MidiChannel, controller: u8, value: u8) -> Self {
        Self::new(EventKind::ControlChange, channel, controller, value)
    }

    /// Flattens a `midly` channel message. A note-on with zero velocity is
    /// a note-off.
    pub fn from_midi(channel: MidiChannel, message: &MidiMessage) -> Self {
        match *message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => {
                Self::note_off(channel, key.as_int(), 0)
            }
            MidiMessage::NoteOn { key, vel } => Self::note_on(channel, key.as_int(), vel.as_int()),
            MidiMessage::NoteOff { key, vel } => {
                Self::note_off(channel, key.as_int(), vel.as_int())
            }
            MidiMessage::Controller { controller, value } => {
                Self::control_change(channel, controller.as_int(), value.as_int())
            }
            MidiMessage::Aftertouch { key, vel } => {
                Self::new(EventKind::Other, channel, key.as_int(), vel.as_int())
            }
            MidiMessage::ProgramChange { program } => {
                Self::new(EventKind::Other, channel, program.as_int(), 0)
            }
            MidiMessage::ChannelAftertouch { vel } => {
                Self::new(EventKind::Other, channel, 0, vel.as_int())
            }
            MidiMessage::PitchBend { .. } => Self::new(EventKind::Other, channel, 0, 0),
        }
    }
}
impl Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} chan {} note {} val {}",
            self.kind, self.channel, self.note, self.value
        )
    }
}

#[allow(dead_code)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GeneralMidiPercussionProgram {
    AcousticBassDrum = 35,
    ElectricBassDrum = 36,
    SideStick = 37,
    AcousticSnare = 38,
    HandClap = 39,
    ElectricSnare = 40,
    LowFloorTom = 41,
    ClosedHiHat = 42,
    HighFloorTom = 43,
    PedalHiHat = 44,
    LowTom = 45,
    OpenHiHat = 46,
    LowMidTom = 47,
    HiMidTom = 48,
    CrashCymbal1 = 49,
    HighTom = 50,
    RideCymbal1 = 51,
    ChineseCymbal = 52,
    RideBell = 53,
    Tambourine = 54,
    SplashCymbal = 55,
    Cowbell = 56,
    CrashCymbal2 = 57,
    Vibraslap = 58,
    RideCymbal2 = 59,
    HighBongo = 60,
    LowBongo = 61,
    MuteHighConga = 62,
    OpenHighConga = 63,
    LowConga = 64,
    HighTimbale = 65,
    LowTimbale = 66,
    HighAgogo = 67,
    LowAgogo = 68,
    Cabasa = 69,
    Maracas = 70,
    ShortWhistle = 71,
    LongWhistle = 72,
    ShortGuiro = 73,
    LongGuiro = 74,
    Claves = 75,
    HighWoodblock = 76,
    LowWoodblock = 77,
    MuteCuica = 78,
    OpenCuica = 79,
    MuteTriangle = 80,
    OpenTriangle = 81,
}
impl GeneralMidiPercussionProgram {
    pub fn key(self) -> u8 {
        self as u8
    }
}
impl From<GeneralMidiPercussionProgram> for u7 {
    fn from(value: GeneralMidiPercussionProgram) -> Self {
        u7::from(value as u8)
    }
}
